#![allow(dead_code)]

use binwrite::BinWrite;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

#[derive(BinWrite)]
#[binwrite(little)]
struct IconDirHeader {
    reserved: u16,
    kind: u16,
    count: u16,
}

#[derive(BinWrite)]
#[binwrite(little)]
struct IconDirRecord {
    width: u8,
    height: u8,
    color_count: u8,
    reserved: u8,
    planes: u16,
    bit_count: u16,
    size: u32,
    offset: u32,
}

#[derive(BinWrite)]
#[binwrite(little)]
struct BitmapInfoHeader {
    size: u32,
    width: i32,
    height: i32,
    planes: u16,
    bit_count: u16,
    compression: u32,
    size_image: u32,
    x_pels_per_meter: i32,
    y_pels_per_meter: i32,
    clr_used: u32,
    clr_important: u32,
}

/// One directory entry: declared width, height and the embedded bytes.
pub struct Entry {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Entry {
    pub fn dib(image: &RgbaImage) -> Entry {
        Entry {
            width: image.width(),
            height: image.height(),
            data: dib32(image),
        }
    }

    pub fn png(image: &RgbaImage) -> Entry {
        Entry {
            width: image.width(),
            height: image.height(),
            data: png(image),
        }
    }
}

fn dimension_byte(value: u32) -> u8 {
    match value {
        x if x >= 256 => 0,
        x => x as u8,
    }
}

pub fn icon_with_header(reserved: u16, kind: u16, entries: &[Entry]) -> Vec<u8> {
    let mut bytes = Vec::new();

    IconDirHeader {
        reserved,
        kind,
        count: entries.len() as u16,
    }
    .write(&mut bytes)
    .unwrap();

    let mut offset = 6 + 16 * entries.len() as u32;

    for entry in entries {
        IconDirRecord {
            width: dimension_byte(entry.width),
            height: dimension_byte(entry.height),
            color_count: 0,
            reserved: 0,
            planes: 1,
            bit_count: 32,
            size: entry.data.len() as u32,
            offset,
        }
        .write(&mut bytes)
        .unwrap();

        offset += entry.data.len() as u32;
    }

    for entry in entries {
        bytes.extend_from_slice(&entry.data);
    }

    bytes
}

pub fn icon(entries: &[Entry]) -> Vec<u8> {
    icon_with_header(0, 1, entries)
}

/// 32 bit icon DIB: doubled height, bottom-up BGRA rows, empty AND mask.
pub fn dib32(image: &RgbaImage) -> Vec<u8> {
    let (width, height) = image.dimensions();
    let mut bytes = Vec::new();

    BitmapInfoHeader {
        size: 40,
        width: width as i32,
        height: height as i32 * 2,
        planes: 1,
        bit_count: 32,
        compression: 0,
        size_image: 0,
        x_pels_per_meter: 0,
        y_pels_per_meter: 0,
        clr_used: 0,
        clr_important: 0,
    }
    .write(&mut bytes)
    .unwrap();

    for y in (0..height).rev() {
        for x in 0..width {
            let [r, g, b, a] = image.get_pixel(x, y).0;
            bytes.extend_from_slice(&[b, g, r, a]);
        }
    }

    let mask_stride = (width as usize).div_ceil(32) * 4;
    bytes.extend(std::iter::repeat(0).take(mask_stride * height as usize));

    bytes
}

pub fn png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Deterministic image with varying colour and alpha.
pub fn pattern(width: u32, height: u32, seed: u8) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x as u8).wrapping_mul(7).wrapping_add(seed),
            (y as u8).wrapping_mul(13),
            seed,
            ((x + y) as u8).wrapping_mul(31),
        ])
    })
}

/// Width and height from a PNG's IHDR chunk.
pub fn png_dimensions(bytes: &[u8]) -> (u32, u32) {
    assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    assert_eq!(&bytes[12..16], b"IHDR");

    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);

    (width, height)
}
