//! Device-independent bitmap as stored inside icon entries.
//!
//! An icon DIB is a `BITMAPINFOHEADER` (or a later version of it), an
//! optional palette, the colour plane and a 1 bit AND mask. The height field
//! covers both planes, so it is twice the image height. Rows of both planes
//! are padded to 4 bytes and stored bottom-up unless the height is negative.

use binread::io::Cursor;
use binread::BinRead;
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::error::{IcoError, Result};
use crate::frame::{DecodedFrame, PixelFormat};

const INFO_HEADER_SIZE: usize = 40;
const BITFIELDS_SIZE: usize = 12;
/// V3 and later headers carry the masks themselves.
const MASKED_HEADER_SIZE: usize = 56;

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;

#[derive(BinRead, Debug)]
#[br(little)]
struct BitmapInfoHeader {
    _size: u32,
    width: i32,
    height: i32,
    _planes: u16,
    bit_count: u16,
    compression: u32,
    _size_image: u32,
    _x_pels_per_meter: i32,
    _y_pels_per_meter: i32,
    clr_used: u32,
    _clr_important: u32,
}

#[derive(Debug, Clone, Copy)]
struct ChannelMasks {
    red: u32,
    green: u32,
    blue: u32,
    alpha: u32,
}

const RGB555: ChannelMasks = ChannelMasks {
    red: 0x7c00,
    green: 0x03e0,
    blue: 0x001f,
    alpha: 0,
};

const BGR888: ChannelMasks = ChannelMasks {
    red: 0x00ff_0000,
    green: 0x0000_ff00,
    blue: 0x0000_00ff,
    alpha: 0,
};

const BGRA8888: ChannelMasks = ChannelMasks {
    alpha: 0xff00_0000,
    ..BGR888
};

enum Layout {
    Indexed(Vec<Rgba<u8>>),
    Packed(ChannelMasks),
}

fn corrupt(reason: impl Into<String>) -> IcoError {
    IcoError::CorruptFrameData(reason.into())
}

fn row_stride(width: usize, bit_count: u16) -> usize {
    (width * bit_count as usize).div_ceil(32) * 4
}

/// Scales the bits selected by `mask` to the 0..=255 range.
fn channel(value: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }

    let max = (mask >> mask.trailing_zeros()) as u64;
    let raw = ((value & mask) >> mask.trailing_zeros()) as u64;

    ((raw * 255 + max / 2) / max) as u8
}

fn read_palette(data: &[u8], offset: usize, count: usize) -> Result<Vec<Rgba<u8>>> {
    let end = offset + count * 4;
    if data.len() < end {
        return Err(corrupt(format!(
            "palette of {count} colours truncated ({} of {end} bytes)",
            data.len()
        )));
    }

    Ok(data[offset..end]
        .chunks_exact(4)
        .map(|bgrx| Rgba([bgrx[2], bgrx[1], bgrx[0], 255]))
        .collect())
}

fn le_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| corrupt(format!("bitmap truncated at offset {offset}")))
}

/// Bit field masks start right after the info header, whether they are part
/// of a larger header or follow a plain one.
fn read_masks(data: &[u8], with_alpha: bool) -> Result<ChannelMasks> {
    Ok(ChannelMasks {
        red: le_u32(data, INFO_HEADER_SIZE)?,
        green: le_u32(data, INFO_HEADER_SIZE + 4)?,
        blue: le_u32(data, INFO_HEADER_SIZE + 8)?,
        alpha: match with_alpha {
            true => le_u32(data, INFO_HEADER_SIZE + 12)?,
            false => 0,
        },
    })
}

fn pixel_value(row: &[u8], x: usize, bit_count: u16) -> u32 {
    match bit_count {
        1 | 4 | 8 => {
            let bits = bit_count as usize;
            let per_byte = 8 / bits;
            let byte = row[x / per_byte];
            let shift = 8 - bits * (x % per_byte + 1);
            ((byte >> shift) & ((1u16 << bits) - 1) as u8) as u32
        }
        _ => {
            let bytes = bit_count as usize / 8;
            row[x * bytes..(x + 1) * bytes]
                .iter()
                .rev()
                .fold(0u32, |acc, &b| (acc << 8) | b as u32)
        }
    }
}

fn mask_bit(row: &[u8], x: usize) -> bool {
    (row[x / 8] >> (7 - x % 8)) & 1 == 1
}

/// Decodes an icon DIB into top-down RGBA.
pub fn decode_dib(data: &[u8]) -> Result<DecodedFrame> {
    if data.len() < 4 {
        return Err(corrupt(format!("{} byte bitmap has no header", data.len())));
    }

    let header_size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if header_size < INFO_HEADER_SIZE {
        return Err(IcoError::UnsupportedFrameEncoding(format!(
            "bitmap header of {header_size} bytes"
        )));
    }
    if data.len() < header_size {
        return Err(corrupt(format!(
            "bitmap header needs {header_size} bytes, entry has {}",
            data.len()
        )));
    }

    let mut reader = Cursor::new(data);
    let header =
        BitmapInfoHeader::read(&mut reader).map_err(|e| corrupt(format!("bitmap header: {e}")))?;

    if header.width <= 0 {
        return Err(corrupt(format!("bitmap width {}", header.width)));
    }

    let width = header.width as usize;
    let height = (header.height.unsigned_abs() / 2) as usize;
    let top_down = header.height < 0;
    let bit_count = header.bit_count;

    if height == 0 {
        return Err(corrupt(format!("bitmap height {}", header.height)));
    }

    let mut offset = header_size;

    let layout = match (header.compression, bit_count) {
        (BI_RGB, 1 | 4 | 8) => {
            let count = match header.clr_used {
                0 => 1usize << bit_count,
                n => n as usize,
            };
            if count > 256 {
                return Err(corrupt(format!("palette of {count} colours")));
            }
            let palette = read_palette(data, offset, count)?;
            offset += count * 4;
            Layout::Indexed(palette)
        }
        (BI_RGB, 16) => Layout::Packed(RGB555),
        (BI_RGB, 24) => Layout::Packed(BGR888),
        (BI_RGB, 32) => Layout::Packed(BGRA8888),
        (BI_BITFIELDS, 16 | 32) => {
            let mut masks = read_masks(data, header_size >= MASKED_HEADER_SIZE)?;
            if header_size == INFO_HEADER_SIZE {
                offset += BITFIELDS_SIZE;
            }
            // A plain info header has no alpha mask field, 32 bit icons keep
            // alpha in the bits left over by the colour masks.
            if bit_count == 32 && header_size == INFO_HEADER_SIZE {
                masks.alpha = !(masks.red | masks.green | masks.blue);
            }
            if bit_count == 16 {
                masks.alpha = 0;
            }
            Layout::Packed(masks)
        }
        (BI_RGB | BI_BITFIELDS, n) => {
            return Err(IcoError::UnsupportedFrameEncoding(format!(
                "{n} bits per pixel"
            )))
        }
        (c, _) => {
            return Err(IcoError::UnsupportedFrameEncoding(format!(
                "bitmap compression method {c}"
            )))
        }
    };

    let color_stride = row_stride(width, bit_count);
    let color_len = color_stride
        .checked_mul(height)
        .ok_or_else(|| corrupt("bitmap dimensions overflow"))?;
    let color_end = offset
        .checked_add(color_len)
        .ok_or_else(|| corrupt("bitmap dimensions overflow"))?;

    if data.len() < color_end {
        return Err(corrupt(format!(
            "{width}x{height} colour plane needs {color_len} bytes at {offset}, entry has {}",
            data.len()
        )));
    }

    let mask_stride = row_stride(width, 1);
    let mask_len = mask_stride * height;
    let mask = match data.len() - color_end {
        0 => {
            debug!(width, height, "bitmap has no AND mask, treating as opaque");
            None
        }
        n if n < mask_len => {
            return Err(corrupt(format!(
                "AND mask truncated ({n} of {mask_len} bytes)"
            )))
        }
        _ => Some(&data[color_end..color_end + mask_len]),
    };

    let source_row = |y: usize| if top_down { y } else { height - 1 - y };

    let mut pixels = RgbaImage::new(width as u32, height as u32);

    for y in 0..height {
        let start = offset + source_row(y) * color_stride;
        let row = &data[start..start + color_stride];

        for x in 0..width {
            let value = pixel_value(row, x, bit_count);

            let pixel = match &layout {
                Layout::Indexed(palette) => palette
                    .get(value as usize)
                    .copied()
                    .unwrap_or(Rgba([0, 0, 0, 255])),
                Layout::Packed(masks) => Rgba([
                    channel(value, masks.red),
                    channel(value, masks.green),
                    channel(value, masks.blue),
                    match masks.alpha {
                        0 => 255,
                        m => channel(value, m),
                    },
                ]),
            };

            pixels.put_pixel(x as u32, y as u32, pixel);
        }
    }

    let channel_alpha = match &layout {
        Layout::Packed(masks) => bit_count == 32 && masks.alpha != 0,
        Layout::Indexed(_) => false,
    };

    if !channel_alpha {
        for y in 0..height {
            let mask_row = mask.map(|m| {
                let start = source_row(y) * mask_stride;
                &m[start..start + mask_stride]
            });

            for x in 0..width {
                let transparent = mask_row.is_some_and(|row| mask_bit(row, x));
                pixels.get_pixel_mut(x as u32, y as u32).0[3] = if transparent { 0 } else { 255 };
            }
        }
    }

    Ok(DecodedFrame {
        width: width as u32,
        height: height as u32,
        format: PixelFormat {
            bits_per_pixel: bit_count,
            has_alpha: channel_alpha || mask.is_some(),
        },
        pixels,
    })
}
