use image::{ImageFormat, RgbaImage};

use crate::dib::decode_dib;
use crate::error::{IcoError, Result};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits_per_pixel: u16,
    pub has_alpha: bool,
}

/// One embedded image, decoded to top-down row-major RGBA8.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    /// Format of the embedded image before conversion to RGBA8.
    pub format: PixelFormat,
    pub pixels: RgbaImage,
}

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&PNG_SIGNATURE)
}

fn decode_png(data: &[u8]) -> Result<DecodedFrame> {
    let image = image::load_from_memory_with_format(data, ImageFormat::Png)
        .map_err(|e| IcoError::CorruptFrameData(format!("embedded PNG: {e}")))?;

    let color = image.color();
    let pixels = image.to_rgba8();

    Ok(DecodedFrame {
        width: pixels.width(),
        height: pixels.height(),
        format: PixelFormat {
            bits_per_pixel: color.bits_per_pixel(),
            has_alpha: color.has_alpha(),
        },
        pixels,
    })
}

/// Decodes one directory entry's bytes, either an embedded PNG or a raw DIB.
pub fn decode_frame(data: &[u8]) -> Result<DecodedFrame> {
    match is_png(data) {
        true => decode_png(data),
        false => decode_dib(data),
    }
}
