//! Output formats and their encoders.
//!
//! Every `OutputFormat` owns one row of `ENCODERS`, indexed by its
//! discriminant. A new format is a new variant, a new row and an encode
//! function; nothing else dispatches on the format.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::{DynamicImage, ImageFormat, ImageResult};

use crate::error::{IcoError, Result};
use crate::frame::DecodedFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Png,
    Bmp,
    Jpeg,
    Gif,
    Tiff,
}

type EncodeFn = fn(&DecodedFrame) -> ImageResult<Vec<u8>>;

struct Encoder {
    format: OutputFormat,
    name: &'static str,
    tokens: &'static [&'static str],
    extension: &'static str,
    encode: EncodeFn,
}

const JPEG_QUALITY: u8 = 90;

static ENCODERS: [Encoder; 5] = [
    Encoder {
        format: OutputFormat::Png,
        name: "PNG",
        tokens: &["png"],
        extension: "png",
        encode: encode_png,
    },
    Encoder {
        format: OutputFormat::Bmp,
        name: "BMP",
        tokens: &["bmp"],
        extension: "bmp",
        encode: encode_bmp,
    },
    Encoder {
        format: OutputFormat::Jpeg,
        name: "JPEG",
        tokens: &["jpeg", "jpg"],
        extension: "jpg",
        encode: encode_jpeg,
    },
    Encoder {
        format: OutputFormat::Gif,
        name: "GIF",
        tokens: &["gif"],
        extension: "gif",
        encode: encode_gif,
    },
    Encoder {
        format: OutputFormat::Tiff,
        name: "TIFF",
        tokens: &["tiff", "tif"],
        extension: "tiff",
        encode: encode_tiff,
    },
];

/// Tokens users may ask for that have no encoder, with the reason.
const UNAVAILABLE: &[(&str, &str)] = &[("wmp", "no JPEG XR encoder is available")];

fn write_rgba(frame: &DecodedFrame, format: ImageFormat) -> ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    frame.pixels.write_to(&mut Cursor::new(&mut bytes), format)?;
    Ok(bytes)
}

fn encode_png(frame: &DecodedFrame) -> ImageResult<Vec<u8>> {
    write_rgba(frame, ImageFormat::Png)
}

fn encode_bmp(frame: &DecodedFrame) -> ImageResult<Vec<u8>> {
    write_rgba(frame, ImageFormat::Bmp)
}

fn encode_gif(frame: &DecodedFrame) -> ImageResult<Vec<u8>> {
    write_rgba(frame, ImageFormat::Gif)
}

fn encode_tiff(frame: &DecodedFrame) -> ImageResult<Vec<u8>> {
    write_rgba(frame, ImageFormat::Tiff)
}

// JPEG has no alpha channel, it is dropped.
fn encode_jpeg(frame: &DecodedFrame) -> ImageResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(frame.pixels.clone()).to_rgb8();

    let mut bytes = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(bytes)
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Png,
        OutputFormat::Bmp,
        OutputFormat::Jpeg,
        OutputFormat::Gif,
        OutputFormat::Tiff,
    ];

    fn encoder(self) -> &'static Encoder {
        &ENCODERS[self as usize]
    }

    pub fn extension(self) -> &'static str {
        self.encoder().extension
    }

    /// Accepted command line tokens, lowercase.
    pub fn supported_tokens() -> Vec<&'static str> {
        ENCODERS.iter().flat_map(|e| e.tokens.iter().copied()).collect()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoder().name)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();

        if let Some(encoder) = ENCODERS.iter().find(|e| e.tokens.contains(&token.as_str())) {
            return Ok(encoder.format);
        }

        let supported = OutputFormat::supported_tokens().join(", ").to_uppercase();

        match UNAVAILABLE.iter().find(|(t, _)| *t == token) {
            Some((_, reason)) => Err(format!(
                "output format `{s}` is not supported ({reason}), supported formats: {supported}"
            )),
            None => Err(format!(
                "unknown output format `{s}`, supported formats: {supported}"
            )),
        }
    }
}

pub fn encode_frame(frame: &DecodedFrame, format: OutputFormat) -> Result<Vec<u8>> {
    (format.encoder().encode)(frame).map_err(|source| IcoError::EncodingFailure { format, source })
}
