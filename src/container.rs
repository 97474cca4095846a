//! ICO/CUR container directory.
//!
//! A container is a 6 byte header followed by one 16 byte record per
//! embedded image. All fields are little-endian.

use std::path::{Path, PathBuf};

use binread::io::Cursor;
use binread::BinRead;

use crate::error::{IcoError, Result};

pub const HEADER_SIZE: usize = 6;
pub const RECORD_SIZE: usize = 16;

#[derive(BinRead, Debug)]
#[br(little)]
struct IconDirHeader {
    reserved: u16,
    kind: u16,
    count: u16,
}

#[derive(BinRead, Debug)]
#[br(little)]
struct IconDirRecord {
    width: u8,
    height: u8,
    color_count: u8,
    _reserved: u8,
    planes: u16,
    bit_count: u16,
    size: u32,
    offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Icon,
    Cursor,
}

impl ContainerKind {
    fn from_type_field(kind: u16) -> Option<ContainerKind> {
        match kind {
            1 => Some(ContainerKind::Icon),
            2 => Some(ContainerKind::Cursor),
            _ => None,
        }
    }
}

/// One embedded image as declared by the container directory.
///
/// The declared dimensions are hints only, the embedded image header is
/// authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub width: u32,
    pub height: u32,
    pub color_count: u8,
    /// Colour planes for icons, hotspot x for cursors.
    pub planes: u16,
    /// Bits per pixel for icons, hotspot y for cursors.
    pub bit_count: u16,
    pub size: u32,
    pub offset: u32,
}

impl DirectoryEntry {
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.size as usize
    }

    /// Embedded image bytes. `bytes` must be the buffer the entry was parsed from.
    pub fn data<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        &bytes[self.range()]
    }
}

fn dimension(byte: u8) -> u32 {
    match byte {
        0 => 256,
        x => x as u32,
    }
}

#[derive(Debug, Clone)]
pub struct IconFile {
    pub path: PathBuf,
    pub kind: ContainerKind,
    pub entries: Vec<DirectoryEntry>,
}

impl IconFile {
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<IconFile> {
        if bytes.len() < HEADER_SIZE {
            return Err(IcoError::malformed(
                path,
                format!("file is {} bytes, header needs {HEADER_SIZE}", bytes.len()),
            ));
        }

        let mut reader = Cursor::new(bytes);

        let header = IconDirHeader::read(&mut reader)
            .map_err(|e| IcoError::malformed(path, e.to_string()))?;

        if header.reserved != 0 {
            return Err(IcoError::malformed(
                path,
                format!("reserved header field is {:#06x}, expected 0", header.reserved),
            ));
        }

        let kind = ContainerKind::from_type_field(header.kind).ok_or_else(|| {
            IcoError::malformed(path, format!("unknown resource type {}", header.kind))
        })?;

        let directory_end = HEADER_SIZE + header.count as usize * RECORD_SIZE;
        if directory_end > bytes.len() {
            return Err(IcoError::malformed(
                path,
                format!(
                    "{} directory entries need {directory_end} bytes, file has {}",
                    header.count,
                    bytes.len()
                ),
            ));
        }

        let mut entries = Vec::with_capacity(header.count as usize);

        for idx in 0..header.count {
            let record = IconDirRecord::read(&mut reader)
                .map_err(|e| IcoError::malformed(path, e.to_string()))?;

            let end = record.offset as u64 + record.size as u64;
            if end > bytes.len() as u64 {
                return Err(IcoError::malformed(
                    path,
                    format!(
                        "entry {idx} spans {}..{end}, past end of file ({} bytes)",
                        record.offset,
                        bytes.len()
                    ),
                ));
            }

            entries.push(DirectoryEntry {
                width: dimension(record.width),
                height: dimension(record.height),
                color_count: record.color_count,
                planes: record.planes,
                bit_count: record.bit_count,
                size: record.size,
                offset: record.offset,
            });
        }

        Ok(IconFile {
            path: path.to_path_buf(),
            kind,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
