pub mod container;
pub mod dib;
pub mod encode;
pub mod error;
pub mod frame;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

pub use container::{ContainerKind, DirectoryEntry, IconFile};
pub use encode::{encode_frame, OutputFormat};
pub use error::{IcoError, Result};
pub use frame::{decode_frame, DecodedFrame, PixelFormat};

#[derive(Debug)]
pub struct FrameFailure {
    pub index: usize,
    pub error: IcoError,
}

/// Outcome of extracting one icon file. `written + failed` equals the
/// number of directory entries.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub written: usize,
    pub failed: usize,
    /// Output paths in directory order. A path appears twice when two
    /// entries share dimensions, the later one is what ends up on disk.
    pub outputs: Vec<PathBuf>,
    pub failures: Vec<FrameFailure>,
}

impl ExtractionReport {
    pub fn total(&self) -> usize {
        self.written + self.failed
    }
}

pub fn output_file_name(stem: &str, width: u32, height: u32, format: OutputFormat) -> String {
    format!("{stem}_{width}x{height}.{}", format.extension())
}

fn extract_entry(
    entry: &DirectoryEntry,
    bytes: &[u8],
    stem: &str,
    destination: &Path,
    format: OutputFormat,
) -> Result<PathBuf> {
    let frame = decode_frame(entry.data(bytes))?;

    if (frame.width, frame.height) != (entry.width, entry.height) {
        debug!(
            "directory declares {}x{}, embedded image is {}x{}",
            entry.width, entry.height, frame.width, frame.height
        );
    }

    let encoded = encode_frame(&frame, format)?;

    let path = destination.join(output_file_name(stem, frame.width, frame.height, format));
    fs::write(&path, encoded).map_err(|e| IcoError::filesystem(&path, e))?;

    Ok(path)
}

/// Extracts every image in the icon at `source` into `destination`.
///
/// Fails only when the file cannot be read or is not an icon container.
/// A frame that cannot be decoded, encoded or written is recorded in the
/// report and the remaining frames are still processed. `destination` must
/// already exist.
pub fn extract_icon(
    source: &Path,
    destination: &Path,
    format: OutputFormat,
) -> Result<ExtractionReport> {
    let bytes = fs::read(source).map_err(|e| IcoError::filesystem(source, e))?;

    let icon = IconFile::parse(source, &bytes)?;

    let stem = match source.file_stem() {
        Some(x) => x.to_string_lossy(),
        None => {
            return Err(IcoError::filesystem(
                source,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            ))
        }
    };

    debug!(
        "{}: {:?} with {} entries",
        source.display(),
        icon.kind,
        icon.len()
    );

    let mut report = ExtractionReport::default();

    for (index, entry) in icon.entries.iter().enumerate() {
        match extract_entry(entry, &bytes, &stem, destination, format) {
            Ok(path) => {
                info!("{} frame {index} -> {}", source.display(), path.display());
                report.written += 1;
                report.outputs.push(path);
            }
            Err(error) => {
                warn!("{} frame {index}: {error}", source.display());
                report.failed += 1;
                report.failures.push(FrameFailure { index, error });
            }
        }
    }

    Ok(report)
}
