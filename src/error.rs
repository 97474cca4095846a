use std::path::PathBuf;

use thiserror::Error;

use crate::encode::OutputFormat;

#[derive(Debug, Error)]
pub enum IcoError {
    #[error("{}: not a valid icon container: {reason}", path.display())]
    MalformedContainer { path: PathBuf, reason: String },

    #[error("unsupported frame encoding: {0}")]
    UnsupportedFrameEncoding(String),

    #[error("corrupt frame data: {0}")]
    CorruptFrameData(String),

    #[error("failed to encode frame as {format}: {source}")]
    EncodingFailure {
        format: OutputFormat,
        #[source]
        source: image::ImageError,
    },

    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IcoError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IcoError::MalformedContainer {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IcoError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, IcoError>;
