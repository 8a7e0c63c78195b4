/// Error types for derivative generation and cleanup
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DerivativeError {
    /// Source is not a valid or supported raster image.
    /// Nothing has been written and the original is untouched.
    #[error("Failed to decode source image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// An encoder rejected the pixels. Earlier derivatives may remain on disk.
    #[error("Failed to encode derivative {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Write, delete, rename or listing failure. Not rolled back.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid base name: {0:?}")]
    InvalidBaseName(String),

    #[error("Invalid slug: {0:?}")]
    InvalidSlug(String),

    #[error("Derivative index error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl DerivativeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DerivativeError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures that leave the original file untouched
    pub fn source_preserved(&self) -> bool {
        matches!(
            self,
            DerivativeError::Decode { .. } | DerivativeError::InvalidBaseName(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DerivativeError>;
