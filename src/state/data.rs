/// Shared data structures for derivative sets
///
/// These structs describe what a generation run produced. They flow
/// from the generator into the derivative index and out to callers
/// (the lifecycle hooks and the CLI).
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::imaging::ladder::{BaseName, DerivativeFormat};

/// One generated file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivativeFile {
    /// File name only (e.g., "pan_800.webp")
    pub file_name: String,
    /// Longer-edge target this file was generated for
    pub size: u32,
    pub format: DerivativeFormat,
    /// Actual pixel dimensions (smaller than `size` when the source was)
    pub width: u32,
    pub height: u32,
}

/// The complete output of one `generate` run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivativeSet {
    /// Directory holding the original and all derivatives
    pub directory: PathBuf,
    pub base_name: BaseName,
    /// File name of the consumed original (e.g., "pan.jpg")
    pub original: String,
    pub generated_at: DateTime<Utc>,
    pub files: Vec<DerivativeFile>,
}

impl DerivativeSet {
    /// Look up the file for a (size, format) pair
    pub fn file(&self, size: u32, format: DerivativeFormat) -> Option<&DerivativeFile> {
        self.files
            .iter()
            .find(|f| f.size == size && f.format == format)
    }
}

/// A set as recorded in the derivative index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedSet {
    /// Unique database ID
    pub id: i64,
    pub directory: PathBuf,
    pub base_name: String,
    pub original: String,
    /// Unix timestamp (seconds)
    pub generated_at: i64,
    pub file_names: Vec<String>,
}
