/// Media storage configuration
///
/// The media root is passed in explicitly rather than read from global
/// state. A config can come from a JSON file, from the environment, or
/// from code.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DerivativeError, Result};

/// Overrides `media_root`
pub const MEDIA_ROOT_ENV: &str = "CATALOG_MEDIA_ROOT";
/// Overrides `index_path`
pub const INDEX_PATH_ENV: &str = "CATALOG_DERIVATIVE_INDEX";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Root directory all entity image paths are relative to
    pub media_root: PathBuf,
    /// SQLite derivative index; None disables the index
    #[serde(default)]
    pub index_path: Option<PathBuf>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        MediaConfig {
            media_root: default_data_dir().join("media"),
            index_path: None,
        }
    }
}

impl MediaConfig {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        MediaConfig {
            media_root: media_root.into(),
            index_path: None,
        }
    }

    pub fn with_index(mut self, index_path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(index_path.into());
        self
    }

    /// Load from a JSON file such as
    /// `{"media_root": "/srv/shop/media", "index_path": "/srv/shop/derivatives.db"}`
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| DerivativeError::io(path, e))?;
        serde_json::from_str(&raw)
            .map_err(|e| DerivativeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply `CATALOG_MEDIA_ROOT` / `CATALOG_DERIVATIVE_INDEX` when set
    pub fn apply_env(mut self) -> Self {
        if let Some(root) = std::env::var_os(MEDIA_ROOT_ENV).filter(|v| !v.is_empty()) {
            self.media_root = PathBuf::from(root);
        }
        if let Some(index) = std::env::var_os(INDEX_PATH_ENV).filter(|v| !v.is_empty()) {
            self.index_path = Some(PathBuf::from(index));
        }
        self
    }

    /// Where the index lives when enabled without an explicit path
    pub fn default_index_path() -> PathBuf {
        default_data_dir().join("derivatives.db")
    }
}

/// Application data directory:
/// - Linux: ~/.local/share/catalog-derivatives
/// - macOS: ~/Library/Application Support/catalog-derivatives
/// - Windows: %APPDATA%\catalog-derivatives
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("catalog-derivatives")
}
