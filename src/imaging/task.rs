/// Async wrappers around the blocking generator
///
/// Each call opens its own generator (and index connection) inside
/// tokio's blocking pool, so the caller's runtime threads never decode
/// or encode images.
use std::path::PathBuf;
use tokio::task;

use super::generator::DerivativeGenerator;
use super::ladder::BaseName;
use crate::config::MediaConfig;
use crate::error::{DerivativeError, Result};
use crate::state::data::DerivativeSet;

/// Run [`DerivativeGenerator::generate`] on the blocking pool
pub async fn generate_async(
    config: MediaConfig,
    source: PathBuf,
    base: BaseName,
) -> Result<Option<DerivativeSet>> {
    task::spawn_blocking(move || {
        let generator = DerivativeGenerator::from_config(&config)?;
        generator.generate(&source, &base)
    })
    .await
    .map_err(|e| DerivativeError::Task(e.to_string()))?
}

/// Run [`DerivativeGenerator::purge`] on the blocking pool
pub async fn purge_async(
    config: MediaConfig,
    base: BaseName,
    directory: PathBuf,
    original: Option<String>,
) -> Result<usize> {
    task::spawn_blocking(move || {
        let generator = DerivativeGenerator::from_config(&config)?;
        generator.purge(&base, &directory, original.as_deref())
    })
    .await
    .map_err(|e| DerivativeError::Task(e.to_string()))?
}
