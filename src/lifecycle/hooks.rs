use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::owner::OwnsImage;
use crate::imaging::generator::DerivativeGenerator;
use crate::imaging::ladder::BaseName;
use crate::error::{DerivativeError, Result};
use crate::state::data::DerivativeSet;

/// Directory, base name and original file name of an entity's image,
/// relative to the media root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLocation {
    pub directory: PathBuf,
    pub base: BaseName,
    /// Stored file name of the original ("pan.jpg")
    pub file_name: String,
}

impl ImageLocation {
    /// Split a stored image path into its directory and base name
    pub fn of(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DerivativeError::InvalidBaseName(path.display().to_string()))?;

        Ok(ImageLocation {
            directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            base: BaseName::from_file_name(file_name)?,
            file_name: file_name.to_string(),
        })
    }

    /// True if both locations name the same derivative set
    pub fn same_set(&self, other: &ImageLocation) -> bool {
        self.directory == other.directory && self.base == other.base
    }

    fn purge_with(&self, generator: &DerivativeGenerator) -> Result<usize> {
        generator.purge(&self.base, &self.directory, Some(&self.file_name))
    }
}

/// What a hook did. Failures are collected as warnings, never returned as
/// errors: the entity save or delete goes ahead regardless, and the
/// caller shows the warnings to the operator.
#[derive(Debug, Default)]
pub struct HookReport {
    /// New stored path, when the image was moved to its canonical location
    pub moved_to: Option<PathBuf>,
    pub generated: Option<DerivativeSet>,
    /// Derivatives carried over to a new location without regenerating
    pub migrated: usize,
    pub purged: usize,
    pub warnings: Vec<DerivativeError>,
}

impl HookReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, stage: &'static str, err: DerivativeError) {
        warn!(stage, error = %err, "⚠️  image derivative step failed; entity is saved anyway");
        self.warnings.push(err);
    }
}

/// Persistence hooks driving the derivative generator.
///
/// Call order for a save: `before_save` with the record as it was
/// persisted, persist the entity, then `after_save`. For a delete:
/// `before_delete`, then remove the record.
#[derive(Debug)]
pub struct ImageLifecycle {
    generator: DerivativeGenerator,
}

impl ImageLifecycle {
    pub fn new(generator: DerivativeGenerator) -> Self {
        ImageLifecycle { generator }
    }

    pub fn generator(&self) -> &DerivativeGenerator {
        &self.generator
    }

    /// Capture where the image lived before this save.
    /// `persisted` is None for a new entity.
    pub fn before_save<E: OwnsImage>(&self, persisted: Option<&E>) -> Option<ImageLocation> {
        let stored = persisted?.stored_image()?;
        match ImageLocation::of(stored) {
            Ok(location) => Some(location),
            Err(err) => {
                warn!(error = %err, path = %stored.display(), "cannot locate previous image");
                None
            }
        }
    }

    /// Bring the stored image to its canonical path, generate its
    /// derivatives and drop the derivatives of the previous image.
    pub fn after_save<E: OwnsImage>(
        &self,
        entity: &mut E,
        previous: Option<&ImageLocation>,
    ) -> HookReport {
        let mut report = HookReport::default();
        let Some(stored) = entity.stored_image().map(Path::to_path_buf) else {
            return report;
        };

        let current = match entity.canonical_path() {
            Ok(Some(canonical)) if canonical != stored => {
                match self.move_to_canonical(&stored, &canonical, &mut report) {
                    Ok(true) => {
                        entity.set_stored_image(canonical.clone());
                        report.moved_to = Some(canonical.clone());
                        canonical
                    }
                    Ok(false) => stored,
                    Err(err) => {
                        report.warn("move to canonical path", err);
                        stored
                    }
                }
            }
            Ok(_) => stored,
            Err(err) => {
                report.warn("canonical path", err);
                stored
            }
        };

        let location = match ImageLocation::of(&current) {
            Ok(location) => location,
            Err(err) => {
                report.warn("base name", err);
                return report;
            }
        };

        match self.generator.generate(&current, &location.base) {
            Ok(set) => report.generated = set,
            Err(err) => report.warn("generate", err),
        }

        if let Some(previous) = previous.filter(|p| !p.same_set(&location)) {
            // Only drop the old set once derivatives exist under the new name
            match self.generator.has_derivatives(&location.base, &location.directory) {
                Ok(true) => match previous.purge_with(&self.generator) {
                    Ok(purged) => report.purged = purged,
                    Err(err) => report.warn("purge previous", err),
                },
                Ok(false) => {
                    debug!(base = %previous.base, "keeping previous derivatives; nothing replaced them");
                }
                Err(err) => report.warn("check replacement", err),
            }
        }

        report
    }

    /// Remove the entity's derivatives (and any unconsumed original)
    pub fn before_delete<E: OwnsImage>(&self, entity: &E) -> HookReport {
        let mut report = HookReport::default();
        let Some(stored) = entity.stored_image() else {
            return report;
        };

        match ImageLocation::of(stored).and_then(|location| location.purge_with(&self.generator)) {
            Ok(purged) => report.purged = purged,
            Err(err) => report.warn("purge", err),
        }
        report
    }

    /// Move the original, or when it was already consumed, its
    /// derivatives. Returns false when there was nothing to move.
    fn move_to_canonical(&self, stored: &Path, canonical: &Path, report: &mut HookReport) -> Result<bool> {
        let source = self.generator.resolve(stored);
        let target = self.generator.resolve(canonical);

        if source.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| DerivativeError::io(parent, e))?;
            }
            move_file(&source, &target)?;
            info!("📦 Moved {} to {}", source.display(), target.display());
            return Ok(true);
        }

        let from = ImageLocation::of(stored)?;
        let to = ImageLocation::of(canonical)?;
        let migrated = self
            .generator
            .migrate(&from.base, &from.directory, &to.base, &to.directory)?;
        report.migrated = migrated;
        Ok(migrated > 0)
    }
}

/// Rename, falling back to copy + delete across filesystems
fn move_file(source: &Path, target: &Path) -> Result<()> {
    match fs::rename(source, target) {
        Ok(()) => return Ok(()),
        Err(err) => debug!(error = %err, source = %source.display(), "rename failed, copying instead"),
    }
    fs::copy(source, target).map_err(|e| DerivativeError::io(target, e))?;
    fs::remove_file(source).map_err(|e| DerivativeError::io(source, e))?;
    Ok(())
}
