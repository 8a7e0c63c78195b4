use chrono::Utc;
use image::ImageReader;
use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::encode;
use super::ladder::{BaseName, DerivativeFormat, DERIVATIVE_SIZES, SET_LEN};
use super::thumbnail;
use crate::config::MediaConfig;
use crate::error::{DerivativeError, Result};
use crate::state::data::{DerivativeFile, DerivativeSet};
use crate::state::index::DerivativeIndex;

/// Generates and removes derivative sets under a media root.
///
/// Holds no per-image state. Relative paths passed to any operation are
/// resolved against the media root; absolute paths are used as given.
#[derive(Debug)]
pub struct DerivativeGenerator {
    media_root: PathBuf,
    index: Option<DerivativeIndex>,
}

impl DerivativeGenerator {
    /// Generator without a derivative index
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        DerivativeGenerator {
            media_root: media_root.into(),
            index: None,
        }
    }

    /// Build from configuration, opening the index if one is configured
    pub fn from_config(config: &MediaConfig) -> Result<Self> {
        let generator = DerivativeGenerator::new(&config.media_root);
        match &config.index_path {
            Some(path) => Ok(generator.with_index(DerivativeIndex::open(path)?)),
            None => Ok(generator),
        }
    }

    pub fn with_index(mut self, index: DerivativeIndex) -> Self {
        self.index = Some(index);
        self
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn index(&self) -> Option<&DerivativeIndex> {
        self.index.as_ref()
    }

    /// Resolve a caller path against the media root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.media_root.join(path)
        }
    }

    /// Generate the 12 derivatives of `source` next to it, then delete it.
    ///
    /// Returns `Ok(None)` without touching the filesystem when `source` is
    /// not in its directory's listing (the save did not carry a new image).
    pub fn generate(&self, source: &Path, base: &BaseName) -> Result<Option<DerivativeSet>> {
        let source = self.resolve(source);
        let (Some(directory), Some(file_name)) = (source.parent(), source.file_name()) else {
            debug!(path = %source.display(), "source has no directory component, skipping");
            return Ok(None);
        };

        if !listing_contains(directory, file_name)? {
            debug!(path = %source.display(), "source not present, skipping derivative generation");
            return Ok(None);
        }

        let decoded = ImageReader::open(&source)
            .map_err(|e| DerivativeError::io(&source, e))?
            .with_guessed_format()
            .map_err(|e| DerivativeError::io(&source, e))?
            .decode()
            .map_err(|e| DerivativeError::Decode {
                path: source.clone(),
                source: e,
            })?;

        info!(
            "📸 Generating derivatives for {} ({}x{}) as '{}'",
            source.display(),
            decoded.width(),
            decoded.height(),
            base
        );

        let rgb = thumbnail::normalize_rgb(decoded);
        let mut files = Vec::with_capacity(SET_LEN);

        for &size in DERIVATIVE_SIZES.iter() {
            let variant = thumbnail::make_thumbnail(&rgb, size);

            for format in DerivativeFormat::ALL {
                let name = base.derivative_file_name(size, format);
                let path = directory.join(&name);
                encode::encode_to_file(&variant, format, &path)?;
                debug!(path = %path.display(), width = variant.width(), height = variant.height(), "wrote derivative");

                files.push(DerivativeFile {
                    file_name: name,
                    size,
                    format,
                    width: variant.width(),
                    height: variant.height(),
                });
            }
        }

        let original = file_name.to_string_lossy().into_owned();

        // A source named like one of its own derivatives was just overwritten
        if !files.iter().any(|f| f.file_name == original) {
            fs::remove_file(&source).map_err(|e| DerivativeError::io(&source, e))?;
        }

        let set = DerivativeSet {
            directory: directory.to_path_buf(),
            base_name: base.clone(),
            original,
            generated_at: Utc::now(),
            files,
        };

        if let Some(index) = &self.index {
            // The files are in place; a stale index only costs a name sweep on purge
            if let Err(err) = index.record_set(&set) {
                warn!(error = %err, base = %base, "failed to record derivative set");
            }
        }

        info!("✅ Generated {} derivatives for '{}' in {}", set.files.len(), base, directory.display());
        Ok(Some(set))
    }

    /// Remove every derivative of `base` in `directory`, plus the file
    /// named exactly `original` if it is still there.
    ///
    /// Other files sharing the base stem (`pan.json` next to `pan_800.jpg`)
    /// are left alone. With an index attached, the recorded files and the
    /// recorded original are removed too.
    ///
    /// Idempotent: a missing directory or no matches is not an error.
    /// Returns how many files were removed.
    pub fn purge(&self, base: &BaseName, directory: &Path, original: Option<&str>) -> Result<usize> {
        let directory = self.resolve(directory);
        let mut removed = 0;
        let mut originals: Vec<String> = original.map(str::to_string).into_iter().collect();

        if let Some(index) = &self.index {
            for name in index.files_for(&directory, base)? {
                if remove_if_present(&directory.join(&name))? {
                    removed += 1;
                }
            }
            originals.extend(index.original_for(&directory, base)?);
        }

        for name in list_files(&directory)? {
            let matched = base.owns_derivative(&name) || originals.iter().any(|o| *o == name);
            if matched && remove_if_present(&directory.join(&name))? {
                removed += 1;
            }
        }

        if let Some(index) = &self.index {
            index.forget_set(&directory, base)?;
        }

        if removed > 0 {
            info!("🗑️  Purged {} files for '{}' in {}", removed, base, directory.display());
        } else {
            debug!(base = %base, directory = %directory.display(), "nothing to purge");
        }
        Ok(removed)
    }

    /// Move an existing derivative set to a new directory and base name.
    ///
    /// Used when the owning entity's path changes after its original was
    /// already consumed, so there is nothing left to regenerate from.
    /// Returns how many files were moved.
    pub fn migrate(
        &self,
        from_base: &BaseName,
        from_dir: &Path,
        to_base: &BaseName,
        to_dir: &Path,
    ) -> Result<usize> {
        let from_dir = self.resolve(from_dir);
        let to_dir = self.resolve(to_dir);
        if from_dir == to_dir && from_base == to_base {
            return Ok(0);
        }

        let mut moved = 0;
        for name in list_files(&from_dir)? {
            let Some(parsed) = super::ladder::parse_derivative_name(&name) else {
                continue;
            };
            if parsed.stem != from_base.as_str() {
                continue;
            }

            if moved == 0 {
                fs::create_dir_all(&to_dir).map_err(|e| DerivativeError::io(&to_dir, e))?;
            }
            let target = to_dir.join(format!("{}_{}.{}", to_base, parsed.size, parsed.extension));
            let origin = from_dir.join(&name);
            fs::rename(&origin, &target).map_err(|e| DerivativeError::io(&origin, e))?;
            moved += 1;
        }

        if let Some(index) = &self.index {
            index.relocate_set(&from_dir, from_base, &to_dir, to_base)?;
        }

        if moved > 0 {
            info!(
                "🚚 Moved {} derivatives from '{}' in {} to '{}' in {}",
                moved,
                from_base,
                from_dir.display(),
                to_base,
                to_dir.display()
            );
        }
        Ok(moved)
    }

    /// True if `directory` holds at least one derivative of `base`
    pub fn has_derivatives(&self, base: &BaseName, directory: &Path) -> Result<bool> {
        let directory = self.resolve(directory);
        Ok(list_files(&directory)?.iter().any(|name| base.owns_derivative(name)))
    }
}

/// Regular file names directly inside `directory` (not recursive).
/// A missing directory lists as empty.
pub fn list_files(directory: &Path) -> Result<Vec<String>> {
    if !directory.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| DerivativeError::io(directory, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        // Base names are UTF-8, so other names can never match
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn listing_contains(directory: &Path, file_name: &OsStr) -> Result<bool> {
    if !directory.is_dir() {
        return Ok(false);
    }
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| DerivativeError::io(directory, e.into()))?;
        if entry.file_type().is_file() && entry.file_name() == file_name {
            return Ok(true);
        }
    }
    Ok(false)
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DerivativeError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    fn sorted(dir: &Path) -> Vec<String> {
        let mut names = list_files(dir).unwrap();
        names.sort();
        names
    }

    fn recorded_set(dir: &Path, base: &BaseName, original: &str) -> DerivativeSet {
        let mut files = Vec::new();
        for &size in &DERIVATIVE_SIZES {
            for format in DerivativeFormat::ALL {
                files.push(DerivativeFile {
                    file_name: base.derivative_file_name(size, format),
                    size,
                    format,
                    width: size,
                    height: size,
                });
            }
        }
        DerivativeSet {
            directory: dir.to_path_buf(),
            base_name: base.clone(),
            original: original.to_string(),
            generated_at: Utc::now(),
            files,
        }
    }

    #[test]
    fn test_resolve_relative_against_root() {
        let generator = DerivativeGenerator::new("/media");
        assert_eq!(generator.resolve(Path::new("cookware/pan.jpg")), PathBuf::from("/media/cookware/pan.jpg"));
        assert_eq!(generator.resolve(Path::new("/elsewhere/pan.jpg")), PathBuf::from("/elsewhere/pan.jpg"));
    }

    #[test]
    fn test_list_files_skips_directories_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.jpg");
        fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("sub"), "b.jpg");

        assert_eq!(sorted(dir.path()), vec!["a.jpg".to_string()]);
        assert!(list_files(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_generate_missing_source_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let generator = DerivativeGenerator::new(dir.path());
        let base = BaseName::new("pan").unwrap();

        let result = generator.generate(&dir.path().join("pan.jpg"), &base).unwrap();
        assert!(result.is_none());
        assert!(list_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_generate_rejects_garbage_and_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pan.jpg"), b"definitely not an image").unwrap();
        let generator = DerivativeGenerator::new(dir.path());

        let err = generator
            .generate(Path::new("pan.jpg"), &BaseName::new("pan").unwrap())
            .unwrap_err();
        assert!(matches!(err, DerivativeError::Decode { .. }));
        assert!(err.source_preserved());
        assert_eq!(sorted(dir.path()), vec!["pan.jpg".to_string()]);
    }

    #[test]
    fn test_purge_by_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pan_1600.jpg");
        touch(dir.path(), "pan_800.webp");
        touch(dir.path(), "unrelated_800.jpg");
        let generator = DerivativeGenerator::new(dir.path());
        let base = BaseName::new("pan").unwrap();

        assert_eq!(generator.purge(&base, dir.path(), None).unwrap(), 2);
        assert_eq!(sorted(dir.path()), vec!["unrelated_800.jpg".to_string()]);

        // Second run is a no-op
        assert_eq!(generator.purge(&base, dir.path(), None).unwrap(), 0);
        assert_eq!(sorted(dir.path()), vec!["unrelated_800.jpg".to_string()]);
    }

    #[test]
    fn test_purge_removes_unconsumed_original() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pan.png");
        touch(dir.path(), "pan_70.avif");
        touch(dir.path(), "pan_notes.txt");
        let generator = DerivativeGenerator::new(dir.path());

        let removed = generator
            .purge(&BaseName::new("pan").unwrap(), dir.path(), Some("pan.png"))
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(sorted(dir.path()), vec!["pan_notes.txt".to_string()]);
    }

    #[test]
    fn test_purge_keeps_files_sharing_the_stem() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pan_1600.jpg");
        touch(dir.path(), "pan.json");
        touch(dir.path(), "pan.txt");
        touch(dir.path(), "pan.jpg");
        let generator = DerivativeGenerator::new(dir.path());
        let base = BaseName::new("pan").unwrap();

        assert_eq!(generator.purge(&base, dir.path(), None).unwrap(), 1);
        assert_eq!(
            sorted(dir.path()),
            vec!["pan.jpg".to_string(), "pan.json".to_string(), "pan.txt".to_string()]
        );

        // Only an exact match on the original's name removes it
        assert_eq!(generator.purge(&base, dir.path(), Some("pan.jpg")).unwrap(), 1);
        assert_eq!(sorted(dir.path()), vec!["pan.json".to_string(), "pan.txt".to_string()]);
    }

    #[test]
    fn test_purge_uses_indexed_original() {
        let dir = tempfile::tempdir().unwrap();
        let base = BaseName::new("pan").unwrap();
        touch(dir.path(), "pan.webp");
        touch(dir.path(), "pan.json");
        touch(dir.path(), "pan_70.jpg");

        let index = DerivativeIndex::in_memory().unwrap();
        index.record_set(&recorded_set(dir.path(), &base, "pan.webp")).unwrap();
        let generator = DerivativeGenerator::new(dir.path()).with_index(index);

        assert_eq!(generator.purge(&base, dir.path(), None).unwrap(), 2);
        assert_eq!(sorted(dir.path()), vec!["pan.json".to_string()]);
        assert_eq!(generator.index().unwrap().set_count().unwrap(), 0);
    }

    #[test]
    fn test_purge_reports_undeletable_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = BaseName::new("pan").unwrap();
        let set = recorded_set(dir.path(), &base, "pan.jpg");
        for file in &set.files {
            touch(dir.path(), &file.file_name);
        }

        // The last recorded name is a directory now, so removing it fails
        let blocker = dir.path().join("pan_70.avif");
        fs::remove_file(&blocker).unwrap();
        fs::create_dir(&blocker).unwrap();
        touch(&blocker, "keep");

        let index = DerivativeIndex::in_memory().unwrap();
        index.record_set(&set).unwrap();
        let generator = DerivativeGenerator::new(dir.path()).with_index(index);

        let err = generator.purge(&base, dir.path(), None).unwrap_err();
        assert!(matches!(err, DerivativeError::Io { ref path, .. } if *path == blocker));
        // Files removed before the failure stay removed
        assert!(sorted(dir.path()).is_empty());
        assert!(blocker.is_dir());
    }

    #[test]
    fn test_generate_write_failure_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(200, 100, image::Rgb([90, 120, 30]))
            .save(dir.path().join("pan.png"))
            .unwrap();
        // A directory squatting on a derivative name makes that write fail
        fs::create_dir(dir.path().join("pan_400.jpg")).unwrap();
        let generator = DerivativeGenerator::new(dir.path());

        let err = generator
            .generate(Path::new("pan.png"), &BaseName::new("pan").unwrap())
            .unwrap_err();
        assert!(matches!(err, DerivativeError::Io { .. }));

        // Partial set stays, original is not deleted
        assert_eq!(
            sorted(dir.path()),
            vec![
                "pan.png".to_string(),
                "pan_1600.avif".to_string(),
                "pan_1600.jpg".to_string(),
                "pan_1600.webp".to_string(),
                "pan_800.avif".to_string(),
                "pan_800.jpg".to_string(),
                "pan_800.webp".to_string(),
            ]
        );
    }

    #[test]
    fn test_purge_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let generator = DerivativeGenerator::new(dir.path());
        let removed = generator
            .purge(&BaseName::new("pan").unwrap(), Path::new("no-such-dir"), None)
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_migrate_renames_set() {
        let dir = tempfile::tempdir().unwrap();
        let old_dir = dir.path().join("pan");
        fs::create_dir(&old_dir).unwrap();
        touch(&old_dir, "pan_1600.jpg");
        touch(&old_dir, "pan_70.webp");
        touch(&old_dir, "lid_70.webp");
        let generator = DerivativeGenerator::new(dir.path());

        let moved = generator
            .migrate(
                &BaseName::new("pan").unwrap(),
                Path::new("pan"),
                &BaseName::new("frying-pan").unwrap(),
                Path::new("frying-pan"),
            )
            .unwrap();
        assert_eq!(moved, 2);
        assert_eq!(
            sorted(&dir.path().join("frying-pan")),
            vec!["frying-pan_1600.jpg".to_string(), "frying-pan_70.webp".to_string()]
        );
        assert_eq!(sorted(&old_dir), vec!["lid_70.webp".to_string()]);
    }

    #[test]
    fn test_has_derivatives() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pan.jpg");
        let generator = DerivativeGenerator::new(dir.path());
        let base = BaseName::new("pan").unwrap();

        assert!(!generator.has_derivatives(&base, dir.path()).unwrap());
        touch(dir.path(), "pan_400.jpg");
        assert!(generator.has_derivatives(&base, dir.path()).unwrap());
    }
}
