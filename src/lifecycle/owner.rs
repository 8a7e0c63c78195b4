/// Catalog entities that own a source image
///
/// The owner decides *where* its image lives; the generator decides what
/// happens there. Paths here are relative to the media root.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::imaging::ladder::BaseName;
use crate::error::{DerivativeError, Result};

/// What the lifecycle hooks need from an owning entity
pub trait OwnsImage {
    /// Directory the image should live in, from the entity's current identity
    fn canonical_dir(&self) -> Result<PathBuf>;

    /// Image path as currently persisted, if the entity has one
    fn stored_image(&self) -> Option<&Path>;

    /// Record the image's new location after it was moved
    fn set_stored_image(&mut self, path: PathBuf);

    /// Where the stored image should be: the canonical directory plus
    /// `<base>.<ext>`, with the base derived from the stored file name
    fn canonical_path(&self) -> Result<Option<PathBuf>> {
        let Some(stored) = self.stored_image() else {
            return Ok(None);
        };
        let file_name = stored
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DerivativeError::InvalidBaseName(stored.display().to_string()))?;

        let base = BaseName::from_file_name(file_name)?;
        let name = match file_name.split_once('.') {
            Some((_, ext)) => format!("{}.{}", base, ext),
            None => base.to_string(),
        };
        Ok(Some(self.canonical_dir()?.join(name)))
    }
}

/// Validate a URL slug used as a path segment.
/// Underscores are rejected so slugs never collide with size suffixes.
pub fn validate_slug(slug: &str) -> Result<&str> {
    let valid = !slug.is_empty()
        && slug != "."
        && slug != ".."
        && !slug.contains(['/', '\\', '_'])
        && !slug.chars().any(char::is_control);

    if valid {
        Ok(slug)
    } else {
        Err(DerivativeError::InvalidSlug(slug.to_string()))
    }
}

/// The catalog entity kinds that carry an image, with the slugs that
/// make up their storage directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageOwner {
    /// `{category}`
    Category { category: String },
    /// `collections/{collection}`
    Collection { collection: String },
    /// `{category}/{product}`
    BaseProduct { category: String, product: String },
    /// `{category}/{product}/{color}`
    ProductColor {
        category: String,
        product: String,
        color: String,
    },
    /// `{category}/{product}/{color}/{variant}`
    ProductVariant {
        category: String,
        product: String,
        color: String,
        variant: String,
    },
}

impl ImageOwner {
    /// Slug chain making up the storage directory
    pub fn segments(&self) -> Vec<&str> {
        match self {
            ImageOwner::Category { category } => vec![category.as_str()],
            ImageOwner::Collection { collection } => vec!["collections", collection.as_str()],
            ImageOwner::BaseProduct { category, product } => vec![category.as_str(), product.as_str()],
            ImageOwner::ProductColor {
                category,
                product,
                color,
            } => vec![category.as_str(), product.as_str(), color.as_str()],
            ImageOwner::ProductVariant {
                category,
                product,
                color,
                variant,
            } => vec![
                category.as_str(),
                product.as_str(),
                color.as_str(),
                variant.as_str(),
            ],
        }
    }

    pub fn directory(&self) -> Result<PathBuf> {
        let mut path = PathBuf::new();
        for segment in self.segments() {
            path.push(validate_slug(segment)?);
        }
        Ok(path)
    }
}

/// An entity's image record: who owns it and where it is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityImage {
    pub owner: ImageOwner,
    /// Relative to the media root; None when no image was uploaded
    pub image: Option<PathBuf>,
}

impl EntityImage {
    pub fn new(owner: ImageOwner, image: impl Into<PathBuf>) -> Self {
        EntityImage {
            owner,
            image: Some(image.into()),
        }
    }
}

impl OwnsImage for EntityImage {
    fn canonical_dir(&self) -> Result<PathBuf> {
        self.owner.directory()
    }

    fn stored_image(&self) -> Option<&Path> {
        self.image.as_deref()
    }

    fn set_stored_image(&mut self, path: PathBuf) {
        self.image = Some(path);
    }
}
