/// The fixed derivative matrix and its naming rules
///
/// Every source image becomes 4 sizes × 3 formats = 12 files named
/// `<base>_<size>.<ext>`. Cleanup works by parsing those names back,
/// so the rules for what a base name may contain live here too.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DerivativeError, Result};

/// Longer-edge targets in pixels, largest first
pub const DERIVATIVE_SIZES: [u32; 4] = [1600, 800, 400, 70];

/// Encoding quality shared by every lossy format
pub const QUALITY: u8 = 95;

/// Number of files in a complete derivative set
pub const SET_LEN: usize = DERIVATIVE_SIZES.len() * DerivativeFormat::ALL.len();

/// Encoded output format of a derivative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivativeFormat {
    Jpeg,
    Webp,
    Avif,
}

impl DerivativeFormat {
    pub const ALL: [DerivativeFormat; 3] = [
        DerivativeFormat::Jpeg,
        DerivativeFormat::Webp,
        DerivativeFormat::Avif,
    ];

    /// File extension written to disk (no leading dot)
    pub fn extension(self) -> &'static str {
        match self {
            DerivativeFormat::Jpeg => "jpg",
            DerivativeFormat::Webp => "webp",
            DerivativeFormat::Avif => "avif",
        }
    }

    /// Case-insensitive; accepts both `jpg` and `jpeg`
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(DerivativeFormat::Jpeg),
            "webp" => Some(DerivativeFormat::Webp),
            "avif" => Some(DerivativeFormat::Avif),
            _ => None,
        }
    }
}

impl fmt::Display for DerivativeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DerivativeFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DerivativeFormat::from_extension(s)
            .ok_or_else(|| format!("unknown derivative format '{}' (expected jpg, webp or avif)", s))
    }
}

/// Text before the first `.` of a file name ("pan.tar.gz" -> "pan")
pub fn file_stem(file_name: &str) -> &str {
    file_name.split_once('.').map_or(file_name, |(stem, _)| stem)
}

/// A file name parsed as `<stem>_<size>.<ext>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativeName<'a> {
    pub stem: &'a str,
    pub size: u32,
    pub extension: &'a str,
}

/// Parse a derivative file name, splitting on the last `_`.
/// Returns None unless the suffix is `<digits>.<ext>`.
pub fn parse_derivative_name(file_name: &str) -> Option<DerivativeName<'_>> {
    let (stem, suffix) = file_name.rsplit_once('_')?;
    let (digits, extension) = suffix.split_once('.')?;
    if stem.is_empty() || extension.is_empty() || !is_digits(digits) {
        return None;
    }
    let size = digits.parse().ok()?;
    Some(DerivativeName {
        stem,
        size,
        extension,
    })
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Stem shared by an original image and its derivatives.
///
/// Validated so that `<base>_<size>.<ext>` always parses back to the same
/// base: no path separators, no dots, and no trailing `_<digits>` segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BaseName(String);

impl BaseName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trailing_size = name
            .rsplit_once('_')
            .map_or(false, |(_, tail)| is_digits(tail));

        if name.is_empty()
            || name.contains(['/', '\\', '.'])
            || name.chars().any(char::is_control)
            || trailing_size
        {
            return Err(DerivativeError::InvalidBaseName(name));
        }
        Ok(BaseName(name))
    }

    /// Derive a base name from an uploaded file name.
    ///
    /// Takes the text before the first `.`; a trailing `_<digits>`
    /// ("IMG_2034") is rewritten to `-<digits>` so it cannot be mistaken
    /// for a size suffix.
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let stem = file_stem(file_name);
        match stem.rsplit_once('_') {
            Some((head, tail)) if is_digits(tail) && !head.is_empty() => {
                BaseName::new(format!("{}-{}", head, tail))
            }
            _ => BaseName::new(stem),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<base>_<size>.<ext>`
    pub fn derivative_file_name(&self, size: u32, format: DerivativeFormat) -> String {
        format!("{}_{}.{}", self.0, size, format.extension())
    }

    /// True if `file_name` is `<this base>_<digits>.<ext>`
    pub fn owns_derivative(&self, file_name: &str) -> bool {
        parse_derivative_name(file_name).map_or(false, |parsed| parsed.stem == self.0)
    }
}

impl fmt::Display for BaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BaseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for BaseName {
    type Err = DerivativeError;

    fn from_str(s: &str) -> Result<Self> {
        BaseName::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_is_twelve_files() {
        assert_eq!(SET_LEN, 12);
    }

    #[test]
    fn test_extensions() {
        assert_eq!(DerivativeFormat::Jpeg.extension(), "jpg");
        assert_eq!("JPEG".parse::<DerivativeFormat>(), Ok(DerivativeFormat::Jpeg));
        assert_eq!("avif".parse::<DerivativeFormat>(), Ok(DerivativeFormat::Avif));
        assert!("png".parse::<DerivativeFormat>().is_err());
    }

    #[test]
    fn test_parse_derivative_name() {
        let parsed = parse_derivative_name("pan_1600.jpg").unwrap();
        assert_eq!(parsed.stem, "pan");
        assert_eq!(parsed.size, 1600);
        assert_eq!(parsed.extension, "jpg");

        // Underscores earlier in the stem are kept
        let parsed = parse_derivative_name("IMG_2034_70.avif").unwrap();
        assert_eq!(parsed.stem, "IMG_2034");

        assert_eq!(parse_derivative_name("pan.jpg"), None);
        assert_eq!(parse_derivative_name("pan_notes.txt"), None);
        assert_eq!(parse_derivative_name("pan_800"), None);
        assert_eq!(parse_derivative_name("_800.jpg"), None);
    }

    #[test]
    fn test_base_name_validation() {
        assert!(BaseName::new("pan").is_ok());
        assert!(BaseName::new("frying-pan").is_ok());
        assert!(BaseName::new("IMG_a2034").is_ok());

        assert!(BaseName::new("").is_err());
        assert!(BaseName::new("a/b").is_err());
        assert!(BaseName::new("a\\b").is_err());
        assert!(BaseName::new("pan.jpg").is_err());
        assert!(BaseName::new("pan_800").is_err());
    }

    #[test]
    fn test_base_name_from_file_name() {
        assert_eq!(BaseName::from_file_name("pan.jpg").unwrap().as_str(), "pan");
        assert_eq!(BaseName::from_file_name("pan.tar.gz").unwrap().as_str(), "pan");
        assert_eq!(
            BaseName::from_file_name("IMG_2034.JPG").unwrap().as_str(),
            "IMG-2034"
        );
        assert!(BaseName::from_file_name(".hidden").is_err());
    }

    #[test]
    fn test_owns_derivative() {
        let base = BaseName::new("pan").unwrap();
        assert!(base.owns_derivative("pan_1600.jpg"));
        assert!(base.owns_derivative("pan_800.webp"));
        assert!(!base.owns_derivative("pan.jpg"));
        assert!(!base.owns_derivative("pan.json"));
        assert!(!base.owns_derivative("unrelated_800.jpg"));
        assert!(!base.owns_derivative("frying-pan_800.jpg"));
        assert!(!base.owns_derivative("pan_notes.txt"));
        assert!(!base.owns_derivative("pan_extra_800.jpg"));
    }
}
