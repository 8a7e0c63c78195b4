use image::{imageops::FilterType, DynamicImage};

/// Filter used for every downscale
const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Normalize any decoded image to 8-bit RGB.
/// Alpha is dropped, palettes and 16-bit channels are expanded/narrowed.
pub fn normalize_rgb(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) => img,
        other => DynamicImage::ImageRgb8(other.into_rgb8()),
    }
}

/// Dimensions after constraining the longer edge to `target`.
///
/// Never enlarges: images already within the target keep their size.
/// The shorter edge is rounded to the nearest pixel and is at least 1.
pub fn thumbnail_dimensions(width: u32, height: u32, target: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= target || width == 0 || height == 0 {
        return (width, height);
    }

    let scale = |edge: u32| -> u32 {
        let scaled = (u64::from(edge) * u64::from(target) + u64::from(longer) / 2) / u64::from(longer);
        scaled.max(1) as u32
    };

    if width >= height {
        (target, scale(height))
    } else {
        (scale(width), target)
    }
}

/// Resize with thumbnail semantics (see [`thumbnail_dimensions`])
pub fn make_thumbnail(img: &DynamicImage, target: u32) -> DynamicImage {
    let (width, height) = thumbnail_dimensions(img.width(), img.height(), target);
    if (width, height) == (img.width(), img.height()) {
        return img.clone();
    }
    img.resize_exact(width, height, RESIZE_FILTER)
}
