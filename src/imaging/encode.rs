/// Per-format encoders for derivative files
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::error::{EncodingError, ImageFormatHint};
use image::{DynamicImage, ImageError, ImageFormat, ImageResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::ladder::{DerivativeFormat, QUALITY};
use crate::error::{DerivativeError, Result};

/// rav1e speed preset (1 = slowest/best, 10 = fastest)
const AVIF_SPEED: u8 = 8;

/// Encode `img` in `format` into any writer
pub fn encode<W: Write>(img: &DynamicImage, format: DerivativeFormat, writer: W) -> ImageResult<()> {
    match format {
        DerivativeFormat::Jpeg => img.write_with_encoder(JpegEncoder::new_with_quality(writer, QUALITY)),
        DerivativeFormat::Webp => encode_webp(img, writer),
        DerivativeFormat::Avif => img.write_with_encoder(AvifEncoder::new_with_speed_quality(
            writer, AVIF_SPEED, QUALITY,
        )),
    }
}

/// Lossy WebP through libwebp at QUALITY
fn encode_webp<W: Write>(img: &DynamicImage, mut writer: W) -> ImageResult<()> {
    let rgb = img.to_rgb8();
    let encoded = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
        .encode_simple(false, f32::from(QUALITY))
        .map_err(|e| {
            ImageError::Encoding(EncodingError::new(
                ImageFormatHint::Exact(ImageFormat::WebP),
                format!("libwebp failed: {:?}", e),
            ))
        })?;
    writer.write_all(&encoded)?;
    Ok(())
}

/// Encode `img` to a new file at `path`, replacing any existing file
pub fn encode_to_file(img: &DynamicImage, format: DerivativeFormat, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| DerivativeError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    encode(img, format, &mut writer).map_err(|err| match err {
        ImageError::IoError(source) => DerivativeError::io(path, source),
        source => DerivativeError::Encode {
            path: path.to_path_buf(),
            source,
        },
    })?;

    writer.flush().map_err(|e| DerivativeError::io(path, e))?;
    Ok(())
}
