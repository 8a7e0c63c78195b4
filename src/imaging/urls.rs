/// URL helpers for the rendering layer
///
/// Pure string transforms from the URL of an entity's original image to
/// the URLs of its derivatives. No I/O.
use super::ladder::{file_stem, DerivativeFormat, DERIVATIVE_SIZES};

/// URL of one derivative: `<dir>/<stem>_<size>.<ext>`.
///
/// The stem is the file name up to its first `.`. The directory part is
/// kept verbatim; a bare file name yields a bare derivative name.
pub fn derivative_url(original_url: &str, size: u32, format: DerivativeFormat) -> String {
    let (dir, file) = match original_url.rfind('/') {
        Some(i) => original_url.split_at(i + 1),
        None => ("", original_url),
    };
    format!("{}{}_{}.{}", dir, file_stem(file), size, format.extension())
}

/// All 12 derivative URLs, largest size first, formats in ladder order
pub fn derivative_urls(original_url: &str) -> Vec<(u32, DerivativeFormat, String)> {
    DERIVATIVE_SIZES
        .iter()
        .flat_map(|&size| {
            DerivativeFormat::ALL
                .into_iter()
                .map(move |format| (size, format, derivative_url(original_url, size, format)))
        })
        .collect()
}

/// Admin list cell: the 70px JPEG linking to the 1600px JPEG
pub fn admin_preview_html(original_url: &str) -> String {
    format!(
        r#"<a href="{}"><img src="{}" style="object-fit: contain;width:70px;aspect-ratio:1/1;"></a>"#,
        escape_attr(&derivative_url(original_url, 1600, DerivativeFormat::Jpeg)),
        escape_attr(&derivative_url(original_url, 70, DerivativeFormat::Jpeg)),
    )
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
