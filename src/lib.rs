/// Catalog image derivatives
///
/// Turns each uploaded catalog image into a fixed set of resized,
/// re-encoded copies (4 sizes × JPEG/WEBP/AVIF) stored next to it, and
/// removes or relocates those sets when the owning entity changes.

pub mod config;
pub mod imaging;
pub mod error;
pub mod lifecycle;
pub mod state;

pub use config::MediaConfig;
pub use imaging::generator::DerivativeGenerator;
pub use imaging::ladder::{BaseName, DerivativeFormat, DERIVATIVE_SIZES, QUALITY};
pub use imaging::urls::{admin_preview_html, derivative_url, derivative_urls};
pub use error::{DerivativeError, Result};
pub use state::data::{DerivativeFile, DerivativeSet};
pub use state::index::DerivativeIndex;
