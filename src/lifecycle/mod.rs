/// Entity lifecycle integration
///
/// Owning entities (categories, collections and the product image kinds)
/// describe where their image belongs; the hooks here move it there,
/// generate derivatives and clean up stale ones around each save/delete.

pub mod hooks;
pub mod owner;

pub use hooks::{HookReport, ImageLifecycle, ImageLocation};
pub use owner::{EntityImage, ImageOwner, OwnsImage};
