/// Derivative generation module
///
/// This module handles:
/// - The fixed size/format ladder and derivative naming
/// - Decoding, RGB normalization and thumbnail resizing
/// - Encoding JPEG, WEBP and AVIF derivatives
/// - Generating, purging and migrating derivative sets on disk
/// - URL helpers for the rendering layer

pub mod encode;
pub mod generator;
pub mod ladder;
pub mod task;
pub mod thumbnail;
pub mod urls;
