/// State management module
///
/// This module handles the persistent side of derivative sets:
/// - The SQLite derivative index (index.rs)
/// - Shared data structures (data.rs)

pub mod data;
pub mod index;
