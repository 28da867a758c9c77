//! Tool implementations module

pub mod filesystem;

// Re-export for convenience
pub use filesystem::{format_mod_time, mode_string, RootedFs};
