//! Confined filesystem tools
//!
//! Provides read-only filesystem inspection confined to one root:
//! - 4 tools (read_file, list_directory, search_files, get_file_info)
//! - Path confinement with lexical and symlink-resolving strategies
//! - Typed dispatch from tool name to handler
//! - Tool runtime coordinator

pub mod types;
pub mod registry;
pub mod security;
pub mod executor;
pub mod runtime;
pub mod implementations;

// Re-export commonly used types
pub use types::{ToolResult, ToolSchema};
pub use registry::ToolRegistry;
pub use security::{ConfinementStrategy, PathConfiner, RootBoundary};
pub use executor::ToolExecutor;
pub use runtime::ToolRuntime;
pub use implementations::RootedFs;
