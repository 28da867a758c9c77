//! filemcp - read-only filesystem tools confined to one root directory
//!
//! Serves `read_file`, `list_directory`, `search_files` and `get_file_info`
//! over newline-delimited JSON-RPC on stdio.
//!
//! # Architecture
//!
//! - **tools**: path confinement, the four operations, registry and executor
//! - **server**: JSON-RPC transport over any async reader/writer pair
//! - **cli**: argument parsing, root resolution and TOML configuration
//! - **logging**: tracing subscriber setup

pub mod errors;
pub mod tools;
pub mod server;
pub mod cli;
pub mod logging;

// Re-export commonly used types
pub use errors::{FsError, FsResult, Result, ServerError};
pub use server::McpServer;
pub use tools::{ConfinementStrategy, PathConfiner, RootedFs, ToolRuntime};
