//! Tool executor
//!
//! Maps a tool name to its typed handler. Arguments are deserialized into
//! the tool's input struct, the blocking filesystem work runs on tokio's
//! blocking pool, and the typed output is serialized back to JSON.
//!
//! Every tool is read-only, so calls run in parallel without coordination:
//! the executor holds no locks and no mutable state.

use crate::errors::{FsResult, Result, ServerError};
use crate::server::protocol::INVALID_PARAMS;
use crate::tools::implementations::RootedFs;
use crate::tools::registry::{ToolRegistry, GET_FILE_INFO, LIST_DIRECTORY, READ_FILE, SEARCH_FILES};
use crate::tools::types::{
    GetFileInfoInput, ListDirectoryInput, ReadFileInput, ReadFileOutput, SearchFilesInput,
    ToolResult,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Executor for tool operations
#[derive(Debug)]
pub struct ToolExecutor {
    /// Tool registry
    registry: ToolRegistry,

    /// Confined filesystem
    fs: Arc<RootedFs>,
}

impl ToolExecutor {
    /// Create new executor over `fs`
    pub fn new(fs: RootedFs) -> Self {
        Self {
            registry: ToolRegistry::new(),
            fs: Arc::new(fs),
        }
    }

    /// Execute a tool by name
    ///
    /// Unknown tools and malformed arguments are protocol errors
    /// (`Err`). Operation failures come back as an unsuccessful
    /// `ToolResult` carrying the error kind.
    pub async fn execute(&self, tool: &str, args: &serde_json::Value) -> Result<ToolResult> {
        if self.registry.get(tool).is_none() {
            return Err(ServerError::Protocol {
                code: INVALID_PARAMS,
                message: format!("Unknown tool: {}", tool),
            });
        }

        let start = Instant::now();
        debug!(tool, "executing tool");

        let outcome = match tool {
            READ_FILE => {
                let input: ReadFileInput = parse_args(tool, args)?;
                self.run(move |fs| fs.read_file(&input.path).map(ReadFileOutput::from))
                    .await?
            }
            LIST_DIRECTORY => {
                let input: ListDirectoryInput = parse_args(tool, args)?;
                self.run(move |fs| fs.list_directory(&input.path)).await?
            }
            SEARCH_FILES => {
                let input: SearchFilesInput = parse_args(tool, args)?;
                self.run(move |fs| fs.search_files(&input.pattern)).await?
            }
            GET_FILE_INFO => {
                let input: GetFileInfoInput = parse_args(tool, args)?;
                self.run(move |fs| fs.get_file_info(&input.path)).await?
            }
            _ => {
                return Err(ServerError::Protocol {
                    code: INVALID_PARAMS,
                    message: format!("Tool not implemented: {}", tool),
                })
            }
        };

        let result = match outcome {
            Ok(output) => ToolResult::success(tool, output, start.elapsed()),
            Err(err) => {
                warn!(tool, kind = err.kind(), error = %err, "tool failed");
                ToolResult::failure(tool, &err, start.elapsed())
            }
        };

        Ok(result)
    }

    /// Run a blocking operation on the blocking pool and serialize its output
    async fn run<T, F>(&self, op: F) -> Result<FsResult<serde_json::Value>>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&RootedFs) -> FsResult<T> + Send + 'static,
    {
        let fs = Arc::clone(&self.fs);
        let outcome = tokio::task::spawn_blocking(move || op(fs.as_ref())).await?;

        match outcome {
            Ok(output) => Ok(Ok(serde_json::to_value(output)?)),
            Err(err) => Ok(Err(err)),
        }
    }

    /// Get registry reference
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Confined filesystem the tools operate on
    pub fn fs(&self) -> &RootedFs {
        &self.fs
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: &serde_json::Value) -> Result<T> {
    // Missing arguments behave like an empty object
    let args = if args.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        args.clone()
    };

    serde_json::from_value(args).map_err(|e| ServerError::Protocol {
        code: INVALID_PARAMS,
        message: format!("Invalid arguments for {}: {}", tool, e),
    })
}
