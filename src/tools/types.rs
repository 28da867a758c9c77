//! Tool input, output, and result types
//!
//! Field names here are the wire contract; `isDir` and `modTime` keep their
//! camelCase spelling on the wire.

use crate::errors::FsError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Arguments of `read_file`
#[derive(Debug, Clone, Deserialize)]
pub struct ReadFileInput {
    pub path: String,
}

/// Arguments of `list_directory`; a missing path lists the root
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDirectoryInput {
    #[serde(default)]
    pub path: String,
}

/// Arguments of `search_files`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchFilesInput {
    pub pattern: String,
}

/// Arguments of `get_file_info`
#[derive(Debug, Clone, Deserialize)]
pub struct GetFileInfoInput {
    pub path: String,
}

/// Whole contents of a file, with the caller's path echoed back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub path: String,
    pub content: Vec<u8>,
}

impl FileContent {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Wire form of `read_file`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadFileOutput {
    /// File contents; invalid UTF-8 is replaced with U+FFFD
    pub content: String,
    /// Raw byte length
    pub size: usize,
    pub path: String,
}

impl From<FileContent> for ReadFileOutput {
    fn from(file: FileContent) -> Self {
        let size = file.size();
        let content = match String::from_utf8(file.content) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        Self {
            content,
            size,
            path: file.path,
        }
    }
}

/// One immediate child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    /// Size in bytes, 0 for directories
    pub size: u64,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
}

/// Result of `list_directory`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub path: String,
    /// Filesystem enumeration order
    pub entries: Vec<DirectoryEntry>,
    pub count: usize,
}

/// Result of `search_files`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub pattern: String,
    /// Root-relative, `/`-separated paths in discovery order
    pub matches: Vec<String>,
    pub count: usize,
}

/// Result of `get_file_info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStat {
    pub path: String,
    pub size: u64,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
    /// RFC 3339 with offset, second precision
    #[serde(rename = "modTime")]
    pub mod_time: String,
    /// Permission string, e.g. `-rw-r--r--`
    pub mode: String,
}

/// Structured failure reported back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolErrorInfo {
    pub kind: String,
    pub message: String,
}

impl From<&FsError> for ToolErrorInfo {
    fn from(err: &FsError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool name that was executed
    pub tool: String,

    /// Structured output (empty object on failure)
    pub output: serde_json::Value,

    /// Whether execution was successful
    pub success: bool,

    /// Execution duration in milliseconds
    pub duration_ms: u64,

    /// Failure details if the operation failed
    pub error: Option<ToolErrorInfo>,
}

impl ToolResult {
    /// Create successful result
    pub fn success(tool: impl Into<String>, output: serde_json::Value, duration: Duration) -> Self {
        Self {
            tool: tool.into(),
            output,
            success: true,
            duration_ms: duration.as_millis() as u64,
            error: None,
        }
    }

    /// Create failed result
    pub fn failure(tool: impl Into<String>, error: &FsError, duration: Duration) -> Self {
        Self {
            tool: tool.into(),
            output: serde_json::json!({}),
            success: false,
            duration_ms: duration.as_millis() as u64,
            error: Some(error.into()),
        }
    }

    /// Kind of the failure, if any
    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.kind.as_str())
    }
}

/// Tool schema definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Parameter schema (JSON Schema)
    #[serde(rename = "inputSchema")]
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    /// Create new tool schema
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
