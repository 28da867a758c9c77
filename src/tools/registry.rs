//! Tool registry with JSON schemas
//!
//! Maintains registry of available tools with input schemas.
//!
//! Tools:
//! - read_file: Read file contents
//! - list_directory: List directory contents
//! - search_files: Find files by base-name glob
//! - get_file_info: File or directory metadata

use crate::tools::types::ToolSchema;
use serde_json::json;
use std::collections::HashMap;

pub const READ_FILE: &str = "read_file";
pub const LIST_DIRECTORY: &str = "list_directory";
pub const SEARCH_FILES: &str = "search_files";
pub const GET_FILE_INFO: &str = "get_file_info";

/// Tool registry
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    /// Map of tool name to schema
    tools: HashMap<String, ToolSchema>,
}

impl ToolRegistry {
    /// Create new tool registry with all tools
    pub fn new() -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        registry.register_read_file();
        registry.register_list_directory();
        registry.register_search_files();
        registry.register_get_file_info();

        registry
    }

    fn register(&mut self, schema: ToolSchema) {
        self.tools.insert(schema.name.clone(), schema);
    }

    fn register_read_file(&mut self) {
        self.register(ToolSchema::new(
            READ_FILE,
            "Read the contents of a file. Returns the file content as text.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "path to the file relative to root directory"
                    }
                },
                "required": ["path"]
            }),
        ));
    }

    fn register_list_directory(&mut self) {
        self.register(ToolSchema::new(
            LIST_DIRECTORY,
            "List the contents of a directory. Returns file names, types, and sizes.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "path to directory relative to root (empty for root)"
                    }
                }
            }),
        ));
    }

    fn register_search_files(&mut self) {
        self.register(ToolSchema::new(
            SEARCH_FILES,
            "Search for files matching a glob pattern (e.g., '*.rs', 'test*', '*.md').",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "glob pattern to match file names, e.g. '*.txt'"
                    }
                },
                "required": ["pattern"]
            }),
        ));
    }

    fn register_get_file_info(&mut self) {
        self.register(ToolSchema::new(
            GET_FILE_INFO,
            "Get detailed information about a file or directory.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "path to the file relative to root directory"
                    }
                },
                "required": ["path"]
            }),
        ));
    }

    /// Get tool schema by name
    pub fn get(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.get(name)
    }

    /// Get all tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<&ToolSchema> {
        let mut schemas: Vec<&ToolSchema> = self.tools.values().collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
