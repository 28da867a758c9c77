//! Tool runtime coordinator
//!
//! Entry point the transport layer talks to. Owns the executor, which owns
//! the registry and the confined filesystem.

use crate::errors::Result;
use crate::tools::executor::ToolExecutor;
use crate::tools::implementations::RootedFs;
use crate::tools::security::{ConfinementStrategy, RootBoundary};
use crate::tools::types::{ToolResult, ToolSchema};
use std::path::Path;
use std::sync::Arc;

/// Tool runtime coordinator
#[derive(Debug, Clone)]
pub struct ToolRuntime {
    executor: Arc<ToolExecutor>,
}

impl ToolRuntime {
    /// Create new tool runtime rooted at `root` with the default strategy
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_strategy(root, ConfinementStrategy::default())
    }

    /// Create tool runtime with an explicit confinement strategy
    pub fn with_strategy(root: impl AsRef<Path>, strategy: ConfinementStrategy) -> Result<Self> {
        let root = RootBoundary::new(root)?;
        let fs = RootedFs::with_strategy(root, strategy)?;
        Ok(Self::from_fs(fs))
    }

    pub fn from_fs(fs: RootedFs) -> Self {
        Self {
            executor: Arc::new(ToolExecutor::new(fs)),
        }
    }

    /// Execute tool asynchronously
    ///
    /// # Flow
    /// 1. Validate tool exists in registry
    /// 2. Deserialize arguments into the tool's input type
    /// 3. Confine the path and run the operation
    /// 4. Return the structured result
    pub async fn execute(&self, tool: &str, args: &serde_json::Value) -> Result<ToolResult> {
        self.executor.execute(tool, args).await
    }

    /// Schemas advertised to callers
    pub fn schemas(&self) -> Vec<&ToolSchema> {
        self.executor.registry().schemas()
    }

    pub fn strategy(&self) -> ConfinementStrategy {
        self.executor.fs().strategy()
    }

    /// Effective root the tools are confined to
    pub fn root(&self) -> &Path {
        self.executor.fs().root().path()
    }
}
