//! Tools module for whoami-mcp
//!
//! This module contains the tool executor trait, the tool registry, and the
//! tool implementations the MCP server exposes.

pub mod whoami;

use crate::error::Result;
use crate::mcp::auth::AuthContext;
use crate::mcp::types::{CallToolResponse, McpTool};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use whoami::WhoamiTool;

/// Trait for tool executors
///
/// Each tool exposed over MCP implements this trait. The caller's
/// authentication context is threaded into every invocation; tools must not
/// read identity from anywhere else.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Returns the tool definition advertised by `tools/list`
    fn tool_definition(&self) -> McpTool;

    /// Executes the tool with the given arguments
    ///
    /// # Arguments
    ///
    /// * `args` - Tool arguments as a JSON value (`{}` when none were sent)
    /// * `auth` - Context verified for the request carrying this call
    ///
    /// # Errors
    ///
    /// Returns error if execution fails
    async fn execute(
        &self,
        args: serde_json::Value,
        auth: Option<&AuthContext>,
    ) -> Result<CallToolResponse>;
}

/// Tool registry for managing available tools
///
/// The registry maintains the collection of tools callable through
/// `tools/call`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolExecutor>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in tool
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        registry.register(whoami::TOOL_NAME, Arc::new(WhoamiTool));
        registry
    }

    /// Register a tool executor in the registry
    ///
    /// A tool registered under an existing name replaces the previous one.
    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn ToolExecutor>) {
        self.tools.insert(name.into(), executor);
    }

    /// Get a tool executor by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).cloned()
    }

    /// All tool definitions, ordered by name
    pub fn all_definitions(&self) -> Vec<McpTool> {
        let mut definitions: Vec<McpTool> = self
            .tools
            .values()
            .map(|executor| executor.tool_definition())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
