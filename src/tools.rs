//! Named tool capabilities and the substring router.

use std::sync::Arc;

use async_trait::async_trait;

/// A named capability invocable with a single string argument, bypassing
/// the LLM. May fail with arbitrary domain errors; the executor catches
/// them.
#[async_trait]
pub trait Tool: Send + Sync {
    async fn invoke(&self, args: &str) -> anyhow::Result<String>;
}

/// A tool under its registered name.
#[derive(Clone)]
pub struct RegisteredTool {
    pub name: String,
    pub tool: Arc<dyn Tool>,
}

/// Maps a sub-task description to a registered tool, or `None` for direct
/// generation.
///
/// Selection is deliberately naive: the first registered tool whose name
/// appears (case-insensitively) as a substring of the description wins, in
/// registration order. No scoring, no disambiguation. A description that
/// merely mentions "search" will route to a tool named `search` whether or
/// not that was intended; swapping in a smarter router only requires
/// replacing this type, the executor does not care.
#[derive(Default)]
pub struct ToolRouter {
    tools: Vec<RegisteredTool>,
}

impl ToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under a unique name.
    ///
    /// # Errors
    /// Rejects duplicate names; routing depends on registration order and a
    /// silent overwrite would reorder it.
    pub fn register(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) -> anyhow::Result<()> {
        let name = name.into();
        if self.tools.iter().any(|t| t.name == name) {
            anyhow::bail!("tool '{}' is already registered", name);
        }
        tracing::debug!(name, "registered tool");
        self.tools.push(RegisteredTool { name, tool });
        Ok(())
    }

    /// First registered tool whose name is a case-insensitive substring of
    /// `description`, or `None`.
    pub fn route(&self, description: &str) -> Option<&RegisteredTool> {
        let haystack = description.to_lowercase();
        self.tools
            .iter()
            .find(|t| haystack.contains(&t.name.to_lowercase()))
    }

    /// Registered tool names, in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }
}
