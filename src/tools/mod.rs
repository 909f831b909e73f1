//! Model-invocable tools over the course index.
//!
//! The tool set is closed: every tool is identified by a [`ToolName`] and
//! implements [`Tool`]. A [`ToolRegistry`] is built per query and collects the
//! source citations produced by the tools it runs.

mod outline;
mod search;

pub use outline::{format_outline, CourseOutlineTool};
pub use search::CourseSearchTool;

use crate::error::{KursError, Result};
use crate::models::Source;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Identifier of every tool the assistant can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolName {
    SearchCourseContent,
    GetCourseOutline,
}

impl ToolName {
    pub const ALL: [ToolName; 2] = [ToolName::SearchCourseContent, ToolName::GetCourseOutline];

    /// Wire name sent to the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchCourseContent => "search_course_content",
            Self::GetCourseOutline => "get_course_outline",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = KursError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| KursError::ToolNotFound(s.to_string()))
    }
}

/// Schema a tool exposes to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: ToolName,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// Result of a tool execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// Text handed back to the model.
    pub content: String,
    /// Citations backing the content, in result order.
    pub sources: Vec<Source>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
        }
    }
}

/// A capability the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput>;

    fn name(&self) -> ToolName {
        self.definition().name
    }
}

/// Decode a tool's JSON arguments into its typed form.
pub(crate) fn parse_arguments<T: DeserializeOwned>(tool: ToolName, arguments: serde_json::Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| KursError::InvalidToolArguments(format!("{}: {}", tool, e)))
}

/// Tools available for one query, plus the sources they produced.
///
/// Sources accumulate across executions until read with
/// [`take_sources`](Self::take_sources), which also resets them.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn Tool>>,
    sources: Mutex<Vec<Source>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if self.tools.insert(name, tool).is_some() {
            warn!("Replaced registered tool {}", name);
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas of all registered tools, in a stable order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Run a tool by wire name with JSON-encoded arguments.
    ///
    /// Unknown names fail with [`KursError::ToolNotFound`]; malformed
    /// arguments with [`KursError::InvalidToolArguments`].
    pub async fn execute(&self, name: &str, arguments: &str) -> Result<String> {
        let tool_name: ToolName = name.parse()?;
        let tool = self
            .tools
            .get(&tool_name)
            .ok_or_else(|| KursError::ToolNotFound(name.to_string()))?;

        let arguments: serde_json::Value = if arguments.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments)
                .map_err(|e| KursError::InvalidToolArguments(format!("{}: {}", tool_name, e)))?
        };

        info!("Executing tool {} with {}", tool_name, arguments);
        let output = tool.execute(arguments).await?;
        debug!("Tool {} produced {} sources", tool_name, output.sources.len());

        self.lock_sources()?.extend(output.sources);
        Ok(output.content)
    }

    /// Sources recorded since the last reset, without clearing them.
    pub fn last_sources(&self) -> Result<Vec<Source>> {
        Ok(self.lock_sources()?.clone())
    }

    /// Read and clear the recorded sources.
    pub fn take_sources(&self) -> Result<Vec<Source>> {
        Ok(std::mem::take(&mut *self.lock_sources()?))
    }

    pub fn reset_sources(&self) -> Result<()> {
        self.lock_sources()?.clear();
        Ok(())
    }

    fn lock_sources(&self) -> Result<std::sync::MutexGuard<'_, Vec<Source>>> {
        self.sources
            .lock()
            .map_err(|e| KursError::ToolExecution(format!("Failed to acquire lock: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    struct EchoTool;

    #[derive(Deserialize)]
    struct EchoArgs {
        course_name: String,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: ToolName::GetCourseOutline,
                description: "echo".to_string(),
                parameters: serde_json::json!({"type": "object"}),
            }
        }

        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput> {
            let args: EchoArgs = parse_arguments(ToolName::GetCourseOutline, arguments)?;
            Ok(ToolOutput {
                content: format!("echo {}", args.course_name),
                sources: vec![Source::new(args.course_name, None)],
            })
        }
    }

    #[test]
    fn test_tool_name_round_trip() {
        for name in ToolName::ALL {
            assert_eq!(name.as_str().parse::<ToolName>().unwrap(), name);
        }
        assert!(matches!(
            "delete_everything".parse::<ToolName>(),
            Err(KursError::ToolNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_registry_executes_and_tracks_sources() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));

        let content = registry
            .execute("get_course_outline", r#"{"course_name": "MCP"}"#)
            .await
            .unwrap();
        assert_eq!(content, "echo MCP");
        registry
            .execute("get_course_outline", r#"{"course_name": "RAG"}"#)
            .await
            .unwrap();

        assert_eq!(registry.last_sources().unwrap().len(), 2);
        let sources = registry.take_sources().unwrap();
        assert_eq!(sources[0].display, "MCP");
        assert_eq!(sources[1].display, "RAG");
        assert!(registry.take_sources().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_registry_errors() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));

        assert!(matches!(
            registry.execute("unknown_tool", "{}").await,
            Err(KursError::ToolNotFound(_))
        ));
        // Known name, but not registered here.
        assert!(matches!(
            registry.execute("search_course_content", "{}").await,
            Err(KursError::ToolNotFound(_))
        ));
        assert!(matches!(
            registry.execute("get_course_outline", "{not json").await,
            Err(KursError::InvalidToolArguments(_))
        ));
        assert!(matches!(
            registry.execute("get_course_outline", r#"{"other": 1}"#).await,
            Err(KursError::InvalidToolArguments(_))
        ));
        assert!(registry.last_sources().unwrap().is_empty());
    }

    #[test]
    fn test_definitions_are_ordered() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, ToolName::GetCourseOutline);
    }
}
