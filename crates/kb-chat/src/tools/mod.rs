//! Tools the agent can call

pub mod citation;
pub mod query;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::SourceNode;

pub use citation::{enable_citation, CitationQueryTool, CITATION_SYSTEM_PROMPT};
pub use query::{build_query_tool, QueryTool, QUERY_TOOL_NAME};

/// Name, description and JSON-schema parameters advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Result of one tool call
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Text handed back to the model
    pub content: String,
    /// Structured sources behind `content`
    pub sources: Vec<SourceNode>,
    /// The call was rejected; `content` explains why
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
            is_error: true,
        }
    }
}

/// A callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    fn metadata(&self) -> &ToolMetadata;

    /// Invoke the tool with model-supplied arguments.
    ///
    /// Bad arguments come back as an error [`ToolOutput`] so the model can
    /// correct itself; `Err` is reserved for failures of the tool itself.
    async fn call(&self, arguments: &Value) -> Result<ToolOutput>;
}
