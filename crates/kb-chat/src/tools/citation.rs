//! Citation-marking decorator for the retrieval tool

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::SourceNode;

use super::query::{missing_query, query_argument, QueryTool};
use super::{Tool, ToolMetadata, ToolOutput};

/// Suffix appended to the agent's system prompt when citations are enabled
pub const CITATION_SYSTEM_PROMPT: &str = r#"

Answer the user question using the response from the query tool.
Each passage returned by the tool starts with a citation marker of the form [citation:<id>].
- After every sentence that uses information from a passage, add that passage's marker exactly as given, e.g. "The warranty lasts two years [citation:9a1f3c2e-5b7d-4e8a-a1b2-c3d4e5f60718]".
- Only use ids that appear in the tool response. Never invent or shorten an id.
- Do not talk about the citations themselves; they are rendered for the user separately."#;

/// Marker placed in front of a cited passage
pub fn citation_marker(source: &SourceNode) -> String {
    format!("[citation:{}]", source.chunk_id)
}

/// Retrieval tool whose passages carry citation markers
pub struct CitationQueryTool {
    inner: QueryTool,
    workflow_compatible: bool,
}

/// Decorate `tool` so every passage is marked with `[citation:<chunk id>]`.
///
/// With `workflow_compatible` the structured sources stay attached to the
/// tool output for the step-based workflow to surface; otherwise only the
/// marked text is returned.
pub fn enable_citation(mut tool: QueryTool, workflow_compatible: bool) -> CitationQueryTool {
    let metadata = tool.metadata_mut();
    metadata.description.push_str(
        " Every passage in the result is prefixed with a [citation:<id>] marker to cite in the answer.",
    );
    CitationQueryTool {
        inner: tool,
        workflow_compatible,
    }
}

impl CitationQueryTool {
    fn format(sources: &[SourceNode]) -> String {
        sources
            .iter()
            .map(|s| format!("{} {}\n{}", citation_marker(s), s.format_inline(), s.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl Tool for CitationQueryTool {
    fn metadata(&self) -> &ToolMetadata {
        self.inner.metadata()
    }

    async fn call(&self, arguments: &Value) -> Result<ToolOutput> {
        let Some(query) = query_argument(arguments) else {
            return Ok(missing_query());
        };

        let sources = self.inner.retrieve(query).await?;
        if sources.is_empty() {
            return Ok(ToolOutput::text("No relevant information found in the knowledge base."));
        }

        let content = Self::format(&sources);
        Ok(ToolOutput {
            content,
            sources: if self.workflow_compatible { sources } else { Vec::new() },
            is_error: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::query::tests::pet_tool;
    use serde_json::json;

    #[tokio::test]
    async fn test_passages_are_marked() {
        let tool = enable_citation(pet_tool(2), true);
        let output = tool.call(&json!({"input": "cats"})).await.unwrap();

        assert_eq!(output.sources.len(), 2);
        for source in &output.sources {
            assert!(output.content.contains(&citation_marker(source)));
        }
        assert!(output
            .content
            .starts_with(&format!("[citation:{}]", output.sources[0].chunk_id)));
    }

    #[tokio::test]
    async fn test_non_workflow_variant_returns_text_only() {
        let tool = enable_citation(pet_tool(1), false);
        let output = tool.call(&json!({"input": "dogs"})).await.unwrap();
        assert!(output.sources.is_empty());
        assert!(output.content.contains("[citation:"));
        assert!(output.content.contains("daily walks"));
    }

    #[test]
    fn test_description_mentions_markers() {
        let tool = enable_citation(pet_tool(1), true);
        assert_eq!(tool.metadata().name, "query_document");
        assert!(tool.metadata().description.contains("[citation:<id>]"));
    }

    #[test]
    fn test_system_prompt_suffix_describes_format() {
        assert!(CITATION_SYSTEM_PROMPT.starts_with('\n'));
        assert!(CITATION_SYSTEM_PROMPT.contains("[citation:<id>]"));
    }
}
