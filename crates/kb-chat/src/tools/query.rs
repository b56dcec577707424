//! Retrieval tool over the persisted index

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::index::IndexHandle;
use crate::providers::EmbeddingProvider;
use crate::types::SourceNode;

use super::{Tool, ToolMetadata, ToolOutput};

/// Name the model calls the retrieval tool by
pub const QUERY_TOOL_NAME: &str = "query_document";

/// Embeds a query and returns the closest passages from the index
pub struct QueryTool {
    index: IndexHandle,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    metadata: ToolMetadata,
}

/// Wrap `index` as the `query_document` tool
pub fn build_query_tool(
    index: IndexHandle,
    embedder: Arc<dyn EmbeddingProvider>,
    config: &RetrievalConfig,
) -> QueryTool {
    index.check_embedding_model(embedder.model());

    QueryTool {
        index,
        embedder,
        top_k: config.top_k,
        metadata: ToolMetadata {
            name: QUERY_TOOL_NAME.to_string(),
            description: config.tool_description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "Search query for the knowledge base"
                    }
                },
                "required": ["input"]
            }),
        },
    }
}

impl QueryTool {
    /// Retrieve the top passages for `query`
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SourceNode>> {
        let embedding = self.embedder.embed(query).await?;
        let sources = self.index.search(&embedding, self.top_k)?;
        tracing::info!(
            "Retrieved {} passages for '{}' (best score {:.3})",
            sources.len(),
            query,
            sources.first().map(|s| s.score).unwrap_or(0.0)
        );
        Ok(sources)
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut ToolMetadata {
        &mut self.metadata
    }
}

/// Query string from tool arguments; a bare JSON string is accepted too
pub(crate) fn query_argument(arguments: &Value) -> Option<&str> {
    arguments
        .get("input")
        .and_then(Value::as_str)
        .or_else(|| arguments.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
}

pub(crate) fn missing_query() -> ToolOutput {
    ToolOutput::error(format!(
        "{} requires a non-empty `input` string argument",
        QUERY_TOOL_NAME
    ))
}

#[async_trait]
impl Tool for QueryTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn call(&self, arguments: &Value) -> Result<ToolOutput> {
        let Some(query) = query_argument(arguments) else {
            return Ok(missing_query());
        };

        let sources = self.retrieve(query).await?;
        if sources.is_empty() {
            return Ok(ToolOutput::text("No relevant information found in the knowledge base."));
        }

        let content = sources
            .iter()
            .map(|s| format!("{}\n{}", s.format_inline(), s.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ToolOutput {
            content,
            sources,
            is_error: false,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use crate::index::tests::sample_index;

    /// Embeds by keyword: "cat" → x, "dog" → y
    pub(crate) struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("cat") { 1.0 } else { 0.0 },
                        if t.contains("dog") { 1.0 } else { 0.0 },
                        0.1,
                    ]
                })
                .collect())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "keyword"
        }

        fn model(&self) -> &str {
            "bge-large"
        }
    }

    pub(crate) fn pet_index() -> IndexHandle {
        Arc::new(sample_index(&[
            ("cats.md", "Cats sleep sixteen hours a day.", vec![1.0, 0.0, 0.1]),
            ("dogs.md", "Dogs need daily walks.", vec![0.0, 1.0, 0.1]),
        ]))
    }

    pub(crate) fn pet_tool(top_k: usize) -> QueryTool {
        let config = RetrievalConfig {
            top_k,
            ..RetrievalConfig::default()
        };
        build_query_tool(pet_index(), Arc::new(KeywordEmbedder), &config)
    }

    #[test]
    fn test_metadata() {
        let tool = pet_tool(1);
        assert_eq!(tool.metadata().name, "query_document");
        assert_eq!(tool.metadata().parameters["required"][0], "input");
        assert_eq!(tool.top_k(), 1);
    }

    #[tokio::test]
    async fn test_call_returns_best_passages() {
        let output = pet_tool(1).call(&json!({"input": "how long do cats sleep"})).await.unwrap();
        assert!(!output.is_error);
        assert_eq!(output.sources.len(), 1);
        assert_eq!(output.sources[0].filename, "cats.md");
        assert!(output.content.contains("[Source: cats.md]"));
        assert!(output.content.contains("sixteen hours"));
    }

    #[tokio::test]
    async fn test_call_accepts_bare_string() {
        let output = pet_tool(2).call(&json!("dog walks")).await.unwrap();
        assert_eq!(output.sources[0].filename, "dogs.md");
    }

    #[tokio::test]
    async fn test_missing_input_is_error_output() {
        let output = pet_tool(2).call(&json!({"query": "cats"})).await.unwrap();
        assert!(output.is_error);
        assert!(output.sources.is_empty());

        let output = pet_tool(2).call(&json!({"input": "  "})).await.unwrap();
        assert!(output.is_error);
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::embedding("connection refused"))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "broken"
        }

        fn model(&self) -> &str {
            "bge-large"
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let tool = build_query_tool(pet_index(), Arc::new(BrokenEmbedder), &RetrievalConfig::default());
        let err = tool.call(&json!({"input": "cats"})).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }
}
