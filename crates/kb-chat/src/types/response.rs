//! Retrieved sources and agent responses

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Chunk, FileType};

/// A retrieved passage and where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceNode {
    /// Chunk ID, also the citation marker
    pub chunk_id: Uuid,
    /// Document ID
    pub document_id: Uuid,
    /// Source filename
    pub filename: String,
    /// File type
    pub file_type: FileType,
    /// Section title (if detected)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    /// Passage text
    pub text: String,
    /// Cosine similarity to the query
    pub score: f32,
}

impl SourceNode {
    /// Create a source node from a chunk and similarity score
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            filename: chunk.source.filename.clone(),
            file_type: chunk.source.file_type.clone(),
            section_title: chunk.source.section_title.clone(),
            text: chunk.content.clone(),
            score,
        }
    }

    /// Format source for display in text
    pub fn format_inline(&self) -> String {
        match &self.section_title {
            Some(section) => format!("[Source: {}, Section: {}]", self.filename, section),
            None => format!("[Source: {}]", self.filename),
        }
    }
}

/// Final answer of one agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Answer text, citation markers included
    pub answer: String,
    /// Sources cited by the answer, in order of first appearance
    pub citations: Vec<SourceNode>,
    /// Every source the tool retrieved during the run
    pub sources: Vec<SourceNode>,
    /// Number of tool calls executed
    pub tool_calls: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl AgentResponse {
    /// Highest similarity among retrieved sources (0.0 when nothing was retrieved)
    pub fn top_score(&self) -> f32 {
        self.sources.iter().map(|s| s.score).fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::document::ChunkSource;

    #[test]
    fn test_from_chunk() {
        let mut source = ChunkSource::new("faq.md".into(), FileType::Markdown);
        source.section_title = Some("Billing".into());
        let chunk = Chunk::new(Uuid::new_v4(), "Invoices are monthly.".into(), source, 0, 21, 0);

        let node = SourceNode::from_chunk(&chunk, 0.82);
        assert_eq!(node.chunk_id, chunk.id);
        assert_eq!(node.text, "Invoices are monthly.");
        assert_eq!(node.format_inline(), "[Source: faq.md, Section: Billing]");
    }

    #[test]
    fn test_top_score() {
        let source = ChunkSource::new("faq.md".into(), FileType::Markdown);
        let chunk = Chunk::new(Uuid::new_v4(), "text".into(), source, 0, 4, 0);
        let mut response = AgentResponse {
            answer: "none".into(),
            citations: vec![],
            sources: vec![],
            tool_calls: 0,
            processing_time_ms: 1,
        };
        assert_eq!(response.top_score(), 0.0);

        response.sources = vec![
            SourceNode::from_chunk(&chunk, 0.4),
            SourceNode::from_chunk(&chunk, 0.9),
        ];
        assert_eq!(response.top_score(), 0.9);
    }
}
