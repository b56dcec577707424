//! Linking `[citation:<id>]` markers in answers to retrieved sources

use regex::Regex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::SourceNode;

const CITATION_PATTERN: &str = r"\[citation:\s*([0-9a-fA-F-]{32,36})\s*\]";

/// Finds citation markers in model output
#[derive(Debug, Clone)]
pub struct CitationLinker {
    pattern: Regex,
}

impl CitationLinker {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(CITATION_PATTERN)
            .map_err(|e| Error::internal(format!("Invalid citation pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Chunk IDs cited in `answer`, deduplicated, in order of first appearance
    pub fn cited_ids(&self, answer: &str) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for cap in self.pattern.captures_iter(answer) {
            match Uuid::parse_str(&cap[1]) {
                Ok(id) if !ids.contains(&id) => ids.push(id),
                Ok(_) => {}
                Err(e) => tracing::debug!("Ignoring malformed citation '{}': {}", &cap[0], e),
            }
        }
        ids
    }

    /// Sources cited by `answer`.
    ///
    /// Markers that name no retrieved source are dropped with a warning.
    pub fn link(&self, answer: &str, sources: &[SourceNode]) -> Vec<SourceNode> {
        self.cited_ids(answer)
            .into_iter()
            .filter_map(|id| {
                let found = sources.iter().find(|s| s.chunk_id == id).cloned();
                if found.is_none() {
                    tracing::warn!("Answer cites unknown source {}", id);
                }
                found
            })
            .collect()
    }
}

/// Truncate snippet to a maximum length while preserving word boundaries
pub fn truncate_snippet(snippet: &str, max_len: usize) -> String {
    if snippet.len() <= max_len {
        return snippet.to_string();
    }

    let mut end = max_len;
    while end > 0 && !snippet.is_char_boundary(end) {
        end -= 1;
    }

    if let Some(pos) = snippet[..end].rfind(' ') {
        return format!("{}...", &snippet[..pos]);
    }

    format!("{}...", &snippet[..end])
}
