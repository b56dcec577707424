//! Document and chunk types with source tracking for citations

use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Extensions indexed as source code, with their language tag
const CODE_EXTENSIONS: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("py", "python"),
    ("js", "javascript"),
    ("ts", "typescript"),
    ("go", "go"),
    ("java", "java"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("cxx", "cpp"),
    ("sh", "bash"),
    ("bash", "bash"),
    ("sql", "sql"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("toml", "toml"),
];

/// Text formats `generate` reads; everything else is skipped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Txt,
    /// Split into sections at headings before chunking
    Markdown,
    /// Indexed as raw text, markup included
    Html,
    Csv,
    Json,
    /// Language tag, e.g. `rust`
    Code(String),
    Unknown,
}

impl FileType {
    /// Classify by extension, case-insensitively
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "csv" => Self::Csv,
            "json" => Self::Json,
            other => CODE_EXTENSIONS
                .iter()
                .find(|(e, _)| *e == other)
                .map(|(_, lang)| Self::Code(lang.to_string()))
                .unwrap_or(Self::Unknown),
        }
    }

    /// Classify a path; no extension means [`FileType::Unknown`]
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    pub fn is_supported(&self) -> bool {
        *self != Self::Unknown
    }
}

/// One indexed file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// Path relative to the data directory
    pub filename: String,
    pub file_type: FileType,
    /// Hex SHA-256 of the raw bytes
    pub content_hash: String,
    /// Set when the document is added to an index
    pub total_chunks: u32,
    pub file_size: u64,
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    pub fn new(filename: String, file_type: FileType, content_hash: String, file_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            file_type,
            content_hash,
            total_chunks: 0,
            file_size,
            ingested_at: chrono::Utc::now(),
        }
    }
}

/// Where a chunk came from, as shown next to a citation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSource {
    pub filename: String,
    pub file_type: FileType,
    /// Nearest preceding markdown heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
}

impl ChunkSource {
    pub fn new(filename: String, file_type: FileType) -> Self {
        Self {
            filename,
            file_type,
            section_title: None,
        }
    }
}

/// Retrievable span of a document; its ID doubles as the citation marker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    /// Empty until embedded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    pub source: ChunkSource,
    /// Byte range in the document text
    pub char_start: usize,
    pub char_end: usize,
    /// Position within the document, from 0
    pub chunk_index: u32,
}

impl Chunk {
    /// New chunk without an embedding
    pub fn new(
        document_id: Uuid,
        content: String,
        source: ChunkSource,
        char_start: usize,
        char_end: usize,
        chunk_index: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content,
            embedding: Vec::new(),
            source,
            char_start,
            char_end,
            chunk_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_extension() {
        assert_eq!(FileType::from_extension("MD"), FileType::Markdown);
        assert_eq!(FileType::from_extension("rs"), FileType::Code("rust".into()));
        assert!(!FileType::from_extension("pdf").is_supported());
    }

    #[test]
    fn test_file_type_from_path() {
        assert_eq!(FileType::from_path(Path::new("notes/a.yml")), FileType::Code("yaml".into()));
        assert_eq!(FileType::from_path(Path::new("Makefile")), FileType::Unknown);
    }
}
