//! Persisted vector index over document chunks
//!
//! The index is a single JSON file (`<persist_dir>/index.json`) holding the
//! ingested documents and their embedded chunks. Search is brute-force
//! cosine similarity.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, Document, SourceNode};

/// File name of the persisted index inside the persist directory
pub const INDEX_FILE: &str = "index.json";

/// On-disk format version
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Shared, immutable handle to a loaded index
pub type IndexHandle = Arc<VectorIndex>;

/// Documents and embedded chunks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    version: u32,
    embedding_model: String,
    dimensions: usize,
    created_at: chrono::DateTime<chrono::Utc>,
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    /// Create an empty index for vectors produced by `embedding_model`
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self {
            version: INDEX_FORMAT_VERSION,
            embedding_model: embedding_model.into(),
            dimensions: 0,
            created_at: chrono::Utc::now(),
            documents: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// Add a document with its embedded chunks.
    ///
    /// The first chunk fixes the index dimensions; later chunks must match.
    pub fn add_document(&mut self, mut document: Document, chunks: Vec<Chunk>) -> Result<()> {
        for chunk in &chunks {
            if chunk.embedding.is_empty() {
                return Err(Error::index(format!(
                    "Chunk {} of {} has no embedding",
                    chunk.chunk_index, document.filename
                )));
            }
            if self.dimensions == 0 {
                self.dimensions = chunk.embedding.len();
            } else if chunk.embedding.len() != self.dimensions {
                return Err(Error::index(format!(
                    "Embedding dimension mismatch in {}: expected {}, got {}",
                    document.filename,
                    self.dimensions,
                    chunk.embedding.len()
                )));
            }
        }

        document.total_chunks = chunks.len() as u32;
        self.documents.push(document);
        self.chunks.extend(chunks);
        Ok(())
    }

    /// Whether a document with this content hash is already indexed
    pub fn contains_hash(&self, content_hash: &str) -> bool {
        self.documents.iter().any(|d| d.content_hash == content_hash)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Top `top_k` chunks by cosine similarity, best first
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<SourceNode>> {
        if !self.is_empty() && query_embedding.len() != self.dimensions {
            return Err(Error::index(format!(
                "Query embedding has {} dimensions, index has {} (built with '{}')",
                query_embedding.len(),
                self.dimensions,
                self.embedding_model
            )));
        }

        let mut scored: Vec<(&Chunk, f32)> = self
            .chunks
            .iter()
            .map(|chunk| (chunk, cosine_similarity(query_embedding, &chunk.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(chunk, score)| SourceNode::from_chunk(chunk, score))
            .collect())
    }

    /// Warn when the configured embedding model differs from the one the index was built with
    pub fn check_embedding_model(&self, configured: &str) -> bool {
        if self.embedding_model != configured {
            tracing::warn!(
                "Index was built with embedding model '{}' but '{}' is configured; \
                 retrieval quality will suffer until the index is regenerated",
                self.embedding_model,
                configured
            );
            return false;
        }
        true
    }

    /// Structural checks run after loading
    fn validate(&self) -> Result<()> {
        if self.version != INDEX_FORMAT_VERSION {
            return Err(Error::index(format!(
                "Unsupported index format version {} (expected {})",
                self.version, INDEX_FORMAT_VERSION
            )));
        }
        if let Some(chunk) = self
            .chunks
            .iter()
            .find(|c| c.embedding.len() != self.dimensions)
        {
            return Err(Error::index(format!(
                "Chunk {} has {} dimensions, index declares {}",
                chunk.id,
                chunk.embedding.len(),
                self.dimensions
            )));
        }
        Ok(())
    }

    /// Path of the index file inside `dir`
    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    /// Load the index from `dir`.
    ///
    /// Returns `Ok(None)` when no index file exists or the index holds no
    /// chunks; unreadable or inconsistent data is an [`Error::Index`].
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = Self::file_path(dir);
        if !path.exists() {
            tracing::debug!("No index at {}", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::index(format!("Failed to read {}: {}", path.display(), e)))?;
        let index: Self = serde_json::from_str(&content)
            .map_err(|e| Error::index(format!("Corrupt index {}: {}", path.display(), e)))?;
        index.validate()?;

        if index.is_empty() {
            tracing::warn!("Index at {} holds no chunks", path.display());
            return Ok(None);
        }

        tracing::info!(
            "Loaded index: {} documents, {} chunks ({} dims, {})",
            index.documents.len(),
            index.chunks.len(),
            index.dimensions,
            index.embedding_model
        );
        Ok(Some(index))
    }

    /// Write the index to `dir`, replacing any previous file
    pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = Self::file_path(dir);
        let tmp = path.with_extension("json.tmp");

        std::fs::write(&tmp, serde_json::to_vec(self)?)?;
        std::fs::rename(&tmp, &path)?;

        tracing::info!(
            "Persisted {} chunks from {} documents to {}",
            self.chunks.len(),
            self.documents.len(),
            path.display()
        );
        Ok(path)
    }
}

/// Open the persisted index configured in `storage`.
///
/// `Ok(None)` means there is nothing to query yet; callers decide whether
/// that is fatal.
pub async fn get_index(storage: &StorageConfig) -> Result<Option<IndexHandle>> {
    let dir = storage.persist_dir.clone();
    tokio::task::spawn_blocking(move || VectorIndex::load(&dir))
        .await
        .map_err(|e| Error::internal(format!("Index loading task failed: {}", e)))?
        .map(|index| index.map(Arc::new))
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
