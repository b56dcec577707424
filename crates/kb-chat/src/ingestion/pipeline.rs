//! Datasource generation: scan the data directory, chunk, embed and persist the index

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::providers::EmbeddingProvider;
use crate::types::{Document, FileType};

use super::chunker::TextChunker;

/// Per-file progress notification
#[derive(Debug, Clone)]
pub struct IngestProgress {
    /// 1-based position of the file
    pub current: usize,
    pub total: usize,
    pub filename: String,
}

/// Outcome of a datasource generation run
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub files_seen: usize,
    pub documents_indexed: usize,
    pub chunks_indexed: usize,
    pub skipped_duplicates: usize,
    pub skipped_unsupported: usize,
    pub skipped_empty: usize,
    /// (file, reason)
    pub failed: Vec<(String, String)>,
    pub index_path: PathBuf,
}

/// Builds a fresh index from every supported file under the data directory
pub struct IngestPipeline {
    data_dir: PathBuf,
    persist_dir: PathBuf,
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IngestPipeline {
    pub fn new(settings: &Settings, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            data_dir: settings.storage.data_dir.clone(),
            persist_dir: settings.storage.persist_dir.clone(),
            chunker: TextChunker::new(settings.storage.chunk_size, settings.storage.chunk_overlap),
            embedder,
        }
    }

    /// Regular, non-hidden files under the data directory, sorted
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.data_dir.is_dir() {
            return Err(Error::config(format!(
                "Data directory '{}' does not exist",
                self.data_dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.data_dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Ingest every discovered file and persist the index
    pub async fn run(&self, on_progress: &(dyn Fn(IngestProgress) + Send + Sync)) -> Result<IngestReport> {
        let files = self.discover()?;
        tracing::info!(
            "Generating datasource from {} files in {}",
            files.len(),
            self.data_dir.display()
        );

        let mut index = VectorIndex::new(self.embedder.model());
        let mut report = IngestReport {
            files_seen: files.len(),
            ..IngestReport::default()
        };

        for (i, path) in files.iter().enumerate() {
            let filename = self.display_name(path);
            on_progress(IngestProgress {
                current: i + 1,
                total: files.len(),
                filename: filename.clone(),
            });

            match self.ingest_file(&mut index, path, &filename, &mut report).await {
                Ok(()) => {}
                Err(e) => {
                    tracing::warn!("Failed to ingest {}: {}", filename, e);
                    report.failed.push((filename, e.to_string()));
                }
            }
        }

        if index.is_empty() {
            return Err(Error::index(format!(
                "No indexable documents found in '{}'",
                self.data_dir.display()
            )));
        }

        let persist_dir = self.persist_dir.clone();
        report.index_path = tokio::task::spawn_blocking(move || index.persist(&persist_dir))
            .await
            .map_err(|e| Error::internal(format!("Index persist task failed: {}", e)))??;

        tracing::info!(
            "Indexed {} documents ({} chunks); {} duplicates, {} unsupported, {} failed",
            report.documents_indexed,
            report.chunks_indexed,
            report.skipped_duplicates,
            report.skipped_unsupported,
            report.failed.len()
        );
        Ok(report)
    }

    async fn ingest_file(
        &self,
        index: &mut VectorIndex,
        path: &Path,
        filename: &str,
        report: &mut IngestReport,
    ) -> Result<()> {
        let file_type = FileType::from_path(path);
        if !file_type.is_supported() {
            tracing::debug!("Skipping unsupported file {}", filename);
            report.skipped_unsupported += 1;
            return Ok(());
        }

        let bytes = tokio::fs::read(path).await?;
        let content_hash = hash_content(&bytes);
        if index.contains_hash(&content_hash) {
            tracing::info!("Skipping duplicate {}", filename);
            report.skipped_duplicates += 1;
            return Ok(());
        }

        let content = String::from_utf8(bytes)
            .map_err(|_| Error::InvalidInput(format!("{} is not valid UTF-8 text", filename)))?;
        let document = Document::new(
            filename.to_string(),
            file_type,
            content_hash,
            content.len() as u64,
        );

        let mut chunks = self.chunker.chunk_document(&document, &content);
        if chunks.is_empty() {
            report.skipped_empty += 1;
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        let chunk_count = chunks.len();
        index.add_document(document, chunks)?;

        tracing::info!("Indexed {} ({} chunks)", filename, chunk_count);
        report.documents_indexed += 1;
        report.chunks_indexed += chunk_count;
        Ok(())
    }

    fn display_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.data_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}

/// SHA-256 of the raw file contents, hex encoded
pub fn hash_content(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Rebuild the index from the configured data directory
pub async fn generate_datasource(
    settings: &Settings,
    embedder: Arc<dyn EmbeddingProvider>,
    on_progress: &(dyn Fn(IngestProgress) + Send + Sync),
) -> Result<IngestReport> {
    IngestPipeline::new(settings, embedder).run(on_progress).await
}
