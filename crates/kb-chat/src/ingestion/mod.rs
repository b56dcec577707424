//! Document ingestion for `kb-chat generate`

mod chunker;
mod pipeline;

pub use chunker::TextChunker;
pub use pipeline::{generate_datasource, hash_content, IngestPipeline, IngestProgress, IngestReport};
