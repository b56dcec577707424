//! Provider abstractions for the chat model and embeddings
//!
//! The agent only talks to `LlmProvider` and `EmbeddingProvider`, so hosted
//! and local backends are interchangeable.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod openai;
pub mod retry;

use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use llm::{ChatCompletion, FinishReason, LlmProvider, TokenUsage};
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiCompatibleLlm;
pub use retry::RetryPolicy;

/// Build the configured chat model
pub fn create_llm(settings: &Settings) -> Result<Arc<dyn LlmProvider>> {
    let llm = OpenAiCompatibleLlm::new(&settings.llm)?;
    tracing::info!(
        "LLM: {} via {} ({})",
        settings.llm.model,
        settings.llm.provider,
        settings.llm.api_base
    );
    Ok(Arc::new(llm))
}

/// Build the configured embedding model
pub fn create_embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder = OllamaEmbedder::new(&settings.embeddings)?;
    tracing::info!(
        "Embeddings: {} ({})",
        settings.embeddings.model,
        settings.embeddings.base_url
    );
    Ok(Arc::new(embedder))
}
