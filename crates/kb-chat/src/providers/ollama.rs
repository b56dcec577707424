//! Ollama embedding provider (`/api/embed`)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{EmbeddingConfig, EmbeddingDevice};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::retry::{status_error, RetryPolicy};

/// Ollama embedding client with batching and retry
pub struct OllamaEmbedder {
    client: Client,
    config: EmbeddingConfig,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<EmbedOptions>,
}

#[derive(Serialize)]
struct EmbedOptions {
    num_gpu: u32,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        match config.device {
            EmbeddingDevice::Auto => {}
            EmbeddingDevice::Cpu => tracing::info!("Embedding device: cpu (GPU offload disabled)"),
            device => tracing::info!(
                "Embedding device: {:?} is advisory; GPU placement is decided by the Ollama server",
                device
            ),
        }

        Ok(Self {
            client,
            retry: RetryPolicy::new(config.max_retries),
            config: config.clone(),
        })
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// GPU offload is disabled when the CPU is forced; other devices are left to the server
    fn options(&self) -> Option<EmbedOptions> {
        match self.config.device {
            EmbeddingDevice::Cpu => Some(EmbedOptions { num_gpu: 0 }),
            _ => None,
        }
    }

    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.config.base_url);
        let body = serde_json::to_value(EmbedRequest {
            model: &self.config.model,
            input: texts,
            options: self.options(),
        })?;

        let response: EmbedResponse = self
            .retry
            .run("Embedding request", || {
                let client = self.client.clone();
                let url = url.clone();
                let body = body.clone();

                async move {
                    let response = client.post(&url).json(&body).send().await?;
                    if !response.status().is_success() {
                        return Err(status_error("ollama", response).await);
                    }

                    let text = response.text().await?;
                    serde_json::from_str(&text).map_err(|e| {
                        Error::embedding(format!("Failed to parse embedding response: {}", e))
                    })
                }
            })
            .await?;

        if response.embeddings.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Requested {} embeddings, received {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            embeddings.extend(self.embed_request(batch).await?);
        }
        Ok(embeddings)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn embedder(base_url: &str, device: EmbeddingDevice, batch_size: usize) -> OllamaEmbedder {
        let config = EmbeddingConfig {
            base_url: base_url.to_string(),
            device,
            batch_size,
            ..EmbeddingConfig::default()
        };
        OllamaEmbedder::new(&config)
            .unwrap()
            .with_retry_policy(RetryPolicy::new(0))
    }

    #[tokio::test]
    async fn test_embed_batches_requests() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embed")
            .match_body(Matcher::PartialJson(json!({"model": "bge-large"})))
            .with_status(200)
            .with_body(json!({"embeddings": [[1.0, 0.0], [0.0, 1.0]]}).to_string())
            .expect(2)
            .create_async()
            .await;

        let texts: Vec<String> = (0..4).map(|i| format!("text {}", i)).collect();
        let embeddings = embedder(&server.url(), EmbeddingDevice::Auto, 2)
            .embed_batch(&texts)
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 4);
        assert_eq!(embeddings[1], vec![0.0, 1.0]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cpu_device_disables_gpu_offload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embed")
            .match_body(Matcher::PartialJson(json!({"options": {"num_gpu": 0}})))
            .with_status(200)
            .with_body(json!({"embeddings": [[0.5, 0.5]]}).to_string())
            .create_async()
            .await;

        let embedding = embedder(&server.url(), EmbeddingDevice::Cpu, 32)
            .embed("hello")
            .await
            .unwrap();

        assert_eq!(embedding, vec![0.5, 0.5]);
        mock.assert_async().await;
    }

    #[test]
    fn test_only_cpu_sends_device_options() {
        let url = "http://localhost:11434";
        assert_eq!(embedder(url, EmbeddingDevice::Cpu, 32).options().map(|o| o.num_gpu), Some(0));
        for device in [EmbeddingDevice::Auto, EmbeddingDevice::Cuda, EmbeddingDevice::Mps] {
            assert!(embedder(url, device, 32).options().is_none());
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_is_embedding_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/embed")
            .with_status(200)
            .with_body(json!({"embeddings": []}).to_string())
            .create_async()
            .await;

        let err = embedder(&server.url(), EmbeddingDevice::Auto, 32)
            .embed("hello")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_missing_model_surfaces_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/embed")
            .with_status(404)
            .with_body("model \"bge-large\" not found, try pulling it first")
            .create_async()
            .await;

        let err = embedder(&server.url(), EmbeddingDevice::Auto, 32)
            .embed("hello")
            .await
            .unwrap_err();
        match err {
            Error::Api { status, message, .. } => {
                assert_eq!(status, 404);
                assert!(message.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
