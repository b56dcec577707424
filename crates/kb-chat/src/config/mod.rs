//! Configuration for the chat agent
//!
//! Settings are resolved once per process from environment variables, with a
//! `.env` file as fallback, and then passed by reference to every component.

pub mod dotenv;
pub mod provider;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

pub use dotenv::{parse_dotenv, DotenvCandidates, DotenvFile};
pub use provider::ProviderKind;

/// Credential variables, in lookup order
pub const CREDENTIAL_VARS: &[&str] = &["DEEPSEEK_API_KEY", "OPENAI_API_KEY"];

/// API base URL variables, in lookup order
pub const API_BASE_VARS: &[&str] = &["LLM_API_BASE", "DEEPSEEK_API_BASE", "OPENAI_API_BASE"];

/// Fully resolved settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Language model configuration
    pub llm: LlmConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Persisted index and source documents
    pub storage: StorageConfig,
    /// Retrieval tool configuration
    pub retrieval: RetrievalConfig,
    /// Agent loop configuration
    pub agent: AgentConfig,
    /// Server configuration
    pub server: ServerConfig,
}

/// LLM configuration (OpenAI-compatible chat completions)
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Which provider serves the model
    pub provider: ProviderKind,
    /// API key, never logged
    #[serde(skip_serializing, default)]
    pub api_key: String,
    /// Generation model name
    pub model: String,
    /// API base URL without trailing slash
    pub api_base: String,
    /// Context window size (tokens)
    pub context_window: usize,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let provider = ProviderKind::default();
        Self {
            provider,
            api_key: String::new(),
            model: provider.default_model().to_string(),
            api_base: provider.default_base_url().to_string(),
            context_window: provider.context_window(provider.default_model()),
            max_tokens: None,
            temperature: None,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("context_window", &self.context_window)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Device the embedding model runs on.
///
/// The Ollama API can only be told to stay off the GPU, so `Cpu` is the one
/// value that changes requests. `Cuda` and `Mps` are accepted as advisory and
/// behave like `Auto`: the server picks the accelerator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingDevice {
    /// Let the embedding server decide
    #[default]
    Auto,
    /// Force CPU inference
    Cpu,
    /// NVIDIA GPU
    Cuda,
    /// Apple silicon GPU
    Mps,
}

impl FromStr for EmbeddingDevice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            "mps" => Ok(Self::Mps),
            other => Err(Error::config(format!(
                "Unknown embedding device '{}' (expected auto, cpu, cuda or mps)",
                other
            ))),
        }
    }
}

/// Embedding configuration (Ollama embedding API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model name
    pub model: String,
    /// Ollama base URL
    pub base_url: String,
    /// Inference device
    pub device: EmbeddingDevice,
    /// Texts per embedding request
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            // Ollama tag for BAAI/bge-large-en-v1.5
            model: "bge-large".to_string(),
            base_url: "http://localhost:11434".to_string(),
            device: EmbeddingDevice::Auto,
            batch_size: 32,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Persisted index and source document locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted index
    pub persist_dir: PathBuf,
    /// Directory scanned by `generate`
    pub data_dir: PathBuf,
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist_dir: PathBuf::from("storage"),
            data_dir: PathBuf::from("data"),
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

/// Retrieval tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Passages returned per tool call
    pub top_k: usize,
    /// Tool description shown to the model
    pub tool_description: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            tool_description: "Use this tool to retrieve information from the knowledge base. \
                Pass a self-contained search query as `input`."
                .to_string(),
        }
    }
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model calls per user message
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Non-empty, trimmed value of `key`
fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn first_of<'a>(vars: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| lookup(vars, key))
}

fn parse_var<T>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    lookup(vars, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| Error::config(format!("Invalid value for {}: '{}' ({})", key, raw, e)))
        })
        .transpose()
}

/// Whether any credential variable holds a non-empty value
pub fn has_credential(vars: &HashMap<String, String>) -> bool {
    first_of(vars, CREDENTIAL_VARS).is_some()
}

impl Settings {
    /// Build settings from a variable map.
    ///
    /// Fails with [`Error::Configuration`] when no credential is present or a
    /// value cannot be parsed.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let api_key = first_of(vars, CREDENTIAL_VARS).ok_or_else(|| {
            Error::config(format!(
                "{} is missing in environment variables (also checked {} and .env files)",
                CREDENTIAL_VARS[0],
                CREDENTIAL_VARS[1..].join(", ")
            ))
        })?;

        let base_url = first_of(vars, API_BASE_VARS);
        let provider = match lookup(vars, "LLM_PROVIDER") {
            Some(raw) => raw.parse::<ProviderKind>()?,
            None => base_url
                .map(ProviderKind::from_base_url)
                .unwrap_or_default(),
        };

        let model = lookup(vars, "MODEL")
            .unwrap_or(provider.default_model())
            .to_string();
        let api_base = base_url
            .unwrap_or(provider.default_base_url())
            .trim_end_matches('/')
            .to_string();

        let llm_defaults = LlmConfig::default();
        let llm = LlmConfig {
            provider,
            api_key: api_key.to_string(),
            context_window: provider.context_window(&model),
            model,
            api_base,
            max_tokens: parse_var(vars, "LLM_MAX_TOKENS")?,
            temperature: parse_var(vars, "LLM_TEMPERATURE")?,
            timeout_secs: parse_var(vars, "LLM_TIMEOUT_SECS")?
                .unwrap_or(llm_defaults.timeout_secs),
            max_retries: parse_var(vars, "LLM_MAX_RETRIES")?
                .unwrap_or(llm_defaults.max_retries),
        };

        let embed_defaults = EmbeddingConfig::default();
        let embeddings = EmbeddingConfig {
            model: lookup(vars, "EMBEDDING_MODEL")
                .map(str::to_string)
                .unwrap_or(embed_defaults.model),
            base_url: lookup(vars, "EMBEDDING_API_BASE")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(embed_defaults.base_url),
            device: parse_var(vars, "EMBEDDING_DEVICE")?.unwrap_or(embed_defaults.device),
            batch_size: parse_var(vars, "EMBEDDING_BATCH_SIZE")?
                .unwrap_or(embed_defaults.batch_size),
            timeout_secs: embed_defaults.timeout_secs,
            max_retries: embed_defaults.max_retries,
        };
        if embeddings.batch_size == 0 {
            return Err(Error::config("EMBEDDING_BATCH_SIZE must be at least 1"));
        }

        let storage_defaults = StorageConfig::default();
        let storage = StorageConfig {
            persist_dir: lookup(vars, "STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(storage_defaults.persist_dir),
            data_dir: lookup(vars, "DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(storage_defaults.data_dir),
            chunk_size: parse_var(vars, "CHUNK_SIZE")?.unwrap_or(storage_defaults.chunk_size),
            chunk_overlap: parse_var(vars, "CHUNK_OVERLAP")?
                .unwrap_or(storage_defaults.chunk_overlap),
        };
        if storage.chunk_overlap >= storage.chunk_size {
            return Err(Error::config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                storage.chunk_overlap, storage.chunk_size
            )));
        }

        let retrieval_defaults = RetrievalConfig::default();
        let retrieval = RetrievalConfig {
            top_k: parse_var(vars, "TOP_K")?.unwrap_or(retrieval_defaults.top_k),
            tool_description: lookup(vars, "QUERY_TOOL_DESCRIPTION")
                .map(str::to_string)
                .unwrap_or(retrieval_defaults.tool_description),
        };
        if retrieval.top_k == 0 {
            return Err(Error::config("TOP_K must be at least 1"));
        }

        let agent = AgentConfig {
            max_iterations: parse_var(vars, "AGENT_MAX_ITERATIONS")?
                .unwrap_or(AgentConfig::default().max_iterations),
        };

        let server_defaults = ServerConfig::default();
        let server = ServerConfig {
            host: lookup(vars, "APP_HOST")
                .map(str::to_string)
                .unwrap_or(server_defaults.host),
            port: parse_var(vars, "APP_PORT")?.unwrap_or(server_defaults.port),
        };

        Ok(Self {
            llm,
            embeddings,
            storage,
            retrieval,
            agent,
            server,
        })
    }
}

/// Resolves [`Settings`] from the environment and `.env` candidates
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    candidates: DotenvCandidates,
}

impl ConfigResolver {
    /// Create a resolver with explicit `.env` candidates
    pub fn new(candidates: DotenvCandidates) -> Self {
        Self { candidates }
    }

    /// `.env` candidates in lookup order
    pub fn candidates(&self) -> &DotenvCandidates {
        &self.candidates
    }

    /// Resolve against the process environment.
    ///
    /// Values loaded from `.env` are exported into the process environment,
    /// never overwriting variables that are already set.
    pub fn resolve(&self) -> Result<Settings> {
        let mut vars: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();

        if let Some(file) = self.load_dotenv_if_needed(&vars)? {
            for key in file.merge_into(&mut vars) {
                std::env::set_var(&key, &vars[&key]);
            }
        }

        let settings = Settings::from_vars(&vars)?;
        log_settings(&settings);
        Ok(settings)
    }

    /// Resolve against an explicit variable map; the process environment is untouched
    pub fn resolve_from(&self, mut vars: HashMap<String, String>) -> Result<Settings> {
        if let Some(file) = self.load_dotenv_if_needed(&vars)? {
            file.merge_into(&mut vars);
        }
        Settings::from_vars(&vars)
    }

    fn load_dotenv_if_needed(&self, vars: &HashMap<String, String>) -> Result<Option<DotenvFile>> {
        if has_credential(vars) {
            tracing::debug!("Credential found in environment, skipping .env discovery");
            return Ok(None);
        }
        self.candidates.load()
    }
}

/// Resolve settings from the process environment and the standard `.env` candidates
pub fn resolve_configuration() -> Result<Settings> {
    ConfigResolver::default().resolve()
}

fn log_settings(settings: &Settings) {
    tracing::info!("Configuration loaded");
    tracing::info!("  - LLM provider: {}", settings.llm.provider);
    tracing::info!("  - LLM model: {}", settings.llm.model);
    tracing::info!("  - API base: {}", settings.llm.api_base);
    tracing::info!("  - Context window: {}", settings.llm.context_window);
    tracing::info!(
        "  - Embedding model: {} (device: {:?}, batch: {})",
        settings.embeddings.model,
        settings.embeddings.device,
        settings.embeddings.batch_size
    );
    tracing::info!("  - Index: {}", settings.storage.persist_dir.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn resolver_in(dir: &Path) -> ConfigResolver {
        ConfigResolver::new(DotenvCandidates::from_paths(vec![dir.join(dotenv::DOTENV_FILE)]))
    }

    #[test]
    fn test_defaults_with_only_credential() {
        let settings = Settings::from_vars(&vars(&[("DEEPSEEK_API_KEY", "sk-test")])).unwrap();
        assert_eq!(settings.llm.provider, ProviderKind::DeepSeek);
        assert_eq!(settings.llm.model, "deepseek-chat");
        assert_eq!(settings.llm.api_base, "https://api.deepseek.com");
        assert_eq!(settings.llm.context_window, 64_000);
        assert_eq!(settings.embeddings.model, "bge-large");
        assert_eq!(settings.embeddings.batch_size, 32);
        assert_eq!(settings.storage.chunk_size, 512);
        assert_eq!(settings.storage.chunk_overlap, 50);
        assert_eq!(settings.retrieval.top_k, 3);
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn test_missing_credential_is_configuration_error() {
        let err = Settings::from_vars(&vars(&[("MODEL", "deepseek-chat")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("DEEPSEEK_API_KEY"));

        // Whitespace-only counts as absent
        let err = Settings::from_vars(&vars(&[("DEEPSEEK_API_KEY", "   ")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_openai_key_fallback() {
        let settings = Settings::from_vars(&vars(&[("OPENAI_API_KEY", "sk-openai")])).unwrap();
        assert_eq!(settings.llm.api_key, "sk-openai");
    }

    #[test]
    fn test_recognized_base_url_overrides_context_window() {
        let settings = Settings::from_vars(&vars(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("MODEL", "gpt-4o"),
            ("OPENAI_API_BASE", "https://api.deepseek.com/v1/"),
        ]))
        .unwrap();
        assert_eq!(settings.llm.provider, ProviderKind::DeepSeek);
        assert_eq!(settings.llm.context_window, 64_000);
        assert_eq!(settings.llm.api_base, "https://api.deepseek.com/v1");
        assert_eq!(settings.llm.model, "gpt-4o");
    }

    #[test]
    fn test_unrecognized_base_url_uses_generic_lookup() {
        let settings = Settings::from_vars(&vars(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("LLM_API_BASE", "https://gateway.example.com/v1"),
        ]))
        .unwrap();
        assert_eq!(settings.llm.provider, ProviderKind::OpenAi);
        assert_eq!(settings.llm.model, "gpt-4o-mini");
        assert_eq!(settings.llm.context_window, 128_000);
    }

    #[test]
    fn test_explicit_provider_wins_over_url() {
        let settings = Settings::from_vars(&vars(&[
            ("DEEPSEEK_API_KEY", "sk-test"),
            ("LLM_PROVIDER", "ollama"),
            ("LLM_API_BASE", "http://gpu-box:8080/v1"),
        ]))
        .unwrap();
        assert_eq!(settings.llm.provider, ProviderKind::Ollama);
        assert_eq!(settings.llm.context_window, 4_096);
        assert_eq!(settings.llm.api_base, "http://gpu-box:8080/v1");
    }

    #[test]
    fn test_embedding_and_numeric_overrides() {
        let settings = Settings::from_vars(&vars(&[
            ("DEEPSEEK_API_KEY", "sk-test"),
            ("EMBEDDING_MODEL", "nomic-embed-text"),
            ("EMBEDDING_DEVICE", "cpu"),
            ("EMBEDDING_BATCH_SIZE", "8"),
            ("LLM_MAX_TOKENS", "1024"),
            ("LLM_TEMPERATURE", "0.2"),
            ("TOP_K", "5"),
            ("APP_PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(settings.embeddings.model, "nomic-embed-text");
        assert_eq!(settings.embeddings.device, EmbeddingDevice::Cpu);
        assert_eq!(settings.embeddings.batch_size, 8);
        assert_eq!(settings.llm.max_tokens, Some(1024));
        assert_eq!(settings.llm.temperature, Some(0.2));
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.server.port, 9000);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        for (key, value) in [
            ("EMBEDDING_BATCH_SIZE", "many"),
            ("EMBEDDING_BATCH_SIZE", "0"),
            ("EMBEDDING_DEVICE", "tpu"),
            ("LLM_PROVIDER", "anthropic"),
            ("APP_PORT", "70000"),
            ("CHUNK_OVERLAP", "600"),
        ] {
            let result = Settings::from_vars(&vars(&[("DEEPSEEK_API_KEY", "sk"), (key, value)]));
            assert!(
                matches!(result, Err(Error::Configuration(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let settings = Settings::from_vars(&vars(&[("DEEPSEEK_API_KEY", "sk-secret")])).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_credential_present_skips_dotenv_discovery() {
        let dir = tempfile::tempdir().unwrap();
        // Unreadable candidate: touching it would fail resolution
        std::fs::create_dir(dir.path().join(dotenv::DOTENV_FILE)).unwrap();
        let resolver = resolver_in(dir.path());

        let settings = resolver
            .resolve_from(vars(&[("DEEPSEEK_API_KEY", "sk-env")]))
            .unwrap();
        assert_eq!(settings.llm.api_key, "sk-env");

        let err = resolver.resolve_from(HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_credential_present_ignores_dotenv_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(dotenv::DOTENV_FILE), "MODEL=from-file\n").unwrap();
        let settings = resolver_in(dir.path())
            .resolve_from(vars(&[("DEEPSEEK_API_KEY", "sk-env")]))
            .unwrap();
        assert_eq!(settings.llm.model, "deepseek-chat");
    }

    #[test]
    fn test_dotenv_supplies_missing_credential() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(dotenv::DOTENV_FILE),
            "# local secrets\nDEEPSEEK_API_KEY=\"sk-file\"\nMODEL='deepseek-reasoner'\nTOP_K=4\n",
        )
        .unwrap();

        let settings = resolver_in(dir.path())
            .resolve_from(vars(&[("TOP_K", "2")]))
            .unwrap();
        assert_eq!(settings.llm.api_key, "sk-file");
        assert_eq!(settings.llm.model, "deepseek-reasoner");
        // Environment wins over file contents
        assert_eq!(settings.retrieval.top_k, 2);
    }

    #[test]
    fn test_blank_environment_credential_falls_back_to_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(dotenv::DOTENV_FILE),
            "DEEPSEEK_API_KEY=sk-from-file\n",
        )
        .unwrap();

        let settings = resolver_in(dir.path())
            .resolve_from(vars(&[("DEEPSEEK_API_KEY", "")]))
            .unwrap();
        assert_eq!(settings.llm.api_key, "sk-from-file");
    }

    #[test]
    fn test_no_credential_anywhere_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(dotenv::DOTENV_FILE), "MODEL=deepseek-chat\n").unwrap();
        let err = resolver_in(dir.path()).resolve_from(HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_resolve_exports_dotenv_into_process_env() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(dotenv::DOTENV_FILE),
            "DEEPSEEK_API_KEY=sk-from-file\nKB_CHAT_TEST_MARKER=loaded\nMODEL=from-file\n",
        )
        .unwrap();
        let resolver = resolver_in(dir.path());

        temp_env::with_vars(
            [
                ("DEEPSEEK_API_KEY", None),
                ("OPENAI_API_KEY", None),
                ("KB_CHAT_TEST_MARKER", None),
                ("MODEL", Some("from-env")),
            ],
            || {
                let settings = resolver.resolve().unwrap();
                assert_eq!(settings.llm.api_key, "sk-from-file");
                assert_eq!(settings.llm.model, "from-env");
                assert_eq!(std::env::var("KB_CHAT_TEST_MARKER").unwrap(), "loaded");
                assert_eq!(std::env::var("MODEL").unwrap(), "from-env");
            },
        );
    }
}
