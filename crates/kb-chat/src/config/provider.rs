//! LLM provider selection and context-window limits

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Context window used when nothing is known about the model
pub const DEFAULT_CONTEXT_WINDOW: usize = 3_900;

/// Generic OpenAI model table (prefix, context window); longest prefix wins
const OPENAI_CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("gpt-4o-mini", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-4-turbo", 128_000),
    ("gpt-4-32k", 32_768),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    ("o1", 200_000),
    ("o3", 200_000),
];

/// Chat-completions provider behind the OpenAI-compatible API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// DeepSeek hosted API
    #[default]
    DeepSeek,
    /// OpenAI or any unrecognized OpenAI-compatible endpoint
    OpenAi,
    /// Local Ollama server (OpenAI-compatible `/v1` API)
    Ollama,
}

impl ProviderKind {
    /// Infer the provider from an API base URL
    pub fn from_base_url(url: &str) -> Self {
        let url = url.to_lowercase();
        if url.contains("deepseek") {
            Self::DeepSeek
        } else if url.contains("ollama") || url.contains(":11434") {
            Self::Ollama
        } else {
            Self::OpenAi
        }
    }

    /// Base URL used when none is configured
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::DeepSeek => "https://api.deepseek.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }

    /// Model used when `MODEL` is unset
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::DeepSeek => "deepseek-chat",
            Self::OpenAi => "gpt-4o-mini",
            Self::Ollama => "llama3.1",
        }
    }

    /// Fixed context window for providers whose models the generic table does not know
    pub fn known_context_window(&self) -> Option<usize> {
        match self {
            Self::DeepSeek => Some(64_000),
            Self::Ollama => Some(4_096),
            Self::OpenAi => None,
        }
    }

    /// Context window for `model` served by this provider
    pub fn context_window(&self, model: &str) -> usize {
        self.known_context_window()
            .unwrap_or_else(|| generic_context_window(model))
    }

    /// Lowercase provider name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeepSeek => "deepseek",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deepseek" => Ok(Self::DeepSeek),
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(Error::config(format!(
                "Unknown LLM provider '{}' (expected deepseek, openai or ollama)",
                other
            ))),
        }
    }
}

/// Look up a model in the generic OpenAI table
pub fn generic_context_window(model: &str) -> usize {
    OPENAI_CONTEXT_WINDOWS
        .iter()
        .filter(|(prefix, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, window)| *window)
        .unwrap_or_else(|| {
            tracing::warn!(
                "Unknown model '{}', using default context window {}",
                model,
                DEFAULT_CONTEXT_WINDOW
            );
            DEFAULT_CONTEXT_WINDOW
        })
}
