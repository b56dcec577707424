//! LLM provider trait for tool-calling chat completions

use async_trait::async_trait;

use crate::error::Result;
use crate::tools::ToolMetadata;
use crate::types::{ChatMessage, ToolCall};

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of the answer
    Stop,
    /// The model wants tool results before continuing
    ToolCalls,
    /// Output hit the token limit
    Length,
    /// Anything else the provider reported
    Other(String),
}

impl FinishReason {
    pub fn from_api(reason: Option<&str>) -> Self {
        match reason {
            None | Some("stop") => Self::Stop,
            Some("tool_calls") | Some("function_call") => Self::ToolCalls,
            Some("length") => Self::Length,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One model turn
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    /// Assistant text (may be empty when only tools are called)
    pub content: String,
    /// Requested tool calls
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

/// Trait for chat models that can call tools
///
/// Implementations:
/// - `OpenAiCompatibleLlm`: DeepSeek, OpenAI or Ollama through `/chat/completions`
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one chat turn with the given tools available
    async fn chat(&self, messages: &[ChatMessage], tools: &[ToolMetadata]) -> Result<ChatCompletion>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;

    /// Context window in tokens
    fn context_window(&self) -> usize;

    /// Tokens reserved for the answer
    fn max_tokens(&self) -> Option<u32> {
        None
    }
}
