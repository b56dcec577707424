//! OpenAI-compatible chat-completions client (DeepSeek, OpenAI, Ollama `/v1`)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::tools::ToolMetadata;
use crate::types::{ChatMessage, Role, ToolCall};

use super::llm::{ChatCompletion, FinishReason, LlmProvider, TokenUsage};
use super::retry::{status_error, RetryPolicy};

/// Chat model reached through `/chat/completions`
pub struct OpenAiCompatibleLlm {
    client: Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl OpenAiCompatibleLlm {
    /// Create a client; the API key must be non-empty
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::config(format!(
                "An API key is required to use the {} provider",
                config.provider
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

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
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleLlm {
    async fn chat(&self, messages: &[ChatMessage], tools: &[ToolMetadata]) -> Result<ChatCompletion> {
        let url = format!("{}/chat/completions", self.config.api_base);
        let body = build_request(&self.config, messages, tools);
        let provider = self.config.provider.to_string();

        tracing::debug!(
            "Chat request to {} ({} messages, {} tools)",
            self.config.model,
            messages.len(),
            tools.len()
        );

        let api_response: ApiResponse = self
            .retry
            .run("Chat completion", || {
                let client = self.client.clone();
                let url = url.clone();
                let body = body.clone();
                let api_key = self.config.api_key.clone();
                let provider = provider.clone();

                async move {
                    let response = client
                        .post(&url)
                        .bearer_auth(&api_key)
                        .json(&body)
                        .send()
                        .await?;

                    if !response.status().is_success() {
                        return Err(status_error(&provider, response).await);
                    }

                    let text = response.text().await?;
                    serde_json::from_str(&text).map_err(|e| {
                        Error::llm(format!("Malformed chat completion response: {}", e))
                    })
                }
            })
            .await?;

        let completion = into_completion(api_response)?;
        tracing::debug!(
            "Chat response: {} chars, {} tool calls, {:?}, {} prompt / {} completion tokens",
            completion.content.len(),
            completion.tool_calls.len(),
            completion.finish_reason,
            completion.usage.prompt_tokens,
            completion.usage.completion_tokens
        );
        Ok(completion)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.api_base);

        match self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        self.config.provider.as_str()
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn context_window(&self) -> usize {
        self.config.context_window
    }

    fn max_tokens(&self) -> Option<u32> {
        self.config.max_tokens
    }
}

fn build_request(config: &LlmConfig, messages: &[ChatMessage], tools: &[ToolMetadata]) -> Value {
    let messages: Vec<Value> = messages.iter().map(message_to_openai).collect();

    let mut body = json!({
        "model": config.model,
        "messages": messages,
    });

    if let Some(max_tokens) = config.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = config.temperature {
        body["temperature"] = json!(temperature);
    }
    if !tools.is_empty() {
        body["tools"] = Value::Array(tools.iter().map(tool_to_openai).collect());
    }

    body
}

fn message_to_openai(message: &ChatMessage) -> Value {
    match message.role {
        Role::System => json!({ "role": "system", "content": message.content }),
        Role::User => json!({ "role": "user", "content": message.content }),
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        }),
        Role::Assistant => {
            let mut value = json!({ "role": "assistant" });
            value["content"] = if message.content.is_empty() {
                Value::Null
            } else {
                Value::String(message.content.clone())
            };

            if !message.tool_calls.is_empty() {
                let calls = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                value["tool_calls"] = Value::Array(calls);
            }
            value
        }
    }
}

fn tool_to_openai(tool: &ToolMetadata) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn into_completion(api: ApiResponse) -> Result<ChatCompletion> {
    let choice = api
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::llm("empty choices array in response"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let arguments = if call.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                    tracing::warn!(
                        "Malformed arguments for tool '{}' ({}), using an empty object",
                        call.function.name,
                        e
                    );
                    json!({})
                })
            };
            ToolCall {
                id: call.id,
                name: call.function.name,
                arguments,
            }
        })
        .collect();

    let usage = api.usage.map_or(TokenUsage::default(), |u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
    });

    Ok(ChatCompletion {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        finish_reason: FinishReason::from_api(choice.finish_reason.as_deref()),
        usage,
    })
}
