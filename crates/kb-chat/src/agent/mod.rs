//! Tool-calling agent
//!
//! The agent sends the conversation to the model together with its tool
//! specs, executes requested tool calls, feeds the results back and stops at
//! the first turn without tool calls.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::generation::CitationLinker;
use crate::providers::{FinishReason, LlmProvider};
use crate::tools::{Tool, ToolMetadata, ToolOutput};
use crate::types::{AgentResponse, ChatInput, ChatMessage, Role, SourceNode, ToolCall};

/// LLM + tools + system prompt, stateless across runs
pub struct Agent {
    llm: Arc<dyn LlmProvider>,
    tools: Vec<Box<dyn Tool>>,
    system_prompt: String,
    max_iterations: usize,
    linker: CitationLinker,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.llm.model())
            .field("tools", &self.tool_names())
            .field("system_prompt_chars", &self.system_prompt.len())
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

impl Agent {
    /// Create an agent. At least one iteration is always allowed.
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Vec<Box<dyn Tool>>,
        system_prompt: impl Into<String>,
        config: &AgentConfig,
    ) -> Result<Self> {
        Ok(Self {
            llm,
            tools,
            system_prompt: system_prompt.into(),
            max_iterations: config.max_iterations.max(1),
            linker: CitationLinker::new()?,
        })
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.metadata().name.as_str()).collect()
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    /// Answer `input.user_msg` given `input.chat_history`
    pub async fn chat(&self, input: &ChatInput) -> Result<AgentResponse> {
        self.run(&input.user_msg, &input.chat_history).await
    }

    /// Run the tool-calling loop until the model answers.
    ///
    /// Every failure is reported as [`Error::AgentExecution`].
    pub async fn run(&self, user_msg: &str, history: &[ChatMessage]) -> Result<AgentResponse> {
        self.run_loop(user_msg, history)
            .await
            .map_err(Error::agent_failure)
    }

    async fn run_loop(&self, user_msg: &str, history: &[ChatMessage]) -> Result<AgentResponse> {
        let started = Instant::now();
        let specs: Vec<ToolMetadata> = self.tools.iter().map(|t| t.metadata().clone()).collect();
        let mut messages = self.build_messages(user_msg, history);
        let mut sources: Vec<SourceNode> = Vec::new();
        let mut tool_calls = 0usize;

        for iteration in 1..=self.max_iterations {
            tracing::debug!("Agent iteration {}/{}", iteration, self.max_iterations);
            let completion = self.llm.chat(&messages, &specs).await?;

            if completion.tool_calls.is_empty() {
                if completion.finish_reason == FinishReason::Length {
                    tracing::warn!("Answer was cut off by the token limit");
                }

                let answer = completion.content;
                let citations = self.linker.link(&answer, &sources);
                tracing::info!(
                    "Agent answered after {} tool calls ({} sources, {} cited)",
                    tool_calls,
                    sources.len(),
                    citations.len()
                );

                return Ok(AgentResponse {
                    answer,
                    citations,
                    sources,
                    tool_calls,
                    processing_time_ms: started.elapsed().as_millis() as u64,
                });
            }

            messages.push(ChatMessage::assistant_tool_calls(
                completion.content,
                completion.tool_calls.clone(),
            ));

            for call in &completion.tool_calls {
                tool_calls += 1;
                let output = self.call_tool(call).await?;
                for source in output.sources {
                    if !sources.iter().any(|s| s.chunk_id == source.chunk_id) {
                        sources.push(source);
                    }
                }

                let content = if output.is_error {
                    format!("[ERROR] {}", output.content)
                } else {
                    output.content
                };
                messages.push(ChatMessage::tool(call.id.clone(), content));
            }
        }

        Err(Error::agent(format!(
            "No final answer after {} iterations",
            self.max_iterations
        )))
    }

    async fn call_tool(&self, call: &ToolCall) -> Result<ToolOutput> {
        let Some(tool) = self.tools.iter().find(|t| t.metadata().name == call.name) else {
            tracing::warn!("Model called unknown tool '{}'", call.name);
            return Ok(ToolOutput::error(format!(
                "Unknown tool '{}'. Available tools: {}",
                call.name,
                self.tool_names().join(", ")
            )));
        };

        tracing::info!("Calling tool {} with {}", call.name, call.arguments);
        tool.call(&call.arguments).await
    }

    /// System prompt, as much recent history as fits, then the user message.
    ///
    /// The budget is the model's context window minus the tokens reserved for
    /// the answer; the oldest history goes first.
    fn build_messages(&self, user_msg: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let system = ChatMessage::system(self.system_prompt.clone());
        let user = ChatMessage::user(user_msg);

        let reserved = self.llm.max_tokens().unwrap_or(0) as usize;
        let budget = self.llm.context_window().saturating_sub(reserved);
        let mut used = system.estimated_tokens() + user.estimated_tokens();

        let conversational: Vec<ChatMessage> = history
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant) && !m.content.is_empty())
            .map(|m| ChatMessage {
                role: m.role,
                content: m.content.clone(),
                tool_calls: Vec::new(),
                tool_call_id: None,
            })
            .collect();

        let mut kept = Vec::new();
        for message in conversational.iter().rev() {
            let tokens = message.estimated_tokens();
            if used + tokens > budget {
                break;
            }
            used += tokens;
            kept.push(message.clone());
        }
        kept.reverse();

        if kept.len() < conversational.len() {
            tracing::info!(
                "Dropped {} oldest history messages to fit the {}-token context window",
                conversational.len() - kept.len(),
                budget
            );
        }

        let mut messages = Vec::with_capacity(kept.len() + 2);
        messages.push(system);
        messages.extend(kept);
        messages.push(user);
        messages
    }
}
