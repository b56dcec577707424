//! Debug chat workflow: an explicit `Start → Chat → Stop` state machine
//!
//! Every step logs what it received. Each run repeats the full assembly
//! (configuration, index, tool, agent), nothing is cached between runs.

use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::index::IndexHandle;
use crate::types::{AgentResponse, ChatInput};

use super::{build_agent, require_index, WorkflowEnvironment, WorkflowOptions};

/// Event handed from Start to Chat
#[derive(Clone)]
pub struct ChatEvent {
    pub input: ChatInput,
    pub settings: Settings,
    pub index: IndexHandle,
}

impl fmt::Debug for ChatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatEvent")
            .field("input", &self.input)
            .field("index_chunks", &self.index.len())
            .finish()
    }
}

/// Final event carrying the agent's response
#[derive(Debug, Clone)]
pub struct StopEvent {
    pub result: AgentResponse,
}

/// Workflow state
#[derive(Debug)]
pub enum WorkflowEvent {
    Start(Value),
    Chat(ChatEvent),
    Stop(StopEvent),
}

impl WorkflowEvent {
    pub fn step_name(&self) -> &'static str {
        match self {
            Self::Start(_) => "Start",
            Self::Chat(_) => "Chat",
            Self::Stop(_) => "Stop",
        }
    }
}

/// Step-based chat workflow with logging at every transition
pub struct DebugWorkflow {
    env: Arc<dyn WorkflowEnvironment>,
    options: WorkflowOptions,
}

impl DebugWorkflow {
    /// Plain-assistant prompt with citations
    pub fn new(env: Arc<dyn WorkflowEnvironment>) -> Self {
        Self::with_options(env, WorkflowOptions::debug())
    }

    pub fn with_options(env: Arc<dyn WorkflowEnvironment>, options: WorkflowOptions) -> Self {
        Self { env, options }
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Drive a payload through Start, Chat and Stop
    pub async fn run(&self, payload: Value) -> Result<AgentResponse> {
        let mut state = WorkflowEvent::Start(payload);
        loop {
            let from = state.step_name();
            state = match state {
                WorkflowEvent::Start(payload) => WorkflowEvent::Chat(self.handle_start(payload).await?),
                WorkflowEvent::Chat(event) => WorkflowEvent::Stop(self.handle_chat(event).await?),
                WorkflowEvent::Stop(event) => return Ok(self.handle_stop(event).result),
            };
            tracing::info!("Workflow transition: {} -> {}", from, state.step_name());
        }
    }

    /// Resolve configuration and the index, then extract the chat input.
    ///
    /// A missing or empty message is logged with a description of the
    /// payload and passed on as an empty message.
    pub async fn handle_start(&self, payload: Value) -> Result<ChatEvent> {
        tracing::info!("Workflow started with input: {}", payload);

        let settings = self.env.settings()?;
        let index = require_index(self.env.as_ref(), &settings).await?;
        tracing::info!("Index loaded successfully ({} chunks)", index.len());

        let input = ChatInput::from_payload(&payload);
        if input.has_message() {
            tracing::info!("User message: {}", input.user_msg);
        } else {
            tracing::warn!(
                "No user message in workflow input ({})",
                describe_payload(&payload)
            );
        }
        if !input.chat_history.is_empty() {
            tracing::info!("Chat history: {} messages", input.chat_history.len());
        }

        Ok(ChatEvent {
            input,
            settings,
            index,
        })
    }

    /// Build the tool and agent, run it, and wrap the response.
    ///
    /// Failures are logged in full and returned unchanged.
    pub async fn handle_chat(&self, event: ChatEvent) -> Result<StopEvent> {
        tracing::info!("Processing chat event: {}", event.input.user_msg);

        let result = async {
            let agent = build_agent(self.env.as_ref(), &event.settings, event.index, &self.options)?;
            tracing::info!("Running agent to generate response");
            agent.chat(&event.input).await
        }
        .await;

        match result {
            Ok(response) => {
                tracing::info!(
                    "Agent response generated: {}",
                    crate::generation::truncate_snippet(&response.answer, 100)
                );
                Ok(StopEvent { result: response })
            }
            Err(e) => {
                log_failure(&e);
                Err(e)
            }
        }
    }

    /// Log and pass the result through
    pub fn handle_stop(&self, event: StopEvent) -> StopEvent {
        tracing::info!(
            "Stop event received: {} chars, {} citations, {} tool calls, top score {:.3}, {} ms",
            event.result.answer.len(),
            event.result.citations.len(),
            event.result.tool_calls,
            event.result.top_score(),
            event.result.processing_time_ms
        );
        event
    }
}

/// Field names and contents of a payload, for diagnostics
pub fn describe_payload(payload: &Value) -> String {
    match payload {
        Value::Object(map) => format!(
            "fields: [{}], contents: {}",
            map.keys().cloned().collect::<Vec<_>>().join(", "),
            payload
        ),
        Value::Null => "payload is null".to_string(),
        other => format!("payload is not an object, contents: {}", other),
    }
}

fn log_failure(err: &Error) {
    let mut causes = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }

    tracing::error!(
        "Chat step failed: {} (kind: {})\ncaused by: {}\nbacktrace:\n{}",
        err,
        err.kind(),
        if causes.is_empty() {
            "-".to_string()
        } else {
            causes.join(" <- ")
        },
        std::backtrace::Backtrace::force_capture()
    );
}
