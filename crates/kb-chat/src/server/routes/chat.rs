//! Chat endpoints

use axum::{extract::State, Json};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{AgentResponse, ChatInput};

/// POST /api/chat - Answer with the main agent
pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<AgentResponse>> {
    let input = ChatInput::from_payload(&payload);
    if !input.has_message() {
        return Err(Error::InvalidInput("user_msg must not be empty".to_string()));
    }

    tracing::info!("Chat: \"{}\" ({} history messages)", input.user_msg, input.chat_history.len());
    let response = state.agent().chat(&input).await?;

    tracing::info!(
        "Chat completed in {}ms, {} citations",
        response.processing_time_ms,
        response.citations.len()
    );
    Ok(Json(response))
}

/// POST /api/chat/debug - Run the payload through the debug workflow
pub async fn chat_debug(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<AgentResponse>> {
    let response = state.debug_workflow().run(payload).await?;
    Ok(Json(response))
}
