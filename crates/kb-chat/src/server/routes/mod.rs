//! API routes for the chat server

pub mod chat;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/chat/debug", post(chat::chat_debug))
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let settings = state.settings();
    Json(serde_json::json!({
        "name": "kb-chat",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Knowledge-base chat agent with source citations",
        "llm": {
            "provider": settings.llm.provider.as_str(),
            "model": state.agent().llm().model(),
            "context_window": state.agent().llm().context_window(),
        },
        "embeddings": {
            "model": settings.embeddings.model,
        },
        "index": {
            "documents": state.index().documents().len(),
            "chunks": state.index().len(),
        },
        "endpoints": {
            "POST /api/chat": "Chat with the knowledge-base agent",
            "POST /api/chat/debug": "Chat through the step-logged debug workflow",
            "GET /api/info": "Server information"
        }
    }))
}
