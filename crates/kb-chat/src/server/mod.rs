//! HTTP server for the chat agent

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::workflow::{ProcessEnvironment, WorkflowEnvironment};
use state::AppState;

/// Chat HTTP server
pub struct ChatServer {
    config: ServerConfig,
    state: AppState,
}

impl ChatServer {
    /// Create a server over the given environment; fails without an index
    pub async fn new(env: Arc<dyn WorkflowEnvironment>) -> Result<Self> {
        let state = AppState::new(env).await?;
        Ok(Self {
            config: state.settings().server.clone(),
            state,
        })
    }

    /// Create from the process environment and `.env`
    pub async fn from_environment() -> Result<Self> {
        Self::new(Arc::new(ProcessEnvironment::default())).await
    }

    /// Override the bind address
    pub fn with_address(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.config.host = host;
        }
        if let Some(port) = port {
            self.config.port = port;
        }
        self
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(health_check))
            .nest("/api", routes::api_routes())
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting chat server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::config(format!("Failed to bind {}: {}", addr, e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
