//! Application state for the chat server

use std::sync::Arc;

use crate::agent::Agent;
use crate::config::Settings;
use crate::error::Result;
use crate::index::IndexHandle;
use crate::workflow::{build_agent, require_index, DebugWorkflow, WorkflowEnvironment, WorkflowOptions};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    settings: Settings,
    /// Loaded once at startup for the main agent
    index: IndexHandle,
    agent: Agent,
    /// Reassembles everything on each request
    debug: DebugWorkflow,
}

impl AppState {
    /// Resolve configuration, open the index and build the main agent
    pub async fn new(env: Arc<dyn WorkflowEnvironment>) -> Result<Self> {
        tracing::info!("Initializing chat application state...");

        let settings = env.settings()?;
        let index = require_index(env.as_ref(), &settings).await?;
        tracing::info!("Index loaded ({} documents, {} chunks)", index.documents().len(), index.len());

        let agent = build_agent(env.as_ref(), &settings, index.clone(), &WorkflowOptions::main())?;
        let debug = DebugWorkflow::new(env);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                settings,
                index,
                agent,
                debug,
            }),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn index(&self) -> &IndexHandle {
        &self.inner.index
    }

    pub fn agent(&self) -> &Agent {
        &self.inner.agent
    }

    pub fn debug_workflow(&self) -> &DebugWorkflow {
        &self.inner.debug
    }
}
