//! Workflow assembly: configuration, index, citation-wrapped query tool, prompt and agent

pub mod debug;

use async_trait::async_trait;
use std::sync::Arc;

use crate::agent::Agent;
use crate::config::{ConfigResolver, Settings};
use crate::error::{Error, Result};
use crate::generation::{PromptBuilder, PromptVariant};
use crate::index::{get_index, IndexHandle};
use crate::providers::{create_embedder, create_llm, EmbeddingProvider, LlmProvider};
use crate::tools::{build_query_tool, enable_citation, Tool};

pub use debug::{ChatEvent, DebugWorkflow, StopEvent, WorkflowEvent};

/// Where the workflow gets its settings, index and models from
#[async_trait]
pub trait WorkflowEnvironment: Send + Sync {
    /// Resolve configuration; must succeed before anything else runs
    fn settings(&self) -> Result<Settings>;

    /// Open the persisted index, `None` when there is none
    async fn index(&self, settings: &Settings) -> Result<Option<IndexHandle>>;

    fn llm(&self, settings: &Settings) -> Result<Arc<dyn LlmProvider>>;

    fn embedder(&self, settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>>;
}

/// Process environment, `.env` files, the on-disk index and the HTTP providers
#[derive(Debug, Clone, Default)]
pub struct ProcessEnvironment {
    resolver: ConfigResolver,
}

impl ProcessEnvironment {
    pub fn new(resolver: ConfigResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl WorkflowEnvironment for ProcessEnvironment {
    fn settings(&self) -> Result<Settings> {
        self.resolver.resolve()
    }

    async fn index(&self, settings: &Settings) -> Result<Option<IndexHandle>> {
        get_index(&settings.storage).await
    }

    fn llm(&self, settings: &Settings) -> Result<Arc<dyn LlmProvider>> {
        create_llm(settings)
    }

    fn embedder(&self, settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
        create_embedder(settings)
    }
}

/// How an agent is put together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Base block of the system prompt
    pub prompt: PromptVariant,
    /// Wrap the query tool with citation markers and append the citation prompt
    pub citations: bool,
    /// Keep structured sources on citation tool output
    pub workflow_compatible: bool,
}

impl WorkflowOptions {
    /// Knowledge-base-only agent with citations
    pub fn main() -> Self {
        Self {
            prompt: PromptVariant::KnowledgeBaseOnly,
            citations: true,
            workflow_compatible: true,
        }
    }

    /// Plain assistant with citations, used by the debug workflow
    pub fn debug() -> Self {
        Self {
            prompt: PromptVariant::Basic,
            citations: true,
            workflow_compatible: true,
        }
    }

    pub fn without_citations(mut self) -> Self {
        self.citations = false;
        self
    }
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self::main()
    }
}

/// Load the index, treating absence as fatal
pub async fn require_index(env: &dyn WorkflowEnvironment, settings: &Settings) -> Result<IndexHandle> {
    match env.index(settings).await? {
        Some(index) => Ok(index),
        None => {
            tracing::error!("Index not found in {}", settings.storage.persist_dir.display());
            Err(Error::IndexNotFound(
                settings.storage.persist_dir.display().to_string(),
            ))
        }
    }
}

/// Build the query tool, prompt and agent over an already loaded index
pub fn build_agent(
    env: &dyn WorkflowEnvironment,
    settings: &Settings,
    index: IndexHandle,
    options: &WorkflowOptions,
) -> Result<Agent> {
    let embedder = env.embedder(settings)?;
    let query_tool = build_query_tool(index, embedder, &settings.retrieval);
    let tool: Box<dyn Tool> = if options.citations {
        Box::new(enable_citation(query_tool, options.workflow_compatible))
    } else {
        Box::new(query_tool)
    };

    let system_prompt = PromptBuilder::system_prompt(options.prompt, options.citations);
    let llm = env.llm(settings)?;

    tracing::info!(
        "Assembled agent: {} ({:?} prompt, citations {})",
        llm.model(),
        options.prompt,
        if options.citations { "on" } else { "off" }
    );
    Agent::new(llm, vec![tool], system_prompt, &settings.agent)
}

/// Resolve configuration, open the index and assemble the agent.
///
/// Fails with [`Error::IndexNotFound`] before any tool or prompt is built
/// when there is no index.
pub async fn assemble_workflow(
    env: &dyn WorkflowEnvironment,
    options: &WorkflowOptions,
) -> Result<Agent> {
    let settings = env.settings()?;
    let index = require_index(env, &settings).await?;
    build_agent(env, &settings, index, options)
}

/// The main chat agent, built from the process environment
pub async fn create_workflow() -> Result<Agent> {
    assemble_workflow(&ProcessEnvironment::default(), &WorkflowOptions::main()).await
}
