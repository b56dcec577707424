//! kb-chat: knowledge-base chat agent with source citations
//!
//! Answers questions from a previously generated document index. A retrieval
//! tool marks every passage it returns with a citation marker, and a
//! tool-calling agent answers only from what that tool retrieved. A debug
//! variant of the chat workflow runs as an explicit `Start → Chat → Stop`
//! state machine and logs every step.

pub mod agent;
pub mod config;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod providers;
pub mod server;
pub mod tools;
pub mod types;
pub mod workflow;

pub use agent::Agent;
pub use config::{resolve_configuration, ConfigResolver, Settings};
pub use error::{Error, Result};
pub use index::{get_index, IndexHandle, VectorIndex};
pub use ingestion::{generate_datasource, IngestReport};
pub use server::ChatServer;
pub use types::{AgentResponse, ChatInput, ChatMessage, SourceNode};
pub use workflow::{assemble_workflow, create_workflow, DebugWorkflow, WorkflowOptions};
