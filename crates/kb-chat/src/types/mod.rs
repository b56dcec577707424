//! Core types for the chat agent

pub mod document;
pub mod message;
pub mod response;

pub use document::{Chunk, ChunkSource, Document, FileType};
pub use message::{ChatInput, ChatMessage, Role, ToolCall};
pub use response::{AgentResponse, SourceNode};
