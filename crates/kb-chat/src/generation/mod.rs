//! System prompts and citation handling for generated answers

pub mod citation;
pub mod prompt;

pub use citation::{truncate_snippet, CitationLinker};
pub use prompt::{PromptBuilder, PromptVariant, NOT_FOUND_ANSWER};
