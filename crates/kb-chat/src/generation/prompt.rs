//! System prompts for the chat agent

use crate::tools::CITATION_SYSTEM_PROMPT;

/// Answer given when the knowledge base has nothing on the topic
pub const NOT_FOUND_ANSWER: &str =
    "I cannot find information about this topic in the provided knowledge base.";

/// Base instruction block of the system prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    /// Refuses anything not stated in the knowledge base
    KnowledgeBaseOnly,
    /// Plain helpful assistant
    Basic,
}

/// Prompt builder for the agent's system prompt
pub struct PromptBuilder;

impl PromptBuilder {
    /// Base instructions for `variant`
    pub fn base_prompt(variant: PromptVariant) -> String {
        match variant {
            PromptVariant::KnowledgeBaseOnly => format!(
                r#"You are a helpful assistant that ONLY answers questions using information from the provided knowledge base.
- You must NOT use any general knowledge or information outside of the knowledge base.
- Always search the knowledge base with the query_document tool before answering.
- If the information is not available in the knowledge base, respond with "{not_found}"
- Always cite your sources using the citation format provided.
- Do not make up, infer, or extrapolate information that is not explicitly stated in the knowledge base."#,
                not_found = NOT_FOUND_ANSWER
            ),
            PromptVariant::Basic => "You are a helpful assistant".to_string(),
        }
    }

    /// Base block followed by the citation suffix when citations are enabled
    pub fn system_prompt(variant: PromptVariant, with_citations: bool) -> String {
        let mut prompt = Self::base_prompt(variant);
        if with_citations {
            prompt.push_str(CITATION_SYSTEM_PROMPT);
        }
        prompt
    }
}
