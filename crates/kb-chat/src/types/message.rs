//! Chat messages and the chat input carried from the Start step to the Chat step

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call ID, echoed back with the result
    pub id: String,
    /// Tool name
    pub name: String,
    /// Parsed JSON arguments
    pub arguments: Value,
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Call this tool message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant turn that requested tool calls
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    /// Result of a tool call
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    /// Rough token estimate (4 characters per token)
    pub fn estimated_tokens(&self) -> usize {
        let arguments: usize = self
            .tool_calls
            .iter()
            .map(|call| call.name.len() + call.arguments.to_string().len())
            .sum();
        (self.content.chars().count() + arguments) / 4 + 4
    }
}

/// User message plus prior conversation, as accepted by the chat workflows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatInput {
    #[serde(default)]
    pub user_msg: String,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
}

impl ChatInput {
    pub fn new(user_msg: impl Into<String>) -> Self {
        Self {
            user_msg: user_msg.into(),
            chat_history: Vec::new(),
        }
    }

    pub fn with_history(mut self, chat_history: Vec<ChatMessage>) -> Self {
        self.chat_history = chat_history;
        self
    }

    /// Extract the chat input from a loosely-shaped payload.
    ///
    /// Accepts a plain string, an object with `user_msg`/`chat_history`, or
    /// either shape nested under an `input` key. Anything else yields an
    /// empty message with empty history.
    pub fn from_payload(payload: &Value) -> Self {
        match payload {
            Value::String(message) => Self::new(message.clone()),
            Value::Object(map) if !map.contains_key("user_msg") && map.contains_key("input") => {
                Self::from_payload(&map["input"])
            }
            Value::Object(map) => Self {
                user_msg: map
                    .get("user_msg")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                chat_history: map
                    .get("chat_history")
                    .map(parse_history)
                    .unwrap_or_default(),
            },
            _ => Self::default(),
        }
    }

    /// Whether the message has any non-whitespace content
    pub fn has_message(&self) -> bool {
        !self.user_msg.trim().is_empty()
    }
}

fn parse_history(value: &Value) -> Vec<ChatMessage> {
    let Some(entries) = value.as_array() else {
        tracing::warn!("chat_history is not a list, ignoring it");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<ChatMessage>(entry.clone()) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("Skipping malformed chat history entry {}: {}", entry, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_string_payload() {
        let input = ChatInput::from_payload(&json!("What is X?"));
        assert_eq!(input.user_msg, "What is X?");
        assert!(input.chat_history.is_empty());
        assert!(input.has_message());
    }

    #[test]
    fn test_object_payload_with_history() {
        let input = ChatInput::from_payload(&json!({
            "user_msg": "And Y?",
            "chat_history": [
                {"role": "user", "content": "What is X?"},
                {"role": "assistant", "content": "X is a thing."}
            ]
        }));
        assert_eq!(input.user_msg, "And Y?");
        assert_eq!(input.chat_history.len(), 2);
        assert_eq!(input.chat_history[1].role, Role::Assistant);
    }

    #[test]
    fn test_wrapped_payloads() {
        let input = ChatInput::from_payload(&json!({"input": "hello"}));
        assert_eq!(input.user_msg, "hello");

        let input = ChatInput::from_payload(&json!({"input": {"user_msg": "nested"}}));
        assert_eq!(input.user_msg, "nested");
    }

    #[test]
    fn test_empty_and_unexpected_payloads() {
        let input = ChatInput::from_payload(&json!({"user_msg": "", "chat_history": []}));
        assert!(!input.has_message());

        assert_eq!(ChatInput::from_payload(&json!(42)), ChatInput::default());
        assert_eq!(ChatInput::from_payload(&Value::Null), ChatInput::default());
        assert_eq!(ChatInput::from_payload(&json!({"foo": "bar"})), ChatInput::default());
        assert!(!ChatInput::from_payload(&json!("   ")).has_message());
    }

    #[test]
    fn test_malformed_history_entries_are_skipped() {
        let input = ChatInput::from_payload(&json!({
            "user_msg": "hi",
            "chat_history": [{"role": "narrator", "content": "x"}, {"role": "user", "content": "ok"}]
        }));
        assert_eq!(input.chat_history, vec![ChatMessage::user("ok")]);

        let input = ChatInput::from_payload(&json!({"user_msg": "hi", "chat_history": "nope"}));
        assert!(input.chat_history.is_empty());
    }

    #[test]
    fn test_tool_message_serialization() {
        let value = serde_json::to_value(ChatMessage::tool("call_1", "result")).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_1");
        assert!(value.get("tool_calls").is_none());
    }
}
