//! Chat message decoding shared by every adapter.
//!
//! Handles OpenAI-style `{role, content}`, LangChain `{type, data}` and
//! serialized `{lc, id: [..., "HumanMessage"], kwargs}` messages, the GenAI
//! `{role, parts}` shape, and batch-nested `[[...]]` message lists.

use serde_json::Value;

use crate::lookup::{field, first_present};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

pub fn parse_role(s: &str) -> Role {
    let lowered = s.trim().to_ascii_lowercase();
    let label = lowered
        .strip_suffix("messagechunk")
        .or_else(|| lowered.strip_suffix("message"))
        .unwrap_or(&lowered);
    match label {
        "system" | "developer" => Role::System,
        "user" | "human" => Role::User,
        "assistant" | "ai" | "model" | "bot" => Role::Assistant,
        "tool" | "function" => Role::Tool,
        _ => Role::Other,
    }
}

/// Flattens message content (a string or a list of typed parts) to text.
pub fn content_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.clone()),
                Value::Object(_) => first_present(part, &["text", "content"])
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(_) => first_present(value, &["text", "content"])
            .map(content_text)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn message_role(value: &Value) -> Option<Role> {
    if let Some(role) = field(value, "role").and_then(Value::as_str) {
        return Some(parse_role(role));
    }
    // Serialized LangChain constructor: the class name is the last id segment.
    if field(value, "lc").is_some() {
        let class_name = field(value, "id")
            .and_then(Value::as_array)
            .and_then(|segments| segments.last())
            .and_then(Value::as_str);
        if let Some(class_name) = class_name {
            return Some(parse_role(class_name));
        }
    }
    first_present(value, &["type", "kwargs.type", "data.type"])
        .and_then(Value::as_str)
        .map(parse_role)
}

pub fn parse_message(value: &Value) -> Option<ChatMessage> {
    if !value.is_object() {
        return None;
    }
    // OpenInference flattens as `llm.input_messages.N.message.{role,content}`.
    if field(value, "role").is_none() {
        if let Some(inner) = field(value, "message").filter(|m| m.is_object()) {
            return parse_message(inner);
        }
    }
    let role = message_role(value)?;
    let content = first_present(
        value,
        &["content", "kwargs.content", "data.content", "text", "parts"],
    )
    .map(content_text)
    .unwrap_or_default();
    Some(ChatMessage { role, content })
}

/// Decodes a message list. A batch (`[[...], [...]]`) yields its first batch.
pub fn parse_messages(value: &Value) -> Vec<ChatMessage> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    if let Some(Value::Array(first_batch)) = items.first() {
        return first_batch.iter().filter_map(parse_message).collect();
    }
    items.iter().filter_map(parse_message).collect()
}

/// Like [`parse_messages`], but also accepts a JSON-encoded string of a
/// message list, or an object wrapping one under `messages`.
pub fn parse_messages_lenient(value: &Value) -> Vec<ChatMessage> {
    match value {
        Value::Array(_) => parse_messages(value),
        Value::Object(_) => field(value, "messages")
            .map(parse_messages)
            .unwrap_or_else(|| parse_message(value).into_iter().collect()),
        Value::String(s) => {
            let trimmed = s.trim_start();
            if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
                return Vec::new();
            }
            serde_json::from_str::<Value>(trimmed)
                .map(|decoded| match decoded {
                    Value::String(_) => Vec::new(),
                    other => parse_messages_lenient(&other),
                })
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// Last user message, else the first message of any role.
pub fn prompt_message(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .or_else(|| messages.first())
}

/// Last assistant message, else the last message of any role.
pub fn response_message(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .or_else(|| messages.last())
}

pub fn system_message(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    messages.iter().find(|m| m.role == Role::System)
}
