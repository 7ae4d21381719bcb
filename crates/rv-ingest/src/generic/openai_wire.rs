use rv_core::core::{ModelId, ModelOutput, TokenUsage};
use serde::Deserialize;
use serde_json::Value;

use crate::lookup::text_of;
use crate::messages::content_text;

// ---------------------------------------------------------------------------
// Response wire types (OpenAI Chat Completions / legacy Completions)
// ---------------------------------------------------------------------------

/// A logged completion response. Loosely typed: fields that vary between API
/// versions and SDK loggers stay as raw JSON.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct OaiCompletion {
    pub id: Option<Value>,
    pub model: Option<Value>,
    pub created: Option<Value>,
    pub choices: Vec<Value>,
    pub usage: Option<Value>,
    /// Request fields some loggers store next to the response.
    pub prompt: Option<Value>,
    pub messages: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct OaiChoice {
    pub message: Option<OaiChoiceMessage>,
    /// Legacy completions API.
    pub text: Option<Value>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct OaiChoiceMessage {
    pub content: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct OaiUsage {
    #[serde(alias = "input_tokens")]
    pub prompt_tokens: Option<u64>,
    #[serde(alias = "output_tokens")]
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Decodes a `usage` object; malformed usage degrades to zero counts.
pub(super) fn convert_usage(usage: Option<&Value>) -> TokenUsage {
    usage
        .and_then(|u| OaiUsage::deserialize(u).ok())
        .map(|u| TokenUsage::from_parts(u.prompt_tokens, u.completion_tokens, u.total_tokens))
        .unwrap_or_default()
}

/// One output per decodable choice. Choices with no text are dropped.
pub(super) fn convert_choices(completion: &OaiCompletion) -> Vec<ModelOutput> {
    let model_id = completion
        .model
        .as_ref()
        .map(text_of)
        .filter(|m| !m.is_empty())
        .map(ModelId::new)
        .unwrap_or_else(ModelId::unknown);
    let usage = convert_usage(completion.usage.as_ref());

    completion
        .choices
        .iter()
        .filter_map(|choice| OaiChoice::deserialize(choice).ok())
        .filter_map(|choice| {
            let text = choice
                .message
                .and_then(|m| m.content)
                .or(choice.text)
                .map(|content| content_text(&content))
                .filter(|text| !text.is_empty())?;
            Some(ModelOutput {
                model_id: model_id.clone(),
                text,
                token_usage: usage.clone(),
                latency_ms: Default::default(),
                finish_reason: choice.finish_reason,
            })
        })
        .collect()
}
