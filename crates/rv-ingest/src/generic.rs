//! Generic normalization chain for values no trace adapter claims.
//!
//! Classifiers run in a fixed order (canonical, OpenAI completion, OpenAI
//! fine-tune, prompt/response, best effort) and the first match converts the
//! value. A canonical-looking value that does not deserialize falls through
//! to the prompt/response step, so the chain always yields a record.

mod openai_wire;

use chrono::Utc;
use rv_core::core::{
    ContextChunk, LatencyMs, ModelId, ModelOutput, NormalizeError, Record, RecordId,
    RecordInput, SCHEMA_VERSION,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::{chunk_from_document, chunks_from_documents};
use crate::detect::{classify_generic, DetectedFormat, PROMPT_KEYS, RESPONSE_KEYS};
use crate::lookup::{
    field, first_number, first_present, first_str, id_of, path, string_list, text_of,
    timestamp_of,
};
use crate::messages::{
    content_text, parse_messages, parse_messages_lenient, prompt_message, system_message, Role,
};
use openai_wire::{convert_choices, convert_usage, OaiCompletion};

const BEST_EFFORT_MIN_CHARS: usize = 10;
const CONTEXT_KEYS: &[&str] = &[
    "context",
    "contexts",
    "documents",
    "chunks",
    "input.context_chunks",
    "input.contextChunks",
];

/// Converts one unit through the generic chain.
pub fn normalize_generic(value: &Value) -> Record {
    match classify_generic(value) {
        DetectedFormat::Canonical => from_canonical(value).unwrap_or_else(|err| {
            debug!(error = %err, "canonical pass-through failed, reading as prompt/response");
            from_prompt_response(value)
        }),
        DetectedFormat::OpenAiCompletion => from_openai_completion(value),
        DetectedFormat::OpenAiFineTune => from_openai_finetune(value),
        DetectedFormat::PromptResponse => from_prompt_response(value),
        _ => from_best_effort(value),
    }
}

fn source_id(value: &Value) -> RecordId {
    field(value, "id")
        .and_then(id_of)
        .map(RecordId::new)
        .unwrap_or_else(RecordId::generate)
}

fn model_of(value: &Value) -> ModelId {
    first_str(value, &["model", "model_id", "modelId"])
        .map(ModelId::new)
        .unwrap_or_else(ModelId::unknown)
}

fn created_at_of(value: &Value) -> chrono::DateTime<Utc> {
    first_present(value, &["created_at", "createdAt", "timestamp", "created"])
        .and_then(timestamp_of)
        .unwrap_or_else(Utc::now)
}

fn chunks_of(value: &Value, prefix: &str) -> Vec<ContextChunk> {
    match first_present(value, CONTEXT_KEYS) {
        Some(Value::Array(docs)) => chunks_from_documents(docs, prefix),
        Some(doc) if doc.is_string() => vec![chunk_from_document(doc, format!("{prefix}-0"))],
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Canonical pass-through
// ---------------------------------------------------------------------------

/// Fills only what a canonical record may omit, then deserializes it as-is.
fn from_canonical(value: &Value) -> Result<Record, NormalizeError> {
    let mut obj: Map<String, Value> = value.as_object().cloned().unwrap_or_default();

    let id = obj.get("id").and_then(id_of);
    obj.insert(
        "id".to_owned(),
        Value::String(id.unwrap_or_else(|| RecordId::generate().as_str().to_owned())),
    );

    // A null or structured prompt would break the string invariant.
    if let Some(input) = obj.get_mut("input").and_then(Value::as_object_mut) {
        if let Some(prompt) = input.get_mut("prompt").filter(|p| !p.is_string()) {
            *prompt = Value::String(content_text(prompt));
        }
    }

    let now = Value::String(Utc::now().to_rfc3339());
    let defaults = [
        ("schemaVersion", Value::from(SCHEMA_VERSION)),
        ("createdAt", now.clone()),
        ("updatedAt", now),
        ("status", Value::String("pending".to_owned())),
        ("humanFeedback", Value::Object(Map::new())),
    ];
    for (key, default) in defaults {
        let entry = obj.entry(key).or_insert(Value::Null);
        if entry.is_null() {
            *entry = default;
        }
    }

    Record::deserialize(Value::Object(obj)).map_err(NormalizeError::from)
}

// ---------------------------------------------------------------------------
// OpenAI chat-completion response
// ---------------------------------------------------------------------------

fn from_openai_completion(value: &Value) -> Record {
    let completion = OaiCompletion::deserialize(value).unwrap_or_default();

    let messages = completion
        .messages
        .as_ref()
        .map(parse_messages_lenient)
        .unwrap_or_default();
    let prompt = match &completion.prompt {
        Some(Value::Array(items)) => items.first().map(text_of).unwrap_or_default(),
        Some(other) => text_of(other),
        None => prompt_message(&messages)
            .map(|m| m.content.clone())
            .unwrap_or_default(),
    };

    let input = RecordInput {
        prompt,
        system_prompt: system_message(&messages).map(|m| m.content.clone()),
        context_chunks: Vec::new(),
    };
    let outputs = convert_choices(&completion);

    Record::new(
        source_id(value),
        completion
            .created
            .as_ref()
            .and_then(timestamp_of)
            .unwrap_or_else(Utc::now),
        input,
        outputs,
    )
}

// ---------------------------------------------------------------------------
// OpenAI fine-tune line
// ---------------------------------------------------------------------------

fn from_openai_finetune(value: &Value) -> Record {
    let messages = field(value, "messages")
        .map(parse_messages)
        .unwrap_or_default();
    let id = source_id(value);

    let prompt = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .unwrap_or_default();
    let outputs: Vec<ModelOutput> = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .map(|m| ModelOutput {
            model_id: model_of(value),
            text: m.content.clone(),
            ..ModelOutput::default()
        })
        .into_iter()
        .collect();

    let input = RecordInput {
        prompt,
        system_prompt: system_message(&messages).map(|m| m.content.clone()),
        context_chunks: chunks_of(value, id.as_str()),
    };

    Record::new(id, created_at_of(value), input, outputs)
        .with_tags(string_list(field(value, "tags")))
}

// ---------------------------------------------------------------------------
// Generic prompt/response
// ---------------------------------------------------------------------------

fn from_prompt_response(value: &Value) -> Record {
    let id = source_id(value);

    let prompt = first_present(value, PROMPT_KEYS)
        .or_else(|| field(value, "input").filter(|i| i.is_string()))
        .or_else(|| path(value, "input.prompt"))
        .map(content_text)
        .unwrap_or_default();

    let outputs: Vec<ModelOutput> = first_present(value, RESPONSE_KEYS)
        .map(content_text)
        .filter(|text| !text.is_empty())
        .map(|text| ModelOutput {
            model_id: model_of(value),
            text,
            token_usage: convert_usage(field(value, "usage")),
            latency_ms: first_number(value, &["latency_ms", "latencyMs", "latency"])
                .map(LatencyMs::from_f64)
                .unwrap_or_default(),
            finish_reason: first_str(value, &["finish_reason", "finishReason"]),
        })
        .into_iter()
        .collect();

    let input = RecordInput {
        prompt,
        system_prompt: first_str(
            value,
            &["system_prompt", "systemPrompt", "system", "input.system_prompt"],
        ),
        context_chunks: chunks_of(value, id.as_str()),
    };

    Record::new(id, created_at_of(value), input, outputs)
        .with_tags(string_list(field(value, "tags")))
}

// ---------------------------------------------------------------------------
// Best effort
// ---------------------------------------------------------------------------

/// Strings longer than the threshold, in document order (depth first).
fn long_strings(value: &Value) -> Vec<&str> {
    let mut found = Vec::new();
    let mut stack = vec![value];
    while let Some(current) = stack.pop() {
        match current {
            Value::String(s) if s.trim().chars().count() > BEST_EFFORT_MIN_CHARS => {
                found.push(s.as_str());
            }
            Value::Array(items) => stack.extend(items.iter().rev()),
            Value::Object(map) => stack.extend(map.values().rev()),
            _ => {}
        }
    }
    found
}

fn from_best_effort(value: &Value) -> Record {
    let (prompt, response) = match value {
        Value::String(s) => (s.clone(), None),
        _ => {
            let strings = long_strings(value);
            (
                strings.first().map(|s| (*s).to_owned()).unwrap_or_default(),
                strings.get(1).map(|s| (*s).to_owned()),
            )
        }
    };

    let outputs: Vec<ModelOutput> = response
        .map(|text| ModelOutput {
            model_id: ModelId::unknown(),
            text,
            ..ModelOutput::default()
        })
        .into_iter()
        .collect();

    Record::new(
        source_id(value),
        Utc::now(),
        RecordInput::from_prompt(prompt),
        outputs,
    )
}
