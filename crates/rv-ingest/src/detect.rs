//! Format detectors.
//!
//! Pure predicates over a parsed JSON value. Trace-tree detectors are
//! consulted first (through the adapter registry), then the generic-chain
//! classifiers in fixed order; [`detect_format`] reports which path a value
//! takes.

use rv_core::core::AdapterKind;
use serde_json::Value;

use crate::lookup::field;

// ---------------------------------------------------------------------------
// Trace-tree formats
// ---------------------------------------------------------------------------

/// Already-normalized data: canonical `outputs` array, or canonical
/// `input.prompt` + `input.contextChunks`.
pub fn has_canonical_shape(value: &Value) -> bool {
    if value.get("outputs").is_some_and(Value::is_array) {
        return true;
    }
    value.get("input").is_some_and(|input| {
        input.get("prompt").is_some() && input.get("contextChunks").is_some()
    })
}

pub fn is_langsmith_run(value: &Value) -> bool {
    if !value.is_object() || has_canonical_shape(value) {
        return false;
    }
    let has_id = field(value, "run_id").is_some() || field(value, "id").is_some();
    let has_io = value.get("inputs").is_some() || value.get("outputs").is_some();
    let has_kind = value.get("run_type").is_some() || value.get("name").is_some();
    has_id && (has_io || has_kind)
}

fn is_run_list(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(is_langsmith_run)
}

pub fn is_langsmith_export(value: &Value) -> bool {
    match value {
        Value::Array(items) => is_run_list(items),
        Value::Object(_) => {
            if let Some(runs) = value.get("runs").and_then(Value::as_array) {
                return is_run_list(runs);
            }
            if let Some(run) = value.get("run") {
                return is_langsmith_run(run);
            }
            is_langsmith_run(value)
        }
        _ => false,
    }
}

fn has_span_ids(value: &Value) -> bool {
    value.get("traceId").is_some() && value.get("spanId").is_some()
}

pub fn is_otel_export(value: &Value) -> bool {
    if !value.is_object() {
        return false;
    }
    if value.get("resourceSpans").is_some_and(Value::is_array) {
        return true;
    }
    if let Some(spans) = value.get("spans").and_then(Value::as_array) {
        return spans.first().is_some_and(has_span_ids);
    }
    has_span_ids(value) && value.get("name").is_some()
}

// ---------------------------------------------------------------------------
// Generic-chain formats
// ---------------------------------------------------------------------------

pub fn is_canonical_record(value: &Value) -> bool {
    value
        .get("input")
        .is_some_and(|input| input.get("prompt").is_some())
        && value.get("outputs").is_some_and(Value::is_array)
}

pub fn is_openai_completion(value: &Value) -> bool {
    field(value, "model").is_some() && value.get("choices").is_some_and(Value::is_array)
}

pub fn is_openai_finetune(value: &Value) -> bool {
    value.get("messages").is_some_and(Value::is_array)
}

pub(crate) const PROMPT_KEYS: &[&str] = &["prompt", "question"];
pub(crate) const RESPONSE_KEYS: &[&str] = &["response", "answer", "output", "completion"];

pub fn is_prompt_response(value: &Value) -> bool {
    if !value.is_object() {
        return false;
    }
    let flat_prompt = PROMPT_KEYS.iter().any(|k| field(value, k).is_some())
        || value.get("input").is_some_and(Value::is_string);
    let nested_prompt = value
        .get("input")
        .is_some_and(|input| input.is_object() && field(input, "prompt").is_some());
    let response = RESPONSE_KEYS.iter().any(|k| field(value, k).is_some());
    (flat_prompt || nested_prompt) && response
}

// ---------------------------------------------------------------------------
// Full classification
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectedFormat {
    OpenTelemetry,
    LangSmith,
    Canonical,
    OpenAiCompletion,
    OpenAiFineTune,
    PromptResponse,
    BestEffort,
}

impl DetectedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenTelemetry => "otel",
            Self::LangSmith => "langsmith",
            Self::Canonical => "canonical",
            Self::OpenAiCompletion => "openai-completion",
            Self::OpenAiFineTune => "openai-finetune",
            Self::PromptResponse => "prompt-response",
            Self::BestEffort => "best-effort",
        }
    }
}

impl From<AdapterKind> for DetectedFormat {
    fn from(kind: AdapterKind) -> Self {
        match kind {
            AdapterKind::OpenTelemetry => Self::OpenTelemetry,
            AdapterKind::LangSmith => Self::LangSmith,
        }
    }
}

/// Generic-chain classification only, in chain order.
pub fn classify_generic(value: &Value) -> DetectedFormat {
    if is_canonical_record(value) {
        DetectedFormat::Canonical
    } else if is_openai_completion(value) {
        DetectedFormat::OpenAiCompletion
    } else if is_openai_finetune(value) {
        DetectedFormat::OpenAiFineTune
    } else if is_prompt_response(value) {
        DetectedFormat::PromptResponse
    } else {
        DetectedFormat::BestEffort
    }
}

/// The path a value takes through the importer, trace formats first.
pub fn detect_format(value: &Value) -> DetectedFormat {
    if is_otel_export(value) {
        DetectedFormat::OpenTelemetry
    } else if is_langsmith_export(value) {
        DetectedFormat::LangSmith
    } else {
        classify_generic(value)
    }
}
