//! OpenTelemetry span-tree adapter.
//!
//! Spans are decoded from any of the three OTLP/JSON export shapes, linked
//! into a tree per trace through `parentSpanId`, and read through a
//! [`SemanticMapping`] so that vendor attribute names stay configuration.

pub mod mapping;
pub mod span;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rv_core::core::{
    AdapterKind, AttributeValue, ContextChunk, LatencyMs, ModelId, ModelOutput, NormalizeError,
    Record, RecordId, RecordInput, SpanId, SpanType, TokenUsage, TraceAdapter, TraceId,
    TraceMetadata, TraceSource,
};
use serde_json::Value;
use tracing::debug;

pub use mapping::{MappingOverride, SemanticMapping, TokenAttributes, TokenOverride};
pub use span::{OtelSpan, SpanExport, SpanStatus};

use crate::context::{chunks_from_documents, documents_in};
use crate::detect::is_otel_export;
use crate::lookup::name_matches;
use crate::messages::{
    parse_messages_lenient, prompt_message, response_message, system_message, ChatMessage,
};
use crate::tree::TraceTree;

const ADAPTER: &str = "otel";

/// Structured attribute values (message arrays, JSON-encoded message lists)
/// decoded as chat messages. Empty when the value is plain text.
fn messages_in(value: &AttributeValue) -> Vec<ChatMessage> {
    match value {
        AttributeValue::String(s) => parse_messages_lenient(&Value::String(s.clone())),
        AttributeValue::Array(_) | AttributeValue::KvList(_) => {
            parse_messages_lenient(&value.to_json())
        }
        _ => Vec::new(),
    }
}

/// Text of a prompt/response value. `pick` selects the message when the
/// value is a message list; string arrays are joined with newlines.
fn text_in(value: &AttributeValue, pick: fn(&[ChatMessage]) -> Option<&ChatMessage>) -> String {
    let messages = messages_in(value);
    if let Some(message) = pick(&messages) {
        return message.content.clone();
    }
    match value {
        AttributeValue::Array(items) if items.iter().all(|i| i.as_str().is_some()) => items
            .iter()
            .filter_map(AttributeValue::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_text(),
    }
}

fn first_text(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Array(items) => items
            .first()
            .map(AttributeValue::to_text)
            .unwrap_or_default(),
        other => other.to_text(),
    }
}

// ---------------------------------------------------------------------------
// OtelAdapter
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct OtelAdapter {
    mapping: Arc<SemanticMapping>,
}

impl Default for OtelAdapter {
    fn default() -> Self {
        Self::new(SemanticMapping::default())
    }
}

impl OtelAdapter {
    pub fn new(mapping: SemanticMapping) -> Self {
        Self::with_shared(Arc::new(mapping))
    }

    pub fn with_shared(mapping: Arc<SemanticMapping>) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &SemanticMapping {
        &self.mapping
    }

    /// Span attributes first, then event attributes.
    fn lookup(&self, span: &OtelSpan, keys: &[String]) -> Option<AttributeValue> {
        span.attributes
            .resolve(keys)
            .or_else(|| span.event_attributes.resolve(keys))
    }

    /// A span-kind attribute decides alone, even when its label is one we do
    /// not map (`RERANKER`, `GUARDRAIL`, ...).
    fn classify(&self, span: &OtelSpan) -> SpanType {
        let explicit = span
            .attributes
            .first_of(&self.mapping.span_kind_attributes)
            .and_then(|(_, value)| value.as_str())
            .filter(|label| !label.trim().is_empty());
        if let Some(label) = explicit {
            return SpanType::from_label(label).unwrap_or(SpanType::Unknown);
        }

        let name = span.name.to_ascii_lowercase();
        if !name.is_empty() {
            if name_matches(&name, &self.mapping.retriever_span_names) {
                return SpanType::Retriever;
            }
            if name_matches(&name, &self.mapping.llm_span_names) {
                return SpanType::Llm;
            }
        }

        let has_llm_attributes = span.attributes.contains_any(&self.mapping.prompt_attributes)
            || span.attributes.contains_any(&self.mapping.response_attributes);
        if has_llm_attributes {
            SpanType::Llm
        } else {
            SpanType::Unknown
        }
    }

    fn context_of(&self, span: &OtelSpan) -> Vec<ContextChunk> {
        let Some(value) = self.lookup(span, &self.mapping.document_attributes) else {
            return Vec::new();
        };
        let json = match value {
            AttributeValue::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
            other => other.to_json(),
        };
        let docs = match &json {
            Value::String(_) => std::slice::from_ref(&json),
            other => documents_in(other).unwrap_or_default(),
        };
        chunks_from_documents(docs, &span.span_id)
    }

    fn token_usage_of(&self, span: &OtelSpan) -> TokenUsage {
        let tokens = &self.mapping.token_attributes;
        let count = |keys: &[String]| self.lookup(span, keys).and_then(|v| v.as_u64());
        TokenUsage::from_parts(
            count(&tokens.input),
            count(&tokens.output),
            count(&tokens.total),
        )
    }

    fn build_record(&self, span: &OtelSpan, kind: SpanType, chunks: Vec<ContextChunk>) -> Record {
        let mapping = &self.mapping;
        let prompt_value = self.lookup(span, &mapping.prompt_attributes);
        let latency = span.duration_ms().map(LatencyMs::from_f64);

        let system_prompt = self
            .lookup(span, &mapping.system_prompt_attributes)
            .map(|v| text_in(&v, system_message))
            .or_else(|| {
                prompt_value
                    .as_ref()
                    .and_then(|v| system_message(&messages_in(v)).map(|m| m.content.clone()))
            });

        let input = RecordInput {
            prompt: prompt_value
                .as_ref()
                .map(|v| text_in(v, prompt_message))
                .unwrap_or_default(),
            system_prompt,
            context_chunks: chunks,
        };

        let outputs: Vec<ModelOutput> = self
            .lookup(span, &mapping.response_attributes)
            .map(|v| text_in(&v, response_message))
            .filter(|text| !text.is_empty())
            .map(|text| ModelOutput {
                model_id: self
                    .lookup(span, &mapping.model_attributes)
                    .map(|v| ModelId::new(v.to_text()))
                    .unwrap_or_else(ModelId::unknown),
                text,
                token_usage: self.token_usage_of(span),
                latency_ms: latency.unwrap_or_default(),
                finish_reason: self
                    .lookup(span, &mapping.finish_reason_attributes)
                    .map(|v| first_text(&v))
                    .filter(|reason| !reason.is_empty()),
            })
            .into_iter()
            .collect();

        let id = if span.trace_id.is_empty() || span.span_id.is_empty() {
            RecordId::generate()
        } else {
            RecordId::new(format!("{}-{}", span.trace_id, span.span_id))
        };

        let metadata = TraceMetadata {
            trace_id: TraceId::new(span.trace_id.clone()),
            span_id: SpanId::new(span.span_id.clone()),
            parent_id: span.parent_span_id.clone().map(SpanId::new),
            span_type: kind,
            source: TraceSource::Otel,
            session_id: self
                .lookup(span, &mapping.session_attributes)
                .map(|v| v.to_text()),
            error: span.status.error(),
            latency_ms: latency,
            original_attributes: Some(span.attributes.to_json_map()),
        };

        Record::new(
            id,
            span.started_at().unwrap_or_else(Utc::now),
            input,
            outputs,
        )
        .with_trace_metadata(metadata)
    }
}

impl TraceAdapter for OtelAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::OpenTelemetry
    }

    fn detect(&self, value: &Value) -> bool {
        is_otel_export(value)
    }

    fn normalize(&self, value: &Value) -> Result<Vec<Record>, NormalizeError> {
        let spans = SpanExport::resolve(value).spans();
        if spans.is_empty() {
            return Err(NormalizeError::UnsupportedShape {
                adapter: ADAPTER,
                reason: "no spans found".to_owned(),
            });
        }

        let kinds: Vec<SpanType> = spans.iter().map(|span| self.classify(span)).collect();
        // Span ids are only unique within their trace.
        let tree = TraceTree::from_parent_ids(
            spans,
            |span| Some(format!("{}/{}", span.trace_id, span.span_id)),
            |span| {
                span.parent_span_id
                    .as_ref()
                    .map(|parent| format!("{}/{}", span.trace_id, parent))
            },
        );

        let mut context: HashMap<&str, Vec<ContextChunk>> = HashMap::new();
        for (i, span) in tree.nodes().iter().enumerate() {
            if kinds[i] == SpanType::Retriever {
                context
                    .entry(span.trace_id.as_str())
                    .or_default()
                    .extend(self.context_of(span));
            }
        }

        let mut targets = tree.leaf_matches(|i| kinds[i] == SpanType::Llm);
        if targets.is_empty() {
            targets = tree.roots();
        }
        debug!(
            spans = tree.len(),
            records = targets.len(),
            traces = context.len(),
            "normalizing otel export"
        );

        Ok(targets
            .into_iter()
            .map(|i| {
                let span = tree.node(i);
                let chunks = context
                    .get(span.trace_id.as_str())
                    .cloned()
                    .unwrap_or_default();
                self.build_record(span, kinds[i], chunks)
            })
            .collect())
    }
}
