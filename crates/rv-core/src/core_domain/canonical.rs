use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{LatencyMs, ModelId, RecordId, SpanId, TraceId};

/// Current canonical record schema version.
pub const SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Modified,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanType {
    Llm,
    Retriever,
    Chain,
    Tool,
    Embedding,
    #[default]
    Unknown,
}

impl SpanType {
    /// Maps a vendor type label (`run_type`, `openinference.span.kind`, ...)
    /// onto a span type. Unrecognized labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "llm" | "chat_model" | "chat" | "completion" | "text_completion" | "generation"
            | "generate_content" => Some(Self::Llm),
            "retriever" | "retrieval" | "retrieve" => Some(Self::Retriever),
            "chain" | "agent" | "workflow" | "task" => Some(Self::Chain),
            "tool" | "execute_tool" => Some(Self::Tool),
            "embedding" | "embeddings" => Some(Self::Embedding),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceSource {
    Langsmith,
    Otel,
    Langfuse,
    Manual,
}

// ---------------------------------------------------------------------------
// Trace metadata
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceMetadata {
    pub trace_id: TraceId,
    #[serde(default)]
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SpanId>,
    #[serde(default)]
    pub span_type: SpanType,
    pub source: TraceSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<LatencyMs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_attributes: Option<Map<String, Value>>,
}

// ---------------------------------------------------------------------------
// Input side
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInput {
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub context_chunks: Vec<ContextChunk>,
}

impl RecordInput {
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            context_chunks: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output side
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Builds usage from whichever counts a source reported. An explicit total
    /// wins; otherwise the total is prompt + completion.
    pub fn from_parts(prompt: Option<u64>, completion: Option<u64>, total: Option<u64>) -> Self {
        let prompt_tokens = prompt.unwrap_or(0);
        let completion_tokens = completion.unwrap_or(0);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: total.unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOutput {
    #[serde(default)]
    pub model_id: ModelId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub token_usage: TokenUsage,
    #[serde(default)]
    pub latency_ms: LatencyMs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Human feedback
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_model_id: Option<ModelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<Vec<ModelId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub golden_context_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl HumanFeedback {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The normalized unit of review every adapter converges on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_metadata: Option<TraceMetadata>,
    pub input: RecordInput,
    #[serde(default)]
    pub outputs: Vec<ModelOutput>,
    #[serde(default)]
    pub human_feedback: HumanFeedback,
}

impl Record {
    /// Builds a fresh `pending` record stamped with the current schema version.
    pub fn new(
        id: RecordId,
        created_at: DateTime<Utc>,
        input: RecordInput,
        outputs: Vec<ModelOutput>,
    ) -> Self {
        Self {
            id,
            schema_version: SCHEMA_VERSION,
            created_at,
            updated_at: Utc::now(),
            status: ReviewStatus::Pending,
            tags: None,
            trace_metadata: None,
            input,
            outputs,
            human_feedback: HumanFeedback::default(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        let mut deduped: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            if !deduped.contains(&tag) {
                deduped.push(tag);
            }
        }
        self.tags = if deduped.is_empty() {
            None
        } else {
            Some(deduped)
        };
        self
    }

    pub fn with_trace_metadata(mut self, metadata: TraceMetadata) -> Self {
        self.trace_metadata = Some(metadata);
        self
    }

    pub fn with_feedback(mut self, feedback: HumanFeedback) -> Self {
        self.human_feedback = feedback;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
