use chrono::{DateTime, Utc};
use rv_core::core::{ModelId, RecordId, ReviewStatus, TraceSource};
use serde::{Deserialize, Serialize};

/// A DPO training pair built from a reviewed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpoPair {
    pub prompt: String,
    pub chosen: String,
    pub rejected: String,
    pub metadata: DpoMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpoMetadata {
    pub record_id: RecordId,
    /// Model whose output was rejected.
    pub model_id: ModelId,
    /// Model whose output was chosen. `None` when the reviewer wrote the
    /// chosen text.
    pub chosen_model_id: Option<ModelId>,
    pub status: ReviewStatus,
    pub source: Option<TraceSource>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FineTuneRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineTuneMessage {
    pub role: FineTuneRole,
    pub content: String,
}

impl FineTuneMessage {
    pub fn new(role: FineTuneRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One chat fine-tuning line: `{"messages": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineTuneExample {
    pub messages: Vec<FineTuneMessage>,
}
