use serde_json::Value;

use crate::core::{NormalizeError, Record};

// ---------------------------------------------------------------------------
// AdapterKind: identifies a trace-tree export format
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterKind {
    OpenTelemetry,
    LangSmith,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenTelemetry => "otel",
            Self::LangSmith => "langsmith",
        }
    }
}

// ---------------------------------------------------------------------------
// TraceAdapter: converts one vendor export into canonical records
// ---------------------------------------------------------------------------

pub trait TraceAdapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    /// Side-effect free shape check. Not matching is never an error.
    fn detect(&self, value: &Value) -> bool;

    /// Normalizes a value `detect` accepted. One export may fan out into
    /// any number of records.
    fn normalize(&self, value: &Value) -> Result<Vec<Record>, NormalizeError>;
}
