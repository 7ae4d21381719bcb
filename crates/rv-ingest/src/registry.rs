use rv_core::core::{AdapterKind, TraceAdapter};
use serde_json::Value;

use crate::langsmith::LangSmithAdapter;
use crate::otel::OtelAdapter;

/// Ordered list of trace-tree adapters. Detection is a linear scan and the
/// first adapter whose `detect` accepts a value wins, so the more specific
/// shapes are registered first.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn TraceAdapter>>,
}

impl AdapterRegistry {
    /// OpenTelemetry first (it requires `traceId` + `spanId`), then LangSmith.
    pub fn new() -> Self {
        Self::with_adapters(vec![
            Box::new(OtelAdapter::default()),
            Box::new(LangSmithAdapter::default()),
        ])
    }

    pub fn with_adapters(adapters: Vec<Box<dyn TraceAdapter>>) -> Self {
        Self { adapters }
    }

    /// First adapter that detects `value`, if any.
    pub fn find(&self, value: &Value) -> Option<&dyn TraceAdapter> {
        self.adapters
            .iter()
            .find(|adapter| adapter.detect(value))
            .map(|adapter| adapter.as_ref())
    }

    pub fn get(&self, kind: AdapterKind) -> Option<&dyn TraceAdapter> {
        self.adapters
            .iter()
            .find(|adapter| adapter.kind() == kind)
            .map(|adapter| adapter.as_ref())
    }

    pub fn kinds(&self) -> Vec<AdapterKind> {
        self.adapters.iter().map(|adapter| adapter.kind()).collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
