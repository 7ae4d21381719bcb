//! OTLP/JSON span decoding.

use chrono::{DateTime, TimeZone, Utc};
use rv_core::core::Attributes;
use serde_json::Value;

use crate::lookup::{field, first_present, first_str, id_of, u64_of};

const SCOPE_KEYS: &[&str] = &["scopeSpans", "instrumentationLibrarySpans"];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanStatus {
    pub is_error: bool,
    pub message: Option<String>,
}

impl SpanStatus {
    fn from_json(value: Option<&Value>) -> Self {
        let Some(status) = value else {
            return Self::default();
        };
        let is_error = match field(status, "code") {
            Some(Value::Number(n)) => n.as_u64() == Some(2),
            Some(Value::String(s)) => {
                matches!(s.as_str(), "2" | "STATUS_CODE_ERROR" | "ERROR")
            }
            _ => false,
        };
        Self {
            is_error,
            message: first_str(status, &["message"]),
        }
    }

    /// Error text for trace metadata; `None` unless the status is an error.
    pub fn error(&self) -> Option<String> {
        self.is_error
            .then(|| self.message.clone().unwrap_or_else(|| "error".to_owned()))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OtelSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub start_nanos: Option<u64>,
    pub end_nanos: Option<u64>,
    pub attributes: Attributes,
    /// Attributes of all span events, in event order.
    pub event_attributes: Attributes,
    pub status: SpanStatus,
}

impl OtelSpan {
    /// Decodes one span. Both camelCase (OTLP/JSON) and snake_case field
    /// names are accepted; an empty parent id means "root".
    pub fn from_json(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let mut event_attributes = Attributes::new();
        for event in field(value, "events")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(attrs) = field(event, "attributes") {
                event_attributes.extend(Attributes::from_json(attrs));
            }
        }

        Some(Self {
            trace_id: first_present(value, &["traceId", "trace_id"])
                .and_then(id_of)
                .unwrap_or_default(),
            span_id: first_present(value, &["spanId", "span_id"])
                .and_then(id_of)
                .unwrap_or_default(),
            parent_span_id: first_present(value, &["parentSpanId", "parent_span_id", "parentId"])
                .and_then(id_of),
            name: first_str(value, &["name"]).unwrap_or_default(),
            start_nanos: first_present(value, &["startTimeUnixNano", "start_time_unix_nano"])
                .and_then(u64_of),
            end_nanos: first_present(value, &["endTimeUnixNano", "end_time_unix_nano"])
                .and_then(u64_of),
            attributes: field(value, "attributes")
                .map(Attributes::from_json)
                .unwrap_or_default(),
            event_attributes,
            status: SpanStatus::from_json(field(value, "status")),
        })
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start_nanos.and_then(nanos_to_datetime)
    }

    /// Duration in milliseconds; `None` unless both timestamps are present.
    pub fn duration_ms(&self) -> Option<f64> {
        let start = self.start_nanos?;
        let end = self.end_nanos?;
        Some((end.saturating_sub(start)) as f64 / 1_000_000.0)
    }
}

pub fn nanos_to_datetime(nanos: u64) -> Option<DateTime<Utc>> {
    let nanos = i64::try_from(nanos).ok()?;
    Some(Utc.timestamp_nanos(nanos))
}

// ---------------------------------------------------------------------------
// SpanExport: the export container, resolved once
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub enum SpanExport<'a> {
    /// `{resourceSpans: [{scopeSpans: [{spans: [...]}]}]}`
    Resource(&'a [Value]),
    /// `{spans: [...]}`
    Spans(&'a [Value]),
    Single(&'a Value),
}

impl<'a> SpanExport<'a> {
    pub fn resolve(value: &'a Value) -> Self {
        if let Some(resource_spans) = value.get("resourceSpans").and_then(Value::as_array) {
            return Self::Resource(resource_spans);
        }
        if let Some(spans) = value.get("spans").and_then(Value::as_array) {
            return Self::Spans(spans);
        }
        Self::Single(value)
    }

    pub fn spans(self) -> Vec<OtelSpan> {
        match self {
            Self::Resource(resource_spans) => resource_spans
                .iter()
                .flat_map(|resource| {
                    SCOPE_KEYS
                        .iter()
                        .filter_map(move |key| field(resource, key).and_then(Value::as_array))
                        .flatten()
                })
                .filter_map(|scope| field(scope, "spans").and_then(Value::as_array))
                .flatten()
                .filter_map(OtelSpan::from_json)
                .collect(),
            Self::Spans(spans) => spans.iter().filter_map(OtelSpan::from_json).collect(),
            Self::Single(span) => OtelSpan::from_json(span).into_iter().collect(),
        }
    }
}
