use std::fmt;

// ---------------------------------------------------------------------------
// String-based identity newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(
            Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_newtype!(RecordId);
string_newtype!(ModelId);
string_newtype!(TraceId);
string_newtype!(SpanId);

impl RecordId {
    /// Fresh random identifier for records whose source carries none.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl ModelId {
    pub fn unknown() -> Self {
        Self::new("unknown")
    }
}

// ---------------------------------------------------------------------------
// LatencyMs: millisecond latency value
// ---------------------------------------------------------------------------

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct LatencyMs(u64);

impl LatencyMs {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Converts a possibly fractional or negative millisecond count, clamping at zero.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self(value.round() as u64)
        } else {
            Self(0)
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_impls() {
        assert_eq!(RecordId::new("rec-1").to_string(), "rec-1");
        assert_eq!(ModelId::new("gpt-4o").to_string(), "gpt-4o");
        assert_eq!(TraceId::new("abc123").to_string(), "abc123");
        assert_eq!(SpanId::new("def456").to_string(), "def456");
    }

    #[test]
    fn test_generated_record_ids_are_unique() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_newtypes_serialize_as_plain_strings() {
        let json = serde_json::to_string(&ModelId::new("claude")).unwrap();
        assert_eq!(json, "\"claude\"");

        let back: SpanId = serde_json::from_str("\"span-9\"").unwrap();
        assert_eq!(back.as_str(), "span-9");
    }

    #[test]
    fn test_latency_from_f64_clamps() {
        assert_eq!(LatencyMs::from_f64(12.6).value(), 13);
        assert_eq!(LatencyMs::from_f64(-5.0).value(), 0);
        assert_eq!(LatencyMs::from_f64(f64::NAN).value(), 0);
        assert_eq!(serde_json::to_string(&LatencyMs::new(250)).unwrap(), "250");
    }

    #[test]
    fn test_unknown_model() {
        assert_eq!(ModelId::unknown().as_str(), "unknown");
        assert!(ModelId::default().is_empty());
    }
}
