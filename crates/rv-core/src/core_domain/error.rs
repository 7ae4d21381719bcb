// ---------------------------------------------------------------------------
// Sub-error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("{adapter} cannot normalize this value: {reason}")]
    UnsupportedShape {
        adapter: &'static str,
        reason: String,
    },
    #[error("invalid canonical record: {0}")]
    InvalidRecord(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

const MIB: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(
        "payload is {size} bytes, which exceeds the {} import limit",
        limit_label(.limit)
    )]
    TooLarge { size: u64, limit: u64 },
    #[error("invalid JSON: {0}")]
    Syntax(serde_json::Error),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("failed to read input: {0}")]
    Io(String),
    #[error("payload is empty")]
    Empty,
}

/// Whole mebibytes when the limit is at least one, bytes otherwise.
fn limit_label(limit: &u64) -> String {
    let limit = *limit;
    if limit < MIB {
        format!("{limit} bytes")
    } else {
        format!("{} MiB", limit / MIB)
    }
}

impl ImportError {
    /// True when the error aborts the whole import rather than a single unit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TooLarge { .. } | Self::Io(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
