//! Import orchestrator: size gate, JSON-vs-JSONL dispatch, per-unit error
//! isolation.
//!
//! Nothing escapes [`Importer::import_payload`] as an error. Every failure
//! is recorded in [`ImportResult::errors`] with the location of the unit
//! that caused it, and processing continues with the next unit.

use std::fmt;
use std::path::Path;

use rv_core::core::{ImportError, Record};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::detect::{classify_generic, DetectedFormat};
use crate::generic::normalize_generic;
use crate::registry::AdapterRegistry;

/// Default payload ceiling: 50 MiB.
pub const MAX_IMPORT_BYTES: u64 = 50 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Where a failing unit sits in the payload. Line and item numbers are 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitLocation {
    Document,
    Line(usize),
    Item(usize),
}

impl fmt::Display for UnitLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Line(n) => write!(f, "line {n}"),
            Self::Item(n) => write!(f, "item {n}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportFailure {
    pub location: UnitLocation,
    pub message: String,
}

impl ImportFailure {
    fn new(location: UnitLocation, error: &ImportError) -> Self {
        Self {
            location,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ImportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ImportResult {
    /// True iff at least one record was produced.
    pub success: bool,
    pub records_imported: usize,
    pub records: Vec<Record>,
    pub errors: Vec<ImportFailure>,
}

impl ImportResult {
    fn from_parts(records: Vec<Record>, errors: Vec<ImportFailure>) -> Self {
        Self {
            success: !records.is_empty(),
            records_imported: records.len(),
            records,
            errors,
        }
    }

    fn failed(location: UnitLocation, error: &ImportError) -> Self {
        Self::from_parts(Vec::new(), vec![ImportFailure::new(location, error)])
    }
}

/// Per-unit format classification, as reported by `rv detect`.
#[derive(Clone, Debug, Default)]
pub struct DetectionReport {
    pub units: Vec<(UnitLocation, DetectedFormat)>,
    pub errors: Vec<ImportFailure>,
}

// ---------------------------------------------------------------------------
// Payload splitting
// ---------------------------------------------------------------------------

enum Payload {
    Document(Value),
    Lines(Vec<(usize, Result<Value, serde_json::Error>)>),
}

/// Whole-document parse first; JSONL only when that fails.
fn split_payload(text: &str) -> Payload {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Payload::Document(value);
    }
    let lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, serde_json::from_str::<Value>(line.trim())))
        .collect();
    Payload::Lines(lines)
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

pub struct Importer {
    registry: AdapterRegistry,
    max_bytes: u64,
}

impl Default for Importer {
    fn default() -> Self {
        Self::new(AdapterRegistry::default(), MAX_IMPORT_BYTES)
    }
}

impl Importer {
    pub fn new(registry: AdapterRegistry, max_bytes: u64) -> Self {
        Self {
            registry,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn import_bytes(&self, bytes: &[u8]) -> ImportResult {
        self.import_payload(bytes.len() as u64, bytes)
    }

    /// Imports a payload whose size was reported separately (file metadata,
    /// upload header). The larger of the reported and actual sizes is gated.
    pub fn import_payload(&self, reported_size: u64, bytes: &[u8]) -> ImportResult {
        let size = reported_size.max(bytes.len() as u64);
        if let Err(err) = self.check_size(size) {
            warn!(size, limit = self.max_bytes, "rejecting oversized payload");
            return ImportResult::failed(UnitLocation::Document, &err);
        }

        let text = String::from_utf8_lossy(bytes);
        if text.trim().is_empty() {
            return ImportResult::failed(UnitLocation::Document, &ImportError::Empty);
        }

        let mut records = Vec::new();
        let mut errors = Vec::new();
        match split_payload(&text) {
            Payload::Document(value) => {
                debug!(size, "importing single JSON document");
                self.import_document(&value, &mut records, &mut errors);
            }
            Payload::Lines(lines) => {
                debug!(size, lines = lines.len(), "importing newline-delimited JSON");
                for (line, parsed) in lines {
                    match parsed {
                        Ok(value) => self.import_unit(
                            &value,
                            UnitLocation::Line(line),
                            &mut records,
                            &mut errors,
                        ),
                        Err(e) => {
                            let err = ImportError::Syntax(e);
                            warn!(line, error = %err, "skipping malformed line");
                            errors.push(ImportFailure::new(UnitLocation::Line(line), &err));
                        }
                    }
                }
            }
        }

        let result = ImportResult::from_parts(records, errors);
        info!(
            records = result.records_imported,
            errors = result.errors.len(),
            "import finished"
        );
        result
    }

    /// Gates on the size reported by file metadata before reading any bytes.
    pub fn import_file(&self, path: &Path) -> ImportResult {
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                let err = ImportError::Io(format!("{}: {e}", path.display()));
                return ImportResult::failed(UnitLocation::Document, &err);
            }
        };
        if let Err(err) = self.check_size(size) {
            warn!(path = %path.display(), size, "rejecting oversized file");
            return ImportResult::failed(UnitLocation::Document, &err);
        }
        match std::fs::read(path) {
            Ok(bytes) => self.import_payload(size, &bytes),
            Err(e) => {
                let err = ImportError::Io(format!("{}: {e}", path.display()));
                ImportResult::failed(UnitLocation::Document, &err)
            }
        }
    }

    /// Classifies each unit the way an import would route it, without
    /// normalizing anything.
    pub fn detect_payload(&self, bytes: &[u8]) -> DetectionReport {
        let mut report = DetectionReport::default();
        if let Err(err) = self.check_size(bytes.len() as u64) {
            report.errors.push(ImportFailure::new(UnitLocation::Document, &err));
            return report;
        }
        let text = String::from_utf8_lossy(bytes);
        if text.trim().is_empty() {
            report
                .errors
                .push(ImportFailure::new(UnitLocation::Document, &ImportError::Empty));
            return report;
        }

        match split_payload(&text) {
            Payload::Document(value) => match (&value, self.registry.find(&value)) {
                (_, Some(adapter)) => {
                    report.units.push((UnitLocation::Document, adapter.kind().into()));
                }
                (Value::Array(items), None) => {
                    for (i, item) in items.iter().enumerate() {
                        report.units.push((UnitLocation::Item(i + 1), self.classify(item)));
                    }
                }
                (other, None) => {
                    report
                        .units
                        .push((UnitLocation::Document, classify_generic(other)));
                }
            },
            Payload::Lines(lines) => {
                for (line, parsed) in lines {
                    match parsed {
                        Ok(value) => {
                            report
                                .units
                                .push((UnitLocation::Line(line), self.classify(&value)));
                        }
                        Err(e) => report.errors.push(ImportFailure::new(
                            UnitLocation::Line(line),
                            &ImportError::Syntax(e),
                        )),
                    }
                }
            }
        }
        report
    }

    fn check_size(&self, size: u64) -> Result<(), ImportError> {
        if size > self.max_bytes {
            return Err(ImportError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    fn classify(&self, value: &Value) -> DetectedFormat {
        match self.registry.find(value) {
            Some(adapter) => adapter.kind().into(),
            None => classify_generic(value),
        }
    }

    /// A trace export is normalized as a whole; otherwise an array is
    /// imported element by element.
    fn import_document(
        &self,
        value: &Value,
        records: &mut Vec<Record>,
        errors: &mut Vec<ImportFailure>,
    ) {
        if self.registry.find(value).is_none() {
            if let Value::Array(items) = value {
                for (i, item) in items.iter().enumerate() {
                    self.import_unit(item, UnitLocation::Item(i + 1), records, errors);
                }
                return;
            }
        }
        self.import_unit(value, UnitLocation::Document, records, errors);
    }

    fn import_unit(
        &self,
        value: &Value,
        location: UnitLocation,
        records: &mut Vec<Record>,
        errors: &mut Vec<ImportFailure>,
    ) {
        let outcome: Result<Vec<Record>, ImportError> = match self.registry.find(value) {
            Some(adapter) => {
                debug!(%location, adapter = adapter.kind().as_str(), "trace adapter matched");
                adapter.normalize(value).map_err(ImportError::from)
            }
            None => Ok(vec![normalize_generic(value)]),
        };

        match outcome {
            Ok(mut produced) => records.append(&mut produced),
            Err(err) => {
                warn!(%location, error = %err, "unit failed to normalize");
                errors.push(ImportFailure::new(location, &err));
            }
        }
    }
}
