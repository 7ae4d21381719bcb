//! Retrieved documents to [`ContextChunk`]s.

use rv_core::core::ContextChunk;
use serde_json::Value;

use crate::lookup::{field, first_number, first_present, first_str, id_of, text_of};

const TEXT_KEYS: &[&str] = &["page_content", "content", "text"];
const SCORE_KEYS: &[&str] = &[
    "score",
    "similarity",
    "relevance_score",
    "metadata.score",
    "metadata.similarity",
    "metadata.relevance_score",
];
const SOURCE_KEYS: &[&str] = &["metadata.source", "source", "metadata.url", "url"];
const ID_KEYS: &[&str] = &["id", "metadata.id", "metadata.doc_id", "doc_id"];

/// Converts one retrieved document. Strings become text-only chunks; objects
/// are read through the text/score/source priority lists. A nested
/// `document` object (OpenInference) is unwrapped first.
pub fn chunk_from_document(doc: &Value, fallback_id: String) -> ContextChunk {
    let doc = field(doc, "document").filter(|d| d.is_object()).unwrap_or(doc);

    if !doc.is_object() {
        return ContextChunk {
            id: fallback_id,
            text: text_of(doc),
            ..ContextChunk::default()
        };
    }

    let text = first_present(doc, TEXT_KEYS)
        .map(text_of)
        .unwrap_or_default();
    let metadata = field(doc, "metadata")
        .and_then(Value::as_object)
        .filter(|m| !m.is_empty())
        .cloned();

    ContextChunk {
        id: first_present(doc, ID_KEYS)
            .and_then(id_of)
            .unwrap_or(fallback_id),
        text,
        source: first_str(doc, SOURCE_KEYS).unwrap_or_default(),
        score: first_number(doc, SCORE_KEYS).unwrap_or(0.0),
        embedding: None,
        metadata,
        excluded: None,
        rank: None,
    }
}

/// Converts a list of documents, preserving order. `prefix` scopes the
/// generated ids of documents that carry none.
pub fn chunks_from_documents(docs: &[Value], prefix: &str) -> Vec<ContextChunk> {
    docs.iter()
        .enumerate()
        .map(|(i, doc)| chunk_from_document(doc, format!("{prefix}-{i}")))
        .collect()
}

/// Finds the document list in a retriever's output: a bare array, or an
/// object holding one under `documents`, `docs`, `results` or `output`.
pub fn documents_in(output: &Value) -> Option<&[Value]> {
    match output {
        Value::Array(items) => Some(items.as_slice()),
        Value::Object(_) => first_present(output, &["documents", "docs", "results", "output"])
            .and_then(Value::as_array)
            .map(Vec::as_slice),
        _ => None,
    }
}
