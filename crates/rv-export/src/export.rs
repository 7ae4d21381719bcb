use chrono::{DateTime, Utc};
use rv_core::core::{ModelId, ModelOutput, Record, ReviewStatus, TraceSource};
use serde::Serialize;

use crate::models::{DpoMetadata, DpoPair, FineTuneExample, FineTuneMessage, FineTuneRole};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ExportFilter {
    pub status: Option<ReviewStatus>,
    /// Keeps records with at least one output from this model.
    pub model_id: Option<ModelId>,
    pub source: Option<TraceSource>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ExportFilter {
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }

        if let Some(model) = self.model_id.as_ref() {
            if !record.outputs.iter().any(|o| &o.model_id == model) {
                return false;
            }
        }

        if let Some(source) = self.source {
            let record_source = record.trace_metadata.as_ref().map(|m| m.source);
            if record_source != Some(source) {
                return false;
            }
        }

        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }

        if let Some(until) = self.until {
            if record.created_at > until {
                return false;
            }
        }

        true
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|value| !value.is_empty())
}

/// The output a reviewer picked, else the first output.
fn selected_output(record: &Record) -> Option<&ModelOutput> {
    record
        .human_feedback
        .selected_model_id
        .as_ref()
        .and_then(|selected| record.outputs.iter().find(|o| &o.model_id == selected))
        .or_else(|| record.outputs.first())
}

/// Among outputs other than `chosen`, the one ranked lowest. Unranked
/// outputs fall back to the first other output.
fn lowest_ranked_other<'a>(record: &'a Record, chosen: &ModelId) -> Option<&'a ModelOutput> {
    let others: Vec<&ModelOutput> = record
        .outputs
        .iter()
        .filter(|o| &o.model_id != chosen)
        .collect();

    let ranked = record.human_feedback.ranking.as_ref().and_then(|ranking| {
        others
            .iter()
            .filter_map(|o| ranking.iter().position(|m| m == &o.model_id).map(|pos| (pos, *o)))
            .max_by_key(|(pos, _)| *pos)
            .map(|(_, output)| output)
    });
    ranked.or_else(|| others.first().copied())
}

/// Export DPO pairs from reviewed records.
///
/// A reviewer correction is preferred over the selected output; otherwise a
/// selection among two or more outputs pairs the selected output against the
/// lowest-ranked alternative. Rejected records never produce pairs.
pub fn export_dpo_pairs(records: &[Record], filter: &ExportFilter) -> Vec<DpoPair> {
    let mut pairs = Vec::new();

    for record in records {
        if record.status == ReviewStatus::Rejected || !filter.matches(record) {
            continue;
        }

        let feedback = &record.human_feedback;
        let (chosen, chosen_model_id, rejected_output) =
            if let Some(corrected) = non_empty(feedback.corrected_text.as_deref()) {
                let Some(output) = selected_output(record) else {
                    continue;
                };
                (corrected, None, output)
            } else {
                let Some(selected_id) = feedback.selected_model_id.as_ref() else {
                    continue;
                };
                if record.outputs.len() < 2 {
                    continue;
                }
                let Some(selected) = record.outputs.iter().find(|o| &o.model_id == selected_id)
                else {
                    continue;
                };
                let Some(other) = lowest_ranked_other(record, selected_id) else {
                    continue;
                };
                (selected.text.as_str(), Some(selected_id.clone()), other)
            };

        if chosen == rejected_output.text.trim() {
            continue;
        }

        pairs.push(DpoPair {
            prompt: record.input.prompt.clone(),
            chosen: chosen.to_owned(),
            rejected: rejected_output.text.clone(),
            metadata: DpoMetadata {
                record_id: record.id.clone(),
                model_id: rejected_output.model_id.clone(),
                chosen_model_id,
                status: record.status,
                source: record.trace_metadata.as_ref().map(|m| m.source),
                created_at: record.created_at,
            },
        });
    }

    pairs
}

/// Export chat fine-tuning examples from approved or modified records.
pub fn export_finetune_examples(records: &[Record], filter: &ExportFilter) -> Vec<FineTuneExample> {
    records
        .iter()
        .filter(|r| matches!(r.status, ReviewStatus::Approved | ReviewStatus::Modified))
        .filter(|r| filter.matches(r))
        .filter_map(|record| {
            let assistant = non_empty(record.human_feedback.corrected_text.as_deref())
                .or_else(|| non_empty(selected_output(record).map(|o| o.text.as_str())))?;

            let mut messages = Vec::with_capacity(3);
            if let Some(system) = non_empty(record.input.system_prompt.as_deref()) {
                messages.push(FineTuneMessage::new(FineTuneRole::System, system));
            }
            messages.push(FineTuneMessage::new(
                FineTuneRole::User,
                record.input.prompt.as_str(),
            ));
            messages.push(FineTuneMessage::new(FineTuneRole::Assistant, assistant));
            Some(FineTuneExample { messages })
        })
        .collect()
}

pub fn export_to_json<T: Serialize>(items: &[T]) -> Result<String, ExportError> {
    let json = serde_json::to_string(items)?;
    Ok(json)
}

/// One JSON document per line, newline-terminated.
pub fn export_to_jsonl<T: Serialize>(items: &[T]) -> Result<String, ExportError> {
    let mut out = String::new();
    for item in items {
        out.push_str(&serde_json::to_string(item)?);
        out.push('\n');
    }
    Ok(out)
}
