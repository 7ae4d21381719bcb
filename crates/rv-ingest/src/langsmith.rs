//! LangSmith run-tree adapter.
//!
//! A LangSmith export is a run (or a list of runs) whose children nest under
//! `child_runs`/`childRuns`, or link back through `parent_run_id` in flat
//! exports. Only the innermost LLM runs become records; retriever runs in the
//! same trace supply their context chunks.

use std::collections::HashMap;

use chrono::Utc;
use rv_core::core::{
    AdapterKind, ContextChunk, HumanFeedback, LatencyMs, ModelId, ModelOutput, NormalizeError,
    Record, RecordId, RecordInput, SpanId, SpanType, TokenUsage, TraceAdapter, TraceId,
    TraceMetadata, TraceSource,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::{chunks_from_documents, documents_in};
use crate::detect::is_langsmith_export;
use crate::lookup::{
    field, first_number, first_present, first_str, first_u64, id_of, is_blank,
    name_matches, path, string_list, text_of, timestamp_of,
};
use crate::messages::{content_text, parse_messages, prompt_message, system_message, ChatMessage};
use crate::tree::TraceTree;

const ADAPTER: &str = "langsmith";
const CHILD_KEYS: [&str; 2] = ["child_runs", "childRuns"];

const MODEL_KEYS: &[&str] = &[
    "extra.invocation_params.model",
    "extra.invocation_params.model_name",
    "extra.metadata.ls_model_name",
    "outputs.llm_output.model_name",
    "name",
];
const LLM_SHAPE_KEYS: &[&str] = &[
    "inputs.messages",
    "inputs.prompt",
    "inputs.prompts",
    "outputs.generations",
];

// ---------------------------------------------------------------------------
// RunNames: name-substring classification lists
// ---------------------------------------------------------------------------

/// Case-insensitive run-name fragments used when a run carries no usable
/// `run_type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunNames {
    pub llm: Vec<String>,
    pub retriever: Vec<String>,
}

impl Default for RunNames {
    fn default() -> Self {
        let owned = |names: &[&str]| -> Vec<String> {
            names.iter().map(|s| (*s).to_owned()).collect()
        };
        Self {
            llm: owned(&[
                "chatopenai",
                "openai",
                "anthropic",
                "llm",
                "gpt",
                "claude",
                "gemini",
                "mistral",
                "ollama",
                "bedrock",
                "cohere",
            ]),
            retriever: owned(&["retriever", "vectorstore", "vector_store"]),
        }
    }
}

// ---------------------------------------------------------------------------
// RunExport: the export container, resolved once
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum RunExport<'a> {
    Runs(&'a [Value]),
    Run(&'a Value),
}

impl<'a> RunExport<'a> {
    fn resolve(value: &'a Value) -> Self {
        if let Value::Array(items) = value {
            return Self::Runs(items);
        }
        if let Some(runs) = value.get("runs").and_then(Value::as_array) {
            return Self::Runs(runs);
        }
        match field(value, "run") {
            Some(run) => Self::Run(run),
            None => Self::Run(value),
        }
    }

    fn top_level(self) -> &'a [Value] {
        match self {
            Self::Runs(items) => items,
            Self::Run(run) => std::slice::from_ref(run),
        }
    }
}

fn run_id_of(run: &Value) -> Option<String> {
    first_present(run, &["id", "run_id"]).and_then(id_of)
}

/// Flattens nested runs into an arena in pre-order, then links top-level runs
/// of flat exports through `parent_run_id`.
fn flatten(top_level: &[Value]) -> (Vec<&Value>, Vec<Option<usize>>) {
    let mut nodes: Vec<&Value> = Vec::new();
    let mut parents: Vec<Option<usize>> = Vec::new();
    let mut stack: Vec<(&Value, Option<usize>)> =
        top_level.iter().rev().map(|run| (run, None)).collect();

    while let Some((run, parent)) = stack.pop() {
        if !run.is_object() {
            continue;
        }
        let index = nodes.len();
        nodes.push(run);
        parents.push(parent);
        for key in CHILD_KEYS.iter().rev() {
            if let Some(children) = run.get(*key).and_then(Value::as_array) {
                stack.extend(children.iter().rev().map(|child| (child, Some(index))));
            }
        }
    }

    let mut by_id: HashMap<String, usize> = HashMap::with_capacity(nodes.len());
    for (i, run) in nodes.iter().enumerate() {
        if let Some(id) = run_id_of(run) {
            by_id.entry(id).or_insert(i);
        }
    }
    for (i, parent) in parents.iter_mut().enumerate() {
        if parent.is_none() {
            *parent = field(nodes[i], "parent_run_id")
                .and_then(id_of)
                .and_then(|pid| by_id.get(&pid).copied());
        }
    }

    (nodes, parents)
}

// ---------------------------------------------------------------------------
// LangSmithAdapter
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct LangSmithAdapter {
    names: RunNames,
}

impl LangSmithAdapter {
    pub fn new(names: RunNames) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &RunNames {
        &self.names
    }

    /// `run_type` first, then the run name, then LLM-shaped inputs/outputs.
    /// A `run_type` outside the known labels (`parser`, `prompt`, ...) is
    /// final and classifies as unknown.
    fn classify(&self, run: &Value) -> SpanType {
        if let Some(label) = field(run, "run_type")
            .and_then(Value::as_str)
            .filter(|label| !label.trim().is_empty())
        {
            return SpanType::from_label(label).unwrap_or(SpanType::Unknown);
        }

        let name = field(run, "name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !name.is_empty() {
            if name_matches(&name, &self.names.retriever) {
                return SpanType::Retriever;
            }
            if name_matches(&name, &self.names.llm) {
                return SpanType::Llm;
            }
        }

        if first_present(run, LLM_SHAPE_KEYS).is_some() {
            SpanType::Llm
        } else {
            SpanType::Unknown
        }
    }

    fn build_record(
        &self,
        tree: &TraceTree<&Value>,
        index: usize,
        kind: SpanType,
        trace_id: &str,
        chunks: Vec<ContextChunk>,
    ) -> Record {
        let run = *tree.node(index);
        let inputs = field(run, "inputs");
        let outputs = field(run, "outputs").filter(|o| !is_blank(o));

        let messages = inputs
            .and_then(|i| field(i, "messages"))
            .map(parse_messages)
            .unwrap_or_default();
        let latency = latency_of(run);

        let input = RecordInput {
            prompt: prompt_of(inputs, &messages),
            system_prompt: system_message(&messages).map(|m| m.content.clone()),
            context_chunks: chunks,
        };
        let outputs: Vec<ModelOutput> = outputs
            .map(|out| ModelOutput {
                model_id: first_str(run, MODEL_KEYS)
                    .map(ModelId::new)
                    .unwrap_or_else(ModelId::unknown),
                text: response_of(out),
                token_usage: token_usage_of(run),
                latency_ms: latency.unwrap_or_default(),
                finish_reason: finish_reason_of(out),
            })
            .into_iter()
            .collect();

        let run_id = run_id_of(run);
        let parent_id = field(run, "parent_run_id").and_then(id_of).or_else(|| {
            tree.parent(index)
                .and_then(|parent| run_id_of(tree.node(parent)))
        });
        let original_attributes: Option<Map<String, Value>> = run.as_object().map(|obj| {
            obj.iter()
                .filter(|(key, _)| !CHILD_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        });

        let metadata = TraceMetadata {
            trace_id: TraceId::new(trace_id),
            span_id: SpanId::new(run_id.clone().unwrap_or_default()),
            parent_id: parent_id.map(SpanId::new),
            span_type: kind,
            source: TraceSource::Langsmith,
            session_id: first_str(run, &["session_id"]),
            error: first_str(run, &["error"]),
            latency_ms: latency,
            original_attributes,
        };

        let created_at = field(run, "start_time")
            .and_then(timestamp_of)
            .unwrap_or_else(Utc::now);

        Record::new(
            run_id.map(RecordId::new).unwrap_or_else(RecordId::generate),
            created_at,
            input,
            outputs,
        )
        .with_tags(string_list(field(run, "tags")))
        .with_trace_metadata(metadata)
        .with_feedback(feedback_of(run))
    }
}

impl TraceAdapter for LangSmithAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::LangSmith
    }

    fn detect(&self, value: &Value) -> bool {
        is_langsmith_export(value)
    }

    fn normalize(&self, value: &Value) -> Result<Vec<Record>, NormalizeError> {
        let (runs, parents) = flatten(RunExport::resolve(value).top_level());
        if runs.is_empty() {
            return Err(NormalizeError::UnsupportedShape {
                adapter: ADAPTER,
                reason: "export contains no runs".to_owned(),
            });
        }

        let kinds: Vec<SpanType> = runs.iter().map(|run| self.classify(run)).collect();
        let tree = TraceTree::new(runs, parents);
        let mut root_keys: HashMap<usize, String> = HashMap::new();
        let trace_keys: Vec<String> = (0..tree.len())
            .map(|i| {
                let root = tree.root_of(i);
                root_keys
                    .entry(root)
                    .or_insert_with(|| trace_key(&tree, root))
                    .clone()
            })
            .collect();

        let mut context: HashMap<&str, Vec<ContextChunk>> = HashMap::new();
        for (i, kind) in kinds.iter().enumerate() {
            if *kind != SpanType::Retriever {
                continue;
            }
            let run = *tree.node(i);
            let docs = field(run, "outputs")
                .and_then(documents_in)
                .unwrap_or_default();
            let prefix = run_id_of(run).unwrap_or_else(|| format!("retriever-{i}"));
            context
                .entry(trace_keys[i].as_str())
                .or_default()
                .extend(chunks_from_documents(docs, &prefix));
        }

        let mut targets = tree.leaf_matches(|i| kinds[i] == SpanType::Llm);
        if targets.is_empty() {
            targets = tree.roots();
        }
        debug!(
            runs = tree.len(),
            records = targets.len(),
            traces = context.len(),
            "normalizing langsmith export"
        );

        Ok(targets
            .into_iter()
            .map(|i| {
                let trace_id = trace_keys[i].as_str();
                let chunks = context.get(trace_id).cloned().unwrap_or_default();
                self.build_record(&tree, i, kinds[i], trace_id, chunks)
            })
            .collect())
    }
}

/// One key per tree: the root's `trace_id`, else the root run id, else the
/// first `trace_id` found below the root.
fn trace_key(tree: &TraceTree<&Value>, root: usize) -> String {
    let node = *tree.node(root);
    field(node, "trace_id")
        .and_then(id_of)
        .or_else(|| run_id_of(node))
        .or_else(|| {
            tree.descendants(root)
                .into_iter()
                .find_map(|i| field(tree.node(i), "trace_id").and_then(id_of))
        })
        .unwrap_or_else(|| format!("trace-{root}"))
}

// ---------------------------------------------------------------------------
// Field extraction
// ---------------------------------------------------------------------------

fn prompt_of(inputs: Option<&Value>, messages: &[ChatMessage]) -> String {
    let Some(inputs) = inputs.filter(|i| !is_blank(i)) else {
        return String::new();
    };
    if let Some(message) = prompt_message(messages) {
        return message.content.clone();
    }
    if let Some(prompt) = field(inputs, "prompt") {
        if let Some(text) = prompt.as_str() {
            return text.to_owned();
        }
        if let Some(text) = first_str(prompt, &["template", "text"]) {
            return text;
        }
    }
    if let Some(first) = path(inputs, "prompts")
        .and_then(Value::as_array)
        .and_then(|prompts| prompts.first())
        .and_then(Value::as_str)
    {
        return first.to_owned();
    }
    if let Some(value) = first_present(inputs, &["input", "question", "query"]) {
        return text_of(value);
    }
    text_of(inputs)
}

/// `generations` may be batch-nested (`[[gen]]`) or flat (`[gen]`).
fn first_generation(outputs: &Value) -> Option<&Value> {
    match field(outputs, "generations")?.as_array()?.first()? {
        Value::Array(batch) => batch.first(),
        generation => Some(generation),
    }
}

fn response_of(outputs: &Value) -> String {
    if let Some(generation) = first_generation(outputs) {
        if let Some(text) = first_str(generation, &["text"]) {
            return text;
        }
        let content = first_present(
            generation,
            &["message.content", "message.kwargs.content", "message.data.content"],
        )
        .map(content_text)
        .filter(|text| !text.is_empty());
        if let Some(content) = content {
            return content;
        }
    }
    if let Some(content) = first_present(outputs, &["message.content", "message.kwargs.content"]) {
        return content_text(content);
    }
    if let Some(value) = first_present(outputs, &["output", "text", "answer", "response"]) {
        return text_of(value);
    }
    text_of(outputs)
}

fn finish_reason_of(outputs: &Value) -> Option<String> {
    first_generation(outputs).and_then(|generation| {
        first_str(
            generation,
            &[
                "generation_info.finish_reason",
                "message.response_metadata.finish_reason",
                "message.kwargs.response_metadata.finish_reason",
            ],
        )
    })
}

fn counts_in(value: &Value, prompt_key: &str, completion_key: &str) -> Option<TokenUsage> {
    let prompt = first_u64(value, &[prompt_key]);
    let completion = first_u64(value, &[completion_key]);
    let total = first_u64(value, &["total_tokens"]);
    if prompt.is_none() && completion.is_none() && total.is_none() {
        return None;
    }
    Some(TokenUsage::from_parts(prompt, completion, total))
}

/// Run-level counts, then `llm_output.token_usage`, then `usage_metadata`.
fn token_usage_of(run: &Value) -> TokenUsage {
    counts_in(run, "prompt_tokens", "completion_tokens")
        .or_else(|| {
            path(run, "outputs.llm_output.token_usage")
                .and_then(|usage| counts_in(usage, "prompt_tokens", "completion_tokens"))
        })
        .or_else(|| {
            path(run, "outputs.usage_metadata")
                .and_then(|usage| counts_in(usage, "input_tokens", "output_tokens"))
        })
        .unwrap_or_default()
}

fn latency_of(run: &Value) -> Option<LatencyMs> {
    if let Some(ms) = first_number(run, &["latency"]) {
        return Some(LatencyMs::from_f64(ms));
    }
    let start = field(run, "start_time").and_then(timestamp_of)?;
    let end = field(run, "end_time").and_then(timestamp_of)?;
    Some(LatencyMs::from_f64((end - start).num_milliseconds() as f64))
}

fn correction_text(correction: &Value) -> String {
    match correction {
        Value::Object(_) => first_present(correction, &["output", "text", "content", "answer"])
            .map(text_of)
            .unwrap_or_else(|| text_of(correction)),
        other => text_of(other),
    }
}

fn feedback_of(run: &Value) -> HumanFeedback {
    let entries: &[Value] = field(run, "feedback")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let corrected_text = entries
        .iter()
        .find_map(|entry| field(entry, "correction"))
        .map(correction_text)
        .filter(|text| !text.trim().is_empty());

    let comments: Vec<String> = entries
        .iter()
        .filter_map(|entry| {
            let comment = field(entry, "comment")?.as_str()?.trim();
            if comment.is_empty() {
                return None;
            }
            let key = first_str(entry, &["key"]).unwrap_or_else(|| "feedback".to_owned());
            Some(format!("[{key}] {comment}"))
        })
        .collect();

    HumanFeedback {
        corrected_text,
        comments: (!comments.is_empty()).then(|| comments.join("\n")),
        ..HumanFeedback::default()
    }
}

#[cfg(test)]
mod tests;
