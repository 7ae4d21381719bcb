#![allow(dead_code)]

use serde_json::{json, Value};

use rv_ingest::import::ImportResult;
use rv_ingest::Importer;

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

pub fn import_value(importer: &Importer, value: &Value) -> ImportResult {
    importer.import_bytes(value.to_string().as_bytes())
}

pub fn jsonl(lines: &[Value]) -> String {
    lines.iter().map(|l| format!("{l}\n")).collect()
}

/// Wraps one attribute the way OTLP/JSON does.
pub fn otlp_kv(key: &str, value: &str) -> Value {
    json!({"key": key, "value": {"stringValue": value}})
}

// ---------------------------------------------------------------------------
// Fixtures, one per supported input shape
// ---------------------------------------------------------------------------

pub fn openai_finetune_line() -> Value {
    json!({
        "messages": [
            {"role": "system", "content": "You are a helpful assistant."},
            {"role": "user", "content": "What is 2 + 2?"},
            {"role": "assistant", "content": "4"}
        ]
    })
}

pub fn openai_completion() -> Value {
    json!({
        "id": "chatcmpl-abc",
        "object": "chat.completion",
        "created": 1_735_689_600,
        "model": "gpt-4o-mini",
        "messages": [{"role": "user", "content": "Name a prime number."}],
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "7"}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 6, "completion_tokens": 1, "total_tokens": 7}
    })
}

pub fn prompt_response() -> Value {
    json!({"prompt": "Translate 'hello' to French.", "response": "Bonjour", "model": "local"})
}

pub fn rag_nested() -> Value {
    json!({
        "input": {
            "prompt": "What does the policy say about refunds?",
            "context_chunks": [
                {"text": "Refunds are issued within 30 days.", "score": 0.82, "source": "policy.md"}
            ]
        },
        "output": "Within 30 days."
    })
}

pub fn langsmith_run() -> Value {
    json!({
        "id": "run-1",
        "name": "ChatOpenAI",
        "run_type": "llm",
        "inputs": {"prompts": ["Summarize: the meeting moved to Friday."]},
        "outputs": {"generations": [[{"text": "Meeting is Friday."}]]}
    })
}

/// chain -> (retriever with two documents, llm)
pub fn langsmith_rag_tree() -> Value {
    json!({
        "id": "chain",
        "name": "RetrievalQA",
        "run_type": "chain",
        "inputs": {"question": "Who maintains the billing service?"},
        "child_runs": [
            {
                "id": "retriever",
                "name": "VectorStoreRetriever",
                "run_type": "retriever",
                "outputs": {"documents": [
                    {"page_content": "Billing is owned by team Ledger.", "metadata": {"source": "owners.md"}, "score": 0.91},
                    {"page_content": "Ledger's on-call rotates weekly.", "metadata": {"source": "oncall.md"}, "score": 0.47}
                ]}
            },
            {
                "id": "llm",
                "name": "ChatOpenAI",
                "run_type": "llm",
                "inputs": {"prompts": ["Who maintains the billing service?"]},
                "outputs": {"generations": [[{"text": "Team Ledger."}]]}
            }
        ]
    })
}

/// An LLM run wrapping another LLM run.
pub fn langsmith_nested_llm() -> Value {
    json!({
        "id": "outer",
        "name": "ChatAnthropic",
        "run_type": "llm",
        "inputs": {"prompts": ["outer prompt"]},
        "outputs": {"generations": [[{"text": "outer answer"}]]},
        "child_runs": [{
            "id": "inner",
            "name": "ChatAnthropic",
            "run_type": "llm",
            "inputs": {"prompts": ["inner prompt"]},
            "outputs": {"generations": [[{"text": "inner answer"}]]}
        }]
    })
}

/// An LLM span wrapping another LLM span in OTLP resourceSpans form.
pub fn otel_nested_llm() -> Value {
    json!({
        "resourceSpans": [{
            "scopeSpans": [{
                "spans": [
                    {
                        "traceId": "4bf92f3577b34da6a3ce929d0e0e4736",
                        "spanId": "00f067aa0ba902b7",
                        "name": "chat gpt-4o",
                        "attributes": [
                            otlp_kv("gen_ai.prompt", "outer prompt"),
                            otlp_kv("gen_ai.completion", "outer answer")
                        ]
                    },
                    {
                        "traceId": "4bf92f3577b34da6a3ce929d0e0e4736",
                        "spanId": "b7ad6b7169203331",
                        "parentSpanId": "00f067aa0ba902b7",
                        "name": "chat gpt-4o",
                        "attributes": [
                            otlp_kv("gen_ai.prompt", "inner prompt"),
                            otlp_kv("gen_ai.completion", "inner answer")
                        ]
                    }
                ]
            }]
        }]
    })
}
