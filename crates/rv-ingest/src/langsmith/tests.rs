use super::*;
use rv_core::core::ReviewStatus;
use serde_json::json;

fn rag_trace() -> Value {
    json!({
        "id": "root",
        "name": "RetrievalQA",
        "run_type": "chain",
        "start_time": "2026-03-01T12:00:00Z",
        "inputs": {"question": "What is the capital of France?"},
        "outputs": {"answer": "Paris"},
        "child_runs": [
            {
                "id": "ret",
                "name": "VectorStoreRetriever",
                "run_type": "retriever",
                "inputs": {"query": "capital of France"},
                "outputs": {
                    "documents": [
                        {"page_content": "Paris is the capital of France.", "metadata": {"source": "a.md", "score": 0.9}},
                        {"page_content": "France is in Europe.", "metadata": {"source": "b.md"}}
                    ]
                }
            },
            {
                "id": "llm-1",
                "name": "ChatOpenAI",
                "run_type": "llm",
                "start_time": "2026-03-01T12:00:01Z",
                "end_time": "2026-03-01T12:00:02.500Z",
                "extra": {"invocation_params": {"model": "gpt-4o-mini"}},
                "inputs": {
                    "messages": [[
                        {"type": "system", "data": {"content": "Answer from context."}},
                        {"type": "human", "data": {"content": "What is the capital of France?"}}
                    ]]
                },
                "outputs": {
                    "generations": [[
                        {"text": "Paris.", "generation_info": {"finish_reason": "stop"}}
                    ]],
                    "llm_output": {
                        "token_usage": {"prompt_tokens": 10, "completion_tokens": 5},
                        "model_name": "gpt-4o-mini-2024"
                    }
                }
            }
        ]
    })
}

fn llm_run(id: &str, text: &str) -> Value {
    json!({
        "id": id,
        "run_type": "llm",
        "inputs": {"prompts": [format!("prompt for {id}")]},
        "outputs": {"generations": [[{"text": text}]]}
    })
}

// -- Leaf extraction --

#[test]
fn test_rag_trace_yields_one_record_with_context() {
    let records = LangSmithAdapter::default().normalize(&rag_trace()).unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.id.as_str(), "llm-1");
    assert_eq!(record.status, ReviewStatus::Pending);
    assert_eq!(record.input.prompt, "What is the capital of France?");
    assert_eq!(
        record.input.system_prompt.as_deref(),
        Some("Answer from context.")
    );

    let chunks = &record.input.context_chunks;
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].id, "ret-0");
    assert_eq!(chunks[0].text, "Paris is the capital of France.");
    assert_eq!(chunks[0].source, "a.md");
    assert_eq!(chunks[0].score, 0.9);
    assert_eq!(chunks[1].source, "b.md");
    assert_eq!(chunks[1].score, 0.0);

    let output = &record.outputs[0];
    assert_eq!(output.text, "Paris.");
    assert_eq!(output.model_id.as_str(), "gpt-4o-mini");
    assert_eq!(output.token_usage.total_tokens, 15);
    assert_eq!(output.latency_ms.value(), 1500);
    assert_eq!(output.finish_reason.as_deref(), Some("stop"));
}

#[test]
fn test_trace_metadata_for_leaf() {
    let records = LangSmithAdapter::default().normalize(&rag_trace()).unwrap();

    let meta = records[0].trace_metadata.as_ref().unwrap();
    assert_eq!(meta.trace_id.as_str(), "root");
    assert_eq!(meta.span_id.as_str(), "llm-1");
    assert_eq!(meta.parent_id.as_ref().map(SpanId::as_str), Some("root"));
    assert_eq!(meta.span_type, SpanType::Llm);
    assert_eq!(meta.source, TraceSource::Langsmith);
    assert_eq!(meta.latency_ms, Some(LatencyMs::new(1500)));
    assert_eq!(
        records[0].created_at.to_rfc3339(),
        "2026-03-01T12:00:01+00:00"
    );
}

#[test]
fn test_nested_llm_only_innermost_becomes_record() {
    let mut outer = llm_run("outer", "outer text");
    outer["child_runs"] = json!([llm_run("inner", "inner text")]);
    let trace = json!({"id": "chain", "run_type": "chain", "child_runs": [outer]});

    let records = LangSmithAdapter::default().normalize(&trace).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id.as_str(), "inner");
    assert_eq!(records[0].outputs[0].text, "inner text");
    assert_eq!(records[0].input.prompt, "prompt for inner");
}

#[test]
fn test_llm_with_llm_below_intermediate_chain_is_skipped() {
    let mut outer = llm_run("outer", "outer");
    outer["childRuns"] = json!([{
        "id": "mid",
        "run_type": "chain",
        "childRuns": [llm_run("inner", "inner")]
    }]);

    let records = LangSmithAdapter::default().normalize(&outer).unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["inner"]);
}

#[test]
fn test_sibling_llms_share_trace_context() {
    let trace = json!({
        "id": "t",
        "run_type": "chain",
        "child_runs": [
            llm_run("a", "first"),
            {
                "id": "r",
                "run_type": "retriever",
                "outputs": {"documents": [{"text": "shared doc"}]}
            },
            llm_run("b", "second")
        ]
    });

    let records = LangSmithAdapter::default().normalize(&trace).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id.as_str(), "a");
    assert_eq!(records[1].id.as_str(), "b");
    for record in &records {
        assert_eq!(record.input.context_chunks.len(), 1);
        assert_eq!(record.input.context_chunks[0].text, "shared doc");
    }
}

#[test]
fn test_context_reaches_leaf_without_trace_id() {
    let trace = json!({
        "id": "root",
        "trace_id": "T",
        "run_type": "chain",
        "child_runs": [
            {
                "id": "r",
                "trace_id": "T",
                "run_type": "retriever",
                "outputs": {"documents": [{"text": "doc"}]}
            },
            llm_run("l", "answer")
        ]
    });

    let records = LangSmithAdapter::default().normalize(&trace).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].input.context_chunks.len(), 1);
    assert_eq!(records[0].trace_metadata.as_ref().unwrap().trace_id.as_str(), "T");
}

#[test]
fn test_trace_id_below_untagged_root_keys_whole_tree() {
    let trace = json!({
        "run_type": "chain",
        "child_runs": [
            {
                "id": "r",
                "run_type": "retriever",
                "outputs": {"documents": [{"text": "doc"}]}
            },
            {
                "id": "l",
                "trace_id": "T",
                "run_type": "llm",
                "inputs": {"prompts": ["q"]},
                "outputs": {"generations": [[{"text": "a"}]]}
            }
        ]
    });

    let records = LangSmithAdapter::default().normalize(&trace).unwrap();

    assert_eq!(records[0].input.context_chunks.len(), 1);
    assert_eq!(records[0].trace_metadata.as_ref().unwrap().trace_id.as_str(), "T");
}

#[test]
fn test_context_is_scoped_to_its_trace() {
    let first = json!({
        "id": "t1",
        "run_type": "chain",
        "child_runs": [
            {"id": "r1", "run_type": "retriever", "outputs": {"documents": [{"text": "one"}]}},
            llm_run("l1", "x")
        ]
    });
    let second = json!({
        "id": "t2",
        "run_type": "chain",
        "child_runs": [llm_run("l2", "y")]
    });

    let records = LangSmithAdapter::default()
        .normalize(&json!([first, second]))
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].input.context_chunks.len(), 1);
    assert!(records[1].input.context_chunks.is_empty());
}

#[test]
fn test_flat_runs_link_through_parent_run_id() {
    let export = json!({
        "runs": [
            {"id": "p", "run_type": "chain", "inputs": {"question": "q"}},
            {"id": "c", "run_type": "llm", "parent_run_id": "p", "inputs": {"prompt": "outer"}},
            {"id": "g", "run_type": "llm", "parent_run_id": "c", "inputs": {"prompt": "inner"}}
        ]
    });

    let records = LangSmithAdapter::default().normalize(&export).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id.as_str(), "g");
    assert_eq!(records[0].input.prompt, "inner");
    let meta = records[0].trace_metadata.as_ref().unwrap();
    assert_eq!(meta.trace_id.as_str(), "p");
    assert_eq!(meta.parent_id.as_ref().map(SpanId::as_str), Some("c"));
}

#[test]
fn test_without_llm_runs_each_root_is_converted() {
    let trace = json!({
        "id": "agent",
        "name": "AgentExecutor",
        "run_type": "chain",
        "inputs": {"question": "q?"},
        "outputs": {"answer": "a!"},
        "child_runs": [{"id": "tool", "run_type": "tool", "inputs": {"input": "x"}}]
    });

    let records = LangSmithAdapter::default().normalize(&trace).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id.as_str(), "agent");
    assert_eq!(records[0].input.prompt, "q?");
    assert_eq!(records[0].outputs[0].text, "a!");
    assert_eq!(records[0].outputs[0].model_id.as_str(), "AgentExecutor");
    assert_eq!(
        records[0].trace_metadata.as_ref().unwrap().span_type,
        SpanType::Chain
    );
}

#[test]
fn test_unmapped_run_type_is_not_an_llm() {
    let trace = json!({
        "id": "agent",
        "run_type": "chain",
        "child_runs": [
            llm_run("llm", "tool call"),
            {
                "id": "parser",
                "name": "OpenAIToolsAgentOutputParser",
                "run_type": "parser",
                "inputs": {"input": "tool call"},
                "outputs": {"output": "parsed"}
            },
            {
                "id": "prompt",
                "name": "ChatPromptTemplate",
                "run_type": "prompt",
                "inputs": {"prompt": "template"}
            }
        ]
    });

    let records = LangSmithAdapter::default().normalize(&trace).unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["llm"]);
}

#[test]
fn test_unmapped_run_type_root_is_unknown() {
    let run = json!({"id": "p", "name": "OpenAIOutputParser", "run_type": "parser"});

    let records = LangSmithAdapter::default().normalize(&run).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].trace_metadata.as_ref().unwrap().span_type,
        SpanType::Unknown
    );
}

#[test]
fn test_configured_names_classify_untyped_runs() {
    let trace = json!({
        "id": "root",
        "run_type": "chain",
        "child_runs": [
            {"id": "m", "name": "HouseModel", "inputs": {"question": "q"}, "outputs": {"answer": "a"}},
            {"id": "o", "name": "Formatter", "inputs": {"question": "q"}}
        ]
    });

    let default_records = LangSmithAdapter::default().normalize(&trace).unwrap();
    assert_eq!(default_records[0].id.as_str(), "root");

    let adapter = LangSmithAdapter::new(RunNames {
        llm: vec!["housemodel".to_owned()],
        retriever: Vec::new(),
    });
    let records = adapter.normalize(&trace).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id.as_str(), "m");
}

// -- Prompt and response priority --

#[test]
fn test_prompt_priority_chain() {
    let adapter = LangSmithAdapter::default();
    let prompt_of_run = |inputs: Value| {
        let run = json!({"id": "r", "run_type": "llm", "inputs": inputs});
        adapter.normalize(&run).unwrap().remove(0).input.prompt
    };

    assert_eq!(
        prompt_of_run(json!({"messages": [{"role": "system", "content": "s"}]})),
        "s"
    );
    assert_eq!(prompt_of_run(json!({"prompt": "direct"})), "direct");
    assert_eq!(
        prompt_of_run(json!({"prompt": {"template": "Say {x}"}})),
        "Say {x}"
    );
    assert_eq!(prompt_of_run(json!({"input": "from input"})), "from input");
    assert_eq!(prompt_of_run(json!({"query": "from query"})), "from query");
    assert_eq!(prompt_of_run(json!({"other": 1})), "{\"other\":1}");
    assert_eq!(prompt_of_run(json!({})), "");
}

#[test]
fn test_missing_inputs_give_empty_prompt_and_no_outputs() {
    let run = json!({"id": "r", "run_type": "llm", "outputs": null});

    let record = LangSmithAdapter::default().normalize(&run).unwrap().remove(0);

    assert_eq!(record.input.prompt, "");
    assert!(record.outputs.is_empty());
}

#[test]
fn test_response_priority_chain() {
    let adapter = LangSmithAdapter::default();
    let response_of_run = |outputs: Value| {
        let run = json!({"id": "r", "run_type": "llm", "outputs": outputs});
        adapter.normalize(&run).unwrap().remove(0).outputs[0].text.clone()
    };

    assert_eq!(
        response_of_run(json!({"generations": [{"text": "flat"}]})),
        "flat"
    );
    assert_eq!(
        response_of_run(json!({"generations": [[{
            "text": "",
            "message": {
                "lc": 1,
                "type": "constructor",
                "id": ["langchain", "schema", "messages", "AIMessage"],
                "kwargs": {"content": "from kwargs"}
            }
        }]]})),
        "from kwargs"
    );
    assert_eq!(
        response_of_run(json!({"message": {"content": "msg"}})),
        "msg"
    );
    assert_eq!(response_of_run(json!({"output": "out"})), "out");
    assert_eq!(response_of_run(json!({"response": "resp"})), "resp");
    assert_eq!(response_of_run(json!({"score": 3})), "{\"score\":3}");
}

// -- Usage, latency, feedback, metadata --

#[test]
fn test_usage_metadata_tokens_and_explicit_latency() {
    let run = json!({
        "id": "r",
        "run_type": "llm",
        "latency": 250,
        "outputs": {
            "generations": [[{"text": "t"}]],
            "usage_metadata": {"input_tokens": 7, "output_tokens": 3, "total_tokens": 11}
        }
    });

    let record = LangSmithAdapter::default().normalize(&run).unwrap().remove(0);

    let usage = &record.outputs[0].token_usage;
    assert_eq!(usage.prompt_tokens, 7);
    assert_eq!(usage.completion_tokens, 3);
    assert_eq!(usage.total_tokens, 11);
    assert_eq!(record.outputs[0].latency_ms.value(), 250);
}

#[test]
fn test_run_level_tokens_win() {
    let run = json!({
        "id": "r",
        "run_type": "llm",
        "prompt_tokens": 1,
        "completion_tokens": 2,
        "outputs": {
            "generations": [[{"text": "t"}]],
            "llm_output": {"token_usage": {"prompt_tokens": 50, "completion_tokens": 50}}
        }
    });

    let record = LangSmithAdapter::default().normalize(&run).unwrap().remove(0);

    assert_eq!(record.outputs[0].token_usage.total_tokens, 3);
}

#[test]
fn test_feedback_correction_and_comments() {
    let run = json!({
        "id": "r",
        "run_type": "llm",
        "inputs": {"prompt": "Capital of France?"},
        "outputs": {"generations": [[{"text": "Lyon"}]]},
        "feedback": [
            {"key": "correctness", "score": 0, "comment": "Wrong city", "correction": {"output": "Paris"}},
            {"key": "style", "comment": "Too terse"},
            {"key": "later", "correction": "ignored"}
        ]
    });

    let record = LangSmithAdapter::default().normalize(&run).unwrap().remove(0);

    let feedback = &record.human_feedback;
    assert_eq!(feedback.corrected_text.as_deref(), Some("Paris"));
    assert_eq!(
        feedback.comments.as_deref(),
        Some("[correctness] Wrong city\n[style] Too terse")
    );
    assert!(feedback.selected_model_id.is_none());
}

#[test]
fn test_tags_session_error_and_original_attributes() {
    let run = json!({
        "id": "r",
        "run_type": "llm",
        "tags": ["prod", "rag", "prod"],
        "session_id": "sess-9",
        "error": "RateLimitError",
        "inputs": {"prompt": "p"},
        "child_runs": []
    });

    let record = LangSmithAdapter::default().normalize(&run).unwrap().remove(0);

    assert_eq!(record.tags, Some(vec!["prod".to_owned(), "rag".to_owned()]));
    let meta = record.trace_metadata.unwrap();
    assert_eq!(meta.session_id.as_deref(), Some("sess-9"));
    assert_eq!(meta.error.as_deref(), Some("RateLimitError"));
    let original = meta.original_attributes.unwrap();
    assert!(original.contains_key("tags"));
    assert!(!original.contains_key("child_runs"));
}

#[test]
fn test_single_run_wrapper_is_accepted() {
    let export = json!({"run": llm_run("wrapped", "w")});

    let adapter = LangSmithAdapter::default();
    assert!(adapter.detect(&export));
    let records = adapter.normalize(&export).unwrap();

    assert_eq!(records[0].id.as_str(), "wrapped");
}

#[test]
fn test_empty_export_is_an_error() {
    let err = LangSmithAdapter::default()
        .normalize(&json!([]))
        .unwrap_err();

    assert!(matches!(
        err,
        NormalizeError::UnsupportedShape {
            adapter: "langsmith",
            ..
        }
    ));
}
