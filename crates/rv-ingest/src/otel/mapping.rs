//! Semantic-convention mapping table for OpenTelemetry spans.
//!
//! Instrumentation libraries disagree on attribute names (GenAI semconv,
//! OpenInference, Traceloop, Langfuse, Vercel AI SDK). Every concept is an
//! ordered list of candidate keys; the first present key wins.

use serde::{Deserialize, Serialize};

fn owned(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| (*k).to_owned()).collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAttributes {
    pub input: Vec<String>,
    pub output: Vec<String>,
    pub total: Vec<String>,
}

impl Default for TokenAttributes {
    fn default() -> Self {
        Self {
            input: owned(&[
                "gen_ai.usage.input_tokens",
                "gen_ai.usage.prompt_tokens",
                "llm.token_count.prompt",
                "llm.usage.prompt_tokens",
                "ai.usage.promptTokens",
            ]),
            output: owned(&[
                "gen_ai.usage.output_tokens",
                "gen_ai.usage.completion_tokens",
                "llm.token_count.completion",
                "llm.usage.completion_tokens",
                "ai.usage.completionTokens",
            ]),
            total: owned(&[
                "gen_ai.usage.total_tokens",
                "llm.token_count.total",
                "llm.usage.total_tokens",
            ]),
        }
    }
}

/// Candidate attribute keys per extracted concept, plus the span-name
/// fragments used to classify spans that carry no kind attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticMapping {
    pub prompt_attributes: Vec<String>,
    pub response_attributes: Vec<String>,
    pub model_attributes: Vec<String>,
    pub token_attributes: TokenAttributes,
    pub system_prompt_attributes: Vec<String>,
    pub document_attributes: Vec<String>,
    pub session_attributes: Vec<String>,
    pub finish_reason_attributes: Vec<String>,
    pub span_kind_attributes: Vec<String>,
    pub llm_span_names: Vec<String>,
    pub retriever_span_names: Vec<String>,
}

impl Default for SemanticMapping {
    fn default() -> Self {
        Self {
            prompt_attributes: owned(&[
                "gen_ai.prompt",
                "gen_ai.input.messages",
                "llm.prompts",
                "llm.input_messages",
                "input.value",
                "traceloop.entity.input",
                "langfuse.observation.input",
                "ai.prompt.messages",
                "ai.prompt",
            ]),
            response_attributes: owned(&[
                "gen_ai.completion",
                "gen_ai.output.messages",
                "llm.completions",
                "llm.output_messages",
                "output.value",
                "traceloop.entity.output",
                "langfuse.observation.output",
                "ai.response.text",
            ]),
            model_attributes: owned(&[
                "gen_ai.response.model",
                "gen_ai.request.model",
                "llm.model_name",
                "langfuse.observation.model.name",
                "ai.model.id",
            ]),
            token_attributes: TokenAttributes::default(),
            system_prompt_attributes: owned(&[
                "gen_ai.system_instructions",
                "gen_ai.system_prompt",
                "llm.system_prompt",
            ]),
            document_attributes: owned(&[
                "retrieval.documents",
                "gen_ai.retrieval.documents",
                "output.value",
            ]),
            session_attributes: owned(&[
                "session.id",
                "gen_ai.conversation.id",
                "langfuse.session.id",
                "traceloop.association.properties.session_id",
            ]),
            finish_reason_attributes: owned(&[
                "gen_ai.response.finish_reasons",
                "gen_ai.response.finish_reason",
                "llm.finish_reason",
            ]),
            span_kind_attributes: owned(&[
                "openinference.span.kind",
                "traceloop.span.kind",
                "langfuse.observation.type",
                "gen_ai.operation.name",
            ]),
            llm_span_names: owned(&[
                "chat",
                "completion",
                "llm",
                "generate",
                "openai",
                "anthropic",
                "gpt",
                "claude",
                "gemini",
            ]),
            retriever_span_names: owned(&["retriev", "vectorstore", "vector_search"]),
        }
    }
}

// ---------------------------------------------------------------------------
// MappingOverride: partial mapping from config
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenOverride {
    pub input: Option<Vec<String>>,
    pub output: Option<Vec<String>>,
    pub total: Option<Vec<String>>,
}

/// A partial mapping. `None` lists leave the base mapping untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MappingOverride {
    pub prompt_attributes: Option<Vec<String>>,
    pub response_attributes: Option<Vec<String>>,
    pub model_attributes: Option<Vec<String>>,
    pub token_attributes: Option<TokenOverride>,
    pub system_prompt_attributes: Option<Vec<String>>,
    pub document_attributes: Option<Vec<String>>,
    pub session_attributes: Option<Vec<String>>,
    pub finish_reason_attributes: Option<Vec<String>>,
    pub span_kind_attributes: Option<Vec<String>>,
    pub llm_span_names: Option<Vec<String>>,
    pub retriever_span_names: Option<Vec<String>>,
}

impl MappingOverride {
    /// Every key list this override sets, labelled for validation messages.
    pub fn lists(&self) -> Vec<(&'static str, &[String])> {
        let mut candidates: Vec<(&'static str, &Option<Vec<String>>)> = vec![
            ("prompt_attributes", &self.prompt_attributes),
            ("response_attributes", &self.response_attributes),
            ("model_attributes", &self.model_attributes),
            ("system_prompt_attributes", &self.system_prompt_attributes),
            ("document_attributes", &self.document_attributes),
            ("session_attributes", &self.session_attributes),
            ("finish_reason_attributes", &self.finish_reason_attributes),
            ("span_kind_attributes", &self.span_kind_attributes),
            ("llm_span_names", &self.llm_span_names),
            ("retriever_span_names", &self.retriever_span_names),
        ];
        if let Some(tokens) = &self.token_attributes {
            candidates.push(("token_attributes.input", &tokens.input));
            candidates.push(("token_attributes.output", &tokens.output));
            candidates.push(("token_attributes.total", &tokens.total));
        }
        candidates
            .into_iter()
            .filter_map(|(label, list)| list.as_deref().map(|list| (label, list)))
            .collect()
    }
}

fn replace(target: &mut Vec<String>, source: &Option<Vec<String>>) {
    if let Some(list) = source {
        target.clone_from(list);
    }
}

fn append(target: &mut Vec<String>, source: &Option<Vec<String>>) {
    for key in source.iter().flatten() {
        if !target.contains(key) {
            target.push(key.clone());
        }
    }
}

impl SemanticMapping {
    /// Replaces each list the override sets.
    pub fn apply(mut self, over: &MappingOverride) -> Self {
        self.merge(over, replace);
        self
    }

    /// Appends the override's keys after the existing candidates.
    pub fn extend(mut self, over: &MappingOverride) -> Self {
        self.merge(over, append);
        self
    }

    fn merge(&mut self, over: &MappingOverride, op: fn(&mut Vec<String>, &Option<Vec<String>>)) {
        op(&mut self.prompt_attributes, &over.prompt_attributes);
        op(&mut self.response_attributes, &over.response_attributes);
        op(&mut self.model_attributes, &over.model_attributes);
        op(&mut self.system_prompt_attributes, &over.system_prompt_attributes);
        op(&mut self.document_attributes, &over.document_attributes);
        op(&mut self.session_attributes, &over.session_attributes);
        op(&mut self.finish_reason_attributes, &over.finish_reason_attributes);
        op(&mut self.span_kind_attributes, &over.span_kind_attributes);
        op(&mut self.llm_span_names, &over.llm_span_names);
        op(&mut self.retriever_span_names, &over.retriever_span_names);
        if let Some(tokens) = &over.token_attributes {
            op(&mut self.token_attributes.input, &tokens.input);
            op(&mut self.token_attributes.output, &tokens.output);
            op(&mut self.token_attributes.total, &tokens.total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_major_conventions() {
        let mapping = SemanticMapping::default();

        assert_eq!(mapping.prompt_attributes[0], "gen_ai.prompt");
        assert!(mapping.prompt_attributes.contains(&"input.value".to_owned()));
        assert!(mapping
            .span_kind_attributes
            .contains(&"openinference.span.kind".to_owned()));
        assert!(mapping
            .token_attributes
            .input
            .contains(&"llm.token_count.prompt".to_owned()));
    }

    #[test]
    fn test_apply_replaces_only_given_lists() {
        let over = MappingOverride {
            prompt_attributes: Some(vec!["my.prompt".to_owned()]),
            token_attributes: Some(TokenOverride {
                total: Some(vec!["my.total".to_owned()]),
                ..TokenOverride::default()
            }),
            ..MappingOverride::default()
        };

        let mapping = SemanticMapping::default().apply(&over);

        assert_eq!(mapping.prompt_attributes, vec!["my.prompt".to_owned()]);
        assert_eq!(mapping.token_attributes.total, vec!["my.total".to_owned()]);
        assert_eq!(
            mapping.response_attributes,
            SemanticMapping::default().response_attributes
        );
        assert_eq!(
            mapping.token_attributes.input,
            TokenAttributes::default().input
        );
    }

    #[test]
    fn test_extend_appends_without_duplicates() {
        let over = MappingOverride {
            prompt_attributes: Some(vec!["vendor.prompt".to_owned(), "gen_ai.prompt".to_owned()]),
            ..MappingOverride::default()
        };

        let mapping = SemanticMapping::default().extend(&over);
        let defaults = SemanticMapping::default().prompt_attributes;

        assert_eq!(mapping.prompt_attributes.len(), defaults.len() + 1);
        assert_eq!(mapping.prompt_attributes[0], "gen_ai.prompt");
        assert_eq!(
            mapping.prompt_attributes.last().map(String::as_str),
            Some("vendor.prompt")
        );
    }

    #[test]
    fn test_override_lists_are_labelled() {
        let over = MappingOverride {
            model_attributes: Some(vec![String::new()]),
            token_attributes: Some(TokenOverride {
                input: Some(vec!["x".to_owned()]),
                ..TokenOverride::default()
            }),
            ..MappingOverride::default()
        };

        let labels: Vec<&str> = over.lists().into_iter().map(|(label, _)| label).collect();

        assert_eq!(labels, vec!["model_attributes", "token_attributes.input"]);
    }

    #[test]
    fn test_mapping_serializes_camel_case() {
        let json = serde_json::to_value(SemanticMapping::default()).unwrap();
        assert!(json.get("promptAttributes").is_some());
        assert!(json.get("tokenAttributes").and_then(|t| t.get("input")).is_some());
    }
}
