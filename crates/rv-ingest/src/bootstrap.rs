use std::sync::Arc;

use anyhow::{ensure, Context};

use crate::config::{IngestConfig, LangSmithConfig, OtelConfig};
use crate::import::Importer;
use crate::langsmith::{LangSmithAdapter, RunNames};
use crate::logging::LogFormat;
use crate::otel::{OtelAdapter, SemanticMapping};
use crate::registry::AdapterRegistry;

// ---------------------------------------------------------------------------
// Runtime: fully validated runtime configuration
// ---------------------------------------------------------------------------

pub struct Runtime {
    pub importer: Importer,
    pub mapping: Arc<SemanticMapping>,
    pub log_level: String,
    pub log_format: LogFormat,
}

// ---------------------------------------------------------------------------
// into_runtime: converts raw IngestConfig into a validated Runtime
// ---------------------------------------------------------------------------

pub fn into_runtime(config: IngestConfig) -> Result<Runtime, anyhow::Error> {
    ensure!(config.import.max_bytes > 0, "import.max_bytes must be positive");

    let log_format = LogFormat::parse(&config.logging.format)
        .with_context(|| format!("unknown log format: {}", config.logging.format))?;

    // Empty keys would match every attribute or run name.
    for (label, keys) in config.otel.mapping.lists() {
        ensure!(
            keys.iter().all(|k| !k.trim().is_empty()),
            "otel.{label} contains an empty key"
        );
    }
    for (label, names) in [
        ("llm_run_names", &config.langsmith.llm_run_names),
        ("retriever_run_names", &config.langsmith.retriever_run_names),
    ] {
        ensure!(
            names.iter().flatten().all(|n| !n.trim().is_empty()),
            "langsmith.{label} contains an empty name"
        );
    }

    let mapping = Arc::new(build_mapping(&config.otel));
    let registry = AdapterRegistry::with_adapters(vec![
        Box::new(OtelAdapter::with_shared(Arc::clone(&mapping))),
        Box::new(LangSmithAdapter::new(build_run_names(config.langsmith))),
    ]);

    Ok(Runtime {
        importer: Importer::new(registry, config.import.max_bytes),
        mapping,
        log_level: config.logging.level,
        log_format,
    })
}

fn build_mapping(otel: &OtelConfig) -> SemanticMapping {
    if otel.replace_defaults {
        SemanticMapping::default().apply(&otel.mapping)
    } else {
        SemanticMapping::default().extend(&otel.mapping)
    }
}

fn build_run_names(config: LangSmithConfig) -> RunNames {
    let defaults = RunNames::default();
    RunNames {
        llm: config.llm_run_names.unwrap_or(defaults.llm),
        retriever: config.retriever_run_names.unwrap_or(defaults.retriever),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
