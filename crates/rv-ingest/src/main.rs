use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rv_core::core::{ModelId, ReviewStatus};
use rv_export::{
    export_dpo_pairs, export_finetune_examples, export_to_jsonl, ExportFilter,
};
use rv_ingest::bootstrap::{self, Runtime};
use rv_ingest::config::IngestConfig;
use rv_ingest::logging::init_logging;
use rv_ingest::ImportFailure;

#[derive(Parser)]
#[command(name = "rv", about = "Normalize LLM traces and logs into review records")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the configuration file. Built-in defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Import a JSON or JSONL file and write canonical records as JSONL.
    Import {
        file: PathBuf,
        /// Write records here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print only the summary.
        #[arg(long)]
        summary_only: bool,
    },
    /// Print the detected format of each unit in a file.
    Detect { file: PathBuf },
    /// Export reviewed records as training data.
    Export {
        file: PathBuf,
        #[arg(long, value_enum)]
        format: ExportFormat,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long)]
        model: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate configuration file and exit.
    Validate,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Dpo,
    Finetune,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Approved,
    Rejected,
    Modified,
}

impl From<StatusArg> for ReviewStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Self::Pending,
            StatusArg::Approved => Self::Approved,
            StatusArg::Rejected => Self::Rejected,
            StatusArg::Modified => Self::Modified,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match load_runtime(cli.config.as_deref()) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}", format!("Config invalid: {e:#}").red());
            return ExitCode::FAILURE;
        }
    };
    init_logging(&runtime.log_level, runtime.log_format);

    let outcome = match cli.command {
        Command::Import {
            file,
            output,
            summary_only,
        } => run_import(&runtime, &file, output.as_deref(), summary_only),
        Command::Detect { file } => run_detect(&runtime, &file),
        Command::Export {
            file,
            format,
            status,
            model,
            output,
        } => {
            let filter = ExportFilter {
                status: status.map(ReviewStatus::from),
                model_id: model.map(ModelId::new),
                ..ExportFilter::default()
            };
            run_export(&runtime, &file, format, &filter, output.as_deref())
        }
        Command::Validate => {
            let source = cli
                .config
                .as_deref()
                .map_or_else(|| "built-in defaults".to_owned(), |p| p.display().to_string());
            println!("{} {source}", "Config valid:".green());
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", format!("Error: {e:#}").red());
            ExitCode::FAILURE
        }
    }
}

fn load_runtime(path: Option<&Path>) -> anyhow::Result<Runtime> {
    let config = match path {
        Some(path) => IngestConfig::from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => IngestConfig::default(),
    };
    bootstrap::into_runtime(config)
}

fn write_output(path: Option<&Path>, body: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, body).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(body.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn print_failures(errors: &[ImportFailure]) {
    for failure in errors {
        eprintln!("  {}", failure.to_string().red());
    }
}

fn run_import(
    runtime: &Runtime,
    file: &Path,
    output: Option<&Path>,
    summary_only: bool,
) -> anyhow::Result<bool> {
    let result = runtime.importer.import_file(file);

    if !summary_only {
        write_output(output, &export_to_jsonl(&result.records)?)?;
    }

    let summary = format!(
        "Imported {} record(s) from {}",
        result.records_imported,
        file.display()
    );
    if result.success {
        eprintln!("{}", summary.green().bold());
    } else {
        eprintln!("{}", summary.yellow().bold());
    }
    if !result.errors.is_empty() {
        eprintln!("{}", format!("{} error(s):", result.errors.len()).red());
        print_failures(&result.errors);
    }
    Ok(result.success)
}

fn run_detect(runtime: &Runtime, file: &Path) -> anyhow::Result<bool> {
    let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let report = runtime.importer.detect_payload(&bytes);

    for (location, format) in &report.units {
        println!("{location}\t{}", format.as_str().cyan());
    }
    print_failures(&report.errors);
    Ok(!report.units.is_empty())
}

fn run_export(
    runtime: &Runtime,
    file: &Path,
    format: ExportFormat,
    filter: &ExportFilter,
    output: Option<&Path>,
) -> anyhow::Result<bool> {
    let result = runtime.importer.import_file(file);
    print_failures(&result.errors);

    let (count, body) = match format {
        ExportFormat::Dpo => {
            let pairs = export_dpo_pairs(&result.records, filter);
            (pairs.len(), export_to_jsonl(&pairs)?)
        }
        ExportFormat::Finetune => {
            let examples = export_finetune_examples(&result.records, filter);
            (examples.len(), export_to_jsonl(&examples)?)
        }
    };
    write_output(output, &body)?;

    eprintln!(
        "{}",
        format!(
            "Exported {count} example(s) from {} record(s)",
            result.records_imported
        )
        .green()
        .bold()
    );
    Ok(true)
}
