//! triplenest command-line runner
//!
//! Executes a JSON chain description against canned fixture results and
//! streams the nested output as JSON or as a trace.

mod output;

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;
use tracing::info;

use output::{Output, OutputFormat};
use triplenest_core::{
    ExecutionConfig, FailurePolicy, FieldMapping, JsonCollector, JsonWriter, MemoryExecutor,
    NestedQuery, PivotOrder, TraceCollector,
};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// triplenest query chain runner
#[derive(Parser, Debug)]
#[command(name = "triplenest")]
#[command(version, about = "Run nested query chains and stream nested JSON")]
pub struct Args {
    /// Chain description (JSON)
    #[arg(short, long)]
    pub chain: PathBuf,

    /// Canned query results (JSON)
    #[arg(long)]
    pub fixtures: PathBuf,

    /// Output format
    #[arg(long, default_value = "json", value_enum)]
    pub format: OutputFormat,

    /// Field and value bindings of the JSON output, as <field>:<value>
    #[arg(long, default_value = "p:o")]
    pub fields: FieldMapping,

    /// Abort on the first failing level instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Fail when a pivot value reappears after its group was closed
    #[arg(long)]
    pub verify_order: bool,

    /// Write the bound arguments of every level as "@args"
    #[arg(long)]
    pub with_args: bool,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Gzip-compress the output
    #[arg(long)]
    pub gzip: bool,

    /// Arguments of the first level
    pub args: Vec<String>,
}

impl Args {
    fn execution_config(&self) -> ExecutionConfig {
        let policy = if self.strict {
            FailurePolicy::Strict
        } else {
            FailurePolicy::Lenient
        };
        let order = if self.verify_order {
            PivotOrder::Verified
        } else {
            PivotOrder::Contiguous
        };
        ExecutionConfig::new()
            .with_failure_policy(policy)
            .with_pivot_order(order)
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] triplenest_core::Error),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

fn main() {
    // Logs go to stderr so they never mix with the document on stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("triplenest=info,triplenest_core=info")
            }),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let chain = NestedQuery::from_path(&args.chain)?;
    let executor = MemoryExecutor::from_path(&args.fixtures)?;
    info!(
        levels = chain.len(),
        fixtures = executor.len(),
        chain = %args.chain.display(),
        "loaded chain"
    );

    let config = args.execution_config();
    let output = Output::open(args.output.as_deref(), args.gzip)?;

    let output = match args.format {
        OutputFormat::Json => {
            let mut collector = JsonCollector::new(JsonWriter::new(output), args.fields.clone())
                .with_args(args.with_args);
            chain.execute_with_config(&executor, &mut collector, &args.args, &config)?;
            collector.into_inner().into_inner()
        }
        OutputFormat::Trace => {
            let mut collector = TraceCollector::new(output);
            chain.execute_with_config(&executor, &mut collector, &args.args, &config)?;
            collector.into_inner()
        }
    };
    output.finish()?;
    Ok(())
}
