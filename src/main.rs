// ABOUTME: Millwright CLI entry point
// ABOUTME: Processes an instruction through the orchestrator and prints the result as JSON

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use millwright::engine::graph::TaskGraphBuilder;
use millwright::{
    CapabilityRegistry, Config, DispatchMode, InMemoryHistory, Orchestrator, RuleBasedAnalyzer,
    TaskScheduler,
};

#[derive(Parser, Debug)]
#[command(name = "millwright", version, about = "Instruction orchestration engine")]
struct Cli {
    /// Business instruction to process
    instruction: String,

    /// Path to a YAML configuration file
    #[arg(short, long, env = "MILLWRIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Run tasks one at a time instead of in dependency waves
    #[arg(long)]
    sequential: bool,

    /// Pretty-print the result JSON
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(&config);

    info!(version = millwright::VERSION, "millwright starting");

    let registry = Arc::new(CapabilityRegistry::with_builtin(config.retry.clone()));
    let scheduler = TaskScheduler::new(Arc::clone(&registry), config.pool_capacity())
        .with_call_timeout(config.capability_timeout);
    let history = Arc::new(InMemoryHistory::new(config.history_retention));

    let mode = if cli.sequential {
        DispatchMode::Sequential
    } else {
        config.dispatch_mode
    };

    let orchestrator = Orchestrator::new(
        Arc::new(RuleBasedAnalyzer::new()),
        registry,
        scheduler,
        TaskGraphBuilder::new(config.retry.max_attempts),
        history,
    )
    .with_analyzer_timeout(config.analyzer_timeout)
    .with_dispatch_mode(mode);

    let result = orchestrator.process_instruction(&cli.instruction).await?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", output);

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "compact" {
        builder.compact().init();
    } else {
        builder.pretty().init();
    }
}
