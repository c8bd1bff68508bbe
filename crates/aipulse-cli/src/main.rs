mod run;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "aipulse")]
#[command(about = "AI-assistant mention enrichment and dimensionalization pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the pipeline: read JSONL mentions from stdin, enrich, and load
    /// the warehouse until EOF or a shutdown signal.
    Run,
    /// Re-commit batches parked in the fallback store.
    Replay,
    /// Print warehouse row counts and the dangling-foreign-key check.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = aipulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run => run::run_pipeline(&config).await,
        Commands::Replay => run::replay_fallback(&config).await,
        Commands::Status => run::print_status(&config).await,
    }
}
