use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ht_cli::commands::{report, track};
use ht_cli::{Cli, Commands, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with flag support; RUST_LOG wins when neither flag
    // is given.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Commands::Track) {
        Commands::Track => track::run(&config).await?,
        Commands::Report { date, json } => {
            let db = ht_db::Database::open(&config.database_path)
                .with_context(|| format!("failed to open {}", config.database_path.display()))?;
            report::run(&mut std::io::stdout().lock(), &db, date, json)?;
        }
    }

    Ok(())
}
