// sbdl/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging (Tracing)
    // RUST_LOG=debug sbdl run ... pour voir les détails
    // Les logs partent sur stderr : `sbdl preview` garde un stdout JSON propre
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            project_dir,
            load_dates,
            topic,
        } => commands::run::execute(project_dir, load_dates, topic).await,
        Commands::Preview {
            project_dir,
            load_date,
            limit,
        } => commands::preview::execute(project_dir, load_date, limit).await,
        Commands::Clean { project_dir } => commands::clean::execute(project_dir),
    }
}
