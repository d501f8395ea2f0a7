//! CLI entry point - the composition root.
//!
//! Parses arguments, initializes logging, bootstraps the engine and
//! dispatches to command handlers.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod bootstrap;
mod handlers;
mod parser;

use parser::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before settings are read
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap::bootstrap().await?;

    match command {
        Commands::Serve => handlers::serve(&ctx).await?,
        Commands::Subscribe {
            url,
            cron,
            quality,
            no_auto_download,
        } => handlers::subscribe(&ctx, url, cron, quality, no_auto_download).await?,
        Commands::Add {
            url,
            quality,
            no_download,
        } => handlers::add(&ctx, url, quality, no_download).await?,
        Commands::Status => handlers::status(&ctx).await?,
        Commands::Subs => handlers::subs(&ctx).await?,
        Commands::Retry { job_id } => handlers::retry(&ctx, job_id).await?,
    }

    Ok(())
}
