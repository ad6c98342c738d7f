use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use ragqa::cli::commands::{
    handle_ask, handle_chat, handle_config, handle_ingest, handle_status,
};
use ragqa::cli::{Cli, Commands, Overrides};
use ragqa::models::{Config, OutputFormat};
use ragqa::utils::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is fine; keys may come from the real environment
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let format = cli.format.unwrap_or_default();

    tokio::select! {
        result = run_command(cli.command, cli.overrides, format) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, exiting...");
        }
    }

    Ok(())
}

async fn run_command(command: Commands, overrides: Overrides, format: OutputFormat) -> Result<()> {
    let config = || -> Result<Config> {
        let mut config = Config::load().context("failed to load configuration")?;
        overrides.apply(&mut config);
        Ok(config)
    };

    match command {
        Commands::Config(cmd) => handle_config(cmd, format).await?,
        Commands::Chat(args) => handle_chat(args, config()?, format).await?,
        Commands::Ingest(args) => handle_ingest(args, config()?, format).await?,
        Commands::Ask(args) => handle_ask(args, config()?, format).await?,
        Commands::Status(args) => handle_status(args, config()?, format).await?,
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
