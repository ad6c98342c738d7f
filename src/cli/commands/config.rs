use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(long, short = 'f', help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show the configuration file path")]
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => handle_init(force, format),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path => handle_path(format),
    }
}

fn handle_init(force: bool, format: OutputFormat) -> Result<()> {
    let path = Config::init(force).context("failed to create config")?;
    print!(
        "{}",
        get_formatter(format).format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => {
            if let Some(path) = Config::config_path().filter(|p| p.exists()) {
                println!("# {}", path.display());
            } else {
                println!("# defaults (no config file)");
            }
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    if let Err(e) = config.validate() {
        eprint!("{}", get_formatter(format).format_error(&e.to_string()));
    }
    Ok(())
}

fn handle_path(format: OutputFormat) -> Result<()> {
    let path = Config::config_path()
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    let state = if path.exists() { "active" } else { "would be" };
    print!(
        "{}",
        get_formatter(format).format_message(&format!("Config ({}): {}", state, path.display()))
    );

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        if env_path.exists() {
            print!(
                "{}",
                get_formatter(format).format_message(&format!(".env (active): {}", env_path.display()))
            );
        }
    }
    Ok(())
}
