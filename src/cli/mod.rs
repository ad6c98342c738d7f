//! Command-line driver over the ingestion and answering pipeline.

pub mod commands;
pub mod output;

use clap::{Args, Parser, Subcommand};

use crate::models::{Config, OutputFormat};
use crate::utils::LogFormat;

/// Ask questions about a long text document.
#[derive(Debug, Parser)]
#[command(name = "ragqa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        env = "RAGQA_LOG_FORMAT",
        default_value = "text",
        help = "Log format on stderr: text or json"
    )]
    pub log_format: LogFormat,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest a document and answer questions about it interactively
    Chat(commands::ChatArgs),

    /// Ingest a document into the vector index
    Ingest(commands::IngestArgs),

    /// Answer one question about a previously ingested document
    Ask(commands::AskArgs),

    /// Check vector index connectivity
    Status(commands::StatusArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

/// Per-invocation overrides of configuration file values.
#[derive(Debug, Default, Clone, Args)]
pub struct Overrides {
    #[arg(long, global = true, help = "Passages used as context per question")]
    pub k: Option<usize>,

    #[arg(long, global = true, help = "Candidates fetched before MMR re-ranking")]
    pub fetch_k: Option<usize>,

    #[arg(long, global = true, help = "MMR relevance weight between 0.0 and 1.0")]
    pub lambda: Option<f32>,

    #[arg(long, global = true, help = "Maximum passage length in characters")]
    pub chunk_size: Option<usize>,

    #[arg(long, global = true, help = "Characters shared by adjacent passages")]
    pub chunk_overlap: Option<usize>,
}

impl Overrides {
    /// Apply overrides in place; validation happens when the pipeline is built.
    pub fn apply(&self, config: &mut Config) {
        if let Some(k) = self.k {
            config.retrieval.k = k;
        }
        if let Some(fetch_k) = self.fetch_k {
            config.retrieval.fetch_k = fetch_k;
        }
        if let Some(lambda) = self.lambda {
            config.retrieval.lambda_mult = lambda;
        }
        if let Some(size) = self.chunk_size {
            config.chunking.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            config.chunking.chunk_overlap = overlap;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_with_overrides() {
        let cli = Cli::parse_from([
            "ragqa", "chat", "dracula.txt", "--k", "3", "--fetch-k", "6", "--lambda", "0.5",
        ]);
        assert!(matches!(cli.command, Commands::Chat(_)));

        let mut config = Config::default();
        cli.overrides.apply(&mut config);
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.retrieval.fetch_k, 6);
        assert!((config.retrieval.lambda_mult - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.chunking.chunk_size, 1000);
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::parse_from([
            "ragqa",
            "--format",
            "json",
            "ask",
            "--document-id",
            "abc",
            "Who is Mina?",
        ]);
        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Commands::Ask(args) => {
                assert_eq!(args.document_id, "abc");
                assert_eq!(args.question, "Who is Mina?");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_log_format_flag() {
        let cli = Cli::parse_from(["ragqa", "--log-format", "json", "config", "path"]);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let mut config = Config::default();
        Overrides::default().apply(&mut config);
        assert_eq!(config.retrieval.k, 5);
        assert_eq!(config.chunking.chunk_overlap, 100);
    }
}
