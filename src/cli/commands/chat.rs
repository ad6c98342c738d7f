use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{answer_question, ingest_file};
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::Pipeline;

#[derive(Debug, Args)]
pub struct ChatArgs {
    #[arg(required = true, help = "Text document to ask questions about")]
    pub file: PathBuf,

    #[arg(long, help = "Identifier to store the document under (default: derived from path)")]
    pub document_id: Option<String>,
}

fn is_exit(input: &str) -> bool {
    input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit")
}

pub async fn handle_chat(args: ChatArgs, config: Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let pipeline = Pipeline::from_config(config)?;

    let stats = ingest_file(&pipeline, &args.file, args.document_id, format).await?;
    eprint!("{}", formatter.format_ingest(&stats));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("\nEnter your question (or 'quit' to exit): ");
        std::io::stderr().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit(question) {
            break;
        }

        match answer_question(&pipeline, question, &stats.handle).await {
            Ok(answer) => print!("{}", formatter.format_answer(&answer)),
            Err(e) => eprint!("{}", formatter.format_error(&format!("{e:#}"))),
        }
        std::io::stdout().flush()?;
    }

    eprintln!("\nThank you for using ragqa!");
    Ok(())
}
