use anyhow::{Result, bail};
use clap::Args;

use super::answer_question;
use crate::cli::output::get_formatter;
use crate::models::{Config, IndexDriver, IndexHandle, OutputFormat};
use crate::services::Pipeline;

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(long, required = true, help = "Document identifier printed by `ragqa ingest`")]
    pub document_id: String,

    #[arg(required = true, help = "Question to answer")]
    pub question: String,
}

pub async fn handle_ask(args: AskArgs, config: Config, format: OutputFormat) -> Result<()> {
    let question = args.question.trim();
    if question.is_empty() {
        bail!("question cannot be empty");
    }
    if config.index.driver == IndexDriver::Memory {
        bail!(
            "`ask` needs a persistent index; set [index] driver = \"qdrant\" or use `ragqa chat`"
        );
    }

    let pipeline = Pipeline::from_config(config)?;
    if pipeline.index().count(&args.document_id).await? == 0 {
        bail!("document {} has no indexed passages", args.document_id);
    }

    let handle = IndexHandle::attach(args.document_id);
    let answer = answer_question(&pipeline, question, &handle).await?;

    print!("{}", get_formatter(format).format_answer(&answer));
    Ok(())
}
