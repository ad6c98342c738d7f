use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::ingest_file;
use crate::cli::output::get_formatter;
use crate::models::{Config, IndexDriver, OutputFormat};
use crate::services::Pipeline;

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(required = true, help = "Text document to ingest")]
    pub file: PathBuf,

    #[arg(long, help = "Identifier to store the document under (default: derived from path)")]
    pub document_id: Option<String>,
}

pub async fn handle_ingest(args: IngestArgs, config: Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    if config.index.driver == IndexDriver::Memory {
        eprint!(
            "{}",
            formatter.format_message(
                "warning: the memory index is discarded on exit; use `ragqa chat` or the qdrant driver"
            )
        );
    }

    let pipeline = Pipeline::from_config(config)?;
    let stats = ingest_file(&pipeline, &args.file, args.document_id, format).await?;

    print!("{}", formatter.format_ingest(&stats));
    Ok(())
}
