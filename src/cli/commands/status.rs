use anyhow::Result;
use clap::Args;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, IndexDriver, OutputFormat};
use crate::services::create_index;

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long, help = "Also report the passage count of this document")]
    pub document_id: Option<String>,
}

pub async fn handle_status(args: StatusArgs, config: Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let index = create_index(&config.index)?;

    let connected = index.health_check().await.unwrap_or(false);

    let document = match args.document_id {
        Some(id) if connected => {
            let count = index.count(&id).await?;
            Some((id, count))
        }
        _ => None,
    };

    let persistent = config.index.driver == IndexDriver::Qdrant;
    let status = StatusInfo {
        index_driver: index.name().to_string(),
        index_url: persistent.then(|| config.index.url.clone()),
        collection: persistent.then(|| config.index.collection.clone()),
        index_connected: connected,
        document,
        embedding_model: format!("{} ({})", config.embedding.model, config.embedding.provider),
        generation_model: config.generation.model.clone(),
    };

    print!("{}", formatter.format_status(&status));
    Ok(())
}
