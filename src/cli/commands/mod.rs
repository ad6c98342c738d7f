mod ask;
mod chat;
mod config;
mod ingest;
mod status;

pub use ask::AskArgs;
pub use chat::ChatArgs;
pub use config::ConfigCommand;
pub use ingest::IngestArgs;
pub use status::StatusArgs;

pub use ask::handle_ask;
pub use chat::handle_chat;
pub use config::handle_config;
pub use ingest::handle_ingest;
pub use status::handle_status;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::output::IngestStats;
use crate::models::{Answer, IndexHandle, OutputFormat};
use crate::services::Pipeline;
use crate::utils::{RetryPolicy, document_id_for, load_document, with_retry};

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Read, chunk, embed and store a file, retrying transient failures.
async fn ingest_file(
    pipeline: &Pipeline,
    path: &Path,
    document_id: Option<String>,
    format: OutputFormat,
) -> Result<IngestStats> {
    let config = pipeline.config();
    let text = load_document(path, &config.document)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let document_id = match document_id {
        Some(id) => id,
        None => document_id_for(path)?,
    };

    let pb = (format == OutputFormat::Text)
        .then(|| spinner(format!("Ingesting {}...", path.display())));

    let start_time = Instant::now();
    let policy = RetryPolicy::from(&config.retry);
    let result = with_retry(&policy, "ingest", || pipeline.ingest(&document_id, &text)).await;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let handle = result.context("ingestion failed")?;
    Ok(IngestStats {
        handle,
        source: path.display().to_string(),
        duration_ms: start_time.elapsed().as_millis() as u64,
    })
}

async fn answer_question(
    pipeline: &Pipeline,
    question: &str,
    handle: &IndexHandle,
) -> Result<Answer> {
    let policy = RetryPolicy::from(&pipeline.config().retry);
    with_retry(&policy, "answer", || pipeline.answer(question, handle))
        .await
        .context("failed to answer question")
}
