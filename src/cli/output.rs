use std::fmt::Write as FmtWrite;

use console::style;

use crate::models::{Answer, IndexHandle, OutputFormat};

pub trait Formatter {
    fn format_answer(&self, answer: &Answer) -> String;
    fn format_ingest(&self, stats: &IngestStats) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct IngestStats {
    pub handle: IndexHandle,
    pub source: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub index_driver: String,
    pub index_url: Option<String>,
    pub collection: Option<String>,
    pub index_connected: bool,
    pub document: Option<(String, u64)>,
    pub embedding_model: String,
    pub generation_model: String,
}

pub struct TextFormatter;

impl TextFormatter {
    fn heading(output: &mut String, title: &str) {
        let _ = writeln!(output, "\n{}", style(format!("--- {title} ---")).bold());
    }
}

impl Formatter for TextFormatter {
    fn format_answer(&self, answer: &Answer) -> String {
        let mut output = String::new();

        Self::heading(&mut output, "Relevant Documents");
        if answer.passages.is_empty() {
            let _ = writeln!(output, "\n{}", style("No relevant passages found.").dim());
        }
        for (i, passage) in answer.passages.iter().enumerate() {
            let _ = writeln!(
                output,
                "\n{} {}",
                style(format!("Document {}:", i + 1)).cyan(),
                style(format!("(offset {})", passage.source_offset)).dim()
            );
            let _ = writeln!(output, "{}", passage.text.trim());
        }

        Self::heading(&mut output, "Generated Response");
        let _ = writeln!(output, "{}", answer.text.trim_end());
        output
    }

    fn format_ingest(&self, stats: &IngestStats) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Ingestion Complete");
        let _ = writeln!(output, "------------------");
        let _ = writeln!(output, "Source:      {}", stats.source);
        let _ = writeln!(output, "Document ID: {}", stats.handle.document_id);
        let _ = writeln!(output, "Passages:    {}", stats.handle.passages);
        let _ = writeln!(output, "Dimension:   {}", stats.handle.dimension);
        let _ = writeln!(output, "Duration:    {}ms", stats.duration_ms);
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Status");
        let _ = writeln!(output, "------");

        let index_status = if status.index_connected {
            style("[CONNECTED]").green()
        } else {
            style("[DISCONNECTED]").red()
        };
        let _ = writeln!(output, "Vector Index: {} {}", status.index_driver, index_status);
        if let Some(ref url) = status.index_url {
            let _ = writeln!(output, "  URL:        {}", url);
        }
        if let Some(ref collection) = status.collection {
            let _ = writeln!(output, "  Collection: {}", collection);
        }
        if let Some((ref id, count)) = status.document {
            let _ = writeln!(output, "  Document:   {} ({} passages)", id, count);
        }
        let _ = writeln!(output);
        let _ = writeln!(output, "Embedding:    {}", status.embedding_model);
        let _ = writeln!(output, "Generation:   {}", status.generation_model);
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {}\n", style("Error:").red().bold(), error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &serde_json::Value) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        let mut out = rendered.unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e));
        out.push('\n');
        out
    }
}

impl Formatter for JsonFormatter {
    fn format_answer(&self, answer: &Answer) -> String {
        match serde_json::to_value(answer) {
            Ok(value) => self.render(&value),
            Err(e) => self.format_error(&e.to_string()),
        }
    }

    fn format_ingest(&self, stats: &IngestStats) -> String {
        self.render(&serde_json::json!({
            "source": stats.source,
            "document_id": stats.handle.document_id,
            "passages": stats.handle.passages,
            "dimension": stats.handle.dimension,
            "duration_ms": stats.duration_ms,
        }))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let document = status.document.as_ref().map(|(id, count)| {
            serde_json::json!({
                "document_id": id,
                "passages": count,
            })
        });

        self.render(&serde_json::json!({
            "index": {
                "driver": status.index_driver,
                "url": status.index_url,
                "collection": status.collection,
                "connected": status.index_connected,
                "document": document,
            },
            "embedding_model": status.embedding_model,
            "generation_model": status.generation_model,
        }))
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", serde_json::json!({"message": message}))
    }

    fn format_error(&self, error: &str) -> String {
        format!("{}\n", serde_json::json!({"error": error}))
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
