//! Answer and output models.

use serde::{Deserialize, Serialize};

use super::passage::Passage;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Result of answering one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Question that was asked
    pub question: String,

    /// Generator output, verbatim
    pub text: String,

    /// Passages used as grounding context, in selection order
    pub passages: Vec<Passage>,

    /// End-to-end latency in milliseconds
    pub duration_ms: u64,
}

impl Answer {
    /// Whether any retrieved context backed the answer.
    pub fn has_context(&self) -> bool {
        !self.passages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("markdown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_answer_context_flag() {
        let answer = Answer {
            question: "q".into(),
            text: "I'm not sure.".into(),
            passages: vec![],
            duration_ms: 3,
        };
        assert!(!answer.has_context());
    }
}
