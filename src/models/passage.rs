use serde::{Deserialize, Serialize};

/// A chunk of the source document indexed as one retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// 0-based position in document order.
    pub id: u32,
    pub text: String,
    /// Char offset in the source document of the first newly packed segment.
    pub source_offset: u64,
    /// Number of leading chars of `text` repeated from the previous passage.
    #[serde(default)]
    pub overlap_chars: u32,
}

impl Passage {
    pub fn new(id: u32, text: impl Into<String>, source_offset: u64) -> Self {
        Self {
            id,
            text: text.into(),
            source_offset,
            overlap_chars: 0,
        }
    }

    /// The part of the passage that is not repeated from its predecessor.
    pub fn fresh_text(&self, separator: &str) -> &str {
        if self.overlap_chars == 0 {
            return &self.text;
        }
        let start = self
            .text
            .char_indices()
            .nth(self.overlap_chars as usize)
            .map_or(self.text.len(), |(i, _)| i);
        let rest = &self.text[start..];
        rest.strip_prefix(separator).unwrap_or(rest)
    }
}

/// A passage paired with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedPassage {
    pub passage: Passage,
    pub vector: Vec<f32>,
}

impl EmbeddedPassage {
    pub fn new(passage: Passage, vector: Vec<f32>) -> Self {
        Self { passage, vector }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Deterministic point id for this passage within its document.
    pub fn point_id(&self, document_id: &str) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}", document_id, self.passage.id);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }
}

/// Handle to a fully ingested document in the vector index.
///
/// Only a successful ingestion produces a handle, so holding one means the
/// document's complete passage set is queryable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHandle {
    pub document_id: String,
    pub passages: usize,
    pub dimension: usize,
}

impl IndexHandle {
    /// Re-open a document that was ingested by an earlier process into a
    /// persistent index.
    pub fn attach(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            passages: 0,
            dimension: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_stable() {
        let p = EmbeddedPassage::new(Passage::new(5, "text", 0), vec![1.0]);
        let id = p.point_id("abc123");
        assert_eq!(id.len(), 36);
        assert_eq!(id, p.point_id("abc123"));
        assert_ne!(id, p.point_id("abc124"));
    }

    #[test]
    fn test_fresh_text_strips_seed() {
        let mut p = Passage::new(1, "B\nC\nD", 4);
        p.overlap_chars = 1;
        assert_eq!(p.fresh_text("\n"), "C\nD");

        let first = Passage::new(0, "A\nB", 0);
        assert_eq!(first.fresh_text("\n"), "A\nB");
    }

    #[test]
    fn test_fresh_text_multibyte() {
        let mut p = Passage::new(1, "äö||ü", 0);
        p.overlap_chars = 2;
        assert_eq!(p.fresh_text("||"), "ü");
    }
}
