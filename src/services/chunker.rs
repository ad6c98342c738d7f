//! Separator-aligned text chunking with character overlap.

use crate::error::ChunkingError;
use crate::models::{ChunkingConfig, Passage};

/// Splits a document into ordered, overlapping passages.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum passage length in characters
    chunk_size: usize,
    /// Characters of a passage repeated at the start of the next
    overlap: usize,
    separator: String,
}

/// A non-empty piece of the document between two separators.
struct Segment<'a> {
    text: &'a str,
    /// Char offset in the document
    offset: u64,
    chars: usize,
}

/// Passage under construction.
struct Draft {
    text: String,
    chars: usize,
    source_offset: u64,
    overlap_chars: usize,
}

impl TextChunker {
    /// Create a chunker, rejecting invalid size/overlap/separator combinations.
    pub fn new(config: &ChunkingConfig) -> Result<Self, ChunkingError> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            separator: config.separator.clone(),
        })
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Chunk a document into passages in document order.
    ///
    /// Segments are packed greedily up to `chunk_size`. A segment that alone
    /// exceeds `chunk_size` becomes its own passage and is never split. Every
    /// passage after the first starts with the trailing `overlap` characters
    /// of its predecessor, except one that follows an oversized passage. An
    /// all-whitespace document yields no passages.
    pub fn chunk(&self, text: &str) -> Vec<Passage> {
        let separator_chars = self.separator.chars().count();
        let mut passages = Vec::new();
        let mut current: Option<Draft> = None;
        // last finished passage, unless it was oversized
        let mut seed_source: Option<String> = None;

        for segment in self.segments(text) {
            if segment.chars > self.chunk_size {
                if let Some(draft) = current.take() {
                    seed_source = Some(self.finish(draft, &mut passages));
                }
                let seed = seed_source
                    .take()
                    .map(|previous| self.seed_from(&previous))
                    .unwrap_or_default();
                self.finish(self.start_draft(&seed, &segment), &mut passages);
                continue;
            }

            current = match current.take() {
                None => Some(self.start_draft("", &segment)),
                Some(mut draft) if draft.chars + separator_chars + segment.chars <= self.chunk_size => {
                    draft.text.push_str(&self.separator);
                    draft.text.push_str(segment.text);
                    draft.chars += separator_chars + segment.chars;
                    Some(draft)
                }
                Some(draft) => {
                    let previous = self.finish(draft, &mut passages);
                    let seed = self.seed_from(&previous);
                    seed_source = Some(previous);
                    Some(self.start_draft(&seed, &segment))
                }
            };
        }

        if let Some(draft) = current {
            self.finish(draft, &mut passages);
        }

        passages
    }

    /// Non-blank pieces between separators, trimmed of surrounding whitespace.
    fn segments<'a>(&'a self, text: &'a str) -> impl Iterator<Item = Segment<'a>> + 'a {
        let separator_chars = self.separator.chars().count() as u64;
        let mut offset = 0u64;

        text.split(self.separator.as_str()).filter_map(move |piece| {
            let start = offset;
            offset += piece.chars().count() as u64 + separator_chars;

            let leading = piece.len() - piece.trim_start().len();
            let trimmed = piece.trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(Segment {
                text: trimmed,
                offset: start + piece[..leading].chars().count() as u64,
                chars: trimmed.chars().count(),
            })
        })
    }

    fn start_draft(&self, seed: &str, segment: &Segment<'_>) -> Draft {
        let seed_chars = seed.chars().count();
        let mut text = String::with_capacity(seed.len() + self.separator.len() + segment.text.len());
        let mut chars = segment.chars;

        if !seed.is_empty() {
            text.push_str(seed);
            text.push_str(&self.separator);
            chars += seed_chars + self.separator.chars().count();
        }
        text.push_str(segment.text);

        Draft {
            text,
            chars,
            source_offset: segment.offset,
            overlap_chars: seed_chars,
        }
    }

    /// Finalize a draft and return its text.
    fn finish(&self, draft: Draft, passages: &mut Vec<Passage>) -> String {
        passages.push(Passage {
            id: passages.len() as u32,
            text: draft.text.clone(),
            source_offset: draft.source_offset,
            overlap_chars: draft.overlap_chars as u32,
        });
        draft.text
    }

    /// Trailing `overlap` characters of a passage, never starting inside a
    /// separator and never starting with whitespace.
    fn seed_from(&self, passage: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }

        let total = passage.chars().count();
        let mut start = if total <= self.overlap {
            0
        } else {
            passage
                .char_indices()
                .nth(total - self.overlap)
                .map_or(passage.len(), |(i, _)| i)
        };

        for (pos, _) in passage.match_indices(self.separator.as_str()) {
            if pos >= start {
                break;
            }
            let end = pos + self.separator.len();
            if start < end {
                start = end;
                break;
            }
        }

        passage[start..].trim_start().to_string()
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        let config = ChunkingConfig::default();
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            separator: config.separator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chunker(chunk_size: usize, chunk_overlap: usize, separator: &str) -> TextChunker {
        TextChunker::new(&ChunkingConfig {
            chunk_size,
            chunk_overlap,
            separator: separator.to_string(),
        })
        .unwrap()
    }

    fn texts(passages: &[Passage]) -> Vec<&str> {
        passages.iter().map(|p| p.text.as_str()).collect()
    }

    #[test]
    fn test_single_letter_lines() {
        let passages = chunker(3, 1, "\n").chunk("A\nB\nC\nD");

        assert_eq!(texts(&passages), vec!["A\nB", "B\nC", "C\nD"]);
        assert_eq!(
            passages.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(
            passages.iter().map(|p| p.source_offset).collect::<Vec<_>>(),
            vec![0, 4, 6]
        );
        assert_eq!(passages[1].overlap_chars, 1);
    }

    #[test]
    fn test_small_document_single_passage() {
        let passages = TextChunker::default().chunk("Hello, world!");
        assert_eq!(texts(&passages), vec!["Hello, world!"]);
        assert_eq!(passages[0].overlap_chars, 0);
    }

    #[test]
    fn test_whitespace_document_is_empty() {
        assert!(TextChunker::default().chunk("").is_empty());
        assert!(TextChunker::default().chunk("  \n \n\t\n").is_empty());
    }

    #[test]
    fn test_empty_segments_are_dropped() {
        let passages = chunker(100, 0, "\n").chunk("\n\nfirst\n\n\n  \nsecond\n");
        assert_eq!(texts(&passages), vec!["first\nsecond"]);
        assert_eq!(passages[0].source_offset, 2);
    }

    #[test]
    fn test_oversized_segment_is_seeded() {
        let passages = chunker(5, 2, "\n").chunk("xy\nabcdefgh\ncd");
        assert_eq!(texts(&passages), vec!["xy", "xy\nabcdefgh", "cd"]);
        assert_eq!(
            passages.iter().map(|p| p.overlap_chars).collect::<Vec<_>>(),
            vec![0, 2, 0]
        );
        assert_eq!(passages[1].fresh_text("\n"), "abcdefgh");
        assert_eq!(passages[1].source_offset, 3);
    }

    #[test]
    fn test_oversized_passage_is_not_a_seed() {
        let passages = chunker(5, 2, "\n").chunk("abcdefgh\nijklmnop\nqr");
        assert_eq!(texts(&passages), vec!["abcdefgh", "ijklmnop", "qr"]);
        assert!(passages.iter().all(|p| p.overlap_chars == 0));
    }

    #[test]
    fn test_segments_are_trimmed() {
        let passages = chunker(6, 0, "\n").chunk("ab   \n  cd");
        assert_eq!(texts(&passages), vec!["ab\ncd"]);
        assert_eq!(passages[0].source_offset, 0);

        let passages = chunker(3, 0, "\n").chunk("ab   \n  cd");
        assert_eq!(texts(&passages), vec!["ab", "cd"]);
        assert_eq!(passages[1].source_offset, 8);
    }

    #[test]
    fn test_leading_whitespace_sets_offset() {
        let passages = chunker(50, 0, "\n").chunk("   indented");
        assert_eq!(texts(&passages), vec!["indented"]);
        assert_eq!(passages[0].source_offset, 3);
    }

    #[test]
    fn test_seed_never_starts_inside_separator() {
        // tail of "aaa||bbb" with overlap 4 would start at "|bbb"
        let passages = chunker(8, 4, "||").chunk("aaa||bbb||ccc");
        assert_eq!(texts(&passages), vec!["aaa||bbb", "bbb||ccc"]);
        assert_eq!(passages[1].overlap_chars, 3);
    }

    #[test]
    fn test_seed_skips_leading_whitespace() {
        let passages = chunker(12, 4, "\n").chunk("hello big\nworld");
        assert_eq!(texts(&passages), vec!["hello big", "big\nworld"]);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let passages = chunker(5, 0, "\n").chunk("äöü\nß");
        assert_eq!(texts(&passages), vec!["äöü\nß"]);
    }

    #[test]
    fn test_invalid_configuration() {
        let err = TextChunker::new(&ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 10,
            separator: "\n".into(),
        })
        .unwrap_err();
        assert_eq!(
            err,
            ChunkingError::OverlapTooLarge {
                overlap: 10,
                size: 10
            }
        );

        let err = TextChunker::new(&ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 0,
            separator: String::new(),
        })
        .unwrap_err();
        assert_eq!(err, ChunkingError::EmptySeparator);
    }

    #[test]
    fn test_passages_fit_unless_oversized() {
        let doc = (0..200)
            .map(|i| format!("line number {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let passages = chunker(100, 20, "\n").chunk(&doc);

        assert!(passages.len() > 1);
        for p in &passages {
            // seeded passages may exceed by at most the seed and one separator
            assert!(p.text.chars().count() <= 100 + 20 + 1, "{:?}", p.text);
            assert!(p.fresh_text("\n").chars().count() <= 100);
        }
    }

    /// Lines of letters and spaces, including blank, indented and long ones.
    fn document() -> impl Strategy<Value = (String, &'static str)> {
        (
            prop::collection::vec("[a-z ]{0,24}", 1..60),
            prop_oneof![Just("\n"), Just("||")],
        )
            .prop_map(|(lines, separator)| (lines.join(separator), separator))
    }

    /// Collapse whitespace at separator boundaries and drop blank pieces.
    fn normalize(text: &str, separator: &str) -> String {
        text.split(separator)
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }

    proptest! {
        #[test]
        fn prop_fresh_text_reconstructs_document(
            (doc, separator) in document(),
            chunk_size in 5usize..30,
            overlap_ratio in 0.0f64..1.0,
        ) {
            let overlap = ((chunk_size as f64) * overlap_ratio) as usize;
            let chunker = chunker(chunk_size, overlap.min(chunk_size - 1), separator);
            let passages = chunker.chunk(&doc);

            let rebuilt = passages
                .iter()
                .map(|p| p.fresh_text(separator))
                .collect::<Vec<_>>()
                .join(separator);
            prop_assert_eq!(normalize(&rebuilt, separator), normalize(&doc, separator));

            for p in &passages {
                let at_offset: String = doc.chars().skip(p.source_offset as usize).collect();
                let first = p.fresh_text(separator).split(separator).next().unwrap_or_default();
                prop_assert!(at_offset.starts_with(first), "{:?} not at {}", first, p.source_offset);
            }
        }

        #[test]
        fn prop_adjacent_passages_share_overlap(
            (doc, separator) in document(),
            chunk_size in 5usize..30,
            overlap in 1usize..10,
        ) {
            prop_assume!(overlap < chunk_size);
            let chunker = chunker(chunk_size, overlap, separator);
            let passages = chunker.chunk(&doc);
            let separator_chars = separator.chars().count();

            for pair in passages.windows(2) {
                if pair[0].fresh_text(separator).chars().count() > chunk_size {
                    continue;
                }

                let prev: Vec<char> = pair[0].text.chars().collect();
                let tail: String = prev[prev.len().saturating_sub(overlap)..].iter().collect();
                let seed: String = pair[1].text.chars().take(pair[1].overlap_chars as usize).collect();

                prop_assert!(!seed.is_empty(), "{:?} follows {:?} unseeded", pair[1].text, pair[0].text);
                prop_assert!(pair[0].text.ends_with(&seed));
                // the seed may skip a partial separator at the start of the tail
                prop_assert!(
                    seed.chars().count() + separator_chars > tail.trim_start().chars().count(),
                    "seed {:?} too short for tail {:?}", seed, tail
                );
            }
        }
    }
}
