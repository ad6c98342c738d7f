//! Grounding prompt assembly.

use crate::models::Passage;

/// Phrase the generator is instructed to answer with when the context does
/// not support an answer.
pub const FALLBACK_ANSWER: &str = "I'm not sure.";

/// Context block used when retrieval found nothing.
pub const NO_CONTEXT_MARKER: &str = "(no context available)";

const PASSAGE_SEPARATOR: &str = "\n\n";

/// Join passage texts with blank lines, in the given order.
pub fn join_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR)
}

/// Frame the question and selected passages as a grounded-answer prompt.
pub fn assemble(question: &str, passages: &[Passage]) -> String {
    let context = if passages.is_empty() {
        NO_CONTEXT_MARKER.to_string()
    } else {
        join_context(passages)
    };

    format!(
        "Question: {question}\n\
         \n\
         Context from documents:\n\
         {context}\n\
         \n\
         Please answer the question based only on the provided context.\n\
         If the answer isn't clear from the context, say \"{FALLBACK_ANSWER}\"\n\
         Provide a concise answer with relevant quotes if available.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_layout() {
        let passages = vec![
            Passage::new(3, "Jonathan kept a diary.", 0),
            Passage::new(1, "The Count lived in a castle.", 0),
        ];
        let prompt = assemble("Who kept a diary?", &passages);

        assert_eq!(
            prompt,
            "Question: Who kept a diary?\n\
             \n\
             Context from documents:\n\
             Jonathan kept a diary.\n\
             \n\
             The Count lived in a castle.\n\
             \n\
             Please answer the question based only on the provided context.\n\
             If the answer isn't clear from the context, say \"I'm not sure.\"\n\
             Provide a concise answer with relevant quotes if available.\n"
        );
    }

    #[test]
    fn test_selection_order_is_kept() {
        let passages = vec![Passage::new(9, "second", 0), Passage::new(2, "first", 0)];
        assert_eq!(join_context(&passages), "second\n\nfirst");
    }

    #[test]
    fn test_empty_context_uses_marker() {
        let prompt = assemble("Anything?", &[]);
        assert!(prompt.contains(NO_CONTEXT_MARKER));
        assert!(prompt.contains(FALLBACK_ANSWER));
    }

    #[test]
    fn test_internal_whitespace_preserved() {
        let passages = vec![Passage::new(0, "line one\n  indented", 0)];
        assert!(assemble("q", &passages).contains("line one\n  indented"));
    }
}
