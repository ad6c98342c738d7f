//! Reading source documents from disk.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use sha2::{Digest, Sha256};

use crate::error::DocumentError;
use crate::models::DocumentConfig;

const TRACING_TARGET: &str = "ragqa::document";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read a text document, trying each configured encoding in order.
///
/// Decoding is strict: an encoding is accepted only if it decodes the whole
/// byte stream without replacement characters.
pub fn load_document(path: &Path, config: &DocumentConfig) -> Result<String, DocumentError> {
    let encodings = resolve_encodings(&config.encodings)?;

    let metadata = fs::metadata(path)?;
    if metadata.len() > config.max_file_size {
        return Err(DocumentError::TooLarge {
            size: metadata.len(),
            limit: config.max_file_size,
        });
    }

    let bytes = fs::read(path)?;
    decode(&bytes, &encodings)
        .map(|(text, encoding)| {
            tracing::debug!(
                target: TRACING_TARGET,
                path = %path.display(),
                encoding = encoding.name(),
                bytes = bytes.len(),
                "Decoded document"
            );
            text.into_owned()
        })
        .map_err(|err| match err {
            DecodeFailure::Binary => DocumentError::Binary(path.display().to_string()),
            DecodeFailure::NoMatch => DocumentError::Unreadable {
                path: path.display().to_string(),
                tried: config.encodings.clone(),
            },
        })
}

/// Stable identifier for a document on disk: hex of the first 16 bytes of
/// the SHA-256 of its canonical path.
pub fn document_id_for(path: &Path) -> Result<String, DocumentError> {
    let canonical = fs::canonicalize(path)?;
    let hash = Sha256::digest(canonical.to_string_lossy().as_bytes());
    Ok(hex::encode(&hash[..16]))
}

fn resolve_encodings(labels: &[String]) -> Result<Vec<&'static Encoding>, DocumentError> {
    labels
        .iter()
        .map(|label| {
            Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| DocumentError::UnknownEncoding(label.clone()))
        })
        .collect()
}

enum DecodeFailure {
    Binary,
    NoMatch,
}

fn decode<'a>(
    bytes: &'a [u8],
    encodings: &[&'static Encoding],
) -> Result<(Cow<'a, str>, &'static Encoding), DecodeFailure> {
    if bytes.contains(&0) {
        return Err(DecodeFailure::Binary);
    }

    for &encoding in encodings {
        let input = if encoding == UTF_8 {
            bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
        } else {
            bytes
        };
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(input) {
            return Ok((text, encoding));
        }
    }
    Err(DecodeFailure::NoMatch)
}
