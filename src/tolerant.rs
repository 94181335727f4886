//! Tolerant JSON decoding for text-generation replies.
//!
//! Replies are asked to be JSON but routinely arrive wrapped in a markdown
//! code fence or a sentence of prose. [`decode`] strips a fence when there is
//! one, otherwise cuts the outermost JSON object/array out of the text, and then
//! decodes it with serde.
//!
//! # Fallback contract
//!
//! [`decode`] never panics and never partially succeeds: it returns `Some`
//! only when the extracted text deserializes into `T` in full. [`decode_or`]
//! replaces any failure with the supplied fallback, so callers always end up
//! with a well-formed value.

use serde::de::DeserializeOwned;
use tracing::debug;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Returns the body of the first code fence, if the text has one.
fn fenced(text: &str) -> Option<&str> {
    let (start, marker) = match text.find(JSON_FENCE) {
        Some(idx) => (idx, JSON_FENCE),
        None => (text.find(FENCE)?, FENCE),
    };
    let body = &text[start + marker.len()..];
    let end = body.find(FENCE).unwrap_or(body.len());
    Some(body[..end].trim())
}

/// Cuts from the first opening brace/bracket to the last matching closer.
fn outermost_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// Extracts the JSON-looking part of a reply.
pub fn extract(text: &str) -> &str {
    let text = text.trim();
    let candidate = fenced(text).unwrap_or(text);
    outermost_json(candidate).unwrap_or(candidate)
}

pub fn decode<T: DeserializeOwned>(text: &str) -> Option<T> {
    match serde_json::from_str(extract(text)) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Could not decode generated JSON");
            None
        }
    }
}

pub fn decode_or<T: DeserializeOwned>(text: &str, fallback: T) -> T {
    decode(text).unwrap_or(fallback)
}
