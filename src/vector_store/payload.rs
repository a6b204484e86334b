//! Helpers for shaping chunk metadata before it reaches the index.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Per-item metadata budget of the hosted index, in bytes.
pub const DEFAULT_METADATA_MAX_BYTES: usize = 40_960;

/// Characters removed from the end of an oversized text on each truncation pass.
const TRUNCATION_STEP_CHARS: usize = 10;

/// Truncate `text` so that its UTF-8 encoding fits in `max_bytes`.
///
/// Oversized text loses [`TRUNCATION_STEP_CHARS`] characters from the end per pass until it
/// fits, so the result may undershoot the budget by a few characters. Cuts always fall on
/// character boundaries.
pub fn truncate_to_bytes(text: &str, max_bytes: usize) -> &str {
    let mut truncated = text;
    while truncated.len() > max_bytes {
        let keep = truncated
            .chars()
            .count()
            .saturating_sub(TRUNCATION_STEP_CHARS);
        let cut = truncated
            .char_indices()
            .nth(keep)
            .map(|(offset, _)| offset)
            .unwrap_or(truncated.len());
        truncated = &truncated[..cut];
    }
    truncated
}

/// Identifier assigned to the chunk at `ordinal` within an upsert batch.
pub fn chunk_id(ordinal: usize) -> String {
    format!("chunk-{ordinal}")
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(chunk_id: &str, text: &str, indexed_at: &str) -> Value {
    let mut payload = Map::new();
    payload.insert("chunk_id".into(), Value::String(chunk_id.to_string()));
    payload.insert("text".into(), Value::String(text.to_string()));
    payload.insert(
        "chunk_hash".into(),
        Value::String(compute_chunk_hash(text)),
    );
    payload.insert("indexed_at".into(), Value::String(indexed_at.to_string()));
    Value::Object(payload)
}
