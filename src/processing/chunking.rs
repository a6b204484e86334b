//! Fixed-stride character windows.
//!
//! Documents are cut into windows of `chunk_size` characters that start every
//! `chunk_size - overlap` characters, so neighbouring windows share `overlap` characters. Windows
//! are measured in Unicode scalar values, never bytes, and ignore word and sentence boundaries.
//! The final windows may be shorter than `chunk_size`.

use super::types::ChunkingError;

/// Window length used when no override is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 300;
/// Characters shared by consecutive windows when no override is configured.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Split `text` into overlapping windows.
///
/// For a text of `L` characters this yields `ceil(L / (chunk_size - overlap))` windows. Empty
/// input yields no windows.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if overlap >= chunk_size {
        return Err(ChunkingError::OverlapTooLarge {
            overlap,
            chunk_size,
        });
    }

    let stride = chunk_size - overlap;
    // Byte offset of every character, plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let chunks = (0..char_count)
        .step_by(stride)
        .map(|start| {
            let end = (start + chunk_size).min(char_count);
            text[boundaries[start]..boundaries[end]].to_string()
        })
        .collect();

    Ok(chunks)
}
