//! PDF text extraction.

use thiserror::Error;

/// Errors raised while turning PDF bytes into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No bytes were supplied.
    #[error("PDF payload is empty")]
    Empty,
    /// The parser rejected the document.
    #[error("Failed to parse PDF: {0}")]
    Parse(String),
    /// The parser panicked or its worker was cancelled.
    #[error("PDF parser aborted: {0}")]
    Panicked(String),
}

/// Extract the text of every page, each followed by a newline.
///
/// Parsing is CPU-bound and runs on the blocking pool. A parser panic is reported as
/// [`ExtractionError::Panicked`] instead of tearing down the request task.
pub async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let byte_count = bytes.len();
    let pages = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
    })
    .await
    .map_err(|error| ExtractionError::Panicked(error.to_string()))?
    .map_err(|error| ExtractionError::Parse(error.to_string()))?;

    let text = join_pages(&pages);
    tracing::debug!(
        bytes = byte_count,
        pages = pages.len(),
        chars = text.chars().count(),
        "Extracted PDF text"
    );
    Ok(text)
}

/// Concatenate page texts, each followed by `\n`. Pages without text contribute nothing.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut text = String::new();
    for page in pages {
        let page = page.as_ref();
        if page.trim().is_empty() {
            continue;
        }
        text.push_str(page);
        text.push('\n');
    }
    text
}

/// Single-page Helvetica PDF reading "Coverage is $500 for dental.".
#[cfg(test)]
pub(crate) const COVERAGE_PDF: &[u8] = include_bytes!("../../tests/fixtures/coverage.pdf");
