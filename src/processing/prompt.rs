//! Prompt construction for the decision template.

/// Number of retrieved chunks placed into the prompt by default.
pub const DEFAULT_MAX_CHUNKS: usize = 3;

/// Embed the first `max_chunks` retrieved texts and the query into the decision template.
///
/// The template asks the model for a JSON object with `decision`, `amount`, and
/// `justification`; the model output is passed through unparsed.
pub fn format_prompt<S: AsRef<str>>(query: &str, relevant_chunks: &[S], max_chunks: usize) -> String {
    let context = relevant_chunks
        .iter()
        .take(max_chunks)
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"
You are a policy assistant. Based on the following document:

{context}

Evaluate the following query:
"{query}"

Return your decision in JSON with:
- decision: "Approved" or "Rejected"
- amount: estimated coverage if any
- justification: explanation with clause references
"#
    )
}
