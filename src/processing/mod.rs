//! Question-answering pipeline: extraction, chunking, prompting, and orchestration.

pub mod chunking;
pub mod extract;
pub mod prompt;
mod service;
pub mod types;

pub use service::{PipelineSettings, RagApi, RagService};
pub use types::{Answer, ChunkingError, ErrorKind, IngestOutcome, PipelineError};
