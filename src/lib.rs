#![deny(missing_docs)]

//! Core library for the docqa PDF question-answering service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat-completion clients.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline counters.
pub mod metrics;
/// Question-answering pipeline.
pub mod processing;
/// Companion webhook receiver.
pub mod receiver;
/// Shared timestamp formatting.
pub mod timestamp;
/// Vector index backends.
pub mod vector_store;
/// Outbound webhook delivery.
pub mod webhook;
