//! # error
//!
//! Centralised application error type.
//!
//! Only faults that must cross a module seam live here — parse faults inside
//! the council never become errors (each stage substitutes its safe default
//! instead), and risk rejections are normal outcomes, not failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The text-generation backend was unreachable, rejected the request, or
    /// returned a body that could not be decoded.
    #[error("LLM request failed: {0}")]
    Llm(String),

    /// The persistence sink rejected a write or read.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Catch-all for unexpected failures.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
