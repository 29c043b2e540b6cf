//! Typed error kinds for the gate.
//!
//! Every kind is a distinct variant so callers can match on what went
//! wrong; nothing crosses the API boundary as a panic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] cmdgate_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("challenge transport failure: {0}")]
    ChallengeTransport(String),

    #[error("execution failure: {0}")]
    Exec(String),
}

/// A `Result` alias where the error type is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
