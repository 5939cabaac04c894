//! Typed domain errors for the memory engine.
//!
//! [`EngramError`] is the error surface exposed through the HTTP envelope.
//! "No search results" is never an error — only malformed input, unknown ids,
//! conflicting curation requests, or storage failures are.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngramError {
    /// Missing or empty required field (empty query, empty content, bad enum value).
    #[error("{0}")]
    Validation(String),

    /// Unknown record id.
    #[error("memory not found: {0}")]
    NotFound(String),

    /// Request references records in a state that forbids the operation
    /// (e.g. consolidating an archived or missing record).
    #[error("{0}")]
    Conflict(String),

    /// Store or index not ready, or the store-wide lock could not be acquired
    /// within the configured timeout.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// Anything else — storage failures, serialization failures.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngramError {
    /// Stable error code used in the HTTP response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Unavailable(_) => "ENGINE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<rusqlite::Error> for EngramError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(anyhow::Error::new(e))
    }
}

impl From<serde_json::Error> for EngramError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(anyhow::Error::new(e))
    }
}
