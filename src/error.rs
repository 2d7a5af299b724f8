//! Engine error kinds and their user-facing severity mapping.
//!
//! All backend failures are converted at the operation boundary; no raw
//! transport error escapes the engine API. Nothing is retried automatically:
//! the user re-triggers the action instead.

use thiserror::Error;

use crate::notify::Severity;

/// Typed outcome of a failed engine operation.
///
/// The engine returns these instead of calling a notification channel
/// itself; the shell maps each kind to a message and severity.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Required input missing; the action was blocked and no request sent.
    #[error("{0}")]
    Validation(String),
    /// The backend reported no documents (sentinel) for the query.
    /// Informational to the user, but results are cleared.
    #[error("{0}")]
    EmptyResult(String),
    /// Network or decode failure; results are cleared.
    #[error("{0}")]
    Transport(String),
    /// Secondary enrichment fetch failed. Logged only, never user-visible;
    /// the primary filtered view is left unenriched.
    #[error("enrichment lookup failed: {0}")]
    Enrichment(String),
    /// A response arrived for a request that has since been superseded.
    /// Discarded without touching state or notifying the user.
    #[error("response superseded by a newer request")]
    Superseded,
}

impl EngineError {
    /// Severity for the user notification, or `None` for kinds that are
    /// never surfaced.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            EngineError::Validation(_) => Some(Severity::Warning),
            EngineError::EmptyResult(_) => Some(Severity::Error),
            EngineError::Transport(_) => Some(Severity::Error),
            EngineError::Enrichment(_) => None,
            EngineError::Superseded => None,
        }
    }
}
