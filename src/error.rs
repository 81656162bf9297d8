//! Error types for the planar filter.
//!
//! Input problems are reported before any construction work begins.
//! Orchestration defects surface as `InvariantViolation` and are never
//! absorbed.

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PmfgError>;

#[derive(Error, Debug)]
pub enum PmfgError {
    /// Malformed weight matrix or edge list
    #[error("Invalid input: {message}")]
    Input { message: String },

    /// Commit of an existing edge, a self-loop, or an edge that fails the
    /// planarity test
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    /// Exhaustive candidate set is larger than the configured limit
    #[error("Candidate set of {required} edges exceeds the limit of {limit} (enable the top-K fallback)")]
    ResourceLimit { required: usize, limit: usize },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Cancellation observed between candidate iterations
    #[error("Construction cancelled after {scanned} candidates")]
    Cancelled { scanned: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl PmfgError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// True for defects in the orchestrator rather than in the data
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}

impl From<serde_json::Error> for PmfgError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
