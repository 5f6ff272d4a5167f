//! Typed failures at the pipeline boundary.
//!
//! Field-level problems (unparseable timestamps, zero distances, ...) are
//! never errors: they surface as `None` on the affected [`TripRecord`]
//! field. Only loading, persisting and configuration can fail a run.
//!
//! [`TripRecord`]: crate::record::TripRecord

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The raw batch could not be read or decoded. Aborts the run before
    /// any derivation starts.
    #[error("failed to load raw trips from {origin}: {reason}")]
    BatchLoad { origin: String, reason: String },

    /// An output artifact could not be written. The in-memory results are
    /// untouched, so persistence can be retried on its own.
    #[error("failed to persist {key}: {reason}")]
    Persist { key: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub fn batch_load(origin: &str, reason: impl std::fmt::Display) -> Self {
        PipelineError::BatchLoad {
            origin: origin.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn persist(key: &str, reason: impl std::fmt::Display) -> Self {
        PipelineError::Persist {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
