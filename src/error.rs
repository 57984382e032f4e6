//! Crate error type
//!
//! Only configuration problems are errors. Empty filter results and
//! over-budget plans are normal outcomes, not failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    /// Corrupt reference data the selector cannot reason about
    #[error("invalid exercise library: {exercise_id}: {reason}")]
    InvalidLibrary { exercise_id: String, reason: String },

    #[error("exercise library is empty")]
    EmptyLibrary,

    /// Template mode referenced an id the library does not contain
    #[error("unknown exercise id: {0}")]
    UnknownExercise(String),
}
