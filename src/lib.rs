//! Periodized resistance-training program generator.
//!
//! Pure computation: given a profile, goal, constraints, training history,
//! and an exercise library, the crate selects exercises, allocates sets, and
//! prescribes reps/RPE/load/rest, steering weekly per-muscle volume toward
//! landmark targets that shift across a 4-week block. No I/O, no async, no
//! persistence; identical inputs always produce identical output.
//!
//! The pipeline, leaves first:
//! history aggregation → fatigue derivation → periodization → hard filters →
//! scoring → slot-filling selection → set allocation → prescription →
//! time-boxing.

pub mod error;
pub mod fatigue;
pub mod filters;
pub mod generator;
pub mod history;
pub mod landmarks;
pub mod models;
pub mod periodization;
pub mod prescription;
pub mod scoring;
pub mod selection;
pub mod substitution;
pub mod timebox;

#[cfg(test)]
pub mod test_utils;

pub use error::PlanError;
pub use generator::{generate_workout, GenerateRequest};
pub use periodization::{
    get_base_target_rpe, get_goal_rep_ranges, get_mesocycle_periodization,
    get_periodization_modifiers, PeriodizationModifiers,
};
pub use selection::{select_exercises, SelectionInput, SelectionOutput};
pub use substitution::suggest_substitutes;
