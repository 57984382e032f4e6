pub mod exercise;
pub mod history;
pub mod plan;
pub mod profile;

pub use exercise::{Exercise, ExerciseLibrary, Muscle};
pub use history::WorkoutHistoryEntry;
pub use plan::WorkoutPlan;
