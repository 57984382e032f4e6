//! Output plan records
//!
//! The plan is the only artifact this crate produces; persistence and
//! rendering happen elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
/// Set prescription
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetType {
    Warmup,
    Top,
    BackOff,
    Straight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutSet {
    pub set_number: u8,
    pub set_type: SetType,
    pub target_reps: u8,
    pub target_rpe: f64,
    /// Fraction of the top working-set load (top set = 1.0)
    pub load_factor: f64,
    pub rest_seconds: u32,
}

// ---------------------------------------------------------------------------
/// Planned exercise
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseRole {
    Warmup,
    MainLift,
    Accessory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedExercise {
    pub exercise_id: String,
    pub name: String,
    pub role: ExerciseRole,
    pub order: u8,
    pub sets: Vec<WorkoutSet>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl PlannedExercise {
    pub fn working_set_count(&self) -> usize {
        self.sets
            .iter()
            .filter(|s| s.set_type != SetType::Warmup)
            .count()
    }
}

// ---------------------------------------------------------------------------
/// Workout plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub id: String,
    pub scheduled_date: DateTime<Utc>,
    pub warmup: Vec<PlannedExercise>,
    pub main: Vec<PlannedExercise>,
    pub accessories: Vec<PlannedExercise>,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl WorkoutPlan {
    /// All planned exercises in session order
    pub fn all_exercises(&self) -> impl Iterator<Item = &PlannedExercise> {
        self.warmup
            .iter()
            .chain(self.main.iter())
            .chain(self.accessories.iter())
    }
}
