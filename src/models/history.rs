//! Workout history records
//!
//! Append-only, read-only input. The generator never mutates history; it
//! derives rolling volume, recency, and readiness signals from it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::exercise::{BodyPart, SplitTag};

// ---------------------------------------------------------------------------
/// Session status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    Partial,
    Skipped,
}

// ---------------------------------------------------------------------------
/// Selection intent: what kind of day this session was generated for
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionIntent {
    FullBody,
    Upper,
    Lower,
    Split(SplitTag),
}

impl SessionIntent {
    pub fn split_tag(&self) -> Option<SplitTag> {
        match self {
            SessionIntent::Split(tag) => Some(*tag),
            SessionIntent::Upper => Some(SplitTag::Upper),
            SessionIntent::Lower => Some(SplitTag::Lower),
            SessionIntent::FullBody => Some(SplitTag::FullBody),
        }
    }
}

// ---------------------------------------------------------------------------
/// Logged work
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedSet {
    pub reps: u8,
    /// Kilograms; dumbbell loads are total (both hands combined)
    pub load_kg: Option<f64>,
    pub rpe: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedExercise {
    pub exercise_id: String,
    pub sets: Vec<LoggedSet>,
}

impl LoggedExercise {
    /// Heaviest set as (load, reps); the stall detector compares these
    pub fn top_set(&self) -> Option<(f64, u8)> {
        self.sets
            .iter()
            .filter_map(|s| s.load_kg.map(|l| (l, s.reps)))
            .max_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }
}

// ---------------------------------------------------------------------------
/// History entry: one scheduled session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutHistoryEntry {
    pub date: DateTime<Utc>,
    pub status: SessionStatus,
    #[serde(default)]
    pub exercises: Vec<LoggedExercise>,
    /// Self-reported readiness at check-in, 1-5
    pub readiness: Option<u8>,
    #[serde(default)]
    pub soreness_notes: Vec<String>,
    /// Body part -> severity 0-3
    #[serde(default)]
    pub pain_flags: BTreeMap<BodyPart, u8>,
    pub intent: Option<SessionIntent>,
    pub split_tag: Option<SplitTag>,
}

impl WorkoutHistoryEntry {
    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(LoggedExercise::set_count).sum()
    }

    pub fn contains_exercise(&self, exercise_id: &str) -> bool {
        self.exercises.iter().any(|e| e.exercise_id == exercise_id)
    }

    pub fn logged(&self, exercise_id: &str) -> Option<&LoggedExercise> {
        self.exercises.iter().find(|e| e.exercise_id == exercise_id)
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
