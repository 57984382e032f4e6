//! User profile, goals, constraints, and generation options

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::exercise::{BodyPart, Equipment, SplitTag};

// ---------------------------------------------------------------------------
/// Goals and training age
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Hypertrophy,
    Strength,
    FatLoss,
    Endurance,
    GeneralFitness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrainingAge {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

// ---------------------------------------------------------------------------
/// Profile and constraints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub training_age: TrainingAge,
    pub days_per_week: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraints {
    pub available_equipment: Vec<Equipment>,
    pub session_minutes: u32,
    #[serde(default)]
    pub avoid_exercises: Vec<String>,
}

// ---------------------------------------------------------------------------
/// Preferences and check-in
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Preferences {
    #[serde(default)]
    pub favorite_exercises: Vec<String>,
    /// Exercises that must be included if they pass hard filters
    #[serde(default)]
    pub pinned_exercises: Vec<String>,
    /// Overrides the goal-derived RPE target when set
    pub target_rpe: Option<f64>,
}

/// Explicit pre-session check-in; wins over history-derived readiness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    /// 1-5
    pub readiness: u8,
    #[serde(default)]
    pub soreness_notes: Vec<String>,
    #[serde(default)]
    pub pain_flags: BTreeMap<BodyPart, u8>,
}

// ---------------------------------------------------------------------------
/// Generation options
// ---------------------------------------------------------------------------

/// Reduced-confidence selection for users or intents with thin history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColdStartStage {
    FirstSession,
    EarlyWeeks,
}

/// Rule-set version, threaded explicitly instead of read from the
/// process environment so output is reproducible anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyVersion {
    #[default]
    V1,
    /// Alternate fat-loss accessory rep range
    V2,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationOptions {
    pub forced_split: Option<SplitTag>,
    #[serde(default)]
    pub preferences: Preferences,
    pub check_in: Option<CheckIn>,
    /// Varies flavor among exact score ties only; same seed, same plan
    pub random_seed: Option<u64>,
    /// 1-indexed; wrapped into the 4-week block
    pub week_in_block: Option<u8>,
    pub cold_start: Option<ColdStartStage>,
    #[serde(default)]
    pub policy: PolicyVersion,
    /// Template mode: prescribe exactly these exercises, skip selection
    pub template_exercises: Option<Vec<String>>,
}
