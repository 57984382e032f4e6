//! Periodization engine
//!
//! Maps (week-in-block, goal, training age) to intensity and volume
//! modifiers. Weeks are 1-indexed and wrap into a fixed 4-week block; the
//! final week of every block is the deload.
//!
//! Key principles:
//! - Pure functions of their inputs, no stored state
//! - Volume ramps while relative intensity steps up toward the deload
//! - Deload is a hard cut: half volume, RPE capped, uniform back-off load

use serde::{Deserialize, Serialize};

use crate::models::profile::{Goal, PolicyVersion, TrainingAge};

/// Mesocycle length in weeks; the last week is always deload
pub const BLOCK_LENGTH: u8 = 4;

/// RPE ceiling applied to every set on a deload week
pub const DELOAD_RPE_CAP: f64 = 6.0;

// ---------------------------------------------------------------------------
/// Modifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodizationModifiers {
    pub rpe_offset: f64,
    pub set_multiplier: f64,
    pub back_off_multiplier: f64,
    pub is_deload: bool,
    pub week_in_block: u8,
}

impl Default for PeriodizationModifiers {
    fn default() -> Self {
        get_periodization_modifiers(1, Goal::Hypertrophy, None)
    }
}

/// Wrap an arbitrary week index into the 1-indexed block
fn wrap_week(week: u8) -> u8 {
    if week == 0 {
        return 1;
    }
    ((week - 1) % BLOCK_LENGTH) + 1
}

fn goal_back_off_multiplier(goal: Goal) -> f64 {
    match goal {
        Goal::Hypertrophy => 0.88,
        Goal::Strength => 0.90,
        _ => 0.85,
    }
}

/// RPE offset without training age: generic 4-bucket step over block progress
fn generic_rpe_offset(t: f64) -> f64 {
    if t <= 0.25 {
        -1.5
    } else if t <= 0.5 {
        -0.5
    } else if t <= 0.75 {
        0.5
    } else {
        1.0
    }
}

/// Age-specific 3-bucket tables; beginners swing the least, advanced the most
fn age_rpe_offset(t: f64, age: TrainingAge) -> f64 {
    let buckets = match age {
        TrainingAge::Beginner => [-1.0, -0.5, 0.0],
        TrainingAge::Intermediate => [-1.5, -0.5, 0.5],
        TrainingAge::Advanced => [-2.0, -0.5, 1.0],
    };
    if t <= 1.0 / 3.0 {
        buckets[0]
    } else if t <= 2.0 / 3.0 {
        buckets[1]
    } else {
        buckets[2]
    }
}

/// Periodization modifiers for one week of the block.
///
/// `get_periodization_modifiers(1, Goal::Hypertrophy, None)` yields
/// `{rpe_offset: -1.5, set_multiplier: 1.0, back_off_multiplier: 0.88,
/// is_deload: false, week_in_block: 1}`.
pub fn get_periodization_modifiers(
    week_in_block: u8,
    goal: Goal,
    training_age: Option<TrainingAge>,
) -> PeriodizationModifiers {
    let week = wrap_week(week_in_block);

    if week == BLOCK_LENGTH {
        return PeriodizationModifiers {
            rpe_offset: -2.0,
            set_multiplier: 0.5,
            back_off_multiplier: 0.75,
            is_deload: true,
            week_in_block: week,
        };
    }

    // Progress: 0 at week 1, 1 at the week before deload
    let t = f64::from(week - 1) / f64::from(BLOCK_LENGTH - 2);

    let rpe_offset = match training_age {
        Some(age) => age_rpe_offset(t, age),
        None => generic_rpe_offset(t),
    };

    PeriodizationModifiers {
        rpe_offset,
        set_multiplier: 1.0 + 0.3 * t,
        back_off_multiplier: goal_back_off_multiplier(goal),
        is_deload: false,
        week_in_block: week,
    }
}

/// The full block, week by week; consumed by rationale rendering
pub fn get_mesocycle_periodization(
    goal: Goal,
    training_age: Option<TrainingAge>,
) -> Vec<PeriodizationModifiers> {
    (1..=BLOCK_LENGTH)
        .map(|week| get_periodization_modifiers(week, goal, training_age))
        .collect()
}

// ---------------------------------------------------------------------------
/// Rep ranges and base RPE by goal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalRepRanges {
    /// Main-lift range (lo, hi)
    pub main: (u8, u8),
    /// Accessory range (lo, hi)
    pub accessory: (u8, u8),
}

pub fn get_goal_rep_ranges(goal: Goal, policy: PolicyVersion) -> GoalRepRanges {
    match goal {
        Goal::Hypertrophy => GoalRepRanges { main: (6, 10), accessory: (8, 15) },
        Goal::Strength => GoalRepRanges { main: (3, 6), accessory: (6, 10) },
        Goal::FatLoss => {
            let accessory = match policy {
                PolicyVersion::V1 => (10, 20),
                PolicyVersion::V2 => (12, 25),
            };
            GoalRepRanges { main: (8, 12), accessory }
        }
        Goal::Endurance => GoalRepRanges { main: (12, 15), accessory: (15, 25) },
        Goal::GeneralFitness => GoalRepRanges { main: (8, 12), accessory: (10, 15) },
    }
}

/// Base top-set RPE target before readiness and periodization adjustments
pub fn get_base_target_rpe(goal: Goal, training_age: TrainingAge) -> f64 {
    let base = match goal {
        Goal::Hypertrophy => 7.5,
        Goal::Strength => 8.0,
        Goal::FatLoss => 7.0,
        Goal::Endurance => 7.0,
        Goal::GeneralFitness => 7.0,
    };
    match training_age {
        TrainingAge::Beginner => base - 0.5,
        TrainingAge::Intermediate => base,
        TrainingAge::Advanced => base + 0.5,
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
