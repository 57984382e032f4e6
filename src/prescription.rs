//! Prescription engine
//!
//! Turns (role, goal, training age, fatigue, periodization, exercise rep
//! range) into concrete sets. Main lifts get a top set plus back-offs at a
//! goal-specific load fraction; accessories get straight sets. Deload weeks
//! flatten everything: one shared rep and load target, RPE capped.

use crate::fatigue::FatigueState;
use crate::models::plan::{SetType, WorkoutSet};
use crate::models::profile::{Goal, PolicyVersion, Preferences, TrainingAge};
use crate::periodization::{
    get_base_target_rpe, get_goal_rep_ranges, PeriodizationModifiers, DELOAD_RPE_CAP,
};

const BASE_MAIN_SETS: f64 = 4.0;
const BASE_ACCESSORY_SETS: f64 = 3.0;
const MIN_WORKING_SETS: u8 = 2;

/// Back-off multipliers at or above this keep back-off reps at the top-set
/// count (pure strength work)
const STRENGTH_BACK_OFF_CUTOFF: f64 = 0.9;

pub const WARMUP_REST_SECONDS: u32 = 45;

// ---------------------------------------------------------------------------
/// Set count
// ---------------------------------------------------------------------------

fn age_set_modifier(age: TrainingAge) -> f64 {
    match age {
        TrainingAge::Beginner => 0.85,
        TrainingAge::Intermediate => 1.0,
        TrainingAge::Advanced => 1.15,
    }
}

/// Working-set count before the allocator adjusts it
pub fn base_set_count(
    is_main_lift: bool,
    training_age: TrainingAge,
    fatigue: &FatigueState,
    periodization: &PeriodizationModifiers,
) -> u8 {
    let base = if is_main_lift { BASE_MAIN_SETS } else { BASE_ACCESSORY_SETS };
    let mut count =
        (base * age_set_modifier(training_age) * periodization.set_multiplier).round() as u8;

    if fatigue.low_readiness() {
        count = count.saturating_sub(1).max(MIN_WORKING_SETS);
    }
    if fatigue.missed_last_session {
        count = count.saturating_sub(1).max(MIN_WORKING_SETS);
    }
    count.max(MIN_WORKING_SETS)
}

// ---------------------------------------------------------------------------
/// RPE and rest
// ---------------------------------------------------------------------------

fn target_rpe(
    goal: Goal,
    training_age: TrainingAge,
    fatigue: &FatigueState,
    preferences: Option<&Preferences>,
    periodization: &PeriodizationModifiers,
) -> f64 {
    let mut rpe = get_base_target_rpe(goal, training_age);
    if fatigue.low_readiness() {
        rpe -= 0.5;
    }
    if let Some(preferred) = preferences.and_then(|p| p.target_rpe) {
        rpe = preferred;
    }
    rpe += periodization.rpe_offset;
    if periodization.is_deload {
        rpe = rpe.min(DELOAD_RPE_CAP);
    }
    rpe.clamp(4.0, 10.0)
}

pub fn rest_seconds(is_main_lift: bool, is_compound: bool, fatigue_cost: u8) -> u32 {
    if is_main_lift {
        if fatigue_cost >= 4 {
            180
        } else {
            150
        }
    } else if is_compound {
        120
    } else if fatigue_cost >= 3 {
        90
    } else {
        60
    }
}

// ---------------------------------------------------------------------------
/// Prescription
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct PrescriptionRequest<'a> {
    pub is_main_lift: bool,
    pub training_age: TrainingAge,
    pub goal: Goal,
    pub policy: PolicyVersion,
    pub fatigue: &'a FatigueState,
    pub preferences: Option<&'a Preferences>,
    pub periodization: &'a PeriodizationModifiers,
    /// Exercise's native rep range, intersected with the goal range
    pub exercise_rep_range: Option<(u8, u8)>,
    pub is_compound: bool,
    pub fatigue_cost: u8,
    /// Allocator-decided working sets; `None` uses the base count
    pub set_count_override: Option<u8>,
}

/// Clamp a rep count into the exercise's native range when one is known
fn fit_reps(reps: u8, native: Option<(u8, u8)>) -> u8 {
    match native {
        Some((lo, hi)) => reps.clamp(lo, hi),
        None => reps,
    }
}

pub fn prescribe_sets_reps(request: &PrescriptionRequest) -> Vec<WorkoutSet> {
    let ranges = get_goal_rep_ranges(request.goal, request.policy);
    let periodization = request.periodization;

    let set_count = request.set_count_override.unwrap_or_else(|| {
        base_set_count(
            request.is_main_lift,
            request.training_age,
            request.fatigue,
            periodization,
        )
    });
    let set_count = set_count.max(MIN_WORKING_SETS);

    let rpe = target_rpe(
        request.goal,
        request.training_age,
        request.fatigue,
        request.preferences,
        periodization,
    );
    let rest = rest_seconds(request.is_main_lift, request.is_compound, request.fatigue_cost);

    if request.is_main_lift {
        let (range_lo, range_hi) = ranges.main;
        let top_reps = fit_reps(range_lo, request.exercise_rep_range);

        if periodization.is_deload {
            // Every deload set shares the top-set rep target and one load
            return (1..=set_count)
                .map(|n| WorkoutSet {
                    set_number: n,
                    set_type: SetType::Straight,
                    target_reps: top_reps,
                    target_rpe: rpe,
                    load_factor: periodization.back_off_multiplier,
                    rest_seconds: rest,
                })
                .collect();
        }

        let back_off_reps = if periodization.back_off_multiplier >= STRENGTH_BACK_OFF_CUTOFF {
            top_reps
        } else {
            fit_reps((range_lo + 2).min(range_hi), request.exercise_rep_range)
        };

        let mut sets = vec![WorkoutSet {
            set_number: 1,
            set_type: SetType::Top,
            target_reps: top_reps,
            target_rpe: rpe,
            load_factor: 1.0,
            rest_seconds: rest,
        }];
        for n in 2..=set_count {
            sets.push(WorkoutSet {
                set_number: n,
                set_type: SetType::BackOff,
                target_reps: back_off_reps,
                target_rpe: rpe,
                load_factor: periodization.back_off_multiplier,
                rest_seconds: rest,
            });
        }
        sets
    } else {
        let (lo, hi) = ranges.accessory;
        let reps = fit_reps((lo + hi) / 2, request.exercise_rep_range);
        let load_factor = if periodization.is_deload {
            periodization.back_off_multiplier
        } else {
            1.0
        };

        (1..=set_count)
            .map(|n| WorkoutSet {
                set_number: n,
                set_type: SetType::Straight,
                target_reps: reps,
                target_rpe: rpe,
                load_factor,
                rest_seconds: rest,
            })
            .collect()
    }
}

/// Two ramp-in warmup sets ahead of a main lift's working sets
pub fn warmup_sets(top_reps: u8) -> Vec<WorkoutSet> {
    [(0.5, 1u8), (0.7, 2u8)]
        .into_iter()
        .map(|(load_factor, n)| WorkoutSet {
            set_number: n,
            set_type: SetType::Warmup,
            target_reps: top_reps,
            target_rpe: 4.0,
            load_factor,
            rest_seconds: WARMUP_REST_SECONDS,
        })
        .collect()
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
