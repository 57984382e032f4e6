//! Candidate scoring
//!
//! Multi-factor soft scoring over hard-filter survivors. The weight table is
//! fixed; during accessory fill four weights interpolate across slot-fill
//! progress so early picks chase volume closure and later picks favor
//! sustainability.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::filters::passes_hard_filters;
use crate::landmarks::INDIRECT_SET_MULTIPLIER;
use crate::models::exercise::Exercise;
use crate::selection::{Phase, SelectionState};
use crate::timebox::provisional_minutes;

/// Minutes of slack under budget required for a +1 time-fit score
const TIME_CUSHION_MINUTES: f64 = 5.0;

/// Provisional working sets assumed before prescription runs
const PROVISIONAL_MAIN_SETS: u8 = 4;
const PROVISIONAL_ACCESSORY_SETS: u8 = 3;
const PROVISIONAL_REST_SECONDS: u32 = 90;

// ---------------------------------------------------------------------------
/// Weights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Weights {
    deficit: f64,
    targetedness: f64,
    sfr: f64,
    lengthened: f64,
    preference: f64,
    diversity: f64,
    continuity: f64,
    time_fit: f64,
    fatigue_penalty: f64,
    redundancy_penalty: f64,
}

const BASE_WEIGHTS: Weights = Weights {
    deficit: 3.0,
    targetedness: 1.0,
    sfr: 1.2,
    lengthened: 0.8,
    preference: 0.7,
    diversity: 0.9,
    continuity: 0.8,
    time_fit: 0.6,
    fatigue_penalty: 1.3,
    redundancy_penalty: 1.0,
};

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

/// Accessory-phase weights drift with slot-fill progress
fn phase_weights(phase: Phase, filled_slot_index: usize, total_slots: usize) -> Weights {
    match phase {
        Phase::Main => BASE_WEIGHTS,
        Phase::Accessory => {
            let t = if total_slots > 1 {
                filled_slot_index as f64 / (total_slots - 1) as f64
            } else {
                0.0
            };
            Weights {
                deficit: lerp(3.0, 2.0, t),
                fatigue_penalty: lerp(1.3, 2.0, t),
                sfr: lerp(1.2, 1.8, t),
                redundancy_penalty: lerp(1.0, 1.5, t),
                ..BASE_WEIGHTS
            }
        }
    }
}

// ---------------------------------------------------------------------------
/// Score breakdown (exposed through the rationale record)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub muscle_deficit: f64,
    pub targetedness: f64,
    pub sfr: f64,
    pub lengthened: f64,
    pub preference: f64,
    pub movement_diversity: f64,
    pub continuity: f64,
    pub time_fit: f64,
    pub fatigue_cost_penalty: f64,
    pub redundancy_penalty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub exercise_id: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub fatigue_cost: u8,
    pub name: String,
}

// ---------------------------------------------------------------------------
/// Component scores
// ---------------------------------------------------------------------------

/// 1-5 attribute centered on 3, scaled to [-1, 1]
fn centered(attribute: u8) -> f64 {
    (f64::from(attribute) - 3.0) / 2.0
}

fn muscle_deficit_score(state: &SelectionState, exercise: &Exercise) -> f64 {
    let masked = |muscle| {
        state.critical_muscles.is_empty() || state.critical_muscles.contains(&muscle)
    };

    let mut score = 0.0;
    for muscle in exercise.primary_muscles.iter().copied().filter(|m| masked(*m)) {
        score += state.remaining_target_fraction(muscle);
    }
    for muscle in exercise.secondary_muscles.iter().copied().filter(|m| masked(*m)) {
        score += state.remaining_target_fraction(muscle) * INDIRECT_SET_MULTIPLIER;
    }
    score
}

fn movement_diversity_score(state: &SelectionState, exercise: &Exercise) -> f64 {
    // One pattern credit per exercise: +1 for a new core pattern, +0.5 for
    // a new non-core one
    let mut score = 0.0;
    for pattern in &exercise.patterns {
        if !state.covered_patterns.contains(pattern) {
            score += if pattern.is_core() { 1.0 } else { 0.5 };
            break;
        }
    }
    let covers_new_muscle = exercise
        .primary_muscles
        .iter()
        .any(|m| !state.covered_primary_muscles.contains(m));
    if !covers_new_muscle {
        score -= 0.5;
    }
    score
}

fn time_fit_score(state: &SelectionState, exercise: &Exercise, phase: Phase) -> f64 {
    let sets = match phase {
        Phase::Main => PROVISIONAL_MAIN_SETS,
        Phase::Accessory => PROVISIONAL_ACCESSORY_SETS,
    };
    let reps = exercise.rep_midpoint();
    let projected =
        state.estimated_minutes + provisional_minutes(sets, reps, PROVISIONAL_REST_SECONDS);

    if projected < state.session_minutes - TIME_CUSHION_MINUTES {
        1.0
    } else if projected <= state.session_minutes {
        0.0
    } else {
        -1.0
    }
}

fn fatigue_cost_penalty(state: &SelectionState, exercise: &Exercise) -> f64 {
    let scaled = f64::from(exercise.fatigue_cost.saturating_sub(1)) / 4.0;
    let readiness_multiplier = match state.fatigue.readiness {
        0..=2 => 1.0,
        3 => 0.5,
        _ => 0.25,
    };
    scaled * readiness_multiplier
}

fn redundancy_penalty(state: &SelectionState, exercise: &Exercise) -> f64 {
    let Some(primary) = exercise.primary_muscles.first() else {
        return 0.0;
    };
    let Some(bucket) = exercise.primary_pattern().map(|p| p.bucket()) else {
        return 0.0;
    };

    let sharers = state
        .selected
        .iter()
        .filter_map(|sel| state.library.get(&sel.exercise_id))
        .filter(|other| {
            other.primary_muscles.first() == Some(primary)
                && other.primary_pattern().map(|p| p.bucket()) == Some(bucket)
        })
        .count();

    match sharers {
        0 => 0.0,
        1 => 0.5,
        _ => 1.0,
    }
}

// ---------------------------------------------------------------------------
/// Scoring entry point
// ---------------------------------------------------------------------------

/// Score every hard-filter survivor for the given phase. Output is sorted:
/// score desc, fatigue cost asc, then name asc — unless a seed is present,
/// in which case exact score-and-fatigue ties are permuted by the seed.
pub fn score_candidates(
    state: &SelectionState,
    phase: Phase,
    filled_slot_index: usize,
    total_slots: usize,
) -> Vec<ScoredCandidate> {
    let weights = phase_weights(phase, filled_slot_index, total_slots);
    let highest_deficit = state.highest_deficit_muscle();

    let mut scored: Vec<ScoredCandidate> = state
        .library
        .iter()
        .filter(|exercise| passes_hard_filters(state, exercise, phase))
        .map(|exercise| {
            let breakdown = ScoreBreakdown {
                muscle_deficit: muscle_deficit_score(state, exercise),
                targetedness: match highest_deficit {
                    Some(muscle) if exercise.primary_muscles.contains(&muscle) => 1.0,
                    _ => 0.0,
                },
                sfr: centered(exercise.sfr_score),
                lengthened: centered(exercise.lengthened_score),
                preference: if state
                    .preferences
                    .favorite_exercises
                    .contains(&exercise.id)
                {
                    1.0
                } else {
                    0.0
                },
                movement_diversity: movement_diversity_score(state, exercise),
                continuity: if state.periodization.week_in_block == 1 {
                    0.0
                } else {
                    f64::from(
                        state
                            .history
                            .continuity
                            .get(&exercise.id)
                            .copied()
                            .unwrap_or(0),
                    ) / 3.0
                },
                time_fit: time_fit_score(state, exercise, phase),
                fatigue_cost_penalty: fatigue_cost_penalty(state, exercise),
                redundancy_penalty: redundancy_penalty(state, exercise),
            };

            let score = weights.deficit * breakdown.muscle_deficit
                + weights.targetedness * breakdown.targetedness
                + weights.sfr * breakdown.sfr
                + weights.lengthened * breakdown.lengthened
                + weights.preference * breakdown.preference
                + weights.diversity * breakdown.movement_diversity
                + weights.continuity * breakdown.continuity
                + weights.time_fit * breakdown.time_fit
                - weights.fatigue_penalty * breakdown.fatigue_cost_penalty
                - weights.redundancy_penalty * breakdown.redundancy_penalty;

            ScoredCandidate {
                exercise_id: exercise.id.clone(),
                score,
                breakdown,
                fatigue_cost: exercise.fatigue_cost,
                name: exercise.name.clone(),
            }
        })
        .collect();

    let seed = state.seed;
    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.fatigue_cost.cmp(&b.fatigue_cost))
            .then_with(|| match seed {
                Some(seed) => tie_key(seed, &a.exercise_id).cmp(&tie_key(seed, &b.exercise_id)),
                None => a.name.cmp(&b.name),
            })
    });

    trace!(phase = ?phase, candidates = scored.len(), "scored candidates");
    scored
}

/// Seeded, exercise-stable shuffle key for exact ties
fn tie_key(seed: u64, exercise_id: &str) -> u64 {
    let folded = exercise_id
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(131).wrapping_add(u64::from(b)));
    ChaCha8Rng::seed_from_u64(seed ^ folded).next_u64()
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
