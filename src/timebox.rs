//! Time-boxing estimator
//!
//! Converts exercise and set lists into estimated minutes, and trims
//! accessories when a plan runs over the session budget. Main lifts are
//! never trimmed here.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::exercise::{Exercise, ExerciseLibrary, Muscle};
use crate::models::plan::{PlannedExercise, SetType, WorkoutSet};

/// Work-time bounds per set, seconds
const MIN_WORK_SECONDS: f64 = 20.0;
const MAX_WORK_SECONDS: f64 = 90.0;
const WARMUP_WORK_CAP_SECONDS: f64 = 30.0;

/// Bound on the trim loop; accessories run out long before this on any
/// sane input
pub const TIME_REDUCTION_GUARD: usize = 120;

// ---------------------------------------------------------------------------
/// Estimation
// ---------------------------------------------------------------------------

/// Seconds for one set: rest plus rep-scaled work time
pub fn set_seconds(set: &WorkoutSet) -> f64 {
    let work = (f64::from(set.target_reps) * 2.0 + 10.0).clamp(MIN_WORK_SECONDS, MAX_WORK_SECONDS);
    let work = if set.set_type == SetType::Warmup {
        work.min(WARMUP_WORK_CAP_SECONDS)
    } else {
        work
    };
    f64::from(set.rest_seconds) + work
}

pub fn exercise_seconds(exercise: &PlannedExercise) -> f64 {
    exercise.sets.iter().map(set_seconds).sum()
}

/// Total estimated minutes for a set of planned exercises, rounded
pub fn estimate_minutes<'a>(exercises: impl IntoIterator<Item = &'a PlannedExercise>) -> u32 {
    let seconds: f64 = exercises.into_iter().map(exercise_seconds).sum();
    (seconds / 60.0).round() as u32
}

/// Rough minutes for a not-yet-prescribed exercise; the scorer uses this to
/// project time fit before prescription runs
pub fn provisional_minutes(sets: u8, reps: u8, rest_seconds: u32) -> f64 {
    let work = (f64::from(reps) * 2.0 + 10.0).clamp(MIN_WORK_SECONDS, MAX_WORK_SECONDS);
    f64::from(sets) * (f64::from(rest_seconds) + work) / 60.0
}

// ---------------------------------------------------------------------------
/// Budget trimming
// ---------------------------------------------------------------------------

/// Retention score for an accessory: higher keeps it longer.
///
/// fatigue_cost + 2 x (primary muscles no main lift covers)
/// - (per-muscle duplicate count beyond one, summed)
fn retention_score(
    exercise: &Exercise,
    main_primary: &[Muscle],
    muscle_occurrences: &BTreeMap<Muscle, usize>,
) -> f64 {
    let uncovered = exercise
        .primary_muscles
        .iter()
        .filter(|m| !main_primary.contains(m))
        .count() as f64;

    let redundancy: f64 = exercise
        .primary_muscles
        .iter()
        .map(|m| {
            muscle_occurrences
                .get(m)
                .map(|n| n.saturating_sub(1) as f64)
                .unwrap_or(0.0)
        })
        .sum();

    f64::from(exercise.fatigue_cost) + 2.0 * uncovered - redundancy
}

/// Trim accessories one at a time, lowest retention first, until the plan
/// fits the budget or no accessories remain. Returns removed exercise ids.
pub fn trim_accessories_to_budget(
    main: &[PlannedExercise],
    accessories: &mut Vec<PlannedExercise>,
    library: &ExerciseLibrary,
    budget_minutes: u32,
) -> Vec<String> {
    let main_primary: Vec<Muscle> = main
        .iter()
        .filter_map(|p| library.get(&p.exercise_id))
        .flat_map(|e| e.primary_muscles.iter().copied())
        .collect();

    let mut removed = Vec::new();

    for _ in 0..TIME_REDUCTION_GUARD {
        let total = estimate_minutes(main.iter().chain(accessories.iter()));
        if total <= budget_minutes || accessories.is_empty() {
            break;
        }

        let mut occurrences: BTreeMap<Muscle, usize> = BTreeMap::new();
        for planned in main.iter().chain(accessories.iter()) {
            if let Some(exercise) = library.get(&planned.exercise_id) {
                for muscle in &exercise.primary_muscles {
                    *occurrences.entry(*muscle).or_insert(0) += 1;
                }
            }
        }

        // Lowest retention goes first; name breaks ties deterministically
        let victim_index = accessories
            .iter()
            .enumerate()
            .filter_map(|(i, planned)| {
                library
                    .get(&planned.exercise_id)
                    .map(|e| (i, retention_score(e, &main_primary, &occurrences), e.name.clone()))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.2.cmp(&b.2)))
            .map(|(i, _, _)| i);

        match victim_index {
            Some(i) => {
                let gone = accessories.remove(i);
                debug!(exercise = %gone.exercise_id, "trimmed accessory for time budget");
                removed.push(gone.exercise_id);
            }
            None => break,
        }
    }

    removed
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
