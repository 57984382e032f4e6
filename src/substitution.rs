//! Substitute suggestion
//!
//! Ranks library exercises by how closely they reproduce a target exercise's
//! movement and stimulus, after removing anything the user cannot or should
//! not perform.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::exercise::{BodyPart, Exercise, ExerciseLibrary};
use crate::models::profile::Constraints;

const SUGGESTION_LIMIT: usize = 3;

/// Pain severity at or above which a contraindication disqualifies a
/// substitute, matching the hard-filter threshold
const PAIN_SEVERITY_THRESHOLD: u8 = 2;

/// Overlap similarity between a candidate and the target: shared patterns
/// and primary muscles dominate, secondary overlap counts lightly, and a
/// large fatigue-cost gap in either direction costs points.
fn similarity(target: &Exercise, candidate: &Exercise) -> f64 {
    let pattern_overlap = candidate
        .patterns
        .iter()
        .filter(|p| target.patterns.contains(p))
        .count() as f64;
    let primary_overlap = candidate
        .primary_muscles
        .iter()
        .filter(|m| target.primary_muscles.contains(m))
        .count() as f64;
    let secondary_overlap = candidate
        .secondary_muscles
        .iter()
        .filter(|m| target.secondary_muscles.contains(m))
        .count() as f64;

    let fatigue_delta =
        f64::from(target.fatigue_cost.abs_diff(candidate.fatigue_cost));

    pattern_overlap * 2.0 + primary_overlap * 2.0 + secondary_overlap * 0.5
        - fatigue_delta * 0.5
}

fn usable(
    candidate: &Exercise,
    constraints: &Constraints,
    pain_flags: &BTreeMap<BodyPart, u8>,
) -> bool {
    if !candidate.equipment.is_empty()
        && !candidate
            .equipment
            .iter()
            .any(|item| constraints.available_equipment.contains(item))
    {
        return false;
    }
    if constraints.avoid_exercises.contains(&candidate.id) {
        return false;
    }
    !candidate.contraindications.iter().any(|part| {
        pain_flags
            .get(part)
            .is_some_and(|severity| *severity >= PAIN_SEVERITY_THRESHOLD)
    })
}

/// Top 3 substitutes for a target exercise, best first. Candidates that
/// share nothing with the target are never suggested.
pub fn suggest_substitutes(
    target: &Exercise,
    library: &ExerciseLibrary,
    constraints: &Constraints,
    pain_flags: &BTreeMap<BodyPart, u8>,
) -> Vec<Exercise> {
    let mut ranked: Vec<(f64, &Exercise)> = library
        .iter()
        .filter(|e| e.id != target.id)
        .filter(|e| usable(e, constraints, pain_flags))
        .map(|e| (similarity(target, e), e))
        .filter(|(score, _)| *score > 0.0)
        .collect();

    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.name.cmp(&b.1.name)));

    debug!(target = %target.id, candidates = ranked.len(), "ranked substitutes");
    ranked
        .into_iter()
        .take(SUGGESTION_LIMIT)
        .map(|(_, e)| e.clone())
        .collect()
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
