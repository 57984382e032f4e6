//! Hard filter engine
//!
//! Binary eligibility gate per exercise. Each check is an independent
//! predicate over immutable exercise data and selection-state-derived sets;
//! the diagnostic variant reports the first failing check so the rationale
//! layer can explain exclusions.

use serde::{Deserialize, Serialize};

use crate::models::exercise::Exercise;
use crate::models::profile::Goal;
use crate::periodization::get_goal_rep_ranges;
use crate::selection::{Phase, SelectionState};

/// Pain severity at or above which a contraindication excludes an exercise
const PAIN_SEVERITY_THRESHOLD: u8 = 2;

/// Minimum SFR score for accessories under stimulus-focused goals
const SFR_FLOOR: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    AlreadySelected,
    Equipment,
    Avoid,
    PainConflict,
    SfrBelowThreshold,
    CriticalMuscleOverlap,
    BodyPartPrimaryOverlap,
    IntentScopePrimaryOverlap,
    SamePrimaryPatternDuplicate,
    MainLiftEligibility,
    MainRepRange,
}

pub fn passes_hard_filters(state: &SelectionState, exercise: &Exercise, phase: Phase) -> bool {
    hard_filter_reason(state, exercise, phase).is_none()
}

/// Diagnostic variant: the first failing check, or `None` when eligible
pub fn hard_filter_reason(
    state: &SelectionState,
    exercise: &Exercise,
    phase: Phase,
) -> Option<FilterReason> {
    if state.is_selected(&exercise.id) {
        return Some(FilterReason::AlreadySelected);
    }

    // Bodyweight-only exercises need nothing; otherwise any required item
    // must be on hand
    if !exercise.equipment.is_empty()
        && !exercise
            .equipment
            .iter()
            .any(|item| state.constraints.available_equipment.contains(item))
    {
        return Some(FilterReason::Equipment);
    }

    if state.constraints.avoid_exercises.contains(&exercise.id) {
        return Some(FilterReason::Avoid);
    }

    let pain_conflict = exercise.contraindications.iter().any(|part| {
        state
            .fatigue
            .pain_flags
            .get(part)
            .is_some_and(|severity| *severity >= PAIN_SEVERITY_THRESHOLD)
    });
    if pain_conflict {
        return Some(FilterReason::PainConflict);
    }

    // Forced-split days require the day's tag and keep every primary muscle
    // inside the day's scope
    if let Some(tag) = state.forced_split {
        if !exercise.split_tags.contains(&tag) {
            return Some(FilterReason::BodyPartPrimaryOverlap);
        }
    }
    if let Some(scope) = state.split_scope() {
        if !exercise
            .primary_muscles
            .iter()
            .any(|m| scope.contains(m))
        {
            return Some(FilterReason::BodyPartPrimaryOverlap);
        }
    } else if let Some(scope) = state.intent_scope() {
        if !exercise
            .primary_muscles
            .iter()
            .any(|m| scope.contains(m))
        {
            return Some(FilterReason::IntentScopePrimaryOverlap);
        }
    }

    match phase {
        Phase::Accessory => {
            let stimulus_goal = matches!(state.goal, Goal::Hypertrophy | Goal::FatLoss);
            if stimulus_goal && exercise.sfr_score < SFR_FLOOR {
                return Some(FilterReason::SfrBelowThreshold);
            }

            if !state.critical_muscles.is_empty()
                && !exercise
                    .primary_muscles
                    .iter()
                    .any(|m| state.critical_muscles.contains(m))
            {
                return Some(FilterReason::CriticalMuscleOverlap);
            }
        }
        Phase::Main => {
            // A second main lift hitting the same primary muscle through the
            // same pattern adds nothing a back-off set would not. Exercises
            // without a primary muscle or pattern never count as duplicates.
            let duplicate = state.selected.iter().any(|sel| {
                state.library.get(&sel.exercise_id).is_some_and(|other| {
                    let same_primary = matches!(
                        (other.primary_muscles.first(), exercise.primary_muscles.first()),
                        (Some(a), Some(b)) if a == b
                    );
                    let same_pattern = matches!(
                        (other.primary_pattern(), exercise.primary_pattern()),
                        (Some(a), Some(b)) if a == b
                    );
                    same_primary && same_pattern
                })
            });
            if duplicate {
                return Some(FilterReason::SamePrimaryPatternDuplicate);
            }

            if !exercise.is_main_lift_eligible() {
                return Some(FilterReason::MainLiftEligibility);
            }

            let main_range = get_goal_rep_ranges(state.goal, state.policy).main;
            if !exercise.rep_range_overlaps(main_range) {
                return Some(FilterReason::MainRepRange);
            }
        }
    }

    None
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
