//! Slot-filling selector state machine
//!
//! Fills main-lift and accessory slots through an ordered sequence of phases,
//! each a pure `fn(state) -> state` transition over stack-local working
//! state. Every addition updates planned effective volume, pattern and
//! muscle coverage, and the running time estimate; the one rollback path
//! removes the offending exercise and recomputes every derived aggregate
//! from scratch instead of incrementally undoing it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlanError;
use crate::fatigue::FatigueState;
use crate::filters::{hard_filter_reason, passes_hard_filters, FilterReason};
use crate::history::HistoryContext;
use crate::landmarks::{muscle_class, MuscleClass, VolumeLandmarks, DEFAULT_WEEKLY_TARGET};
use crate::models::exercise::{
    Exercise, ExerciseLibrary, MovementPattern, Muscle, PatternBucket, SplitTag,
};
use crate::models::history::SessionIntent;
use crate::models::plan::ExerciseRole;
use crate::models::profile::{
    ColdStartStage, Constraints, Goal, PolicyVersion, Preferences, TrainingAge,
};
use crate::periodization::{PeriodizationModifiers, BLOCK_LENGTH};
use crate::prescription::base_set_count;
use crate::scoring::{score_candidates, ScoreBreakdown, ScoredCandidate};
use crate::timebox::{provisional_minutes, TIME_REDUCTION_GUARD};

/// Bound on the incremental set-allocation loop
pub const SET_REBALANCE_GUARD: usize = 60;

/// Every plan carries at least this many exercises when the library allows it
const MIN_PLAN_EXERCISES: usize = 3;

/// Continuity appearances required to seed an exercise as an anchor
const ANCHOR_CONTINUITY_FLOOR: u8 = 2;
const ANCHOR_LIMIT: usize = 2;

/// Per-exercise working-set ceilings for the allocator
const MAX_MAIN_SETS: u8 = 6;
const MAX_ACCESSORY_SETS: u8 = 5;
const MIN_ALLOCATED_SETS: u8 = 2;

/// Remaining-target fraction at which a muscle becomes critical for the
/// final accessory slots
const CRITICAL_DEFICIT_FRACTION: f64 = 0.35;
const CRITICAL_SLOT_WINDOW: usize = 2;

/// Provisional per-set rest assumed before prescription runs
const PROVISIONAL_REST_SECONDS: u32 = 90;

// ---------------------------------------------------------------------------
/// Selection phases and steps
// ---------------------------------------------------------------------------

/// Which slot kind a filter/score pass is evaluating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Main,
    Accessory,
}

/// The state-machine phase that added an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStep {
    Seeding,
    MainFill,
    CompoundFloor,
    AccessoryFill,
    StarterFallback,
    Safety,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedExercise {
    pub exercise_id: String,
    pub role: ExerciseRole,
    pub step: SelectionStep,
    pub order: u8,
}

/// Per-candidate explanation record; the sole contract with any
/// explainability layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RationaleEntry {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub hard_filter_pass: bool,
    pub filter_reason: Option<FilterReason>,
    pub selected_step: Option<SelectionStep>,
}

// ---------------------------------------------------------------------------
/// Input / output contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SelectionInput<'a> {
    pub library: &'a ExerciseLibrary,
    pub landmarks: VolumeLandmarks,
    pub goal: Goal,
    pub policy: PolicyVersion,
    pub training_age: TrainingAge,
    pub intent: SessionIntent,
    pub forced_split: Option<SplitTag>,
    pub constraints: Constraints,
    pub preferences: Preferences,
    pub fatigue: FatigueState,
    pub history: HistoryContext,
    pub periodization: PeriodizationModifiers,
    pub cold_start: Option<ColdStartStage>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionOutput {
    pub selected: Vec<SelectedExercise>,
    pub main_ids: Vec<String>,
    pub accessory_ids: Vec<String>,
    /// Working sets per selected exercise
    pub set_targets: BTreeMap<String, u8>,
    /// Planned effective weekly sets added by this session, per muscle
    pub volume_plan: BTreeMap<Muscle, f64>,
    pub rationale: BTreeMap<String, RationaleEntry>,
    pub estimated_minutes: u32,
}

// ---------------------------------------------------------------------------
/// Working state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SelectionState<'a> {
    pub library: &'a ExerciseLibrary,
    pub goal: Goal,
    pub policy: PolicyVersion,
    pub training_age: TrainingAge,
    pub intent: SessionIntent,
    pub forced_split: Option<SplitTag>,
    pub constraints: Constraints,
    pub preferences: Preferences,
    pub fatigue: FatigueState,
    pub history: HistoryContext,
    pub periodization: PeriodizationModifiers,
    /// Weekly effective-set target per muscle for this block week
    pub targets: BTreeMap<Muscle, f64>,
    pub mrv: BTreeMap<Muscle, f64>,
    /// Effective sets this session has planned so far, per muscle
    pub planned_volume: BTreeMap<Muscle, f64>,
    /// Non-empty only for the final accessory slots; filters then require a
    /// primary-muscle hit
    pub critical_muscles: BTreeSet<Muscle>,
    pub selected: Vec<SelectedExercise>,
    pub set_targets: BTreeMap<String, u8>,
    pub main_slots_remaining: usize,
    pub accessory_slots_remaining: usize,
    pub covered_patterns: BTreeSet<MovementPattern>,
    pub covered_primary_muscles: BTreeSet<Muscle>,
    pub estimated_minutes: f64,
    pub session_minutes: f64,
    pub rationale: BTreeMap<String, RationaleEntry>,
    pub seed: Option<u64>,
    pub cold_start: Option<ColdStartStage>,
}

fn class_muscles(classes: &[MuscleClass]) -> BTreeSet<Muscle> {
    Muscle::ALL
        .iter()
        .copied()
        .filter(|m| classes.contains(&muscle_class(*m)))
        .collect()
}

fn split_tag_scope(tag: SplitTag) -> Option<BTreeSet<Muscle>> {
    match tag {
        SplitTag::Push => Some(class_muscles(&[MuscleClass::Push])),
        SplitTag::Pull => Some(class_muscles(&[MuscleClass::Pull])),
        SplitTag::Legs | SplitTag::Lower => Some(class_muscles(&[MuscleClass::Legs])),
        SplitTag::Upper => Some(class_muscles(&[MuscleClass::Push, MuscleClass::Pull])),
        SplitTag::FullBody => None,
    }
}

fn main_slot_budget(session_minutes: f64) -> usize {
    if session_minutes < 40.0 {
        1
    } else {
        2
    }
}

fn accessory_slot_budget(session_minutes: f64) -> usize {
    ((session_minutes / 15.0) as usize).clamp(2, 6)
}

impl<'a> SelectionState<'a> {
    pub fn from_input(input: &SelectionInput<'a>) -> Self {
        let session_minutes = f64::from(input.constraints.session_minutes);
        let week = input.periodization.week_in_block;

        let targets = Muscle::ALL
            .iter()
            .map(|m| (*m, input.landmarks.weekly_target(*m, week, BLOCK_LENGTH)))
            .collect();
        let mrv = Muscle::ALL.iter().map(|m| (*m, input.landmarks.mrv(*m))).collect();

        Self {
            library: input.library,
            goal: input.goal,
            policy: input.policy,
            training_age: input.training_age,
            intent: input.intent,
            forced_split: input.forced_split,
            constraints: input.constraints.clone(),
            preferences: input.preferences.clone(),
            fatigue: input.fatigue.clone(),
            history: input.history.clone(),
            periodization: input.periodization,
            targets,
            mrv,
            planned_volume: BTreeMap::new(),
            critical_muscles: BTreeSet::new(),
            selected: Vec::new(),
            set_targets: BTreeMap::new(),
            main_slots_remaining: main_slot_budget(session_minutes),
            accessory_slots_remaining: accessory_slot_budget(session_minutes),
            covered_patterns: BTreeSet::new(),
            covered_primary_muscles: BTreeSet::new(),
            estimated_minutes: 0.0,
            session_minutes,
            rationale: BTreeMap::new(),
            seed: input.seed,
            cold_start: input.cold_start,
        }
    }

    pub fn is_selected(&self, exercise_id: &str) -> bool {
        self.selected.iter().any(|s| s.exercise_id == exercise_id)
    }

    /// Muscle scope for a forced-split day, `None` for full-body tags
    pub fn split_scope(&self) -> Option<BTreeSet<Muscle>> {
        self.forced_split.and_then(split_tag_scope)
    }

    /// Muscle scope implied by the session intent when no split is forced
    pub fn intent_scope(&self) -> Option<BTreeSet<Muscle>> {
        match self.intent {
            SessionIntent::Upper => split_tag_scope(SplitTag::Upper),
            SessionIntent::Lower => split_tag_scope(SplitTag::Lower),
            SessionIntent::FullBody => None,
            SessionIntent::Split(tag) => split_tag_scope(tag),
        }
    }

    /// Fraction of a muscle's weekly target still unmet after recent history
    /// and the sets planned so far, clamped at zero
    pub fn remaining_target_fraction(&self, muscle: Muscle) -> f64 {
        let target = self
            .targets
            .get(&muscle)
            .copied()
            .unwrap_or(DEFAULT_WEEKLY_TARGET);
        if target <= 0.0 {
            return 0.0;
        }
        let done = self.history.volume.recent_effective(muscle)
            + self.planned_volume.get(&muscle).copied().unwrap_or(0.0);
        ((target - done) / target).max(0.0)
    }

    /// The single muscle with the most unmet effective sets, if any
    pub fn highest_deficit_muscle(&self) -> Option<Muscle> {
        self.deficit_muscles_desc().into_iter().next()
    }

    /// All in-scope muscles with unmet effective sets, largest deficit first
    pub fn deficit_muscles_desc(&self) -> Vec<Muscle> {
        let scope = self.split_scope().or_else(|| self.intent_scope());
        let mut deficits: Vec<(f64, Muscle)> = self
            .targets
            .iter()
            .filter(|(muscle, _)| scope.as_ref().map_or(true, |s| s.contains(*muscle)))
            .filter_map(|(muscle, target)| {
                let done = self.history.volume.recent_effective(*muscle)
                    + self.planned_volume.get(muscle).copied().unwrap_or(0.0);
                let deficit = target - done;
                (deficit > 0.0).then_some((deficit, *muscle))
            })
            .collect();
        deficits.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        deficits.into_iter().map(|(_, m)| m).collect()
    }

    fn sets_for(&self, exercise_id: &str) -> u8 {
        self.set_targets.get(exercise_id).copied().unwrap_or(0)
    }

    fn provisional_exercise_minutes(&self, exercise: &Exercise, sets: u8) -> f64 {
        provisional_minutes(sets, exercise.rep_midpoint(), PROVISIONAL_REST_SECONDS)
    }

    fn per_set_minutes(&self, exercise: &Exercise) -> f64 {
        self.provisional_exercise_minutes(exercise, 1)
    }

    /// Add one exercise and fold its provisional dose into every running
    /// aggregate
    fn add_exercise(&mut self, exercise_id: &str, role: ExerciseRole, step: SelectionStep) {
        let library = self.library;
        let Some(exercise) = library.get(exercise_id) else {
            return;
        };

        let sets = base_set_count(
            role == ExerciseRole::MainLift,
            self.training_age,
            &self.fatigue,
            &self.periodization,
        );

        let order = self.selected.len() as u8;
        self.selected.push(SelectedExercise {
            exercise_id: exercise_id.to_string(),
            role,
            step,
            order,
        });
        self.set_targets.insert(exercise_id.to_string(), sets);

        self.apply_volume(exercise, f64::from(sets));
        self.covered_patterns.extend(exercise.patterns.iter().copied());
        self.covered_primary_muscles
            .extend(exercise.primary_muscles.iter().copied());
        self.estimated_minutes += self.provisional_exercise_minutes(exercise, sets);

        match role {
            ExerciseRole::MainLift => {
                self.main_slots_remaining = self.main_slots_remaining.saturating_sub(1);
            }
            _ => {
                self.accessory_slots_remaining =
                    self.accessory_slots_remaining.saturating_sub(1);
            }
        }

        self.rationale
            .entry(exercise_id.to_string())
            .and_modify(|entry| entry.selected_step = Some(step))
            .or_insert(RationaleEntry {
                score: 0.0,
                breakdown: ScoreBreakdown::default(),
                hard_filter_pass: true,
                filter_reason: None,
                selected_step: Some(step),
            });
        debug!(exercise = exercise_id, ?role, ?step, sets, "selected exercise");
    }

    fn apply_volume(&mut self, exercise: &Exercise, sets: f64) {
        for muscle in &exercise.primary_muscles {
            *self.planned_volume.entry(*muscle).or_insert(0.0) += sets;
        }
        for muscle in &exercise.secondary_muscles {
            *self.planned_volume.entry(*muscle).or_insert(0.0) += sets * 0.5;
        }
    }

    /// Remove an exercise and rebuild every derived aggregate from the
    /// surviving selection. Slot counters are not refunded; a rollback never
    /// reopens a slot.
    fn remove_and_recompute(&mut self, exercise_id: &str) {
        self.selected.retain(|s| s.exercise_id != exercise_id);
        self.set_targets.remove(exercise_id);
        if let Some(entry) = self.rationale.get_mut(exercise_id) {
            entry.selected_step = None;
        }
        self.recompute_aggregates();
    }

    fn recompute_aggregates(&mut self) {
        self.planned_volume.clear();
        self.covered_patterns.clear();
        self.covered_primary_muscles.clear();
        self.estimated_minutes = 0.0;

        let library = self.library;
        let selected: Vec<(String, u8)> = self
            .selected
            .iter()
            .map(|s| (s.exercise_id.clone(), self.sets_for(&s.exercise_id)))
            .collect();

        for (id, sets) in selected {
            let Some(exercise) = library.get(&id) else {
                continue;
            };
            self.apply_volume(exercise, f64::from(sets));
            self.covered_patterns.extend(exercise.patterns.iter().copied());
            self.covered_primary_muscles
                .extend(exercise.primary_muscles.iter().copied());
            self.estimated_minutes += self.provisional_exercise_minutes(exercise, sets);
        }
    }

    fn record_filter_outcomes(&mut self, phase: Phase) {
        let library = self.library;
        let reasons: Vec<(String, Option<FilterReason>)> = library
            .iter()
            .map(|e| (e.id.clone(), hard_filter_reason(self, e, phase)))
            .collect();
        for (id, reason) in reasons {
            if reason.is_some() {
                self.rationale
                    .entry(id)
                    .and_modify(|entry| {
                        if entry.selected_step.is_none() {
                            entry.hard_filter_pass = false;
                            entry.filter_reason = reason;
                        }
                    })
                    .or_insert(RationaleEntry {
                        score: 0.0,
                        breakdown: ScoreBreakdown::default(),
                        hard_filter_pass: false,
                        filter_reason: reason,
                        selected_step: None,
                    });
            }
        }
    }

    fn record_scored(&mut self, scored: &[ScoredCandidate]) {
        for candidate in scored {
            let entry = self
                .rationale
                .entry(candidate.exercise_id.clone())
                .or_insert(RationaleEntry {
                    score: 0.0,
                    breakdown: ScoreBreakdown::default(),
                    hard_filter_pass: true,
                    filter_reason: None,
                    selected_step: None,
                });
            entry.score = candidate.score;
            entry.breakdown = candidate.breakdown;
            entry.hard_filter_pass = true;
            entry.filter_reason = None;
        }
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    /// Pins first, then continuity anchors. Anchors are skipped in block
    /// week 1 so every mesocycle opens with a fresh pick.
    fn seed_phase(mut self) -> Self {
        let pins = self.preferences.pinned_exercises.clone();
        for id in pins {
            self.try_add_preferring_main(&id, SelectionStep::Seeding);
        }

        if self.periodization.week_in_block == 1 {
            return self;
        }

        let mut anchors: Vec<(u8, String)> = self
            .history
            .continuity
            .iter()
            .filter(|(id, count)| {
                **count >= ANCHOR_CONTINUITY_FLOOR && !self.history.stalled.contains(*id)
            })
            .map(|(id, count)| (*count, id.clone()))
            .collect();
        anchors.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut seeded = 0;
        for (_, id) in anchors {
            if seeded >= ANCHOR_LIMIT {
                break;
            }
            if self.try_add_preferring_main(&id, SelectionStep::Seeding) {
                seeded += 1;
            }
        }
        self
    }

    fn try_add_preferring_main(&mut self, exercise_id: &str, step: SelectionStep) -> bool {
        let library = self.library;
        let Some(exercise) = library.get(exercise_id) else {
            return false;
        };
        if self.main_slots_remaining > 0 && passes_hard_filters(self, exercise, Phase::Main) {
            self.add_exercise(exercise_id, ExerciseRole::MainLift, step);
            return true;
        }
        if self.accessory_slots_remaining > 0
            && passes_hard_filters(self, exercise, Phase::Accessory)
        {
            self.add_exercise(exercise_id, ExerciseRole::Accessory, step);
            return true;
        }
        false
    }

    fn main_fill_phase(mut self) -> Self {
        self.record_filter_outcomes(Phase::Main);
        let total = self.main_slots_remaining.max(1);

        while self.main_slots_remaining > 0 {
            let filled = total - self.main_slots_remaining;
            let scored = score_candidates(&self, Phase::Main, filled, total);
            self.record_scored(&scored);

            // No survivor: the slot stays short, never an error
            let Some(best) = scored.first() else {
                break;
            };
            let id = best.exercise_id.clone();
            self.add_exercise(&id, ExerciseRole::MainLift, SelectionStep::MainFill);
        }
        self
    }

    /// Full-body sessions guarantee at least one compound in each of the
    /// push, pull, and lower pattern buckets
    fn compound_floor_phase(self) -> Self {
        if self.intent != SessionIntent::FullBody {
            return self;
        }
        self.ensure_bucket_coverage(SelectionStep::CompoundFloor)
    }

    fn ensure_bucket_coverage(mut self, step: SelectionStep) -> Self {
        for bucket in [PatternBucket::Lower, PatternBucket::Push, PatternBucket::Pull] {
            let covered = self.selected.iter().any(|sel| {
                self.library.get(&sel.exercise_id).is_some_and(|e| {
                    e.is_compound
                        && e.primary_pattern().map(|p| p.bucket()) == Some(bucket)
                })
            });
            if covered {
                continue;
            }
            if self.main_slots_remaining == 0 && self.accessory_slots_remaining == 0 {
                break;
            }

            let scored = score_candidates(&self, Phase::Accessory, 0, 1);
            let pick = scored.iter().find_map(|c| {
                self.library.get(&c.exercise_id).and_then(|e| {
                    (e.is_compound
                        && e.primary_pattern().map(|p| p.bucket()) == Some(bucket))
                    .then(|| c.exercise_id.clone())
                })
            });
            if let Some(id) = pick {
                let eligible = self
                    .library
                    .get(&id)
                    .is_some_and(|e| e.is_main_lift_eligible());
                let role = if self.main_slots_remaining > 0 && eligible {
                    ExerciseRole::MainLift
                } else {
                    ExerciseRole::Accessory
                };
                self.add_exercise(&id, role, step);
            }
        }
        self
    }

    fn accessory_fill_phase(mut self) -> Self {
        self.record_filter_outcomes(Phase::Accessory);
        let total = self.accessory_slots_remaining.max(1);

        while self.accessory_slots_remaining > 0 {
            // The last couple of slots chase only the largest deficits
            if self.accessory_slots_remaining <= CRITICAL_SLOT_WINDOW {
                self.critical_muscles = self.critical_deficit_muscles();
            }

            let filled = total - self.accessory_slots_remaining;
            let mut scored = score_candidates(&self, Phase::Accessory, filled, total);
            if scored.is_empty() && !self.critical_muscles.is_empty() {
                // Nothing hits the critical set; relax it rather than leave
                // the slot empty
                self.critical_muscles.clear();
                scored = score_candidates(&self, Phase::Accessory, filled, total);
            }
            self.record_scored(&scored);

            let Some(best) = scored.first() else {
                break;
            };
            let id = best.exercise_id.clone();
            self.add_exercise(&id, ExerciseRole::Accessory, SelectionStep::AccessoryFill);
        }

        self.critical_muscles.clear();
        self
    }

    fn critical_deficit_muscles(&self) -> BTreeSet<Muscle> {
        let mut deficits: Vec<(f64, Muscle)> = self
            .targets
            .keys()
            .map(|m| (self.remaining_target_fraction(*m), *m))
            .filter(|(f, _)| *f >= CRITICAL_DEFICIT_FRACTION)
            .collect();
        deficits.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        deficits
            .into_iter()
            .take(self.accessory_slots_remaining.max(1))
            .map(|(_, m)| m)
            .collect()
    }

    /// Thin history or a near-empty result falls back to a balanced
    /// compound trio
    fn starter_fallback_phase(self) -> Self {
        if self.cold_start.is_none() && self.selected.len() >= MIN_PLAN_EXERCISES {
            return self;
        }
        self.ensure_bucket_coverage(SelectionStep::StarterFallback)
    }

    /// Retention score used by in-selection trimming, mirroring the
    /// time-boxing pass: fatigue cost, plus credit for primaries no main
    /// lift covers, minus per-muscle redundancy
    fn retention_score(&self, exercise: &Exercise) -> f64 {
        let main_primary: BTreeSet<Muscle> = self
            .selected
            .iter()
            .filter(|s| s.role == ExerciseRole::MainLift)
            .filter_map(|s| self.library.get(&s.exercise_id))
            .flat_map(|e| e.primary_muscles.iter().copied())
            .collect();

        let mut occurrences: BTreeMap<Muscle, usize> = BTreeMap::new();
        for sel in &self.selected {
            if let Some(e) = self.library.get(&sel.exercise_id) {
                for m in &e.primary_muscles {
                    *occurrences.entry(*m).or_insert(0) += 1;
                }
            }
        }

        let uncovered = exercise
            .primary_muscles
            .iter()
            .filter(|m| !main_primary.contains(m))
            .count() as f64;
        let redundancy: f64 = exercise
            .primary_muscles
            .iter()
            .map(|m| occurrences.get(m).map(|n| n.saturating_sub(1) as f64).unwrap_or(0.0))
            .sum();

        f64::from(exercise.fatigue_cost) + 2.0 * uncovered - redundancy
    }

    fn lowest_retention_accessory(&self, touching: Option<Muscle>) -> Option<String> {
        self.selected
            .iter()
            .filter(|s| s.role == ExerciseRole::Accessory)
            .filter_map(|s| self.library.get(&s.exercise_id))
            .filter(|e| match touching {
                Some(muscle) => e.primary_muscles.contains(&muscle),
                None => true,
            })
            .map(|e| (self.retention_score(e), e.name.clone(), e.id.clone()))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, _, id)| id)
    }

    /// Volume caps and time trimming, applied to accessories only. Main
    /// lifts are never touched here.
    fn post_fill_safety_phase(mut self) -> Self {
        // MRV caps: shave accessory sets on over-cap muscles, dropping the
        // accessory outright once it hits the floor
        for _ in 0..SET_REBALANCE_GUARD {
            let over_cap = self.mrv.iter().find_map(|(muscle, cap)| {
                let total = self.history.volume.recent_effective(*muscle)
                    + self.planned_volume.get(muscle).copied().unwrap_or(0.0);
                (total > *cap).then_some(*muscle)
            });
            let Some(muscle) = over_cap else {
                break;
            };
            let Some(id) = self.lowest_retention_accessory(Some(muscle)) else {
                break;
            };

            let sets = self.sets_for(&id);
            if sets > MIN_ALLOCATED_SETS {
                self.set_targets.insert(id, sets - 1);
            } else {
                self.selected.retain(|s| s.exercise_id != id);
                self.set_targets.remove(&id);
            }
            self.recompute_aggregates();
        }

        // Time budget: drop whole accessories, lowest retention first
        for _ in 0..TIME_REDUCTION_GUARD {
            if self.estimated_minutes <= self.session_minutes {
                break;
            }
            let Some(id) = self.lowest_retention_accessory(None) else {
                break;
            };
            debug!(exercise = %id, "trimmed accessory in post-fill safety");
            self.remove_and_recompute(&id);
        }
        self
    }

    /// Cheapest selected holder of the muscle that can still take a set
    /// without breaking its per-role cap or any primary muscle's MRV
    fn set_recipient_for(&self, muscle: Muscle) -> Option<String> {
        self.selected
            .iter()
            .filter_map(|s| self.library.get(&s.exercise_id).map(|e| (s, e)))
            .filter(|(_, e)| e.primary_muscles.contains(&muscle))
            .filter(|(s, e)| {
                let cap = if s.role == ExerciseRole::MainLift {
                    MAX_MAIN_SETS
                } else {
                    MAX_ACCESSORY_SETS
                };
                self.sets_for(&e.id) < cap
            })
            .filter(|(_, e)| {
                e.primary_muscles.iter().all(|m| {
                    let total = self.history.volume.recent_effective(*m)
                        + self.planned_volume.get(m).copied().unwrap_or(0.0);
                    total + 1.0 <= self.mrv.get(m).copied().unwrap_or(f64::MAX)
                })
            })
            .min_by(|a, b| {
                self.sets_for(&a.1.id)
                    .cmp(&self.sets_for(&b.1.id))
                    .then(a.0.order.cmp(&b.0.order))
            })
            .map(|(_, e)| e.id.clone())
    }

    /// Incremental set allocation: one set at a time toward the largest
    /// remaining per-muscle deficit that some selected exercise can still
    /// absorb, respecting MRV and the time budget. Deficits nothing in the
    /// session covers are passed over, not treated as a stopping condition.
    fn allocate_sets_phase(mut self) -> Self {
        'allocation: for _ in 0..SET_REBALANCE_GUARD {
            for muscle in self.deficit_muscles_desc() {
                let Some(id) = self.set_recipient_for(muscle) else {
                    continue;
                };
                let Some(exercise) = self.library.get(&id).cloned() else {
                    continue;
                };
                if self.estimated_minutes + self.per_set_minutes(&exercise)
                    > self.session_minutes
                {
                    continue;
                }

                let sets = self.sets_for(&id);
                self.set_targets.insert(id, sets + 1);
                self.apply_volume(&exercise, 1.0);
                self.estimated_minutes += self.per_set_minutes(&exercise);
                continue 'allocation;
            }
            // No deficit muscle can take another set
            break;
        }
        self
    }

    /// Repeat the safety pass, then enforce the minimum exercise floor. An
    /// addition that breaks the time budget is rolled back by full
    /// recomputation.
    fn final_safety_phase(mut self) -> Self {
        self = self.post_fill_safety_phase();

        for _ in 0..SET_REBALANCE_GUARD {
            if self.selected.len() >= MIN_PLAN_EXERCISES {
                break;
            }
            let scored = score_candidates(&self, Phase::Accessory, 0, 1);
            self.record_scored(&scored);
            let Some(best) = scored.first() else {
                break;
            };
            let id = best.exercise_id.clone();
            self.add_exercise(&id, ExerciseRole::Accessory, SelectionStep::Safety);

            if self.estimated_minutes > self.session_minutes {
                self.remove_and_recompute(&id);
                break;
            }
        }
        self
    }

    fn into_output(self) -> SelectionOutput {
        let main_ids = self
            .selected
            .iter()
            .filter(|s| s.role == ExerciseRole::MainLift)
            .map(|s| s.exercise_id.clone())
            .collect();
        let accessory_ids = self
            .selected
            .iter()
            .filter(|s| s.role != ExerciseRole::MainLift)
            .map(|s| s.exercise_id.clone())
            .collect();
        let estimated_minutes = self.estimated_minutes.round() as u32;

        SelectionOutput {
            selected: self.selected,
            main_ids,
            accessory_ids,
            set_targets: self.set_targets,
            volume_plan: self.planned_volume,
            rationale: self.rationale,
            estimated_minutes,
        }
    }
}

// ---------------------------------------------------------------------------
/// Entry point
// ---------------------------------------------------------------------------

/// Run the full selector state machine over one session's inputs
pub fn select_exercises(input: &SelectionInput) -> Result<SelectionOutput, PlanError> {
    if input.library.is_empty() {
        return Err(PlanError::EmptyLibrary);
    }

    let state = SelectionState::from_input(input)
        .seed_phase()
        .main_fill_phase()
        .compound_floor_phase()
        .accessory_fill_phase()
        .starter_fallback_phase()
        .post_fill_safety_phase()
        .allocate_sets_phase()
        .final_safety_phase();

    Ok(state.into_output())
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_tracing, make_selection_input, StateFixture};

    #[test]
    fn test_selection_is_deterministic() {
        init_tracing();
        let fixture = StateFixture::new();
        let input = make_selection_input(&fixture);

        let first = select_exercises(&input).unwrap();
        let second = select_exercises(&input).unwrap();

        let ids = |out: &SelectionOutput| {
            out.selected.iter().map(|s| s.exercise_id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.set_targets, second.set_targets);
    }

    #[test]
    fn test_no_duplicate_exercises() {
        let fixture = StateFixture::new();
        let input = make_selection_input(&fixture);
        let output = select_exercises(&input).unwrap();

        let mut ids: Vec<&str> =
            output.selected.iter().map(|s| s.exercise_id.as_str()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
        assert!(before >= 3);
    }

    #[test]
    fn test_forced_split_tags_every_selection() {
        let mut fixture = StateFixture::new();
        fixture.forced_split = Some(SplitTag::Push);
        let input = make_selection_input(&fixture);
        let output = select_exercises(&input).unwrap();

        assert!(!output.selected.is_empty());
        for sel in &output.selected {
            let exercise = fixture.library.get(&sel.exercise_id).unwrap();
            assert!(
                exercise.split_tags.contains(&SplitTag::Push),
                "{} lacks the push tag",
                sel.exercise_id
            );
        }
    }

    #[test]
    fn test_main_fill_picks_eligible_compounds() {
        let fixture = StateFixture::new();
        let input = make_selection_input(&fixture);
        let output = select_exercises(&input).unwrap();

        assert!(!output.main_ids.is_empty());
        for id in &output.main_ids {
            assert!(fixture.library.get(id).unwrap().is_main_lift_eligible());
        }
    }

    #[test]
    fn test_pinned_exercise_is_seeded() {
        let mut fixture = StateFixture::new();
        fixture.preferences.pinned_exercises = vec!["db_curl".into()];
        let input = make_selection_input(&fixture);
        let output = select_exercises(&input).unwrap();

        let pinned = output
            .selected
            .iter()
            .find(|s| s.exercise_id == "db_curl")
            .expect("pin missing");
        assert_eq!(pinned.step, SelectionStep::Seeding);
    }

    #[test]
    fn test_anchors_skipped_in_week_one() {
        let mut fixture = StateFixture::new();
        fixture.week_in_block = 1;
        fixture.continuity.insert("db_curl".into(), 3);
        let input = make_selection_input(&fixture);
        let output = select_exercises(&input).unwrap();

        let anchored = output
            .selected
            .iter()
            .any(|s| s.exercise_id == "db_curl" && s.step == SelectionStep::Seeding);
        assert!(!anchored);
    }

    #[test]
    fn test_stalled_exercise_is_not_anchored() {
        let mut fixture = StateFixture::new();
        fixture.week_in_block = 2;
        fixture.continuity.insert("bench_press".into(), 3);
        fixture.stalled.insert("bench_press".into());
        let input = make_selection_input(&fixture);
        let output = select_exercises(&input).unwrap();

        let anchored = output
            .selected
            .iter()
            .any(|s| s.exercise_id == "bench_press" && s.step == SelectionStep::Seeding);
        assert!(!anchored);
    }

    #[test]
    fn test_full_body_covers_push_pull_lower_compounds() {
        let fixture = StateFixture::new();
        let input = make_selection_input(&fixture);
        let output = select_exercises(&input).unwrap();

        let buckets: BTreeSet<PatternBucket> = output
            .selected
            .iter()
            .filter_map(|s| fixture.library.get(&s.exercise_id))
            .filter(|e| e.is_compound)
            .filter_map(|e| e.primary_pattern().map(|p| p.bucket()))
            .collect();

        assert!(buckets.contains(&PatternBucket::Push));
        assert!(buckets.contains(&PatternBucket::Pull));
        assert!(buckets.contains(&PatternBucket::Lower));
    }

    #[test]
    fn test_time_budget_respected_via_accessory_trim() {
        let mut fixture = StateFixture::new();
        fixture.constraints.session_minutes = 30;
        let input = make_selection_input(&fixture);
        let output = select_exercises(&input).unwrap();

        assert!(output.estimated_minutes <= 30 + 1);
        // Main lifts survive the squeeze
        assert!(!output.main_ids.is_empty());
    }

    #[test]
    fn test_set_allocation_closes_deficits() {
        // A long full-body session leaves time for sets beyond the base
        // counts. Unaddressable deficits (muscles nothing selected covers)
        // must not stall the allocator: it keeps filling until every muscle
        // still short of target has all its holders at their set caps.
        let mut fixture = StateFixture::new();
        fixture.constraints.session_minutes = 120;
        let input = make_selection_input(&fixture);
        let output = select_exercises(&input).unwrap();

        let base_total: u32 = output
            .selected
            .iter()
            .map(|s| {
                u32::from(base_set_count(
                    s.role == ExerciseRole::MainLift,
                    input.training_age,
                    &input.fatigue,
                    &input.periodization,
                ))
            })
            .sum();
        let allocated: u32 = output.set_targets.values().map(|s| u32::from(*s)).sum();
        assert!(allocated > base_total, "no sets allocated beyond the base counts");

        let landmarks = VolumeLandmarks::standard();
        for muscle in Muscle::ALL {
            let target = landmarks.weekly_target(muscle, 2, BLOCK_LENGTH);
            let planned = output.volume_plan.get(&muscle).copied().unwrap_or(0.0);
            if planned >= target {
                continue;
            }
            for sel in &output.selected {
                let exercise = fixture.library.get(&sel.exercise_id).unwrap();
                if !exercise.primary_muscles.contains(&muscle) {
                    continue;
                }
                let cap = if sel.role == ExerciseRole::MainLift {
                    MAX_MAIN_SETS
                } else {
                    MAX_ACCESSORY_SETS
                };
                assert_eq!(
                    output.set_targets[&sel.exercise_id], cap,
                    "{} could still absorb a set for {}",
                    sel.exercise_id,
                    muscle.as_str()
                );
            }
        }
    }

    #[test]
    fn test_unknown_pin_is_ignored() {
        let mut fixture = StateFixture::new();
        fixture.preferences.pinned_exercises = vec!["no_such_exercise".into()];
        let input = make_selection_input(&fixture);

        let output = select_exercises(&input).unwrap();
        assert!(!output.selected.iter().any(|s| s.exercise_id == "no_such_exercise"));
    }

    #[test]
    fn test_empty_library_is_fatal() {
        let library = ExerciseLibrary::load(vec![]).unwrap();
        let fixture = StateFixture::new();
        let mut input = make_selection_input(&fixture);
        input.library = &library;

        assert!(matches!(select_exercises(&input), Err(PlanError::EmptyLibrary)));
    }

    #[test]
    fn test_rationale_covers_selected_and_rejected() {
        let mut fixture = StateFixture::new();
        fixture.constraints.avoid_exercises = vec!["cable_fly".into()];
        let input = make_selection_input(&fixture);
        let output = select_exercises(&input).unwrap();

        let rejected = output.rationale.get("cable_fly").unwrap();
        assert!(!rejected.hard_filter_pass);
        assert_eq!(rejected.filter_reason, Some(FilterReason::Avoid));

        for sel in &output.selected {
            let entry = output.rationale.get(&sel.exercise_id).unwrap();
            assert_eq!(entry.selected_step, Some(sel.step));
        }
    }
}
