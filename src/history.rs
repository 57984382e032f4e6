//! History aggregation
//!
//! Turns raw workout history into the rolling signals the selector consumes:
//! per-muscle weekly volume, per-exercise recency and continuity, stalled
//! exercise detection, and the deload trigger. All windows are computed
//! relative to an explicit `as_of` instant so identical inputs always yield
//! identical output.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::landmarks::{VolumeLandmark, VolumeLandmarks, INDIRECT_SET_MULTIPLIER};
use crate::models::exercise::{ExerciseLibrary, Muscle};
use crate::models::history::{SessionIntent, SessionStatus, WorkoutHistoryEntry};

/// Same-intent sessions examined for continuity
const CONTINUITY_WINDOW: usize = 3;

/// Consecutive low-readiness sessions that force a deload
const DELOAD_READINESS_STREAK: usize = 4;

/// Completed sessions with non-increasing volume that force a deload
const DELOAD_VOLUME_STREAK: usize = 5;

/// Consecutive appearances with no top-set improvement to call a stall
const STALL_APPEARANCES: usize = 3;

// ---------------------------------------------------------------------------
/// Per-muscle volume context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MuscleVolume {
    pub weekly_direct_sets: f64,
    pub weekly_indirect_sets: f64,
    pub previous_direct_sets: f64,
    pub previous_indirect_sets: f64,
}

impl MuscleVolume {
    /// Effective weekly sets: direct plus scaled indirect
    pub fn recent_effective(&self) -> f64 {
        self.weekly_direct_sets + self.weekly_indirect_sets * INDIRECT_SET_MULTIPLIER
    }

    pub fn previous_effective(&self) -> f64 {
        self.previous_direct_sets + self.previous_indirect_sets * INDIRECT_SET_MULTIPLIER
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeContext {
    pub muscles: BTreeMap<Muscle, MuscleVolume>,
    pub landmarks: BTreeMap<Muscle, VolumeLandmark>,
}

impl VolumeContext {
    pub fn recent_effective(&self, muscle: Muscle) -> f64 {
        self.muscles
            .get(&muscle)
            .map(MuscleVolume::recent_effective)
            .unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
/// Aggregated history context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryContext {
    pub volume: VolumeContext,
    /// Hours since each exercise was last performed
    pub recency_hours: BTreeMap<String, f64>,
    /// Appearances in the last 3 same-intent sessions
    pub continuity: BTreeMap<String, u8>,
    /// Exercises with no top-set progress over their last 3 appearances
    pub stalled: BTreeSet<String>,
    /// Most recent stimulus instant per muscle, for SRA recovery
    pub last_stimulus: BTreeMap<Muscle, DateTime<Utc>>,
    pub deload_due: bool,
    pub completed_sessions: usize,
}

/// Aggregate raw history into selector inputs.
///
/// `intent` scopes the continuity window: only sessions generated for the
/// same intent count toward an exercise's continuity.
pub fn aggregate_history(
    history: &[WorkoutHistoryEntry],
    library: &ExerciseLibrary,
    landmarks: &VolumeLandmarks,
    intent: Option<SessionIntent>,
    as_of: DateTime<Utc>,
) -> HistoryContext {
    let mut entries: Vec<&WorkoutHistoryEntry> = history.iter().collect();
    entries.sort_by_key(|e| e.date);

    let mut muscles: BTreeMap<Muscle, MuscleVolume> = BTreeMap::new();
    let mut recency_hours: BTreeMap<String, f64> = BTreeMap::new();
    let mut last_stimulus: BTreeMap<Muscle, DateTime<Utc>> = BTreeMap::new();

    for entry in &entries {
        if entry.status == SessionStatus::Skipped {
            continue;
        }
        let age_days = (as_of - entry.date).num_hours() as f64 / 24.0;
        let in_recent = (0.0..7.0).contains(&age_days);
        let in_previous = (7.0..14.0).contains(&age_days);

        for logged in &entry.exercises {
            let Some(exercise) = library.get(&logged.exercise_id) else {
                continue;
            };
            let sets = logged.set_count() as f64;

            if age_days >= 0.0 {
                let hours = (as_of - entry.date).num_hours() as f64;
                recency_hours
                    .entry(logged.exercise_id.clone())
                    .and_modify(|h| *h = h.min(hours))
                    .or_insert(hours);

                for muscle in exercise.primary_muscles.iter().copied() {
                    last_stimulus
                        .entry(muscle)
                        .and_modify(|d| *d = (*d).max(entry.date))
                        .or_insert(entry.date);
                }
            }

            if in_recent || in_previous {
                for muscle in exercise.primary_muscles.iter().copied() {
                    let slot = muscles.entry(muscle).or_default();
                    if in_recent {
                        slot.weekly_direct_sets += sets;
                    } else {
                        slot.previous_direct_sets += sets;
                    }
                }
                for muscle in exercise.secondary_muscles.iter().copied() {
                    let slot = muscles.entry(muscle).or_default();
                    if in_recent {
                        slot.weekly_indirect_sets += sets;
                    } else {
                        slot.previous_indirect_sets += sets;
                    }
                }
            }
        }
    }

    let landmark_table = Muscle::ALL
        .iter()
        .filter_map(|m| landmarks.get(*m).map(|l| (*m, l)))
        .collect();

    let continuity = compute_continuity(&entries, intent);
    let stalled = detect_stalls(&entries);
    let deload_due = deload_trigger(&entries);
    let completed_sessions = entries
        .iter()
        .filter(|e| e.status == SessionStatus::Completed)
        .count();

    debug!(
        tracked_muscles = muscles.len(),
        stalled = stalled.len(),
        deload_due,
        "aggregated history"
    );

    HistoryContext {
        volume: VolumeContext { muscles, landmarks: landmark_table },
        recency_hours,
        continuity,
        stalled,
        last_stimulus,
        deload_due,
        completed_sessions,
    }
}

/// Appearances per exercise over the last 3 sessions that share the intent
fn compute_continuity(
    entries: &[&WorkoutHistoryEntry],
    intent: Option<SessionIntent>,
) -> BTreeMap<String, u8> {
    let mut continuity = BTreeMap::new();
    let window = entries
        .iter()
        .rev()
        .filter(|e| e.status != SessionStatus::Skipped)
        .filter(|e| match (intent, e.intent) {
            (Some(wanted), Some(had)) => wanted == had,
            (Some(_), None) => false,
            (None, _) => true,
        })
        .take(CONTINUITY_WINDOW);

    for entry in window {
        for logged in &entry.exercises {
            *continuity.entry(logged.exercise_id.clone()).or_insert(0) += 1;
        }
    }
    continuity
}

/// An exercise stalls when its last 3 appearances show no top-set load or
/// rep increase between any consecutive pair.
fn detect_stalls(entries: &[&WorkoutHistoryEntry]) -> BTreeSet<String> {
    let mut appearances: BTreeMap<String, Vec<(f64, u8)>> = BTreeMap::new();

    for entry in entries {
        if entry.status == SessionStatus::Skipped {
            continue;
        }
        for logged in &entry.exercises {
            if let Some(top) = logged.top_set() {
                appearances
                    .entry(logged.exercise_id.clone())
                    .or_default()
                    .push(top);
            }
        }
    }

    appearances
        .into_iter()
        .filter(|(_, tops)| {
            if tops.len() < STALL_APPEARANCES {
                return false;
            }
            let recent = &tops[tops.len() - STALL_APPEARANCES..];
            recent.windows(2).all(|pair| {
                let (prev_load, prev_reps) = pair[0];
                let (load, reps) = pair[1];
                load <= prev_load && reps <= prev_reps
            })
        })
        .map(|(id, _)| id)
        .collect()
}

/// Deload trigger:
/// - fewer than 2 entries: never
/// - 4 consecutive most-recent sessions with readiness <= 2: yes
/// - 5 most-recent completed sessions with non-increasing total volume: yes
pub fn deload_trigger(entries: &[&WorkoutHistoryEntry]) -> bool {
    if entries.len() < 2 {
        return false;
    }

    let recent_readiness: Vec<u8> = entries
        .iter()
        .rev()
        .take(DELOAD_READINESS_STREAK)
        .filter_map(|e| e.readiness)
        .collect();
    if recent_readiness.len() == DELOAD_READINESS_STREAK
        && recent_readiness.iter().all(|r| *r <= 2)
    {
        return true;
    }

    let completed: Vec<usize> = entries
        .iter()
        .filter(|e| e.status == SessionStatus::Completed)
        .map(|e| e.total_sets())
        .collect();
    if completed.len() >= DELOAD_VOLUME_STREAK {
        let recent = &completed[completed.len() - DELOAD_VOLUME_STREAK..];
        if recent.windows(2).all(|pair| pair[1] <= pair[0]) {
            return true;
        }
    }

    false
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
