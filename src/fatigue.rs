//! Fatigue/readiness derivation and SRA recovery estimation
//!
//! The fatigue state is ephemeral: recreated on every generation call from
//! the explicit check-in when present, else the most recent history entry.
//! SRA recovery is advisory only — it annotates the plan, never gates
//! selection.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::exercise::{BodyPart, Muscle};
use crate::models::history::{SessionStatus, WorkoutHistoryEntry};
use crate::models::profile::CheckIn;

/// Recovery percentage under which a targeted muscle draws a warning
pub const SRA_WARNING_THRESHOLD: f64 = 80.0;

// ---------------------------------------------------------------------------
/// Fatigue state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FatigueState {
    /// 1-5; defaults to 3 with no signal
    pub readiness: u8,
    pub soreness_notes: Vec<String>,
    pub missed_last_session: bool,
    pub pain_flags: BTreeMap<BodyPart, u8>,
}

impl Default for FatigueState {
    fn default() -> Self {
        Self {
            readiness: 3,
            soreness_notes: Vec::new(),
            missed_last_session: false,
            pain_flags: BTreeMap::new(),
        }
    }
}

impl FatigueState {
    pub fn low_readiness(&self) -> bool {
        self.readiness <= 2
    }
}

/// Derive fatigue from check-in or, failing that, the latest history entry.
///
/// `missed_last_session` is true only when the most recent entry was
/// skipped outright, regardless of where readiness came from.
pub fn derive_fatigue_state(
    check_in: Option<&CheckIn>,
    history: &[WorkoutHistoryEntry],
) -> FatigueState {
    let latest = history.iter().max_by_key(|e| e.date);
    let missed_last_session =
        latest.map(|e| e.status == SessionStatus::Skipped).unwrap_or(false);

    if let Some(check_in) = check_in {
        return FatigueState {
            readiness: check_in.readiness.clamp(1, 5),
            soreness_notes: check_in.soreness_notes.clone(),
            missed_last_session,
            pain_flags: check_in.pain_flags.clone(),
        };
    }

    match latest {
        Some(entry) => FatigueState {
            readiness: entry.readiness.unwrap_or(3).clamp(1, 5),
            soreness_notes: entry.soreness_notes.clone(),
            missed_last_session,
            pain_flags: entry.pain_flags.clone(),
        },
        None => FatigueState::default(),
    }
}

// ---------------------------------------------------------------------------
/// SRA recovery
// ---------------------------------------------------------------------------

/// Full-recovery window per muscle, in hours
pub fn recovery_window_hours(muscle: Muscle) -> f64 {
    match muscle {
        // Large lower-body muscles recover slowest
        Muscle::Quads | Muscle::Hamstrings | Muscle::Glutes | Muscle::LowerBack => 72.0,
        // Small, high-frequency muscles bounce back fast
        Muscle::Biceps | Muscle::Triceps | Muscle::Forearms | Muscle::Calves | Muscle::Abs => 36.0,
        _ => 48.0,
    }
}

/// Percentage recovered per muscle since its last stimulus. Muscles with no
/// recorded stimulus are fully recovered.
pub fn recovery_percentages(
    last_stimulus: &BTreeMap<Muscle, DateTime<Utc>>,
    as_of: DateTime<Utc>,
) -> BTreeMap<Muscle, f64> {
    last_stimulus
        .iter()
        .map(|(muscle, stimulated_at)| {
            let elapsed_hours = (as_of - *stimulated_at).num_minutes() as f64 / 60.0;
            let pct = (elapsed_hours / recovery_window_hours(*muscle) * 100.0).clamp(0.0, 100.0);
            (*muscle, pct)
        })
        .collect()
}

/// Advisory warnings for targeted muscles still under the recovery
/// threshold. Never blocks selection.
pub fn sra_warnings(
    targeted: impl IntoIterator<Item = Muscle>,
    recovery: &BTreeMap<Muscle, f64>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    for muscle in targeted {
        if let Some(pct) = recovery.get(&muscle) {
            if *pct < SRA_WARNING_THRESHOLD {
                warn!(muscle = muscle.as_str(), recovery_pct = pct, "muscle under-recovered");
                warnings.push(format!(
                    "{} is ~{:.0}% recovered since its last stimulus",
                    muscle.as_str(),
                    pct
                ));
            }
        }
    }
    warnings
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
