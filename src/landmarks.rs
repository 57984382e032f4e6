//! Volume landmarks and weekly volume targets
//!
//! Per-muscle MEV/MAV/MRV landmarks plus the push/pull/legs classification.
//! Loaded once as an immutable lookup service and injected into the engine;
//! nothing here is a mutable global.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::exercise::Muscle;

/// Weekly effective-set target for muscles without a landmark entry
pub const DEFAULT_WEEKLY_TARGET: f64 = 10.0;

/// Secondary-muscle sets count at this fraction of a direct set
pub const INDIRECT_SET_MULTIPLIER: f64 = 0.5;

// ---------------------------------------------------------------------------
/// Landmarks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolumeLandmark {
    /// Minimum effective weekly sets
    pub mev: f64,
    /// Maximum adaptive weekly sets
    pub mav: f64,
    /// Maximum recoverable weekly sets
    pub mrv: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuscleClass {
    Push,
    Pull,
    Legs,
}

// ---------------------------------------------------------------------------
/// Lookup service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct VolumeLandmarks {
    table: BTreeMap<Muscle, VolumeLandmark>,
}

impl VolumeLandmarks {
    /// The built-in landmark table
    pub fn standard() -> Self {
        let entries: [(Muscle, f64, f64, f64); 16] = [
            (Muscle::Chest, 8.0, 14.0, 22.0),
            (Muscle::FrontDelts, 4.0, 8.0, 14.0),
            (Muscle::SideDelts, 8.0, 16.0, 26.0),
            (Muscle::RearDelts, 6.0, 12.0, 22.0),
            (Muscle::Lats, 8.0, 14.0, 22.0),
            (Muscle::UpperBack, 8.0, 14.0, 22.0),
            (Muscle::Traps, 4.0, 10.0, 20.0),
            (Muscle::Biceps, 6.0, 14.0, 20.0),
            (Muscle::Triceps, 6.0, 12.0, 18.0),
            (Muscle::Forearms, 2.0, 8.0, 16.0),
            (Muscle::Quads, 8.0, 14.0, 20.0),
            (Muscle::Hamstrings, 6.0, 12.0, 16.0),
            (Muscle::Glutes, 6.0, 12.0, 16.0),
            (Muscle::Calves, 6.0, 12.0, 16.0),
            (Muscle::Abs, 4.0, 10.0, 16.0),
            (Muscle::LowerBack, 4.0, 8.0, 12.0),
        ];

        let table = entries
            .into_iter()
            .map(|(muscle, mev, mav, mrv)| (muscle, VolumeLandmark { mev, mav, mrv }))
            .collect();

        Self { table }
    }

    /// Custom table (e.g., user-adjusted landmarks)
    pub fn from_table(table: BTreeMap<Muscle, VolumeLandmark>) -> Self {
        Self { table }
    }

    pub fn get(&self, muscle: Muscle) -> Option<VolumeLandmark> {
        self.table.get(&muscle).copied()
    }

    pub fn mrv(&self, muscle: Muscle) -> f64 {
        self.get(muscle)
            .map(|l| l.mrv)
            .unwrap_or(DEFAULT_WEEKLY_TARGET * 1.5)
    }

    /// Weekly effective-set target for a muscle, interpolated MEV -> MAV as
    /// the mesocycle progresses. Week is 1-indexed; the final week (deload)
    /// is not a target week and clamps to MEV.
    pub fn weekly_target(&self, muscle: Muscle, week_in_meso: u8, meso_len: u8) -> f64 {
        let Some(landmark) = self.get(muscle) else {
            return DEFAULT_WEEKLY_TARGET;
        };

        let last_loading_week = meso_len.saturating_sub(1).max(1);
        if week_in_meso >= meso_len {
            // Deload week trains at minimum
            return landmark.mev;
        }

        let progress = if last_loading_week > 1 {
            f64::from(week_in_meso.saturating_sub(1)) / f64::from(last_loading_week - 1)
        } else {
            0.0
        };
        landmark.mev + (landmark.mav - landmark.mev) * progress.clamp(0.0, 1.0)
    }
}

impl Default for VolumeLandmarks {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
/// Push/pull/legs classification
// ---------------------------------------------------------------------------

pub fn muscle_class(muscle: Muscle) -> MuscleClass {
    match muscle {
        Muscle::Chest | Muscle::FrontDelts | Muscle::SideDelts | Muscle::Triceps => {
            MuscleClass::Push
        }
        Muscle::RearDelts
        | Muscle::Lats
        | Muscle::UpperBack
        | Muscle::Traps
        | Muscle::Biceps
        | Muscle::Forearms => MuscleClass::Pull,
        Muscle::Quads
        | Muscle::Hamstrings
        | Muscle::Glutes
        | Muscle::Calves
        | Muscle::Abs
        | Muscle::LowerBack => MuscleClass::Legs,
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekly_target_interpolates_mev_to_mav() {
        let landmarks = VolumeLandmarks::standard();

        // Chest: MEV 8, MAV 14 over a 4-week block (weeks 1-3 loading)
        let week1 = landmarks.weekly_target(Muscle::Chest, 1, 4);
        let week2 = landmarks.weekly_target(Muscle::Chest, 2, 4);
        let week3 = landmarks.weekly_target(Muscle::Chest, 3, 4);

        assert_eq!(week1, 8.0);
        assert_eq!(week2, 11.0);
        assert_eq!(week3, 14.0);
    }

    #[test]
    fn test_deload_week_targets_mev() {
        let landmarks = VolumeLandmarks::standard();
        assert_eq!(landmarks.weekly_target(Muscle::Chest, 4, 4), 8.0);
    }

    #[test]
    fn test_unknown_muscle_falls_back_to_flat_default() {
        let landmarks = VolumeLandmarks::from_table(BTreeMap::new());
        assert_eq!(
            landmarks.weekly_target(Muscle::Chest, 2, 4),
            DEFAULT_WEEKLY_TARGET
        );
    }

    #[test]
    fn test_muscle_classification_is_exclusive() {
        // Every muscle classifies into exactly one of push/pull/legs
        let mut push = 0;
        let mut pull = 0;
        let mut legs = 0;
        for muscle in Muscle::ALL {
            match muscle_class(muscle) {
                MuscleClass::Push => push += 1,
                MuscleClass::Pull => pull += 1,
                MuscleClass::Legs => legs += 1,
            }
        }
        assert_eq!(push + pull + legs, Muscle::ALL.len());
        assert!(push >= 4 && pull >= 4 && legs >= 4);
    }
}
