//! Exercise reference data
//!
//! Immutable library records owned externally. The library is validated and
//! normalized once at load time; the engine never re-checks raw input fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

// ---------------------------------------------------------------------------
/// Muscles tracked by the volume model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Muscle {
    Chest,
    FrontDelts,
    SideDelts,
    RearDelts,
    Lats,
    UpperBack,
    Traps,
    Biceps,
    Triceps,
    Forearms,
    Quads,
    Hamstrings,
    Glutes,
    Calves,
    Abs,
    LowerBack,
}

impl Muscle {
    pub const ALL: [Muscle; 16] = [
        Muscle::Chest,
        Muscle::FrontDelts,
        Muscle::SideDelts,
        Muscle::RearDelts,
        Muscle::Lats,
        Muscle::UpperBack,
        Muscle::Traps,
        Muscle::Biceps,
        Muscle::Triceps,
        Muscle::Forearms,
        Muscle::Quads,
        Muscle::Hamstrings,
        Muscle::Glutes,
        Muscle::Calves,
        Muscle::Abs,
        Muscle::LowerBack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Muscle::Chest => "chest",
            Muscle::FrontDelts => "front_delts",
            Muscle::SideDelts => "side_delts",
            Muscle::RearDelts => "rear_delts",
            Muscle::Lats => "lats",
            Muscle::UpperBack => "upper_back",
            Muscle::Traps => "traps",
            Muscle::Biceps => "biceps",
            Muscle::Triceps => "triceps",
            Muscle::Forearms => "forearms",
            Muscle::Quads => "quads",
            Muscle::Hamstrings => "hamstrings",
            Muscle::Glutes => "glutes",
            Muscle::Calves => "calves",
            Muscle::Abs => "abs",
            Muscle::LowerBack => "lower_back",
        }
    }
}

// ---------------------------------------------------------------------------
/// Movement patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPattern {
    Squat,
    Hinge,
    Lunge,
    HorizontalPush,
    HorizontalPull,
    VerticalPush,
    VerticalPull,
    Carry,
    Rotation,
    Isolation,
}

impl MovementPattern {
    /// Core patterns count double for movement diversity
    pub fn is_core(&self) -> bool {
        matches!(
            self,
            MovementPattern::Squat
                | MovementPattern::Hinge
                | MovementPattern::HorizontalPush
                | MovementPattern::HorizontalPull
                | MovementPattern::VerticalPush
                | MovementPattern::VerticalPull
        )
    }

    /// Bucket used by redundancy checks: push/pull/lower/other
    pub fn bucket(&self) -> PatternBucket {
        match self {
            MovementPattern::HorizontalPush | MovementPattern::VerticalPush => PatternBucket::Push,
            MovementPattern::HorizontalPull | MovementPattern::VerticalPull => PatternBucket::Pull,
            MovementPattern::Squat | MovementPattern::Hinge | MovementPattern::Lunge => {
                PatternBucket::Lower
            }
            _ => PatternBucket::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternBucket {
    Push,
    Pull,
    Lower,
    Other,
}

// ---------------------------------------------------------------------------
/// Split tags, equipment, joint stress, body parts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitTag {
    Push,
    Pull,
    Legs,
    Upper,
    Lower,
    FullBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Equipment {
    Barbell,
    Dumbbell,
    Kettlebell,
    Cable,
    Machine,
    Bench,
    Rack,
    PullUpBar,
    ResistanceBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointStress {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    LowBack,
    Knee,
    Hip,
    Shoulder,
    Elbow,
    Wrist,
    Neck,
    Ankle,
}

// ---------------------------------------------------------------------------
/// Exercise record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub patterns: Vec<MovementPattern>,
    pub split_tags: Vec<SplitTag>,
    pub joint_stress: JointStress,
    /// Explicit eligibility; older library exports only carry `is_main_lift`.
    /// Resolved once at library load.
    #[serde(default)]
    pub main_lift_eligible: Option<bool>,
    #[serde(default)]
    pub is_main_lift: Option<bool>,
    pub is_compound: bool,
    /// Systemic fatigue cost, 1-5
    pub fatigue_cost: u8,
    pub primary_muscles: Vec<Muscle>,
    #[serde(default)]
    pub secondary_muscles: Vec<Muscle>,
    /// Empty means bodyweight-only
    #[serde(default)]
    pub equipment: Vec<Equipment>,
    /// Native rep range (lo, hi)
    pub rep_range: (u8, u8),
    /// Stimulus-to-fatigue ratio, 1-5
    pub sfr_score: u8,
    /// Loaded-stretch quality, 1-5
    pub lengthened_score: u8,
    #[serde(default)]
    pub contraindications: Vec<BodyPart>,
    /// Estimated working-time seconds per set, excluding rest
    pub seconds_per_set: u32,
}

impl Exercise {
    /// Resolved at load; callers never see the raw duck-typed pair.
    pub fn is_main_lift_eligible(&self) -> bool {
        self.main_lift_eligible
            .or(self.is_main_lift)
            .unwrap_or(false)
    }

    pub fn rep_range_overlaps(&self, range: (u8, u8)) -> bool {
        self.rep_range.0 <= range.1 && range.0 <= self.rep_range.1
    }

    /// Midpoint of the native rep range; widened so ranges near `u8::MAX`
    /// cannot overflow
    pub fn rep_midpoint(&self) -> u8 {
        ((u16::from(self.rep_range.0) + u16::from(self.rep_range.1)) / 2) as u8
    }

    pub fn has_pattern(&self, pattern: MovementPattern) -> bool {
        self.patterns.contains(&pattern)
    }

    pub fn primary_pattern(&self) -> Option<MovementPattern> {
        self.patterns.first().copied()
    }

    /// All muscles this exercise touches, primaries first
    pub fn all_muscles(&self) -> impl Iterator<Item = Muscle> + '_ {
        self.primary_muscles
            .iter()
            .chain(self.secondary_muscles.iter())
            .copied()
    }
}

// ---------------------------------------------------------------------------
/// Exercise library: validated, normalized, id-keyed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExerciseLibrary {
    exercises: BTreeMap<String, Exercise>,
}

impl ExerciseLibrary {
    /// Validate and normalize raw exercise records.
    ///
    /// Fatal conditions: duplicate ids, or an exercise tagged both push and
    /// pull (corrupt reference data the selector cannot reason about).
    pub fn load(raw: Vec<Exercise>) -> Result<Self, PlanError> {
        let mut exercises = BTreeMap::new();

        for mut exercise in raw {
            if exercise.split_tags.contains(&SplitTag::Push)
                && exercise.split_tags.contains(&SplitTag::Pull)
            {
                return Err(PlanError::InvalidLibrary {
                    exercise_id: exercise.id.clone(),
                    reason: "tagged both push and pull".into(),
                });
            }

            // Resolve the eligibility fallback once, here
            exercise.main_lift_eligible = Some(exercise.is_main_lift_eligible());

            if exercises
                .insert(exercise.id.clone(), exercise.clone())
                .is_some()
            {
                return Err(PlanError::InvalidLibrary {
                    exercise_id: exercise.id,
                    reason: "duplicate exercise id".into(),
                });
            }
        }

        Ok(Self { exercises })
    }

    pub fn get(&self, id: &str) -> Option<&Exercise> {
        self.exercises.get(id)
    }

    /// Deterministic id-ordered iteration
    pub fn iter(&self) -> impl Iterator<Item = &Exercise> {
        self.exercises.values()
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
