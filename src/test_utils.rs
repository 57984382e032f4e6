//! Shared fixture factories for unit tests

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone, Utc};

use crate::fatigue::FatigueState;
use crate::history::{HistoryContext, VolumeContext};
use crate::landmarks::VolumeLandmarks;
use crate::models::exercise::{
    BodyPart, Equipment, Exercise, ExerciseLibrary, JointStress, MovementPattern, Muscle,
    SplitTag,
};
use crate::models::history::{
    LoggedExercise, LoggedSet, SessionIntent, SessionStatus, WorkoutHistoryEntry,
};
use crate::models::plan::{ExerciseRole, PlannedExercise, SetType, WorkoutSet};
use crate::models::profile::{Constraints, Goal, PolicyVersion, Preferences, TrainingAge};
use crate::periodization::get_periodization_modifiers;
use crate::selection::{SelectionInput, SelectionState};

/// Fixed "now" so window math never depends on wall-clock time
pub fn now_fixture() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap()
}

/// Route pipeline tracing through the test harness; respects `RUST_LOG`.
/// Safe to call from every test, only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
/// Exercises
// ---------------------------------------------------------------------------

/// Minimal isolation-style exercise; tests override what they care about
pub fn make_exercise(id: &str, primaries: &[Muscle], secondaries: &[Muscle]) -> Exercise {
    Exercise {
        id: id.to_string(),
        name: id.replace('_', " "),
        patterns: vec![MovementPattern::Isolation],
        split_tags: vec![SplitTag::FullBody],
        joint_stress: JointStress::Low,
        main_lift_eligible: Some(false),
        is_main_lift: None,
        is_compound: false,
        fatigue_cost: 2,
        primary_muscles: primaries.to_vec(),
        secondary_muscles: secondaries.to_vec(),
        equipment: vec![Equipment::Dumbbell],
        rep_range: (8, 15),
        sfr_score: 3,
        lengthened_score: 3,
        contraindications: vec![],
        seconds_per_set: 40,
    }
}

#[allow(clippy::too_many_arguments)]
fn compound(
    id: &str,
    pattern: MovementPattern,
    tags: &[SplitTag],
    primaries: &[Muscle],
    secondaries: &[Muscle],
    equipment: &[Equipment],
    fatigue_cost: u8,
    rep_range: (u8, u8),
) -> Exercise {
    let mut exercise = make_exercise(id, primaries, secondaries);
    exercise.patterns = vec![pattern];
    exercise.split_tags = tags.to_vec();
    exercise.main_lift_eligible = Some(true);
    exercise.is_compound = true;
    exercise.fatigue_cost = fatigue_cost;
    exercise.equipment = equipment.to_vec();
    exercise.rep_range = rep_range;
    exercise.joint_stress = JointStress::Medium;
    exercise
}

/// A small but realistic library spanning push, pull, and lower work
pub fn make_library() -> ExerciseLibrary {
    let mut exercises = vec![
        compound(
            "bench_press",
            MovementPattern::HorizontalPush,
            &[SplitTag::Push, SplitTag::Upper, SplitTag::FullBody],
            &[Muscle::Chest],
            &[Muscle::Triceps, Muscle::FrontDelts],
            &[Equipment::Barbell, Equipment::Bench],
            4,
            (5, 12),
        ),
        compound(
            "incline_db_press",
            MovementPattern::HorizontalPush,
            &[SplitTag::Push, SplitTag::Upper, SplitTag::FullBody],
            &[Muscle::Chest],
            &[Muscle::FrontDelts, Muscle::Triceps],
            &[Equipment::Dumbbell, Equipment::Bench],
            3,
            (6, 12),
        ),
        compound(
            "overhead_press",
            MovementPattern::VerticalPush,
            &[SplitTag::Push, SplitTag::Upper, SplitTag::FullBody],
            &[Muscle::FrontDelts],
            &[Muscle::Triceps, Muscle::SideDelts],
            &[Equipment::Barbell, Equipment::Rack],
            3,
            (5, 10),
        ),
        compound(
            "barbell_row",
            MovementPattern::HorizontalPull,
            &[SplitTag::Pull, SplitTag::Upper, SplitTag::FullBody],
            &[Muscle::Lats, Muscle::UpperBack],
            &[Muscle::Biceps, Muscle::RearDelts],
            &[Equipment::Barbell],
            4,
            (6, 10),
        ),
        compound(
            "lat_pulldown",
            MovementPattern::VerticalPull,
            &[SplitTag::Pull, SplitTag::Upper, SplitTag::FullBody],
            &[Muscle::Lats],
            &[Muscle::Biceps],
            &[Equipment::Cable, Equipment::Machine],
            2,
            (8, 12),
        ),
        compound(
            "back_squat",
            MovementPattern::Squat,
            &[SplitTag::Legs, SplitTag::Lower, SplitTag::FullBody],
            &[Muscle::Quads],
            &[Muscle::Glutes, Muscle::LowerBack],
            &[Equipment::Barbell, Equipment::Rack],
            5,
            (5, 10),
        ),
        compound(
            "leg_press",
            MovementPattern::Squat,
            &[SplitTag::Legs, SplitTag::Lower, SplitTag::FullBody],
            &[Muscle::Quads, Muscle::Glutes],
            &[],
            &[Equipment::Machine],
            3,
            (8, 15),
        ),
        compound(
            "romanian_deadlift",
            MovementPattern::Hinge,
            &[SplitTag::Legs, SplitTag::Lower, SplitTag::FullBody],
            &[Muscle::Hamstrings, Muscle::Glutes],
            &[Muscle::LowerBack],
            &[Equipment::Barbell],
            4,
            (6, 10),
        ),
    ];

    // Hinge work is the usual low-back flashpoint
    exercises
        .iter_mut()
        .find(|e| e.id == "romanian_deadlift")
        .unwrap()
        .contraindications = vec![BodyPart::LowBack];

    let mut cable_fly = make_exercise("cable_fly", &[Muscle::Chest], &[]);
    cable_fly.equipment = vec![Equipment::Cable];
    cable_fly.rep_range = (10, 15);
    cable_fly.sfr_score = 4;
    cable_fly.lengthened_score = 5;
    cable_fly.split_tags = vec![SplitTag::Push, SplitTag::Upper, SplitTag::FullBody];
    exercises.push(cable_fly);

    let mut lateral_raise = make_exercise("lateral_raise", &[Muscle::SideDelts], &[]);
    lateral_raise.fatigue_cost = 1;
    lateral_raise.sfr_score = 4;
    lateral_raise.rep_range = (10, 20);
    lateral_raise.split_tags = vec![SplitTag::Push, SplitTag::Upper, SplitTag::FullBody];
    exercises.push(lateral_raise);

    let mut db_curl = make_exercise("db_curl", &[Muscle::Biceps], &[]);
    db_curl.fatigue_cost = 1;
    db_curl.sfr_score = 4;
    db_curl.split_tags = vec![SplitTag::Pull, SplitTag::Upper, SplitTag::FullBody];
    exercises.push(db_curl);

    let mut leg_curl = make_exercise("leg_curl", &[Muscle::Hamstrings], &[]);
    leg_curl.equipment = vec![Equipment::Machine];
    leg_curl.sfr_score = 4;
    leg_curl.rep_range = (10, 15);
    leg_curl.split_tags = vec![SplitTag::Legs, SplitTag::Lower, SplitTag::FullBody];
    exercises.push(leg_curl);

    ExerciseLibrary::load(exercises).expect("fixture library is valid")
}

// ---------------------------------------------------------------------------
/// History entries
// ---------------------------------------------------------------------------

/// Completed session with `sets` logged sets of 8 reps at 60kg per exercise
pub fn make_entry(date: DateTime<Utc>, exercises: &[(&str, u8)]) -> WorkoutHistoryEntry {
    WorkoutHistoryEntry {
        date,
        status: SessionStatus::Completed,
        exercises: exercises
            .iter()
            .map(|(id, sets)| LoggedExercise {
                exercise_id: id.to_string(),
                sets: (0..*sets)
                    .map(|_| LoggedSet {
                        reps: 8,
                        load_kg: Some(60.0),
                        rpe: Some(7.0),
                    })
                    .collect(),
            })
            .collect(),
        readiness: None,
        soreness_notes: vec![],
        pain_flags: BTreeMap::new(),
        intent: None,
        split_tag: None,
    }
}

// ---------------------------------------------------------------------------
/// Planned exercises
// ---------------------------------------------------------------------------

pub fn make_planned(
    id: &str,
    role: ExerciseRole,
    sets: u8,
    reps: u8,
    rest_seconds: u32,
) -> PlannedExercise {
    PlannedExercise {
        exercise_id: id.to_string(),
        name: id.replace('_', " "),
        role,
        order: 0,
        sets: (1..=sets)
            .map(|n| WorkoutSet {
                set_number: n,
                set_type: SetType::Straight,
                target_reps: reps,
                target_rpe: 7.0,
                load_factor: 1.0,
                rest_seconds,
            })
            .collect(),
        notes: vec![],
    }
}

// ---------------------------------------------------------------------------
/// Selection state fixture
// ---------------------------------------------------------------------------

/// Adjustable knobs for building a selection state mid-flight
pub struct StateFixture {
    pub library: ExerciseLibrary,
    pub constraints: Constraints,
    pub preferences: Preferences,
    pub forced_split: Option<SplitTag>,
    pub pain_flags: BTreeMap<BodyPart, u8>,
    pub planned_volume: BTreeMap<Muscle, f64>,
    pub continuity: BTreeMap<String, u8>,
    pub stalled: BTreeSet<String>,
    pub week_in_block: u8,
    pub readiness: u8,
    pub seed: Option<u64>,
}

impl StateFixture {
    pub fn new() -> Self {
        Self {
            library: make_library(),
            constraints: Constraints {
                available_equipment: vec![
                    Equipment::Barbell,
                    Equipment::Dumbbell,
                    Equipment::Cable,
                    Equipment::Machine,
                    Equipment::Bench,
                    Equipment::Rack,
                ],
                session_minutes: 60,
                avoid_exercises: vec![],
            },
            preferences: Preferences::default(),
            forced_split: None,
            pain_flags: BTreeMap::new(),
            planned_volume: BTreeMap::new(),
            continuity: BTreeMap::new(),
            stalled: BTreeSet::new(),
            week_in_block: 2,
            readiness: 3,
            seed: None,
        }
    }

    fn history_context(&self) -> HistoryContext {
        let landmarks = VolumeLandmarks::standard();
        HistoryContext {
            volume: VolumeContext {
                muscles: BTreeMap::new(),
                landmarks: Muscle::ALL
                    .iter()
                    .filter_map(|m| landmarks.get(*m).map(|l| (*m, l)))
                    .collect(),
            },
            recency_hours: BTreeMap::new(),
            continuity: self.continuity.clone(),
            stalled: self.stalled.clone(),
            last_stimulus: BTreeMap::new(),
            deload_due: false,
            completed_sessions: 6,
        }
    }
}

impl Default for StateFixture {
    fn default() -> Self {
        Self::new()
    }
}

pub fn make_selection_input(fixture: &StateFixture) -> SelectionInput<'_> {
    SelectionInput {
        library: &fixture.library,
        landmarks: VolumeLandmarks::standard(),
        goal: Goal::Hypertrophy,
        policy: PolicyVersion::V1,
        training_age: TrainingAge::Intermediate,
        intent: SessionIntent::FullBody,
        forced_split: fixture.forced_split,
        constraints: fixture.constraints.clone(),
        preferences: fixture.preferences.clone(),
        fatigue: FatigueState {
            readiness: fixture.readiness,
            soreness_notes: vec![],
            missed_last_session: false,
            pain_flags: fixture.pain_flags.clone(),
        },
        history: fixture.history_context(),
        periodization: get_periodization_modifiers(fixture.week_in_block, Goal::Hypertrophy, None),
        cold_start: None,
        seed: fixture.seed,
    }
}

/// Mid-selection state with the fixture's overrides already applied
pub fn make_selection_state_fixture(fixture: &StateFixture) -> SelectionState<'_> {
    let input = make_selection_input(fixture);
    let mut state = SelectionState::from_input(&input);
    state.planned_volume = fixture.planned_volume.clone();
    state
}
