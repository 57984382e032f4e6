//! Workout generation
//!
//! Orchestrates the full pipeline for one session: history aggregation,
//! fatigue derivation, periodization, selection, prescription, warmup
//! embedding, time-boxing, and advisory recovery notes. Template mode skips
//! selection entirely and shares only the prescription and periodization
//! primitives.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::PlanError;
use crate::fatigue::{derive_fatigue_state, recovery_percentages, sra_warnings, FatigueState};
use crate::history::{aggregate_history, HistoryContext};
use crate::landmarks::VolumeLandmarks;
use crate::models::exercise::{Exercise, ExerciseLibrary, SplitTag};
use crate::models::history::{SessionIntent, WorkoutHistoryEntry};
use crate::models::plan::{ExerciseRole, PlannedExercise, WorkoutPlan};
use crate::models::profile::{
    ColdStartStage, Constraints, GenerationOptions, Goal, UserProfile,
};
use crate::periodization::{
    get_periodization_modifiers, PeriodizationModifiers, BLOCK_LENGTH,
};
use crate::prescription::{prescribe_sets_reps, warmup_sets, PrescriptionRequest};
use crate::selection::{select_exercises, SelectionInput, SelectionOutput};
use crate::timebox::{estimate_minutes, trim_accessories_to_budget};

/// Template mode caps how many listed exercises become main lifts
const TEMPLATE_MAIN_LIMIT: usize = 2;

/// Completed sessions under which cold-start handling kicks in
const COLD_START_SESSIONS: usize = 3;

// ---------------------------------------------------------------------------
/// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub library: &'a ExerciseLibrary,
    pub landmarks: VolumeLandmarks,
    pub profile: UserProfile,
    pub goal: Goal,
    pub constraints: Constraints,
    pub history: Vec<WorkoutHistoryEntry>,
    pub scheduled_date: DateTime<Utc>,
    pub options: GenerationOptions,
}

fn intent_for(options: &GenerationOptions) -> SessionIntent {
    match options.forced_split {
        Some(SplitTag::Upper) => SessionIntent::Upper,
        Some(SplitTag::Lower) => SessionIntent::Lower,
        Some(SplitTag::FullBody) | None => SessionIntent::FullBody,
        Some(tag) => SessionIntent::Split(tag),
    }
}

fn intent_token(intent: SessionIntent) -> &'static str {
    match intent {
        SessionIntent::FullBody => "full_body",
        SessionIntent::Upper => "upper",
        SessionIntent::Lower => "lower",
        SessionIntent::Split(SplitTag::Push) => "push",
        SessionIntent::Split(SplitTag::Pull) => "pull",
        SessionIntent::Split(SplitTag::Legs) => "legs",
        SessionIntent::Split(SplitTag::Upper) => "upper",
        SessionIntent::Split(SplitTag::Lower) => "lower",
        SessionIntent::Split(SplitTag::FullBody) => "full_body",
    }
}

/// Block week inferred from training cadence when no override is given
fn infer_week_in_block(context: &HistoryContext, days_per_week: u8) -> u8 {
    let days = days_per_week.max(1);
    let weeks_trained = context.completed_sessions / usize::from(days);
    ((weeks_trained % usize::from(BLOCK_LENGTH)) as u8) + 1
}

// ---------------------------------------------------------------------------
/// Generation
// ---------------------------------------------------------------------------

pub fn generate_workout(request: &GenerateRequest) -> Result<WorkoutPlan, PlanError> {
    if request.library.is_empty() {
        return Err(PlanError::EmptyLibrary);
    }

    let intent = intent_for(&request.options);
    let context = aggregate_history(
        &request.history,
        request.library,
        &request.landmarks,
        Some(intent),
        request.scheduled_date,
    );
    let fatigue = derive_fatigue_state(request.options.check_in.as_ref(), &request.history);

    let mut notes = Vec::new();
    let week = match request.options.week_in_block {
        Some(week) => week,
        None if context.deload_due => {
            notes.push("deload triggered by recent readiness and volume trend".to_string());
            BLOCK_LENGTH
        }
        None => infer_week_in_block(&context, request.profile.days_per_week),
    };
    let periodization =
        get_periodization_modifiers(week, request.goal, Some(request.profile.training_age));
    if periodization.is_deload {
        notes.push("deload week: reduced volume, effort capped".to_string());
    }

    let cold_start = request.options.cold_start.or({
        if context.completed_sessions == 0 {
            Some(ColdStartStage::FirstSession)
        } else if context.completed_sessions < COLD_START_SESSIONS {
            Some(ColdStartStage::EarlyWeeks)
        } else {
            None
        }
    });

    let (mut main, mut accessories) = match &request.options.template_exercises {
        Some(template) => prescribe_template(request, template, &fatigue, &periodization)?,
        None => {
            let input = SelectionInput {
                library: request.library,
                landmarks: request.landmarks.clone(),
                goal: request.goal,
                policy: request.options.policy,
                training_age: request.profile.training_age,
                intent,
                forced_split: request.options.forced_split,
                constraints: request.constraints.clone(),
                preferences: request.options.preferences.clone(),
                fatigue: fatigue.clone(),
                history: context.clone(),
                periodization,
                cold_start,
                seed: request.options.random_seed,
            };
            let output = select_exercises(&input)?;
            prescribe_selection(request, &output, &fatigue, &periodization)?
        }
    };

    // Warmup ramps into the first main lift rather than standing alone,
    // keeping the plan free of duplicate exercise entries
    if let Some(first_main) = main.first_mut() {
        if !periodization.is_deload {
            if let Some(top_reps) = first_main.sets.first().map(|s| s.target_reps) {
                let mut sets = warmup_sets(top_reps);
                sets.append(&mut first_main.sets);
                for (i, set) in sets.iter_mut().enumerate() {
                    set.set_number = (i + 1) as u8;
                }
                first_main.sets = sets;
            }
        }
    }

    // Time budget, enforced on accessories only; template plans are taken
    // as given
    if request.options.template_exercises.is_none() {
        let removed = trim_accessories_to_budget(
            &main,
            &mut accessories,
            request.library,
            request.constraints.session_minutes,
        );
        if !removed.is_empty() {
            debug!(removed = removed.len(), "accessories trimmed for time");
        }
    }

    // Advisory recovery notes for under-recovered targeted muscles
    let targeted = main
        .iter()
        .chain(accessories.iter())
        .filter_map(|p| request.library.get(&p.exercise_id))
        .flat_map(|e| e.primary_muscles.iter().copied())
        .collect::<std::collections::BTreeSet<_>>();
    let recovery = recovery_percentages(&context.last_stimulus, request.scheduled_date);
    notes.extend(sra_warnings(targeted, &recovery));

    let estimated_minutes = estimate_minutes(main.iter().chain(accessories.iter()));
    let id = format!(
        "plan-{}-{}-w{}",
        request.scheduled_date.format("%Y%m%d"),
        intent_token(intent),
        periodization.week_in_block
    );

    info!(
        plan = %id,
        main = main.len(),
        accessories = accessories.len(),
        estimated_minutes,
        "generated workout plan"
    );

    Ok(WorkoutPlan {
        id,
        scheduled_date: request.scheduled_date,
        warmup: Vec::new(),
        main,
        accessories,
        estimated_minutes,
        notes,
    })
}

// ---------------------------------------------------------------------------
/// Prescription wiring
// ---------------------------------------------------------------------------

fn prescribe_one(
    request: &GenerateRequest,
    exercise: &Exercise,
    role: ExerciseRole,
    order: u8,
    set_count_override: Option<u8>,
    fatigue: &FatigueState,
    periodization: &PeriodizationModifiers,
) -> PlannedExercise {
    let sets = prescribe_sets_reps(&PrescriptionRequest {
        is_main_lift: role == ExerciseRole::MainLift,
        training_age: request.profile.training_age,
        goal: request.goal,
        policy: request.options.policy,
        fatigue,
        preferences: Some(&request.options.preferences),
        periodization,
        exercise_rep_range: Some(exercise.rep_range),
        is_compound: exercise.is_compound,
        fatigue_cost: exercise.fatigue_cost,
        set_count_override,
    });

    PlannedExercise {
        exercise_id: exercise.id.clone(),
        name: exercise.name.clone(),
        role,
        order,
        sets,
        notes: vec![],
    }
}

fn prescribe_selection(
    request: &GenerateRequest,
    output: &SelectionOutput,
    fatigue: &FatigueState,
    periodization: &PeriodizationModifiers,
) -> Result<(Vec<PlannedExercise>, Vec<PlannedExercise>), PlanError> {
    let mut main = Vec::new();
    let mut accessories = Vec::new();

    for (order, selected) in output.selected.iter().enumerate() {
        let exercise = request
            .library
            .get(&selected.exercise_id)
            .ok_or_else(|| PlanError::UnknownExercise(selected.exercise_id.clone()))?;

        let planned = prescribe_one(
            request,
            exercise,
            selected.role,
            order as u8,
            output.set_targets.get(&selected.exercise_id).copied(),
            fatigue,
            periodization,
        );
        if selected.role == ExerciseRole::MainLift {
            main.push(planned);
        } else {
            accessories.push(planned);
        }
    }

    Ok((main, accessories))
}

fn prescribe_template(
    request: &GenerateRequest,
    template: &[String],
    fatigue: &FatigueState,
    periodization: &PeriodizationModifiers,
) -> Result<(Vec<PlannedExercise>, Vec<PlannedExercise>), PlanError> {
    let mut main = Vec::new();
    let mut accessories = Vec::new();

    for (order, id) in template.iter().enumerate() {
        let exercise = request
            .library
            .get(id)
            .ok_or_else(|| PlanError::UnknownExercise(id.clone()))?;

        let role = if exercise.is_main_lift_eligible() && main.len() < TEMPLATE_MAIN_LIMIT {
            ExerciseRole::MainLift
        } else {
            ExerciseRole::Accessory
        };
        let planned =
            prescribe_one(request, exercise, role, order as u8, None, fatigue, periodization);
        if role == ExerciseRole::MainLift {
            main.push(planned);
        } else {
            accessories.push(planned);
        }
    }

    Ok((main, accessories))
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::SetType;
    use crate::models::profile::TrainingAge;
    use crate::periodization::DELOAD_RPE_CAP;
    use crate::test_utils::{init_tracing, make_entry, make_library, now_fixture};
    use chrono::Duration;

    fn request(library: &ExerciseLibrary) -> GenerateRequest<'_> {
        GenerateRequest {
            library,
            landmarks: VolumeLandmarks::standard(),
            profile: UserProfile { training_age: TrainingAge::Intermediate, days_per_week: 3 },
            goal: Goal::Hypertrophy,
            constraints: Constraints {
                available_equipment: vec![
                    crate::models::exercise::Equipment::Barbell,
                    crate::models::exercise::Equipment::Dumbbell,
                    crate::models::exercise::Equipment::Cable,
                    crate::models::exercise::Equipment::Machine,
                    crate::models::exercise::Equipment::Bench,
                    crate::models::exercise::Equipment::Rack,
                ],
                session_minutes: 60,
                avoid_exercises: vec![],
            },
            history: vec![],
            scheduled_date: now_fixture(),
            options: GenerationOptions {
                week_in_block: Some(2),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        init_tracing();
        let library = make_library();
        let req = request(&library);

        let first = generate_workout(&req).unwrap();
        let second = generate_workout(&req).unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_plan_has_no_duplicate_exercises() {
        let library = make_library();
        let plan = generate_workout(&request(&library)).unwrap();

        let mut ids: Vec<&str> =
            plan.all_exercises().map(|p| p.exercise_id.as_str()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
        assert!(before >= 3);
    }

    #[test]
    fn test_warmup_ramps_into_first_main_lift() {
        let library = make_library();
        let plan = generate_workout(&request(&library)).unwrap();

        let first_main = plan.main.first().expect("plan has a main lift");
        assert_eq!(first_main.sets[0].set_type, SetType::Warmup);
        assert_eq!(first_main.sets[1].set_type, SetType::Warmup);
        assert!(first_main.working_set_count() >= 2);
        // Set numbers run contiguously through warmup and work
        for (i, set) in first_main.sets.iter().enumerate() {
            assert_eq!(set.set_number as usize, i + 1);
        }
        // Warmups never appear as standalone plan entries
        assert!(plan.warmup.is_empty());
    }

    #[test]
    fn test_estimated_minutes_within_budget() {
        let library = make_library();
        let mut req = request(&library);
        req.constraints.session_minutes = 40;

        let plan = generate_workout(&req).unwrap();
        assert!(plan.estimated_minutes <= 40);
        assert!(!plan.main.is_empty());
    }

    #[test]
    fn test_week_progression_is_monotonic() {
        let library = make_library();

        let mut week1 = request(&library);
        week1.options.week_in_block = Some(1);
        let mut week3 = request(&library);
        week3.options.week_in_block = Some(3);

        let early = generate_workout(&week1).unwrap();
        let late = generate_workout(&week3).unwrap();

        let top_rpe = |plan: &WorkoutPlan| {
            plan.main[0]
                .sets
                .iter()
                .find(|s| s.set_type == SetType::Top)
                .unwrap()
                .target_rpe
        };
        assert!(top_rpe(&late) >= top_rpe(&early));
        assert!(
            late.main[0].working_set_count() >= early.main[0].working_set_count()
        );
    }

    #[test]
    fn test_deload_week_cuts_volume_and_caps_rpe() {
        let library = make_library();

        let mut week1 = request(&library);
        week1.options.week_in_block = Some(1);
        let mut week4 = request(&library);
        week4.options.week_in_block = Some(4);

        let loading = generate_workout(&week1).unwrap();
        let deload = generate_workout(&week4).unwrap();

        assert!(
            deload.main[0].working_set_count() < loading.main[0].working_set_count()
        );
        for planned in deload.all_exercises() {
            for set in &planned.sets {
                assert!(set.target_rpe <= DELOAD_RPE_CAP);
            }
        }
        assert!(deload.notes.iter().any(|n| n.contains("deload")));
    }

    #[test]
    fn test_deload_auto_triggers_from_history() {
        let library = make_library();
        let now = now_fixture();

        // Four straight low-readiness sessions and no week override
        let mut history = Vec::new();
        for days_ago in [8, 6, 4, 2] {
            let mut entry = make_entry(now - Duration::days(days_ago), &[("bench_press", 3)]);
            entry.readiness = Some(2);
            history.push(entry);
        }

        let mut req = request(&library);
        req.history = history;
        req.options.week_in_block = None;
        // Check-in overrides the stale low readiness so selection still runs
        req.options.check_in = Some(crate::models::profile::CheckIn {
            readiness: 4,
            soreness_notes: vec![],
            pain_flags: Default::default(),
        });

        let plan = generate_workout(&req).unwrap();
        assert!(plan.id.ends_with("-w4"));
        assert!(plan.notes.iter().any(|n| n.contains("deload triggered")));
    }

    #[test]
    fn test_forced_split_day_selects_tagged_exercises_only() {
        let library = make_library();
        let mut req = request(&library);
        req.options.forced_split = Some(SplitTag::Pull);

        let plan = generate_workout(&req).unwrap();
        assert!(!plan.main.is_empty());
        for planned in plan.all_exercises() {
            let exercise = library.get(&planned.exercise_id).unwrap();
            assert!(exercise.split_tags.contains(&SplitTag::Pull));
        }
    }

    #[test]
    fn test_template_mode_prescribes_listed_exercises_in_order() {
        let library = make_library();
        let mut req = request(&library);
        req.options.template_exercises = Some(vec![
            "back_squat".into(),
            "bench_press".into(),
            "barbell_row".into(),
            "db_curl".into(),
        ]);

        let plan = generate_workout(&req).unwrap();
        // First two eligible lifts become mains, the rest accessories
        assert_eq!(plan.main.len(), 2);
        assert_eq!(plan.main[0].exercise_id, "back_squat");
        assert_eq!(plan.main[1].exercise_id, "bench_press");
        assert_eq!(plan.accessories.len(), 2);
        assert_eq!(plan.accessories[0].exercise_id, "barbell_row");
    }

    #[test]
    fn test_template_mode_rejects_unknown_exercise() {
        let library = make_library();
        let mut req = request(&library);
        req.options.template_exercises = Some(vec!["no_such_lift".into()]);

        assert!(matches!(
            generate_workout(&req),
            Err(PlanError::UnknownExercise(_))
        ));
    }

    #[test]
    fn test_seed_changes_only_tied_flavor() {
        let library = make_library();

        let mut seeded = request(&library);
        seeded.options.random_seed = Some(7);

        let first = generate_workout(&seeded).unwrap();
        let second = generate_workout(&seeded).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_sra_warning_lands_in_notes() {
        let library = make_library();
        let now = now_fixture();

        let mut req = request(&library);
        // Heavy squat session 24h ago: quads well under their 72h window
        req.history = vec![make_entry(now - Duration::hours(24), &[("back_squat", 5)])];

        let plan = generate_workout(&req).unwrap();
        let targets_quads = plan.all_exercises().any(|p| {
            library
                .get(&p.exercise_id)
                .is_some_and(|e| e.primary_muscles.contains(&crate::models::exercise::Muscle::Quads))
        });
        if targets_quads {
            assert!(plan.notes.iter().any(|n| n.contains("quads")));
        }
    }
}
