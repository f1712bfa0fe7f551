//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - Recording a posted activity score (record + module progress + aggregate)
//!   - Completing an activity end to end (score, progress, points, level, badges, telemetry)
//!   - The per-module / overall progress overview shown on the progress screen

use serde_json::json;
use tracing::{error, info, instrument};

use crate::domain::{ActivityScore, EventPayload, ModuleProgress, ProgressUpdate};
use crate::error::{ApiResult, AppError};
use crate::events::QUIZ_SUBMIT;
use crate::protocol::{ActivityOutcome, ActivityScoreCreated, ActivityScoreIn, CompleteActivityIn, ModuleOverview, ProgressOverviewOut};
use crate::scoring::{module_completion_percent, overall_progress_percent};
use crate::state::AppState;
use crate::validation::{validate_activity_score, validate_completion};

/// Validate and store an activity score, then upsert the module progress and
/// the user's aggregate. Persistence errors surface to the caller.
#[instrument(level = "info", skip(state, input), fields(user = %input.user_id, module = %input.module_id, activity = %input.activity_id))]
pub async fn record_activity_score(state: &AppState, input: ActivityScoreIn) -> ApiResult<ActivityScoreCreated> {
  let valid = validate_activity_score(&input).map_err(AppError::Validation)?;

  let record = ActivityScore {
    id: String::new(),
    user_id: input.user_id.trim().to_string(),
    module_id: input.module_id.trim().to_string(),
    activity_id: input.activity_id.trim().to_string(),
    activity_type: valid.activity_type,
    score: valid.score,
    total_questions: input.total_questions,
    correct_answers: input.correct_answers,
    incorrect_answers: input.incorrect_answers,
    time_spent: input.time_spent,
    correct_streak: input.correct_streak,
    correct_placements: input.correct_placements,
    incorrect_attempts: input.incorrect_attempts,
    correct_matches: input.correct_matches,
    incorrect_matches: input.incorrect_matches,
    attempts_per_pair: input.attempts_per_pair,
    created_at: chrono::Utc::now(),
  };
  let record = state.records.insert(record).await?;

  let update = ProgressUpdate { step: input.step, score: Some(record.score) };
  state.progress.set_module_progress(&record.user_id, &record.module_id, &update).await?;
  let module_progress = state
    .progress
    .get_module_progress(&record.user_id, &record.module_id)
    .await?
    .unwrap_or_default();
  let user_progress = state
    .records
    .user_progress(&record.user_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("progress for user {}", record.user_id)))?;

  info!(target: "progress", id = %record.id, score = record.score, "Activity score recorded");
  Ok(ActivityScoreCreated { activity_score: record, module_progress, user_progress })
}

/// Partial update of an existing module progress entry.
pub async fn update_module_progress(state: &AppState, uid: &str, module: &str, update: ProgressUpdate) -> ApiResult<ModuleProgress> {
  if let Some(score) = update.score {
    if score > 100 {
      return Err(AppError::Validation(vec!["score must be between 0 and 100".into()]));
    }
  }
  if state.progress.get_module_progress(uid, module).await?.is_none() {
    return Err(AppError::NotFound(format!("progress for module {} of user {}", module, uid)));
  }
  if !update.is_empty() {
    state.progress.set_module_progress(uid, module, &update).await?;
  }
  state
    .progress
    .get_module_progress(uid, module)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("progress for module {} of user {}", module, uid)))
}

/// Finish an activity the way an activity screen does:
/// score it, count a first completion, persist `{step, score}`, award points,
/// raise the level, apply the badge policy and log the submission.
///
/// Invalid attempts are rejected before any write. After that only the score
/// is guaranteed; every write is best effort.
#[instrument(level = "info", skip(state, input), fields(user = %input.user_id, module = %input.module_id, step = input.step))]
pub async fn complete_activity(state: &AppState, input: CompleteActivityIn) -> ApiResult<ActivityOutcome> {
  validate_completion(&input).map_err(AppError::Validation)?;
  let uid = input.user_id.as_str();
  let module = input.module_id.as_str();
  let attempt = &input.attempt;
  let score = attempt.score();
  let percentage = attempt.percentage();
  let rules = &state.gamification.points;

  let module_completed = state
    .catalog
    .get_module_config(module)
    .is_some_and(|def| input.step >= def.total_steps);

  // The first-completion check reads the score stored before this attempt.
  let completion_counted = module_completed && state.gamification.mark_module_completed_once(uid, module).await;

  let update = ProgressUpdate { step: Some(input.step), score: Some(score) };
  if let Err(e) = state.progress.set_module_progress(uid, module, &update).await {
    error!(target: "progress", %uid, %module, error = %e, "Failed to save progress; continuing");
  }

  let mut points = rules.per_correct_answer * attempt.correct_answers() as u64;
  // The full-module bonus goes with the first counted completion only, so
  // replaying a finished module earns per-answer points.
  if completion_counted {
    points += rules.module_completion_bonus;
  }
  let points_awarded = if state.gamification.award_points(uid, points).await { points } else { 0 };

  let new_level = if completion_counted {
    match state.progress.get_profile(uid).await {
      Ok(profile) => {
        let count = profile.map_or(0, |p| p.completed_modules);
        state.gamification.update_level(uid, count).await
      }
      Err(e) => {
        error!(target: "gamification", %uid, error = %e, "Failed to read profile for level update");
        None
      }
    }
  } else {
    None
  };

  let badge = state
    .gamification
    .award_activity_badge(uid, attempt.activity_type(), percentage)
    .await;

  let mut extra = serde_json::Map::new();
  extra.insert("moduleId".into(), json!(module));
  extra.insert("activityType".into(), json!(attempt.activity_type().as_str()));
  extra.insert("percentage".into(), json!(percentage));
  state
    .recorder
    .record(uid, QUIZ_SUBMIT, EventPayload { screen: None, value: Some(score as f64), extra: Some(extra) })
    .await;

  let progress = state.progress.load_progress_or_default(uid).await;
  let outcome = ActivityOutcome {
    score,
    percentage,
    points_awarded,
    module_completed,
    completion_counted,
    new_level,
    badge,
    module_percent: module_completion_percent(&state.catalog, module, input.step),
    overall_percent: overall_progress_percent(&state.catalog, &progress),
  };
  info!(target: "gamification", %uid, %module, score, points = points_awarded, completed = module_completed, "Activity completed");
  Ok(outcome)
}

/// Per-module and overall completion for the progress screen.
/// A failed read renders as 0%.
pub async fn progress_overview(state: &AppState, uid: &str) -> ProgressOverviewOut {
  let progress = state.progress.load_progress_or_default(uid).await;
  let modules = state
    .catalog
    .modules()
    .iter()
    .map(|def| {
      let entry = progress.get(&def.name);
      let step = entry.map_or(0, |p| p.step);
      ModuleOverview {
        name: def.name.clone(),
        total_steps: def.total_steps,
        step,
        score: entry.and_then(|p| p.score),
        percent: module_completion_percent(&state.catalog, &def.name, step),
      }
    })
    .collect();
  ProgressOverviewOut { modules, overall: overall_progress_percent(&state.catalog, &progress) }
}
