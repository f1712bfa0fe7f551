//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::domain::{EventPayload, ProgressUpdate};
use crate::error::{ApiResult, AppError};
use crate::events::{SessionContext, LOGIN_SUCCESS};
use crate::logic::*;
use crate::protocol::*;
use crate::records::DEFAULT_LEADERBOARD_LIMIT;
use crate::state::AppState;
use crate::util::{is_day_key, trunc_for_log};

const MAX_LEADERBOARD_LIMIT: usize = 100;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, session: state.recorder.session().id().to_string() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_modules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.catalog.modules().to_vec())
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user_id, activity = %body.activity_id, kind = %body.activity_type))]
pub async fn http_post_activity_score(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ActivityScoreIn>,
) -> ApiResult<impl IntoResponse> {
  let created = record_activity_score(&state, body).await?;
  info!(target: "progress", id = %created.activity_score.id, score = created.activity_score.score, "HTTP activity score created");
  Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_module_scores(
  State(state): State<Arc<AppState>>,
  Path((module_id, user_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
  let scores = state.records.recent_for_module(&user_id, &module_id).await?;
  Ok(Json(scores))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_user_progress(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
  match state.records.user_progress(&user_id).await? {
    Some(p) => Ok(Json(p)),
    None => Err(AppError::NotFound(format!("progress for user {}", user_id))),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress_overview(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> impl IntoResponse {
  Json(progress_overview(&state, &user_id).await)
}

#[instrument(level = "info", skip(state, body), fields(step = ?body.step, score = ?body.score))]
pub async fn http_put_module_progress(
  State(state): State<Arc<AppState>>,
  Path((module_id, user_id)): Path<(String, String)>,
  Json(body): Json<ProgressUpdate>,
) -> ApiResult<impl IntoResponse> {
  let updated = update_module_progress(&state, &user_id, &module_id, body).await?;
  Ok(Json(updated))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_restart_module(
  State(state): State<Arc<AppState>>,
  Path((module_id, user_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
  if state.catalog.get_module_config(&module_id).is_none() {
    return Err(AppError::NotFound(format!("module {}", module_id)));
  }
  state.progress.restart_module(&user_id, &module_id).await?;
  let progress = state.progress.get_module_progress(&user_id, &module_id).await?.unwrap_or_default();
  Ok(Json(progress))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_leaderboard(
  State(state): State<Arc<AppState>>,
  Path(activity_id): Path<String>,
  Query(q): Query<LeaderboardQuery>,
) -> ApiResult<impl IntoResponse> {
  let limit = q.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT).clamp(1, MAX_LEADERBOARD_LIMIT);
  let top = state.records.leaderboard(&activity_id, limit).await?;
  info!(target: "progress", %activity_id, limit, entries = top.len(), "HTTP leaderboard served");
  Ok(Json(top))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_activity_stats(
  State(state): State<Arc<AppState>>,
  Path((activity_id, user_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
  match state.records.stats(&activity_id, &user_id).await? {
    Some(stats) => Ok(Json(stats)),
    None => Err(AppError::NotFound(format!("stats for activity {} of user {}", activity_id, user_id))),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_profile(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
  match state.progress.get_profile(&user_id).await? {
    Some(p) => Ok(Json(p)),
    None => Err(AppError::NotFound(format!("profile {}", user_id))),
  }
}

/// Called after a successful sign-in: create or refresh the profile and log the login.
#[instrument(level = "info", skip(state, body))]
pub async fn http_post_profile(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
  Json(body): Json<ProfileIn>,
) -> ApiResult<impl IntoResponse> {
  let profile = state
    .progress
    .create_or_touch_profile(&user_id, body.email.trim(), body.display_name.trim())
    .await?;
  state.recorder.record(&user_id, LOGIN_SUCCESS, EventPayload::default()).await;
  Ok(Json(profile))
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user_id, module = %body.module_id, step = body.step))]
pub async fn http_post_complete_activity(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CompleteActivityIn>,
) -> ApiResult<impl IntoResponse> {
  let outcome = complete_activity(&state, body).await?;
  Ok(Json(outcome))
}

/// Telemetry intake; answers 202 even when recording failed.
#[instrument(level = "info", skip(state, body), fields(kind = %trunc_for_log(&body.kind, 64)))]
pub async fn http_post_event(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
  Json(body): Json<EventIn>,
) -> ApiResult<impl IntoResponse> {
  if body.kind.trim().is_empty() {
    return Err(AppError::Validation(vec!["type is required".into()]));
  }
  let recorder = match body.session_id.filter(|s| !s.trim().is_empty()) {
    Some(id) => state.recorder.with_session(SessionContext::from_id(id)),
    None => state.recorder.clone(),
  };
  let payload = EventPayload { screen: body.screen, value: body.value, extra: body.extra };
  let id = recorder.record(&user_id, &body.kind, payload).await;
  Ok((StatusCode::ACCEPTED, Json(EventOut { id })))
}

/// Event log of one user for the admin view, oldest first.
#[instrument(level = "info", skip(state))]
pub async fn http_get_events(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
  let events = state.recorder.events_for(&user_id).await?;
  info!(target: "events", %user_id, entries = events.len(), "HTTP events served");
  Ok(Json(events))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_daily_metrics(
  State(state): State<Arc<AppState>>,
  Path(day): Path<String>,
) -> ApiResult<impl IntoResponse> {
  if !is_day_key(&day) {
    return Err(AppError::Validation(vec!["day must be formatted as YYYY-MM-DD".into()]));
  }
  match state.recorder.daily_metrics(&day).await? {
    Some(m) => Ok(Json(m)),
    None => Err(AppError::NotFound(format!("metrics for {}", day))),
  }
}

#[cfg(test)]
mod tests {
  use axum::{body::Body, http::Request, Router};
  use serde_json::{json, Value};
  use tower::ServiceExt;

  use super::*;
  use crate::config::{AppConfig, ModuleCfg};
  use crate::routes::build_router;
  use crate::store::MemoryStore;

  fn app() -> Router {
    let cfg = AppConfig {
      modules: vec![
        ModuleCfg { name: "tariffs".into(), total_steps: 10 },
        ModuleCfg { name: "grid_basics".into(), total_steps: 20 },
      ],
      ..AppConfig::default()
    };
    build_router(Arc::new(AppState::with_store(Arc::new(MemoryStore::new()), cfg)))
  }

  async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .header("content-type", "application/json")
      .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
      .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
  }

  fn trivia_score(user: &str, activity: &str, correct: u32) -> Value {
    json!({
      "userId": user,
      "moduleId": "tariffs",
      "activityId": activity,
      "activityType": "trivia",
      "totalQuestions": 10,
      "correctAnswers": correct,
      "incorrectAnswers": 10 - correct,
      "timeSpent": 45,
      "correctStreak": 2,
      "step": 4
    })
  }

  #[tokio::test]
  async fn health_reports_session() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["session"].as_str().unwrap().starts_with("session_"));
  }

  #[tokio::test]
  async fn post_activity_score_creates_three_records() {
    let app = app();
    let (status, body) = send(&app, "POST", "/scores/activity", Some(trivia_score("u1", "quiz-1", 8))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["activityScore"]["score"], 91);
    assert_eq!(body["moduleProgress"]["step"], 4);
    assert_eq!(body["moduleProgress"]["score"], 91);
    assert_eq!(body["userProgress"]["totalActivities"], 1);
    assert_eq!(body["userProgress"]["overallProgress"], 13);

    let (status, body) = send(&app, "GET", "/progress/user/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["averageScore"], 91);

    let (status, body) = send(&app, "GET", "/scores/module/tariffs/user/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn invalid_activity_score_is_rejected_with_details() {
    let mut bad = trivia_score("u1", "quiz-1", 8);
    bad["incorrectAnswers"] = json!(5);
    bad["score"] = json!(101);
    let (status, body) = send(&app(), "POST", "/scores/activity", Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["details"].as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn missing_records_are_404() {
    let app = app();
    assert_eq!(send(&app, "GET", "/progress/user/ghost", None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "GET", "/stats/quiz-1/user/ghost", None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "GET", "/profiles/ghost", None).await.0, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "PUT", "/progress/module/tariffs/user/ghost", Some(json!({"step": 2}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn put_progress_updates_partially() {
    let app = app();
    send(&app, "POST", "/scores/activity", Some(trivia_score("u1", "quiz-1", 8))).await;
    let (status, body) = send(&app, "PUT", "/progress/module/tariffs/user/u1", Some(json!({"step": 7}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], 7);
    assert_eq!(body["score"], 91);
  }

  #[tokio::test]
  async fn leaderboard_and_stats_endpoints() {
    let app = app();
    for (user, correct) in [("u1", 6), ("u2", 9), ("u1", 8)] {
      let (status, _) = send(&app, "POST", "/scores/activity", Some(trivia_score(user, "quiz-1", correct))).await;
      assert_eq!(status, StatusCode::CREATED);
    }
    let (_, top) = send(&app, "GET", "/leaderboard/quiz-1?limit=2", None).await;
    let scores: Vec<u64> = top.as_array().unwrap().iter().map(|s| s["score"].as_u64().unwrap()).collect();
    assert_eq!(scores, vec![100, 91]);

    let (status, stats) = send(&app, "GET", "/stats/quiz-1/user/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats, json!({"attempts": 2, "bestScore": 91, "averageScore": 81, "totalTime": 90}));
  }

  #[tokio::test]
  async fn complete_activity_end_to_end() {
    let app = app();
    let (status, profile) = send(&app, "POST", "/profiles/u1", Some(json!({"email": "a@b.c", "displayName": "Ana"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["level"], 1);

    let (status, out) = send(&app, "POST", "/activities/complete", Some(json!({
      "userId": "u1",
      "moduleId": "tariffs",
      "step": 10,
      "attempt": {"activityType": "trivia", "correct": 8, "total": 10, "timeSpentSeconds": 45, "correctStreak": 2}
    }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["score"], 91);
    assert_eq!(out["pointsAwarded"], 180);
    assert_eq!(out["newLevel"], 2);
    assert_eq!(out["badge"], "Knowledgeable");

    let (_, profile) = send(&app, "GET", "/profiles/u1", None).await;
    assert_eq!(profile["points"], 180);
    assert_eq!(profile["completedModules"], 1);
    assert_eq!(profile["badges"], json!(["Knowledgeable"]));

    let (_, overview) = send(&app, "GET", "/progress/overview/u1", None).await;
    assert_eq!(overview["overall"], 33);
    assert_eq!(overview["modules"][0]["percent"], 100);
  }

  #[tokio::test]
  async fn events_feed_daily_metrics() {
    let app = app();
    let (status, _) = send(&app, "POST", "/events/u1", Some(json!({"type": "screen_view", "screen": "home"}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = send(&app, "POST", "/events/u1", Some(json!({"type": "screen_time", "screen": "home", "value": 1200, "sessionId": "session_1_abc"}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let today = crate::util::day_key(chrono::Utc::now());
    let (status, metrics) = send(&app, "GET", &format!("/metrics/daily/{today}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["screen_views"], 1.0);
    assert_eq!(metrics["screen_time_ms"], 1200.0);

    assert_eq!(send(&app, "GET", "/metrics/daily/1999-01-01", None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "GET", "/metrics/daily/today", None).await.0, StatusCode::BAD_REQUEST);

    let (status, events) = send(&app, "GET", "/events/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = events.as_array().unwrap().iter().filter_map(|e| e["type"].as_str()).collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&"screen_view") && kinds.contains(&"screen_time"));

    let (_, profile) = send(&app, "GET", "/profiles/u1", None).await;
    assert_eq!(profile["totalTimeMs"], 1200);
  }

  #[tokio::test]
  async fn over_total_counts_are_rejected_on_both_endpoints() {
    let app = app();
    let (status, body) = send(&app, "POST", "/scores/activity", Some(json!({
      "userId": "u1",
      "moduleId": "tariffs",
      "activityId": "sort-1",
      "activityType": "drag_drop",
      "totalQuestions": 4,
      "correctAnswers": 4,
      "incorrectAnswers": 0,
      "timeSpent": 30,
      "correctPlacements": 50
    }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], json!(["correctPlacements must not exceed totalQuestions"]));

    let (status, body) = send(&app, "POST", "/activities/complete", Some(json!({
      "userId": "u1",
      "moduleId": "tariffs",
      "step": 10,
      "attempt": {"activityType": "drag_drop", "correctPlacements": 20, "totalItems": 4}
    }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], json!(["correctPlacements must not exceed totalItems"]));

    assert_eq!(send(&app, "GET", "/progress/user/u1", None).await.0, StatusCode::NOT_FOUND);
    let (_, overview) = send(&app, "GET", "/progress/overview/u1", None).await;
    assert_eq!(overview["modules"][0]["score"], Value::Null);
  }

  #[tokio::test]
  async fn restart_unknown_module_is_404() {
    let app = app();
    assert_eq!(send(&app, "POST", "/progress/module/nope/user/u1/restart", None).await.0, StatusCode::NOT_FOUND);
    let (status, body) = send(&app, "POST", "/progress/module/tariffs/user/u1/restart", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], 1);
  }
}
