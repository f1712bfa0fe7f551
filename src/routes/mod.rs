//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - scores / progress / leaderboard / stats endpoints consumed by the app
/// - profile, activity completion and telemetry endpoints
/// - the daily metrics and event log reads used by the admin view
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::http_health))
        .route("/modules", get(http::http_get_modules))
        // Scores & progress
        .route("/scores/activity", post(http::http_post_activity_score))
        .route("/scores/module/:module_id/user/:user_id", get(http::http_get_module_scores))
        .route("/progress/user/:user_id", get(http::http_get_user_progress))
        .route("/progress/overview/:user_id", get(http::http_get_progress_overview))
        .route("/progress/module/:module_id/user/:user_id", put(http::http_put_module_progress))
        .route("/progress/module/:module_id/user/:user_id/restart", post(http::http_post_restart_module))
        .route("/leaderboard/:activity_id", get(http::http_get_leaderboard))
        .route("/stats/:activity_id/user/:user_id", get(http::http_get_activity_stats))
        // Profiles & gamification
        .route("/profiles/:user_id", get(http::http_get_profile).post(http::http_post_profile))
        .route("/activities/complete", post(http::http_post_complete_activity))
        // Telemetry
        .route("/events/:user_id", get(http::http_get_events).post(http::http_post_event))
        .route("/metrics/daily/:day", get(http::http_get_daily_metrics))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
