//! Public protocol structs for the HTTP endpoints (serde ready, camelCase on the wire).
//! Keep this small and stable to evolve backend and app independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ActivityScore, ModuleProgress, UserProgress};
use crate::scoring::ActivityAttempt;

/// Raw attempt data posted by an activity screen.
/// Missing ids and counts default to empty/zero and are rejected by validation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityScoreIn {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub module_id: String,
    #[serde(default)]
    pub activity_id: String,
    #[serde(default)]
    pub activity_type: String,
    /// Client-computed score; computed server-side when omitted.
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub incorrect_answers: u32,
    /// Seconds.
    #[serde(default)]
    pub time_spent: u32,
    /// Step reached in the module; progress keeps its step when omitted.
    #[serde(default)]
    pub step: Option<u32>,

    // trivia
    #[serde(default)]
    pub correct_streak: Option<u32>,
    // drag_drop
    #[serde(default)]
    pub correct_placements: Option<u32>,
    #[serde(default)]
    pub incorrect_attempts: Option<u32>,
    // matching
    #[serde(default)]
    pub correct_matches: Option<u32>,
    #[serde(default)]
    pub incorrect_matches: Option<u32>,
    #[serde(default)]
    pub attempts_per_pair: Option<BTreeMap<String, u32>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityScoreCreated {
    pub activity_score: ActivityScore,
    pub module_progress: ModuleProgress,
    pub user_progress: UserProgress,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStatsOut {
    pub attempts: u64,
    pub best_score: u32,
    pub average_score: u32,
    pub total_time: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileIn {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIn {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub screen: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
    /// Session of the app launch that produced the event; the server session is used when absent.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventOut {
    pub id: Option<String>,
}

/// One finished activity, run through scoring, progress and gamification.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteActivityIn {
    pub user_id: String,
    pub module_id: String,
    pub step: u32,
    pub attempt: ActivityAttempt,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOutcome {
    pub score: u32,
    pub percentage: u32,
    pub points_awarded: u64,
    pub module_completed: bool,
    pub completion_counted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    pub module_percent: u32,
    pub overall_percent: u32,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleOverview {
    pub name: String,
    pub total_steps: u32,
    pub step: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    pub percent: u32,
}

#[derive(Debug, Serialize)]
pub struct ProgressOverviewOut {
    pub modules: Vec<ModuleOverview>,
    pub overall: u32,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub session: String,
}
