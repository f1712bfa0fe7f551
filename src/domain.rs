//! Domain models: module definitions, per-module progress, user profiles,
//! activity types, telemetry events and the activity score records.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A learning module: a named unit of lesson content with a fixed number of steps.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDefinition {
  pub name: String,
  pub total_steps: u32,
}

/// Progress of one user inside one module.
/// `score` is only present once an activity of the module has completed.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgress {
  #[serde(default)] pub step: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub score: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub updated_at: Option<DateTime<Utc>>,
}

/// Fields of a progress merge-write. `None` leaves the stored field untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
  #[serde(default, skip_serializing_if = "Option::is_none")] pub step: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub score: Option<u32>,
}

impl ProgressUpdate {
  pub fn is_empty(&self) -> bool { self.step.is_none() && self.score.is_none() }
}

/// Per-user profile document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  #[serde(default)] pub email: String,
  #[serde(default)] pub display_name: String,
  #[serde(default)] pub created_at: DateTime<Utc>,
  #[serde(default)] pub last_login_at: DateTime<Utc>,
  #[serde(default = "default_level")] pub level: u32,
  #[serde(default)] pub points: u64,
  #[serde(default = "default_streak")] pub streak_days: u32,
  #[serde(default)] pub total_time_ms: u64,
  #[serde(default)] pub completed_modules: u32,
  #[serde(default)] pub badges: BTreeSet<String>,
}

fn default_level() -> u32 { 1 }
fn default_streak() -> u32 { 1 }

impl UserProfile {
  /// Profile as created on first registration/login.
  pub fn new(email: &str, display_name: &str, now: DateTime<Utc>) -> Self {
    Self {
      email: email.to_string(),
      display_name: display_name.to_string(),
      created_at: now,
      last_login_at: now,
      level: default_level(),
      points: 0,
      streak_days: default_streak(),
      total_time_ms: 0,
      completed_modules: 0,
      badges: BTreeSet::new(),
    }
  }
}

/// Profile counters that only ever change through atomic increments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileCounter {
  Points,
  TotalTimeMs,
  CompletedModules,
}

impl ProfileCounter {
  pub fn field(&self) -> &'static str {
    match self {
      Self::Points => "points",
      Self::TotalTimeMs => "totalTimeMs",
      Self::CompletedModules => "completedModules",
    }
  }
}

/// Kind of scored interaction nested in a module step.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
  Trivia,
  DragDrop,
  Matching,
  Interactive,
}

impl ActivityType {
  pub const ALL: [ActivityType; 4] = [Self::Trivia, Self::DragDrop, Self::Matching, Self::Interactive];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Trivia => "trivia",
      Self::DragDrop => "drag_drop",
      Self::Matching => "matching",
      Self::Interactive => "interactive",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|t| t.as_str() == s)
  }
}

/// Append-only telemetry entry stored under `profiles/{uid}/events`.
/// Optional fields are omitted when absent, never written as null.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub screen: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub value: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub extra: Option<serde_json::Map<String, serde_json::Value>>,
  pub session_id: String,
  pub created_at: DateTime<Utc>,
}

/// Optional parts of an event supplied by the caller.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct EventPayload {
  #[serde(default)] pub screen: Option<String>,
  #[serde(default)] pub value: Option<f64>,
  #[serde(default)] pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

/// One calendar day of counters, keyed by metric name.
pub type DailyMetric = BTreeMap<String, f64>;

/// Immutable record of one scored activity attempt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityScore {
  #[serde(default)] pub id: String,
  pub user_id: String,
  pub module_id: String,
  pub activity_id: String,
  pub activity_type: ActivityType,
  pub score: u32,
  pub total_questions: u32,
  pub correct_answers: u32,
  pub incorrect_answers: u32,
  #[serde(default)] pub time_spent: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub correct_streak: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub correct_placements: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub incorrect_attempts: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub correct_matches: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub incorrect_matches: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub attempts_per_pair: Option<BTreeMap<String, u32>>,
  pub created_at: DateTime<Utc>,
}

/// Per-user aggregate across all recorded activity scores.
/// `averageScore` and `overallProgress` are derived at read time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
  #[serde(default)] pub user_id: String,
  #[serde(default)] pub total_activities: u64,
  #[serde(default)] pub total_score: u64,
  #[serde(default)] pub total_time_spent: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub last_activity_at: Option<DateTime<Utc>>,
  #[serde(default)] pub average_score: u32,
  #[serde(default)] pub overall_progress: u32,
}
