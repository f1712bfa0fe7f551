//! Score aggregation: per-activity scores from raw attempt data, and the
//! module / overall completion percentages.
//!
//! Everything here is pure. Percentages are weighted by each module's step
//! count, so a module with more steps contributes proportionally more to
//! overall completion.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::ModuleCatalog;
use crate::domain::{ActivityType, ModuleProgress};
use crate::util::round_percent;

/// `round(100 * correct / total)`, 0 when `total` is 0.
pub fn base_score(correct: u32, total: u32) -> u32 {
  round_percent(correct as u64, total as u64)
}

/// Base score plus a speed bonus (10 points, minus one per 30s) and a streak
/// bonus (one point per consecutive correct answer, up to 10), capped at 100.
pub fn trivia_score(correct: u32, total: u32, time_spent_seconds: u32, correct_streak: u32) -> u32 {
  let time_bonus = 10u32.saturating_sub(time_spent_seconds / 30);
  let streak_bonus = correct_streak.min(10);
  (base_score(correct, total) + time_bonus + streak_bonus).min(100)
}

/// Base score minus 2 points per wrong attempt and 1 point per minute, floored at 0.
pub fn drag_drop_score(correct_placements: u32, total_items: u32, incorrect_attempts: u32, completion_time_seconds: u32) -> u32 {
  let penalty = 2 * incorrect_attempts as i64 + (completion_time_seconds / 60) as i64;
  (base_score(correct_placements, total_items) as i64 - penalty).max(0) as u32
}

/// Base score minus 2 points per extra attempt needed on average per pair, floored at 0.
/// `incorrect_matches` is already reflected in the attempt counts and does not weigh in twice.
pub fn matching_score(correct_matches: u32, total_pairs: u32, _incorrect_matches: u32, attempts_per_pair: &BTreeMap<String, u32>) -> u32 {
  let attempts: u64 = attempts_per_pair.values().map(|&a| a as u64).sum();
  let average = if total_pairs == 0 { 0.0 } else { attempts as f64 / total_pairs as f64 };
  let penalty = 2.0 * (average - 1.0).max(0.0);
  (base_score(correct_matches, total_pairs) as f64 - penalty).max(0.0).round() as u32
}

/// Completion of one module; overshooting steps are clamped, unknown modules yield 0.
pub fn module_completion_percent(catalog: &ModuleCatalog, module_name: &str, current_step: u32) -> u32 {
  match catalog.get_module_config(module_name) {
    Some(def) => round_percent(current_step.min(def.total_steps) as u64, def.total_steps as u64),
    None => 0,
  }
}

/// Step-weighted completion across every catalog module.
/// Modules missing from `progress` count as step 0; unknown keys are ignored.
pub fn overall_progress_percent(catalog: &ModuleCatalog, progress: &HashMap<String, ModuleProgress>) -> u32 {
  let done: u64 = catalog
    .modules()
    .iter()
    .map(|def| progress.get(&def.name).map_or(0, |p| p.step.min(def.total_steps)) as u64)
    .sum();
  round_percent(done, catalog.total_steps_across_all_modules())
}

/// Raw attempt data produced by an activity component.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "activityType", rename_all = "snake_case")]
pub enum ActivityAttempt {
  #[serde(rename_all = "camelCase")]
  Trivia { correct: u32, total: u32, #[serde(default)] time_spent_seconds: u32, #[serde(default)] correct_streak: u32 },
  #[serde(rename_all = "camelCase")]
  DragDrop { correct_placements: u32, total_items: u32, #[serde(default)] incorrect_attempts: u32, #[serde(default)] completion_time_seconds: u32 },
  #[serde(rename_all = "camelCase")]
  Matching { correct_matches: u32, total_pairs: u32, #[serde(default)] incorrect_matches: u32, #[serde(default)] attempts_per_pair: BTreeMap<String, u32> },
  #[serde(rename_all = "camelCase")]
  Interactive { correct: u32, total: u32 },
}

impl ActivityAttempt {
  pub fn activity_type(&self) -> ActivityType {
    match self {
      Self::Trivia { .. } => ActivityType::Trivia,
      Self::DragDrop { .. } => ActivityType::DragDrop,
      Self::Matching { .. } => ActivityType::Matching,
      Self::Interactive { .. } => ActivityType::Interactive,
    }
  }

  pub fn score(&self) -> u32 {
    match self {
      Self::Trivia { correct, total, time_spent_seconds, correct_streak } =>
        trivia_score(*correct, *total, *time_spent_seconds, *correct_streak),
      Self::DragDrop { correct_placements, total_items, incorrect_attempts, completion_time_seconds } =>
        drag_drop_score(*correct_placements, *total_items, *incorrect_attempts, *completion_time_seconds),
      Self::Matching { correct_matches, total_pairs, incorrect_matches, attempts_per_pair } =>
        matching_score(*correct_matches, *total_pairs, *incorrect_matches, attempts_per_pair),
      Self::Interactive { correct, total } => base_score(*correct, *total),
    }
  }

  pub fn correct_answers(&self) -> u32 {
    match self {
      Self::Trivia { correct, .. } | Self::Interactive { correct, .. } => *correct,
      Self::DragDrop { correct_placements, .. } => *correct_placements,
      Self::Matching { correct_matches, .. } => *correct_matches,
    }
  }

  pub fn total(&self) -> u32 {
    match self {
      Self::Trivia { total, .. } | Self::Interactive { total, .. } => *total,
      Self::DragDrop { total_items, .. } => *total_items,
      Self::Matching { total_pairs, .. } => *total_pairs,
    }
  }

  /// Share of correct answers, without bonuses or penalties. Badge thresholds use this.
  pub fn percentage(&self) -> u32 {
    match self {
      Self::Trivia { correct, total, .. } | Self::Interactive { correct, total } => base_score(*correct, *total),
      Self::DragDrop { correct_placements, total_items, .. } => base_score(*correct_placements, *total_items),
      Self::Matching { correct_matches, total_pairs, .. } => base_score(*correct_matches, *total_pairs),
    }
  }
}
