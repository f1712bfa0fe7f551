//! Gamification rules over `UserProfile`: points, first-completion counting,
//! levels and badges.
//!
//! All writes are best effort. A failed write is logged and swallowed so the
//! activity flow that triggered it carries on; nothing is retried.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::config::{BadgeRule, PointsRules};
use crate::domain::{ActivityType, ProfileCounter};
use crate::progress::ProgressStore;

pub const MAX_LEVEL: u32 = 5;

/// Level for a completed-module count: one level per module, starting at 1, capped at 5.
pub fn derive_level(completed_modules: u32) -> u32 {
  completed_modules.saturating_add(1).clamp(1, MAX_LEVEL)
}

/// Per-activity-type badge thresholds, highest threshold first.
#[derive(Clone, Debug, Default)]
pub struct BadgePolicy {
  rules: HashMap<ActivityType, Vec<BadgeRule>>,
}

impl BadgePolicy {
  pub fn from_config(cfg: &BTreeMap<String, Vec<BadgeRule>>) -> Self {
    let mut rules = HashMap::new();
    for (kind, list) in cfg {
      let Some(activity) = ActivityType::parse(kind) else {
        warn!(target: "gamification", %kind, "Ignoring badge rules for unknown activity type");
        continue;
      };
      let mut list = list.clone();
      list.sort_by(|a, b| b.min_percent.cmp(&a.min_percent));
      rules.insert(activity, list);
    }
    Self { rules }
  }

  /// Badge earned by `percentage` on an activity of this type, if any.
  pub fn badge_for(&self, activity: ActivityType, percentage: u32) -> Option<&str> {
    self.rules
      .get(&activity)?
      .iter()
      .find(|r| percentage >= r.min_percent)
      .map(|r| r.badge.as_str())
  }
}

#[derive(Clone)]
pub struct Gamification {
  progress: ProgressStore,
  badges: Arc<BadgePolicy>,
  pub points: PointsRules,
}

impl Gamification {
  pub fn new(progress: ProgressStore, badges: BadgePolicy, points: PointsRules) -> Self {
    Self { progress, badges: Arc::new(badges), points }
  }

  /// Atomic increment of the user's points. Returns false if the write failed.
  #[instrument(level = "debug", skip(self))]
  pub async fn award_points(&self, uid: &str, amount: u64) -> bool {
    match self.progress.increment_profile(uid, ProfileCounter::Points, amount).await {
      Ok(()) => {
        debug!(target: "gamification", %uid, amount, "Points awarded");
        true
      }
      Err(e) => {
        error!(target: "gamification", %uid, amount, error = %e, "Failed to award points");
        false
      }
    }
  }

  /// Count a module as completed unless it already holds a nonzero score.
  ///
  /// Must run before the new score is persisted. The check keys off the stored
  /// score, so a module previously finished with a score of exactly 0 is
  /// counted again on its next completion.
  #[instrument(level = "debug", skip(self))]
  pub async fn mark_module_completed_once(&self, uid: &str, module: &str) -> bool {
    let prior = match self.progress.get_module_progress(uid, module).await {
      Ok(p) => p,
      Err(e) => {
        error!(target: "gamification", %uid, %module, error = %e, "Failed to read module progress; completion not counted");
        return false;
      }
    };
    if prior.and_then(|p| p.score).unwrap_or(0) != 0 {
      debug!(target: "gamification", %uid, %module, "Module already completed; not counting again");
      return false;
    }
    match self.progress.increment_profile(uid, ProfileCounter::CompletedModules, 1).await {
      Ok(()) => {
        info!(target: "gamification", %uid, %module, "Module completion counted");
        true
      }
      Err(e) => {
        error!(target: "gamification", %uid, %module, error = %e, "Failed to count module completion");
        false
      }
    }
  }

  /// Persist the level derived from `completed_modules` if it is higher than
  /// the stored one. Returns the new level when it was raised.
  #[instrument(level = "debug", skip(self))]
  pub async fn update_level(&self, uid: &str, completed_modules: u32) -> Option<u32> {
    let stored = match self.progress.get_profile(uid).await {
      Ok(p) => p.map_or(1, |p| p.level),
      Err(e) => {
        error!(target: "gamification", %uid, error = %e, "Failed to read profile; level unchanged");
        return None;
      }
    };
    let level = derive_level(completed_modules);
    if level <= stored {
      return None;
    }
    match self.progress.set_level(uid, level).await {
      Ok(()) => {
        info!(target: "gamification", %uid, from = stored, to = level, "Level up");
        Some(level)
      }
      Err(e) => {
        error!(target: "gamification", %uid, level, error = %e, "Failed to persist level");
        None
      }
    }
  }

  /// Add `badge` to the profile unless it is already there. Returns true when newly awarded.
  #[instrument(level = "debug", skip(self))]
  pub async fn award_badge_if_absent(&self, uid: &str, badge: &str) -> bool {
    match self.progress.get_profile(uid).await {
      Ok(Some(p)) if p.badges.contains(badge) => return false,
      Ok(_) => {}
      Err(e) => {
        error!(target: "gamification", %uid, %badge, error = %e, "Failed to read badges");
        return false;
      }
    }
    match self.progress.add_badge(uid, badge).await {
      Ok(()) => {
        info!(target: "gamification", %uid, %badge, "Badge awarded");
        true
      }
      Err(e) => {
        error!(target: "gamification", %uid, %badge, error = %e, "Failed to award badge");
        false
      }
    }
  }

  /// Apply the badge policy for an activity result. Returns the badge if it was newly awarded.
  pub async fn award_activity_badge(&self, uid: &str, activity: ActivityType, percentage: u32) -> Option<String> {
    let badge = self.badges.badge_for(activity, percentage)?.to_string();
    self.award_badge_if_absent(uid, &badge).await.then_some(badge)
  }
}
