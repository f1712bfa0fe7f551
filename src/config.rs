//! Loading service configuration (module catalog, points rules, badge policy) from TOML.
//!
//! See `AppConfig` for the expected schema:
//!
//! ```toml
//! [[modules]]
//! name = "tariffs"
//! total_steps = 8
//!
//! [points]
//! per_correct_answer = 10
//! module_completion_bonus = 100
//!
//! [badges]
//! trivia = [{ min_percent = 100, badge = "Expert" }, { min_percent = 75, badge = "Knowledgeable" }]
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::ActivityType;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
  #[serde(default)]
  pub modules: Vec<ModuleCfg>,
  #[serde(default)]
  pub points: PointsRules,
  /// Activity type name (`trivia`, `drag_drop`, ...) to thresholds.
  #[serde(default = "default_badge_rules")]
  pub badges: BTreeMap<String, Vec<BadgeRule>>,
}

/// Module entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ModuleCfg {
  pub name: String,
  pub total_steps: u32,
}

/// Point amounts awarded by the activity flow.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct PointsRules {
  #[serde(default = "default_per_correct")]
  pub per_correct_answer: u64,
  #[serde(default = "default_completion_bonus")]
  pub module_completion_bonus: u64,
}

impl Default for PointsRules {
  fn default() -> Self {
    Self {
      per_correct_answer: default_per_correct(),
      module_completion_bonus: default_completion_bonus(),
    }
  }
}

fn default_per_correct() -> u64 { 10 }
fn default_completion_bonus() -> u64 { 100 }

/// A badge granted when an activity's percentage reaches `min_percent`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BadgeRule {
  pub min_percent: u32,
  pub badge: String,
}

/// Trivia: a perfect run earns "Expert", 75% or better earns "Knowledgeable".
pub fn default_badge_rules() -> BTreeMap<String, Vec<BadgeRule>> {
  BTreeMap::from([(
    ActivityType::Trivia.as_str().to_string(),
    vec![
      BadgeRule { min_percent: 100, badge: "Expert".into() },
      BadgeRule { min_percent: 75, badge: "Knowledgeable".into() },
    ],
  )])
}

/// Config used when no TOML file is provided.
impl Default for AppConfig {
  fn default() -> Self {
    Self {
      modules: Vec::new(),
      points: PointsRules::default(),
      badges: default_badge_rules(),
    }
  }
}

impl AppConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str::<AppConfig>(s)
  }
}

/// Attempt to load `AppConfig` from APP_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("APP_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match AppConfig::from_toml_str(&s) {
      Ok(cfg) => {
        info!(target: "gridwise", %path, modules = cfg.modules.len(), "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "gridwise", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "gridwise", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_full_config() {
    let cfg = AppConfig::from_toml_str(
      r#"
      [[modules]]
      name = "tariffs"
      total_steps = 8

      [[modules]]
      name = "grid_basics"
      total_steps = 4

      [points]
      per_correct_answer = 5

      [badges]
      matching = [{ min_percent = 90, badge = "Matchmaker" }]
      "#,
    )
    .expect("config");
    assert_eq!(cfg.modules.len(), 2);
    assert_eq!(cfg.modules[1].name, "grid_basics");
    assert_eq!(cfg.points.per_correct_answer, 5);
    assert_eq!(cfg.points.module_completion_bonus, 100);
    assert_eq!(cfg.badges["matching"][0].badge, "Matchmaker");
    assert!(!cfg.badges.contains_key("trivia"));
  }

  #[test]
  fn empty_config_keeps_default_badges() {
    let cfg = AppConfig::from_toml_str("").expect("config");
    assert!(cfg.modules.is_empty());
    assert_eq!(cfg.points, PointsRules::default());
    assert_eq!(cfg.badges, default_badge_rules());
  }
}
