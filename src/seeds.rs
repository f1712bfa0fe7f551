//! Built-in module catalog used when no configuration overrides it.

use crate::domain::ModuleDefinition;

/// Lesson modules shipped with the app, in the order they are presented.
pub fn seed_modules() -> Vec<ModuleDefinition> {
  [
    ("intro_regulation", 6),
    ("grid_basics", 8),
    ("tariffs", 10),
    ("market_agents", 7),
    ("consumer_rights", 9),
    ("renewables", 8),
  ]
  .into_iter()
  .map(|(name, total_steps)| ModuleDefinition { name: name.into(), total_steps })
  .collect()
}
