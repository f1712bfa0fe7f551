//! Module catalog: the static module name → total steps configuration.
//!
//! Built once at startup (from TOML or the built-in seeds) and never mutated.
//! Declaration order is preserved and drives `all_module_keys`.

use std::collections::HashMap;

use tracing::{error, info};

use crate::config::ModuleCfg;
use crate::domain::ModuleDefinition;
use crate::seeds::seed_modules;

#[derive(Clone, Debug, Default)]
pub struct ModuleCatalog {
  modules: Vec<ModuleDefinition>,
  index: HashMap<String, usize>,
}

impl ModuleCatalog {
  /// Build a catalog, skipping entries with zero steps or a duplicate name.
  pub fn new(defs: impl IntoIterator<Item = ModuleDefinition>) -> Self {
    let mut catalog = Self::default();
    for def in defs {
      if def.total_steps == 0 {
        error!(target: "gridwise", module = %def.name, "Skipping module: total_steps must be > 0.");
        continue;
      }
      if catalog.index.contains_key(&def.name) {
        error!(target: "gridwise", module = %def.name, "Skipping module: duplicate name.");
        continue;
      }
      catalog.index.insert(def.name.clone(), catalog.modules.len());
      catalog.modules.push(def);
    }
    catalog
  }

  /// Catalog from configured modules, or the built-in seeds when none are configured.
  pub fn from_config(cfg: &[ModuleCfg]) -> Self {
    let catalog = if cfg.is_empty() {
      Self::new(seed_modules())
    } else {
      Self::new(cfg.iter().map(|m| ModuleDefinition { name: m.name.clone(), total_steps: m.total_steps }))
    };
    info!(
      target: "gridwise",
      modules = catalog.modules.len(),
      total_steps = catalog.total_steps_across_all_modules(),
      "Module catalog ready"
    );
    catalog
  }

  pub fn get_module_config(&self, name: &str) -> Option<&ModuleDefinition> {
    self.index.get(name).map(|&i| &self.modules[i])
  }

  pub fn all_module_keys(&self) -> impl Iterator<Item = &str> {
    self.modules.iter().map(|m| m.name.as_str())
  }

  pub fn modules(&self) -> &[ModuleDefinition] {
    &self.modules
  }

  pub fn total_steps_across_all_modules(&self) -> u64 {
    self.modules.iter().map(|m| m.total_steps as u64).sum()
  }
}
