//! Progress store accessor: per-user module progress (`progress/{uid}`, one
//! document per user keyed by module name) and profiles (`profiles/{uid}`).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

use crate::domain::{ModuleProgress, ProfileCounter, ProgressUpdate, UserProfile};
use crate::store::{from_document, to_document, Document, DocumentStore, StoreError};
use crate::util::doc_path;

pub const PROFILES: &str = "profiles";
pub const PROGRESS: &str = "progress";

#[derive(Clone)]
pub struct ProgressStore {
  store: Arc<dyn DocumentStore>,
}

impl ProgressStore {
  pub fn new(store: Arc<dyn DocumentStore>) -> Self {
    Self { store }
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn get_all_progress(&self, uid: &str) -> Result<HashMap<String, ModuleProgress>, StoreError> {
    let path = doc_path(PROGRESS, uid);
    let Some(doc) = self.store.get(&path).await? else {
      return Ok(HashMap::new());
    };
    let mut out = HashMap::with_capacity(doc.len());
    for (module, value) in doc {
      match serde_json::from_value::<ModuleProgress>(value) {
        Ok(p) => { out.insert(module, p); }
        Err(e) => error!(target: "progress", %uid, %module, error = %e, "Ignoring malformed progress entry"),
      }
    }
    Ok(out)
  }

  /// Screen-facing read: a failed load renders as "no progress yet".
  pub async fn load_progress_or_default(&self, uid: &str) -> HashMap<String, ModuleProgress> {
    self.get_all_progress(uid).await.unwrap_or_else(|e| {
      error!(target: "progress", %uid, error = %e, "Failed to load progress; showing empty state");
      HashMap::new()
    })
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn get_module_progress(&self, uid: &str, module: &str) -> Result<Option<ModuleProgress>, StoreError> {
    let path = doc_path(PROGRESS, uid);
    let Some(mut doc) = self.store.get(&path).await? else {
      return Ok(None);
    };
    match doc.remove(module) {
      Some(Value::Object(entry)) => from_document(&path, entry).map(Some),
      _ => Ok(None),
    }
  }

  /// Merge-write of the supplied fields; `updatedAt` is always stamped.
  #[instrument(level = "debug", skip(self))]
  pub async fn set_module_progress(&self, uid: &str, module: &str, update: &ProgressUpdate) -> Result<(), StoreError> {
    let mut entry = to_document(update)?;
    entry.insert("updatedAt".into(), serde_json::to_value(Utc::now())?);
    let mut doc = Document::new();
    doc.insert(module.to_string(), Value::Object(entry));
    self.store.set(&doc_path(PROGRESS, uid), doc, true).await?;
    debug!(target: "progress", %uid, %module, step = ?update.step, score = ?update.score, "Module progress written");
    Ok(())
  }

  /// User-initiated restart: the module goes back to step 1. The last score is kept.
  pub async fn restart_module(&self, uid: &str, module: &str) -> Result<(), StoreError> {
    info!(target: "progress", %uid, %module, "Restarting module");
    self.set_module_progress(uid, module, &ProgressUpdate { step: Some(1), score: None }).await
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, StoreError> {
    let path = doc_path(PROFILES, uid);
    match self.store.get(&path).await? {
      Some(doc) => from_document(&path, doc).map(Some),
      None => Ok(None),
    }
  }

  /// Create the profile with defaults, or refresh login time, email and display name.
  ///
  /// A profile first written by a counter increment has no `createdAt`,
  /// `level`, `streakDays` or `badges` yet; the first login fills them in.
  #[instrument(level = "info", skip(self, email, display_name))]
  pub async fn create_or_touch_profile(&self, uid: &str, email: &str, display_name: &str) -> Result<UserProfile, StoreError> {
    let path = doc_path(PROFILES, uid);
    let now = Utc::now();
    let Some(mut doc) = self.store.get(&path).await? else {
      let profile = UserProfile::new(email, display_name, now);
      self.store.set(&path, to_document(&profile)?, false).await?;
      info!(target: "progress", %uid, "Profile created");
      return Ok(profile);
    };

    let mut touch = to_document(&json!({ "lastLoginAt": now, "email": email, "displayName": display_name }))?;
    let defaults = to_document(&UserProfile::new(email, display_name, now))?;
    for field in ["createdAt", "level", "streakDays", "badges"] {
      if !doc.contains_key(field) {
        if let Some(v) = defaults.get(field) {
          touch.insert(field.to_string(), v.clone());
        }
      }
    }
    self.store.set(&path, touch.clone(), true).await?;
    doc.extend(touch);
    debug!(target: "progress", %uid, "Profile touched");
    from_document(&path, doc)
  }

  /// Atomic increment of a profile counter.
  pub async fn increment_profile(&self, uid: &str, counter: ProfileCounter, amount: u64) -> Result<(), StoreError> {
    let delta = i64::try_from(amount).unwrap_or(i64::MAX);
    self.store.increment(&doc_path(PROFILES, uid), counter.field(), delta).await
  }

  pub async fn set_level(&self, uid: &str, level: u32) -> Result<(), StoreError> {
    let mut doc = Document::new();
    doc.insert("level".into(), Value::from(level));
    self.store.set(&doc_path(PROFILES, uid), doc, true).await
  }

  /// Atomic set-union of one badge into the profile's badge list.
  pub async fn add_badge(&self, uid: &str, badge: &str) -> Result<(), StoreError> {
    self.store.array_union(&doc_path(PROFILES, uid), "badges", vec![Value::from(badge)]).await
  }
}
