//! Activity score history (`activity_scores/{autoId}`) and the per-user
//! aggregate (`user_progress/{uid}`) behind the scores/progress API.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::catalog::ModuleCatalog;
use crate::domain::{ActivityScore, UserProgress};
use crate::progress::ProgressStore;
use crate::protocol::ActivityStatsOut;
use crate::scoring::overall_progress_percent;
use crate::store::{from_document, to_document, Document, DocumentStore, StoreError};
use crate::util::doc_path;

pub const ACTIVITY_SCORES: &str = "activity_scores";
pub const USER_PROGRESS: &str = "user_progress";

pub const RECENT_SCORES_LIMIT: usize = 10;
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

#[derive(Clone)]
pub struct ScoreRecords {
  store: Arc<dyn DocumentStore>,
  progress: ProgressStore,
  catalog: Arc<ModuleCatalog>,
}

impl ScoreRecords {
  pub fn new(store: Arc<dyn DocumentStore>, progress: ProgressStore, catalog: Arc<ModuleCatalog>) -> Self {
    Self { store, progress, catalog }
  }

  /// Store a new attempt and fold it into the user's aggregate counters.
  #[instrument(level = "debug", skip(self, record), fields(user = %record.user_id, activity = %record.activity_id))]
  pub async fn insert(&self, mut record: ActivityScore) -> Result<ActivityScore, StoreError> {
    let mut doc = to_document(&record)?;
    doc.remove("id");
    record.id = self.store.add(ACTIVITY_SCORES, doc).await?;

    let path = doc_path(USER_PROGRESS, &record.user_id);
    self.store.increment(&path, "totalActivities", 1).await?;
    self.store.increment(&path, "totalScore", record.score as i64).await?;
    self.store.increment(&path, "totalTimeSpent", record.time_spent as i64).await?;
    let mut touch = Document::new();
    touch.insert("userId".into(), Value::from(record.user_id.clone()));
    touch.insert("lastActivityAt".into(), serde_json::to_value(record.created_at)?);
    self.store.set(&path, touch, true).await?;

    debug!(target: "progress", id = %record.id, score = record.score, "Activity score stored");
    Ok(record)
  }

  async fn all(&self) -> Result<Vec<ActivityScore>, StoreError> {
    self
      .store
      .list(ACTIVITY_SCORES)
      .await?
      .into_iter()
      .map(|(id, doc)| {
        let mut rec: ActivityScore = from_document(&doc_path(ACTIVITY_SCORES, &id), doc)?;
        rec.id = id;
        Ok(rec)
      })
      .collect()
  }

  /// Up to 10 most recent attempts of a user in a module, newest first.
  pub async fn recent_for_module(&self, uid: &str, module: &str) -> Result<Vec<ActivityScore>, StoreError> {
    let mut out: Vec<_> = self
      .all()
      .await?
      .into_iter()
      .filter(|r| r.user_id == uid && r.module_id == module)
      .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out.truncate(RECENT_SCORES_LIMIT);
    Ok(out)
  }

  /// Best attempts for an activity, highest score first (earlier attempt wins ties).
  pub async fn leaderboard(&self, activity_id: &str, limit: usize) -> Result<Vec<ActivityScore>, StoreError> {
    let mut out: Vec<_> = self.all().await?.into_iter().filter(|r| r.activity_id == activity_id).collect();
    out.sort_by(|a, b| b.score.cmp(&a.score).then(a.created_at.cmp(&b.created_at)));
    out.truncate(limit);
    Ok(out)
  }

  /// Attempts, best and average score and total time of a user on an activity.
  pub async fn stats(&self, activity_id: &str, uid: &str) -> Result<Option<ActivityStatsOut>, StoreError> {
    let attempts: Vec<_> = self
      .all()
      .await?
      .into_iter()
      .filter(|r| r.activity_id == activity_id && r.user_id == uid)
      .collect();
    if attempts.is_empty() {
      return Ok(None);
    }
    let total_score: u64 = attempts.iter().map(|r| r.score as u64).sum();
    Ok(Some(ActivityStatsOut {
      attempts: attempts.len() as u64,
      best_score: attempts.iter().map(|r| r.score).max().unwrap_or(0),
      average_score: (total_score as f64 / attempts.len() as f64).round() as u32,
      total_time: attempts.iter().map(|r| r.time_spent as u64).sum(),
    }))
  }

  /// The user's aggregate with average score and overall completion filled in.
  pub async fn user_progress(&self, uid: &str) -> Result<Option<UserProgress>, StoreError> {
    let path = doc_path(USER_PROGRESS, uid);
    let Some(doc) = self.store.get(&path).await? else {
      return Ok(None);
    };
    let mut agg: UserProgress = from_document(&path, doc)?;
    agg.user_id = uid.to_string();
    agg.average_score = if agg.total_activities == 0 {
      0
    } else {
      (agg.total_score as f64 / agg.total_activities as f64).round() as u32
    };
    let modules = self.progress.get_all_progress(uid).await?;
    agg.overall_progress = overall_progress_percent(&self.catalog, &modules);
    Ok(Some(agg))
  }
}
