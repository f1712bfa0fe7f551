//! Event/telemetry recorder: append-only per-user event log
//! (`profiles/{uid}/events`) and daily aggregate counters
//! (`metrics_daily/{YYYY-MM-DD}`).
//!
//! Recording is fire-and-forget: failures are logged and never reach the caller.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, error, instrument};

use crate::domain::{DailyMetric, EventLogEntry, EventPayload, ProfileCounter};
use crate::progress::{ProgressStore, PROFILES};
use crate::store::{from_document, to_document, DocumentStore, StoreError};
use crate::util::{day_key, doc_path};

pub const METRICS_DAILY: &str = "metrics_daily";

pub const SCREEN_VIEW: &str = "screen_view";
pub const SCREEN_TIME: &str = "screen_time";
pub const CLICK: &str = "click";
pub const QUIZ_SUBMIT: &str = "quiz_submit";
pub const LOGIN_SUCCESS: &str = "login_success";

/// Identity of one application launch, attached to every event it records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
  id: String,
}

impl SessionContext {
  /// Fresh `session_<millis>_<random>` token.
  pub fn generate() -> Self {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
      .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
      .collect();
    Self { id: format!("session_{}_{}", Utc::now().timestamp_millis(), suffix) }
  }

  /// Session reported by a client.
  pub fn from_id(id: impl Into<String>) -> Self {
    Self { id: id.into() }
  }

  pub fn id(&self) -> &str {
    &self.id
  }
}

/// Daily counter bumped for an event type, and by how much.
pub fn daily_metric_for(kind: &str, value: Option<f64>) -> Option<(&'static str, i64)> {
  match kind {
    SCREEN_VIEW => Some(("screen_views", 1)),
    SCREEN_TIME => Some(("screen_time_ms", value.unwrap_or(0.0).max(0.0).round() as i64)),
    CLICK => Some(("clicks", 1)),
    QUIZ_SUBMIT => Some(("quiz_submits", 1)),
    LOGIN_SUCCESS => Some(("logins", 1)),
    _ => None,
  }
}

#[derive(Clone)]
pub struct EventRecorder {
  store: Arc<dyn DocumentStore>,
  progress: ProgressStore,
  session: SessionContext,
}

impl EventRecorder {
  pub fn new(store: Arc<dyn DocumentStore>, progress: ProgressStore, session: SessionContext) -> Self {
    Self { store, progress, session }
  }

  pub fn session(&self) -> &SessionContext {
    &self.session
  }

  /// Same recorder, attributing events to another session.
  pub fn with_session(&self, session: SessionContext) -> Self {
    Self { session, ..self.clone() }
  }

  /// Append an event. Returns the stored entry id on success.
  #[instrument(level = "debug", skip(self, payload), fields(session = %self.session.id))]
  pub async fn log_event(&self, uid: &str, kind: &str, payload: EventPayload) -> Option<String> {
    let entry = EventLogEntry {
      kind: kind.to_string(),
      screen: payload.screen,
      value: payload.value,
      extra: payload.extra,
      session_id: self.session.id.clone(),
      created_at: Utc::now(),
    };
    let collection = format!("{}/events", doc_path(PROFILES, uid));
    let res = match to_document(&entry) {
      Ok(doc) => self.store.add(&collection, doc).await,
      Err(e) => Err(e),
    };
    match res {
      Ok(id) => {
        debug!(target: "events", %uid, %kind, %id, "Event logged");
        Some(id)
      }
      Err(e) => {
        error!(target: "events", %uid, %kind, error = %e, "Failed to log event");
        None
      }
    }
  }

  /// Atomic increment of today's counter for `metric`.
  #[instrument(level = "debug", skip(self))]
  pub async fn bump_daily(&self, metric: &str, amount: i64) -> bool {
    let path = doc_path(METRICS_DAILY, &day_key(Utc::now()));
    match self.store.increment(&path, metric, amount).await {
      Ok(()) => true,
      Err(e) => {
        error!(target: "events", %metric, amount, error = %e, "Failed to bump daily metric");
        false
      }
    }
  }

  /// Log an event and bump the daily counter its type maps to.
  /// A `screen_time` event also adds its duration to the profile's total time.
  pub async fn record(&self, uid: &str, kind: &str, payload: EventPayload) -> Option<String> {
    let value = payload.value;
    let id = self.log_event(uid, kind, payload).await;
    if let Some((metric, amount)) = daily_metric_for(kind, value) {
      self.bump_daily(metric, amount).await;
    }
    if kind == SCREEN_TIME {
      let elapsed_ms = value.unwrap_or(0.0).max(0.0).round() as u64;
      self.add_total_time(uid, elapsed_ms).await;
    }
    id
  }

  async fn add_total_time(&self, uid: &str, elapsed_ms: u64) {
    if let Err(e) = self.progress.increment_profile(uid, ProfileCounter::TotalTimeMs, elapsed_ms).await {
      error!(target: "events", %uid, elapsed_ms, error = %e, "Failed to add screen time to profile");
    }
  }

  /// Read one day of counters for the admin metrics view.
  pub async fn daily_metrics(&self, day: &str) -> Result<Option<DailyMetric>, StoreError> {
    let path = doc_path(METRICS_DAILY, day);
    match self.store.get(&path).await? {
      Some(doc) => from_document(&path, doc).map(Some),
      None => Ok(None),
    }
  }

  /// Events of one user, oldest first.
  pub async fn events_for(&self, uid: &str) -> Result<Vec<EventLogEntry>, StoreError> {
    let collection = format!("{}/events", doc_path(PROFILES, uid));
    let mut out = self
      .store
      .list(&collection)
      .await?
      .into_iter()
      .map(|(id, doc)| from_document::<EventLogEntry>(&doc_path(&collection, &id), doc))
      .collect::<Result<Vec<_>, _>>()?;
    out.sort_by_key(|e| e.created_at);
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::testing::FlakyStore;
  use crate::store::MemoryStore;

  fn recorder() -> (EventRecorder, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let progress = ProgressStore::new(store.clone());
    (EventRecorder::new(store.clone(), progress, SessionContext::generate()), store)
  }

  #[test]
  fn session_token_shape() {
    let s = SessionContext::generate();
    let parts: Vec<&str> = s.id().split('_').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "session");
    assert!(parts[1].parse::<i64>().is_ok());
    assert_eq!(parts[2].len(), 9);
    assert_ne!(SessionContext::generate(), s);
  }

  #[tokio::test]
  async fn events_are_sparse_and_carry_the_session() {
    let (rec, store) = recorder();
    let id = rec.log_event("u1", CLICK, EventPayload { screen: Some("home".into()), ..Default::default() }).await;
    let id = id.expect("logged");
    let doc = store.get(&format!("profiles/u1/events/{id}")).await.unwrap().unwrap();
    assert_eq!(doc["type"], "click");
    assert_eq!(doc["screen"], "home");
    assert_eq!(doc["sessionId"], rec.session().id());
    assert!(!doc.contains_key("value"));
    assert!(!doc.contains_key("extra"));
  }

  #[tokio::test]
  async fn record_bumps_daily_counters() {
    let (rec, _) = recorder();
    rec.record("u1", CLICK, EventPayload::default()).await;
    rec.record("u2", CLICK, EventPayload::default()).await;
    rec.record("u1", QUIZ_SUBMIT, EventPayload::default()).await;
    rec.record("u1", "custom_thing", EventPayload::default()).await;

    let today = day_key(Utc::now());
    let metrics = rec.daily_metrics(&today).await.unwrap().unwrap();
    assert_eq!(metrics["clicks"], 2.0);
    assert_eq!(metrics["quiz_submits"], 1.0);
    assert_eq!(metrics.len(), 2);
    assert_eq!(rec.events_for("u1").await.unwrap().len(), 3);
  }

  #[tokio::test]
  async fn screen_time_adds_to_profile_total() {
    let (rec, _) = recorder();
    let progress = rec.progress.clone();
    progress.create_or_touch_profile("u1", "a@b.c", "A").await.unwrap();

    let lesson = || Some("lesson".to_string());
    rec.record("u1", SCREEN_VIEW, EventPayload { screen: lesson(), ..Default::default() }).await;
    rec.record("u1", SCREEN_TIME, EventPayload { screen: lesson(), value: Some(820.4), extra: None }).await;
    rec.record("u1", SCREEN_TIME, EventPayload { value: Some(1500.0), ..Default::default() }).await;
    rec.record("u1", SCREEN_TIME, EventPayload { value: Some(-30.0), ..Default::default() }).await;

    let events = rec.events_for("u1").await.unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events.iter().filter(|e| e.kind == SCREEN_VIEW).count(), 1);
    let profile = progress.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.total_time_ms, 820 + 1500);
    let metrics = rec.daily_metrics(&day_key(Utc::now())).await.unwrap().unwrap();
    assert_eq!(metrics["screen_time_ms"], 2320.0);
    assert_eq!(metrics["screen_views"], 1.0);
  }

  #[tokio::test]
  async fn telemetry_failures_do_not_surface() {
    let store = Arc::new(FlakyStore::default());
    let rec = EventRecorder::new(store.clone(), ProgressStore::new(store.clone()), SessionContext::from_id("s"));
    store.set_offline(true);
    assert_eq!(rec.record("u1", SCREEN_TIME, EventPayload { value: Some(10.0), ..Default::default() }).await, None);
    assert!(!rec.bump_daily("clicks", 1).await);
  }
}
