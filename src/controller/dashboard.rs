//! The dashboard controller: option loading, per-report caches and reload
//! coordination.
//!
//! One controller exists per dashboard view and owns all of its caches.
//! Option loads are memoized per cache key as shared futures, so concurrent
//! callers for the same key ride one backend call (single-flight). Mutating
//! any option invalidates every cached entry whose option tree contains the
//! mutated root key, then drives a fresh load/display cycle.

use color_eyre::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::marketplace::{Backend, BackendError, DashboardData};

use super::cache_key::{CacheKey, CallCounters};
use super::options::{OptionPath, OptionsTree};
use super::session::{session_options_id, SessionStore};

/// Report id of the dashboard root. Option loads for it may reroute to a
/// specific sub-report; the resolved tree's own ids decide.
pub const DASHBOARD_REPORT_ID: &str = "mk_instance_dashboard";

/// A pending-or-resolved option load. Cloning shares the underlying call.
type OptionsFuture = Shared<BoxFuture<'static, Result<OptionsTree, BackendError>>>;

#[derive(Default)]
struct ControllerState {
  counters: CallCounters,
  /// Single-flight option loads per cache key.
  options_cache: HashMap<CacheKey, OptionsFuture>,
  /// Report payload slots per cache key. `None` marks a reserved slot the
  /// display layer has not populated yet; invalidated together with the
  /// options entry for the same key.
  data_cache: HashMap<CacheKey, Option<DashboardData>>,
  /// Last fully resolved options per key, reroutes already applied.
  resolved_options: HashMap<CacheKey, OptionsTree>,
  /// Live options driving the current view.
  options: OptionsTree,
  /// Data for the currently displayed report, if already fetched.
  data: Option<DashboardData>,
  active_key: Option<CacheKey>,
}

enum OptionOp {
  Update(Value),
  Toggle,
  Delete,
}

/// Coordinates option loads, caches and reloads for one dashboard view.
///
/// Cheap to clone; clones share state, so background tasks can drive loads
/// while the view reads through the accessors. The internal lock is never
/// held across an await point.
#[derive(Clone)]
pub struct DashboardController {
  backend: Arc<dyn Backend>,
  session: Arc<dyn SessionStore>,
  state: Arc<Mutex<ControllerState>>,
  /// Options submitted when no session entry applies.
  default_options: OptionsTree,
  company_id: String,
}

impl DashboardController {
  pub fn new(
    backend: Arc<dyn Backend>,
    session: Arc<dyn SessionStore>,
    default_options: OptionsTree,
    company_id: impl Into<String>,
  ) -> Self {
    Self {
      backend,
      session,
      state: Arc::new(Mutex::new(ControllerState::default())),
      default_options,
      company_id: company_id.into(),
    }
  }

  fn state(&self) -> MutexGuard<'_, ControllerState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn session_id(&self) -> String {
    session_options_id(DASHBOARD_REPORT_ID, &self.company_id)
  }

  /// Initial entry point: load options for the dashboard root report, stamp
  /// the call number, persist the session state and display. Returns the
  /// live options after the display cycle.
  pub async fn load(&self, ignore_session: bool) -> Result<OptionsTree> {
    let main_options = self
      .load_report_options(DASHBOARD_REPORT_ID, ignore_session)
      .await?;
    let cache_key = main_options.derived_key()?;

    let stamped = {
      let mut state = self.state();
      state.options = main_options;
      state.counters.increment(&cache_key);
      let call_number = state.counters.get(&cache_key);
      state.options.set_number("loading_call_number", call_number);
      let stamped = state.options.clone();
      state.resolved_options.insert(cache_key.clone(), stamped.clone());
      stamped
    };
    self.session.put(&self.session_id(), &stamped)?;

    self.display_report().await?;
    Ok(self.options())
  }

  /// Load options for `report_id`, memoized single-flight per cache key.
  ///
  /// The submitted option set is the session one unless `ignore_session` is
  /// set or none exists, in which case the caller-supplied defaults go out.
  /// If the backend reroutes to a different report/source pair, the cache
  /// entry moves to the new key and the provisional key is forgotten, so a
  /// later direct open of that key is not short-circuited by the redirect.
  ///
  /// Backend failures propagate unchanged; there is no retry here.
  pub async fn load_report_options(
    &self,
    report_id: &str,
    ignore_session: bool,
  ) -> Result<OptionsTree> {
    let session_id = self.session_id();
    let mut load_options = if ignore_session {
      self.default_options.clone()
    } else {
      self
        .session
        .get(&session_id)?
        .unwrap_or_else(|| self.default_options.clone())
    };

    let source = load_options
      .sections_source_id()
      .unwrap_or(report_id)
      .to_string();
    let cache_key = CacheKey::derive(&source, report_id);

    // Check, stamp and (on a miss) insert under one lock so a second caller
    // arriving before the backend answers reuses the same pending future.
    let (slot, fresh) = {
      let mut state = self.state();

      if !state.counters.contains(&cache_key) {
        state.counters.increment(&cache_key);
      }
      load_options.set_number("loading_call_number", state.counters.get(&cache_key));

      match state.options_cache.get(&cache_key) {
        Some(existing) => (existing.clone(), false),
        None => {
          load_options.set_string("selected_section_id", report_id);

          let backend = Arc::clone(&self.backend);
          let report = report_id.to_string();
          let submitted = load_options.clone();
          debug!(report = report_id, key = %cache_key, "requesting report options");
          let future: OptionsFuture = async move { backend.get_options(&report, submitted).await }
            .boxed()
            .shared();

          state.options_cache.insert(cache_key.clone(), future.clone());
          (future, true)
        }
      }
    };

    let resolved = slot.await?;

    if fresh {
      let loaded_key = resolved.derived_key()?;
      if loaded_key != cache_key {
        // The backend redirected to a different report. Move the entry to
        // the key the resolved options actually belong to and forget the
        // provisional one, counters included.
        debug!(from = %cache_key, to = %loaded_key, "report options rerouted");
        let mut state = self.state();
        if let Some(entry) = state.options_cache.remove(&cache_key) {
          state.options_cache.insert(loaded_key.clone(), entry);
        }
        state.resolved_options.remove(&cache_key);
        state
          .resolved_options
          .insert(loaded_key.clone(), resolved.clone());
        state.counters.set(&loaded_key, 1);
        state.counters.remove(&cache_key);
        return Ok(resolved);
      }
    }

    Ok(resolved)
  }

  /// Resolve the dashboard's current report and reserve its data slot.
  ///
  /// The slot starts empty; the display layer populates it through
  /// [`store_report_data`](Self::store_report_data) once the chart payload
  /// arrives. Returns the final cache key and whatever the slot holds.
  pub async fn load_report(&self) -> Result<(CacheKey, Option<DashboardData>)> {
    let options = self
      .load_report_options(DASHBOARD_REPORT_ID, false)
      .await?;
    let cache_key = options.derived_key()?;

    let data = {
      let mut state = self.state();
      state
        .data_cache
        .entry(cache_key.clone())
        .or_insert(None)
        .clone()
    };

    Ok((cache_key, data))
  }

  /// Run one display cycle: load the report, adopt its resolved options as
  /// the live options, pick up any cached data and persist the session.
  pub async fn display_report(&self) -> Result<CacheKey> {
    let (cache_key, data) = self.load_report().await?;

    let cached = { self.state().options_cache.get(&cache_key).cloned() };
    if let Some(future) = cached {
      let resolved = future.await?;
      let mut state = self.state();
      state.options = resolved;
      state.data = data;
      state.active_key = Some(cache_key.clone());
    }

    let live = self.options();
    self.session.put(&self.session_id(), &live)?;
    Ok(cache_key)
  }

  /// Invalidate every cached entry whose option tree contains the mutated
  /// path's root key, persist `new_options` and re-display the dashboard.
  ///
  /// Invalidation is by topical relevance, not exact key match: changing
  /// `date.filter` drops every cached report variant whose options carry a
  /// `date` section, since they all depend on it.
  pub async fn reload(&self, path: &OptionPath, new_options: OptionsTree) -> Result<CacheKey> {
    let root = path.root().to_string();

    let entries: Vec<(CacheKey, OptionsFuture)> = {
      let state = self.state();
      state
        .options_cache
        .iter()
        .map(|(key, future)| (key.clone(), future.clone()))
        .collect()
    };

    for (cache_key, future) in entries {
      let cached = future.await?;
      if cached.contains_root(&root) {
        debug!(key = %cache_key, root = %root, "invalidating cached report");
        let mut state = self.state();
        state.options_cache.remove(&cache_key);
        state.data_cache.remove(&cache_key);
      }
    }

    self.session.put(&self.session_id(), &new_options)?;
    self.display_report().await
  }

  /// Bump the call counter for the live options' key. The next load request
  /// for that key goes out stamped with the new number.
  pub fn increment_call_number(&self) -> Result<()> {
    let mut state = self.state();
    let cache_key = state.options.derived_key()?;
    state.counters.increment(&cache_key);
    Ok(())
  }

  pub async fn update_option(&self, path: &OptionPath, value: Value) -> Result<()> {
    self.mutate_option(OptionOp::Update(value), path, false).await
  }

  pub async fn toggle_option(&self, path: &OptionPath, reload_ui: bool) -> Result<()> {
    self.mutate_option(OptionOp::Toggle, path, reload_ui).await
  }

  pub async fn delete_option(&self, path: &OptionPath) -> Result<()> {
    self.mutate_option(OptionOp::Delete, path, false).await
  }

  async fn mutate_option(
    &self,
    op: OptionOp,
    path: &OptionPath,
    reload_ui: bool,
  ) -> Result<()> {
    {
      let mut state = self.state();
      match op {
        OptionOp::Update(value) => state.options.update(path, value)?,
        OptionOp::Toggle => {
          state.options.toggle(path)?;
        }
        OptionOp::Delete => state.options.delete(path)?,
      }
    }

    if reload_ui {
      self.increment_call_number()?;
      let options = self.options();
      self.reload(path, options).await?;
    }

    Ok(())
  }

  /// Populate the data slot for `key`. If that report is the one currently
  /// displayed, the live data follows.
  pub fn store_report_data(&self, key: &CacheKey, data: DashboardData) {
    let mut state = self.state();
    if state.active_key.as_ref() == Some(key) {
      state.data = Some(data.clone());
    }
    state.data_cache.insert(key.clone(), Some(data));
  }

  /// Snapshot of the live options.
  pub fn options(&self) -> OptionsTree {
    self.state().options.clone()
  }

  /// Data for the currently displayed report, if fetched.
  pub fn data(&self) -> Option<DashboardData> {
    self.state().data.clone()
  }

  /// Cache key of the currently displayed report.
  pub fn active_key(&self) -> Option<CacheKey> {
    self.state().active_key.clone()
  }

  #[allow(dead_code)]
  pub fn call_number(&self, key: &CacheKey) -> u64 {
    self.state().counters.get(key)
  }

  #[allow(dead_code)]
  pub fn has_counter(&self, key: &CacheKey) -> bool {
    self.state().counters.contains(key)
  }

  #[allow(dead_code)]
  pub fn has_cached_options(&self, key: &CacheKey) -> bool {
    self.state().options_cache.contains_key(key)
  }

  #[allow(dead_code)]
  pub fn has_cached_data(&self, key: &CacheKey) -> bool {
    self.state().data_cache.contains_key(key)
  }

  /// Last fully resolved options recorded for `key`.
  #[allow(dead_code)]
  pub fn resolved_options(&self, key: &CacheKey) -> Option<OptionsTree> {
    self.state().resolved_options.get(key).cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::controller::session::MemorySessionStore;
  use crate::marketplace::{DashboardQuery, Notification};
  use async_trait::async_trait;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  /// Backend double: echoes the submitted options back with ids filled in,
  /// optionally rerouting to a fixed (source, report) pair, optionally
  /// answering from a canned per-report tree.
  #[derive(Default)]
  struct MockBackend {
    options_calls: AtomicU32,
    delay: Option<Duration>,
    reroute_to: Option<(String, String)>,
    canned: HashMap<String, Value>,
    last_submitted: Mutex<Option<OptionsTree>>,
  }

  impl MockBackend {
    fn new() -> Self {
      Self::default()
    }

    fn with_delay(mut self, delay: Duration) -> Self {
      self.delay = Some(delay);
      self
    }

    fn with_reroute(mut self, source: &str, report: &str) -> Self {
      self.reroute_to = Some((source.to_string(), report.to_string()));
      self
    }

    fn with_canned(mut self, report_id: &str, tree: Value) -> Self {
      self.canned.insert(report_id.to_string(), tree);
      self
    }

    fn options_calls(&self) -> u32 {
      self.options_calls.load(Ordering::SeqCst)
    }

    fn last_submitted(&self) -> Option<OptionsTree> {
      self.last_submitted.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl Backend for MockBackend {
    async fn get_options(
      &self,
      report_id: &str,
      previous: OptionsTree,
    ) -> Result<OptionsTree, BackendError> {
      self.options_calls.fetch_add(1, Ordering::SeqCst);
      *self.last_submitted.lock().unwrap() = Some(previous.clone());

      if let Some(delay) = self.delay {
        tokio::time::sleep(delay).await;
      }

      if let Some(canned) = self.canned.get(report_id) {
        return Ok(OptionsTree::from_value(canned.clone()).unwrap());
      }

      let (source, report) = match &self.reroute_to {
        Some((source, report)) => (source.clone(), report.clone()),
        None => (
          previous
            .sections_source_id()
            .unwrap_or(report_id)
            .to_string(),
          report_id.to_string(),
        ),
      };

      let mut resolved = previous;
      resolved.set_string("sections_source_id", &source);
      resolved.set_string("report_id", &report);
      Ok(resolved)
    }

    async fn get_dashboard_data(
      &self,
      _query: DashboardQuery,
    ) -> Result<DashboardData, BackendError> {
      Ok(DashboardData::default())
    }

    async fn poll_notifications(&self, _after: u64) -> Result<Vec<Notification>, BackendError> {
      Ok(Vec::new())
    }
  }

  fn defaults() -> OptionsTree {
    OptionsTree::from_value(json!({
      "sections_source_id": "S1",
      "date": {"filter": "this_year"},
      "comparison": false,
    }))
    .unwrap()
  }

  fn controller(backend: Arc<MockBackend>) -> DashboardController {
    DashboardController::new(
      backend,
      Arc::new(MemorySessionStore::new()),
      defaults(),
      "1",
    )
  }

  fn path(raw: &str) -> OptionPath {
    OptionPath::parse(raw).unwrap()
  }

  #[tokio::test]
  async fn test_first_load_derives_key_and_counter() {
    let backend = Arc::new(MockBackend::new());
    let controller = controller(backend.clone());

    let options = controller.load_report_options("R1", false).await.unwrap();
    let key = options.derived_key().unwrap();

    assert_eq!(key.as_str(), "S1_R1");
    assert_eq!(controller.call_number(&key), 1);
    assert!(controller.has_cached_options(&key));
    assert_eq!(backend.options_calls(), 1);
  }

  #[tokio::test]
  async fn test_submitted_options_are_stamped() {
    let backend = Arc::new(MockBackend::new());
    let controller = controller(backend.clone());

    controller.load_report_options("R1", false).await.unwrap();

    let submitted = backend.last_submitted().unwrap();
    assert_eq!(submitted.loading_call_number(), 1);
    assert_eq!(
      submitted.get_str(&path("selected_section_id")),
      Some("R1")
    );
  }

  #[tokio::test]
  async fn test_concurrent_loads_share_one_backend_call() {
    let backend = Arc::new(MockBackend::new().with_delay(Duration::from_millis(30)));
    let controller = controller(backend.clone());

    let (a, b) = tokio::join!(
      controller.load_report_options("R1", false),
      controller.load_report_options("R1", false),
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(backend.options_calls(), 1);
  }

  #[tokio::test]
  async fn test_cached_load_skips_backend() {
    let backend = Arc::new(MockBackend::new());
    let controller = controller(backend.clone());

    let first = controller.load_report_options("R1", false).await.unwrap();
    let second = controller.load_report_options("R1", false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(backend.options_calls(), 1);
    // A repeat load must not bump the counter past the first increment.
    assert_eq!(controller.call_number(&first.derived_key().unwrap()), 1);
  }

  #[tokio::test]
  async fn test_reroute_moves_cache_to_resolved_key() {
    let backend = Arc::new(MockBackend::new().with_reroute("S2", "R2"));
    let controller = controller(backend.clone());

    let resolved = controller.load_report_options("R1", false).await.unwrap();

    let provisional = CacheKey::derive("S1", "R1");
    let rerouted = resolved.derived_key().unwrap();
    assert_eq!(rerouted.as_str(), "S2_R2");

    // The provisional key must be gone from both the cache and the counter
    // map, so a later direct open of it is not short-circuited.
    assert!(!controller.has_cached_options(&provisional));
    assert!(!controller.has_counter(&provisional));

    assert!(controller.has_cached_options(&rerouted));
    assert_eq!(controller.call_number(&rerouted), 1);
    assert_eq!(controller.resolved_options(&rerouted), Some(resolved));
    assert_eq!(controller.resolved_options(&provisional), None);
  }

  #[tokio::test]
  async fn test_reload_purges_topically_related_entries() {
    let backend = Arc::new(
      MockBackend::new()
        .with_canned(
          "R1",
          json!({
            "sections_source_id": "S1",
            "report_id": "R1",
            "date": {"filter": "this_year"},
          }),
        )
        .with_canned(
          "R2",
          json!({
            "sections_source_id": "S1",
            "report_id": "R2",
            "listing": {"state": "active"},
          }),
        ),
    );
    let controller = controller(backend.clone());

    let with_date = controller
      .load_report_options("R1", false)
      .await
      .unwrap()
      .derived_key()
      .unwrap();
    let without_date = controller
      .load_report_options("R2", false)
      .await
      .unwrap()
      .derived_key()
      .unwrap();

    controller.store_report_data(&with_date, DashboardData::default());
    controller.store_report_data(&without_date, DashboardData::default());

    controller
      .reload(&path("date.filter"), defaults())
      .await
      .unwrap();

    // Every cached tree carrying a `date` section is purged, options and
    // data in lockstep; unrelated trees survive.
    assert!(!controller.has_cached_options(&with_date));
    assert!(!controller.has_cached_data(&with_date));
    assert!(controller.has_cached_options(&without_date));
    assert!(controller.has_cached_data(&without_date));
  }

  #[tokio::test]
  async fn test_reload_issues_fresh_root_load() {
    let backend = Arc::new(MockBackend::new());
    let controller = controller(backend.clone());

    controller.load(false).await.unwrap();
    let calls_after_load = backend.options_calls();

    controller
      .toggle_option(&path("comparison"), true)
      .await
      .unwrap();

    assert!(backend.options_calls() > calls_after_load);
    assert_eq!(
      controller.options().get(&path("comparison")),
      Some(&json!(true))
    );
  }

  #[tokio::test]
  async fn test_mutation_without_reload_keeps_cache() {
    let backend = Arc::new(MockBackend::new());
    let controller = controller(backend.clone());

    controller.load(false).await.unwrap();
    let calls_after_load = backend.options_calls();
    let key = controller.active_key().unwrap();

    controller
      .update_option(&path("date.filter"), json!("this_month"))
      .await
      .unwrap();

    assert_eq!(backend.options_calls(), calls_after_load);
    assert!(controller.has_cached_options(&key));
  }

  #[tokio::test]
  async fn test_load_stamps_and_persists_session() {
    let backend = Arc::new(MockBackend::new());
    let session = Arc::new(MemorySessionStore::new());
    let controller =
      DashboardController::new(backend.clone(), session.clone(), defaults(), "1");

    let options = controller.load(false).await.unwrap();

    assert!(options.loading_call_number() > 0);
    let stored = session
      .get(&session_options_id(DASHBOARD_REPORT_ID, "1"))
      .unwrap();
    assert!(stored.is_some());
  }

  #[tokio::test]
  async fn test_session_options_feed_next_load() {
    let backend = Arc::new(MockBackend::new());
    let session = Arc::new(MemorySessionStore::new());

    {
      let controller =
        DashboardController::new(backend.clone(), session.clone(), defaults(), "1");
      controller.load(false).await.unwrap();
      controller
        .update_option(&path("date.filter"), json!("this_month"))
        .await
        .unwrap();
      controller
        .reload(&path("date.filter"), controller.options())
        .await
        .unwrap();
    }

    // A fresh controller over the same session sees the persisted filter.
    let controller = DashboardController::new(backend.clone(), session, defaults(), "1");
    controller.load(false).await.unwrap();
    let submitted = backend.last_submitted().unwrap();
    assert_eq!(submitted.get_str(&path("date.filter")), Some("this_month"));
  }

  #[tokio::test]
  async fn test_ignore_session_uses_defaults() {
    let backend = Arc::new(MockBackend::new());
    let session = Arc::new(MemorySessionStore::new());

    let mut persisted = defaults();
    persisted.set_string("report_id", "R9");
    persisted
      .update(&path("date.filter"), json!("this_month"))
      .unwrap();
    session
      .put(&session_options_id(DASHBOARD_REPORT_ID, "1"), &persisted)
      .unwrap();

    let controller = DashboardController::new(backend.clone(), session, defaults(), "1");
    controller
      .load_report_options("R1", true)
      .await
      .unwrap();

    let submitted = backend.last_submitted().unwrap();
    assert_eq!(submitted.get_str(&path("date.filter")), Some("this_year"));
  }

  #[tokio::test]
  async fn test_data_slot_reserved_then_populated() {
    let backend = Arc::new(MockBackend::new());
    let controller = controller(backend.clone());

    let (key, data) = controller.load_report().await.unwrap();
    assert_eq!(data, None);
    assert!(controller.has_cached_data(&key));

    let payload = DashboardData {
      summary: crate::marketplace::Summary {
        total_orders: 5,
        ..Default::default()
      },
      ..Default::default()
    };
    controller.store_report_data(&key, payload.clone());

    let (_, data) = controller.load_report().await.unwrap();
    assert_eq!(data, Some(payload));
  }

  #[tokio::test]
  async fn test_delete_option_removes_leaf() {
    let backend = Arc::new(MockBackend::new());
    let controller = controller(backend.clone());

    controller.load(false).await.unwrap();
    assert!(controller.options().get(&path("date.filter")).is_some());

    controller.delete_option(&path("date.filter")).await.unwrap();
    assert_eq!(controller.options().get(&path("date.filter")), None);
  }

  #[tokio::test]
  async fn test_stored_data_for_active_report_goes_live() {
    let backend = Arc::new(MockBackend::new());
    let controller = controller(backend.clone());

    controller.load(false).await.unwrap();
    let key = controller.active_key().unwrap();
    assert_eq!(controller.data(), None);

    let payload = DashboardData {
      summary: crate::marketplace::Summary {
        total_orders: 3,
        ..Default::default()
      },
      ..Default::default()
    };
    controller.store_report_data(&key, payload.clone());

    assert_eq!(controller.data(), Some(payload));
  }

  #[tokio::test]
  async fn test_backend_failure_propagates() {
    struct FailingBackend;

    #[async_trait]
    impl Backend for FailingBackend {
      async fn get_options(
        &self,
        _report_id: &str,
        _previous: OptionsTree,
      ) -> Result<OptionsTree, BackendError> {
        Err(BackendError::Request("boom".to_string()))
      }

      async fn get_dashboard_data(
        &self,
        _query: DashboardQuery,
      ) -> Result<DashboardData, BackendError> {
        Err(BackendError::Request("boom".to_string()))
      }

      async fn poll_notifications(
        &self,
        _after: u64,
      ) -> Result<Vec<Notification>, BackendError> {
        Ok(Vec::new())
      }
    }

    let controller = DashboardController::new(
      Arc::new(FailingBackend),
      Arc::new(MemorySessionStore::new()),
      defaults(),
      "1",
    );

    let err = controller
      .load_report_options("R1", false)
      .await
      .unwrap_err();
    assert!(err.to_string().contains("boom"));
  }
}
