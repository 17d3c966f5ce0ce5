use crate::config::Config;
use crate::controller::{
  DashboardController, KeepLast, MemorySessionStore, OptionPath, OptionsTree, SessionStore,
  SqliteSessionStore,
};
use crate::dates::{self, DateFilters, PeriodType};
use crate::event::{DashboardEvent, Event, EventHandler};
use crate::marketplace::{
  Backend, DashboardData, DashboardQuery, HttpBackend, Notification, NotificationKind,
};
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use rand::seq::SliceRandom;
use ratatui::prelude::*;
use serde_json::{json, Value};
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Trailing-edge debounce for filter changes, so clicking through five
/// filters issues one reload, not five.
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

/// How long a non-sticky notice stays on screen.
const NOTICE_TTL: Duration = Duration::from_secs(5);

const ERROR_TITLES: [&str; 9] = [
  "Oh snap!",
  "Oops!",
  "Uh-oh!",
  "Error!",
  "Yikes!",
  "Whoops!",
  "Houston, we have a problem!",
  "Oh no!",
  "Epic fail!",
];

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  /// Editing one bound of a custom date range
  DateInput { field: DateField, input: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
  From,
  To,
}

impl DateField {
  pub fn label(&self) -> &'static str {
    match self {
      DateField::From => "from",
      DateField::To => "to",
    }
  }

  fn option_leaf(&self) -> &'static str {
    match self {
      DateField::From => "date_from",
      DateField::To => "date_to",
    }
  }
}

/// A transient user notice (server notification or local warning)
pub struct Notice {
  pub title: Option<String>,
  pub message: String,
  pub kind: NotificationKind,
  pub sticky: bool,
  shown_at: Instant,
}

pub struct ErrorOverlay {
  pub title: String,
  pub message: String,
}

/// Main application state
pub struct App {
  config: Config,
  controller: DashboardController,
  backend: Arc<dyn Backend>,
  /// Latest-wins guard for chart-data fetches
  keep_last: KeepLast,

  /// Current input mode
  mode: Mode,
  /// Snapshot of the live options, refreshed on every dashboard event
  options: OptionsTree,
  /// Period offsets backing the filter bar
  date_filters: DateFilters,
  data: Option<DashboardData>,
  loading: bool,
  notice: Option<Notice>,
  error: Option<ErrorOverlay>,

  /// Pending debounce timer; aborted and restarted on every filter change
  reload_debounce: Option<JoinHandle<()>>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  ignore_session: bool,
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, ignore_session: bool) -> Result<Self> {
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&config)?);

    let session: Arc<dyn SessionStore> = match SqliteSessionStore::open() {
      Ok(store) => Arc::new(store),
      Err(e) => {
        warn!("session store unavailable, keeping options in memory: {}", e);
        Arc::new(MemorySessionStore::new())
      }
    };

    let controller = DashboardController::new(
      Arc::clone(&backend),
      session,
      config.default_options(),
      config.marketplace.company_id.clone(),
    );

    let (tx, _rx) = mpsc::unbounded_channel();

    Ok(Self {
      config,
      controller,
      backend,
      keep_last: KeepLast::new(),
      mode: Mode::Normal,
      options: OptionsTree::new(),
      date_filters: DateFilters::default(),
      data: None,
      loading: true,
      notice: None,
      error: None,
      reload_debounce: None,
      event_tx: tx,
      ignore_session,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    self.spawn_notification_poller();
    self.spawn_initial_load();

    // Main loop
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self))?;

      // Handle events
      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  // ======================================================================
  // Background tasks
  // ======================================================================

  fn spawn_initial_load(&self) {
    let controller = self.controller.clone();
    let tx = self.event_tx.clone();
    let ignore_session = self.ignore_session;

    tokio::spawn(async move {
      let _ = tx.send(Event::Dashboard(DashboardEvent::Loading));
      match controller.load(ignore_session).await {
        Ok(options) => {
          let _ = tx.send(Event::Dashboard(DashboardEvent::OptionsLoaded(options)));
        }
        Err(e) => {
          let _ = tx.send(Event::Error(e.to_string()));
        }
      }
    });
  }

  /// Fetch chart data for the currently resolved report and store it in the
  /// controller's data slot. Superseded fetches are discarded on arrival.
  fn spawn_data_fetch(&self) {
    let controller = self.controller.clone();
    let backend = Arc::clone(&self.backend);
    let keep_last = self.keep_last.clone();
    let tx = self.event_tx.clone();
    let instance_id = self.config.marketplace.instance_id;

    tokio::spawn(async move {
      let result = async {
        let (key, _cached) = controller.load_report().await?;
        let options = controller.options();
        let query = DashboardQuery {
          instance_id,
          date_from: options
            .get_str(&dates::date_path("date_from"))
            .unwrap_or_default()
            .to_string(),
          date_to: options
            .get_str(&dates::date_path("date_to"))
            .unwrap_or_default()
            .to_string(),
          date_filter: options
            .get_str(&dates::date_path("filter"))
            .unwrap_or_default()
            .to_string(),
        };

        if let Some(outcome) = keep_last.add(backend.get_dashboard_data(query)).await {
          let data = outcome?;
          controller.store_report_data(&key, data.clone());
          let _ = tx.send(Event::Dashboard(DashboardEvent::DataLoaded {
            key,
            data: Box::new(data),
          }));
        }
        Ok::<_, color_eyre::Report>(())
      }
      .await;

      if let Err(e) = result {
        let _ = tx.send(Event::Error(e.to_string()));
      }
    });
  }

  fn spawn_reload(&self, path: OptionPath) {
    let controller = self.controller.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let _ = tx.send(Event::Dashboard(DashboardEvent::Loading));
      let new_options = controller.options();
      match controller.reload(&path, new_options).await {
        Ok(_) => {
          let _ = tx.send(Event::Dashboard(DashboardEvent::OptionsLoaded(
            controller.options(),
          )));
        }
        Err(e) => {
          let _ = tx.send(Event::Error(e.to_string()));
        }
      }
    });
  }

  /// Apply a batch of option mutations in order, without reloading.
  fn spawn_updates(&self, updates: Vec<(OptionPath, Value)>) {
    let controller = self.controller.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      for (path, value) in updates {
        if let Err(e) = controller.update_option(&path, value).await {
          let _ = tx.send(Event::Error(e.to_string()));
          return;
        }
      }
      let _ = tx.send(Event::Dashboard(DashboardEvent::OptionsChanged(
        controller.options(),
      )));
    });
  }

  fn spawn_toggle(&self, path: OptionPath) {
    let controller = self.controller.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      match controller.toggle_option(&path, false).await {
        Ok(()) => {
          let _ = tx.send(Event::Dashboard(DashboardEvent::OptionsChanged(
            controller.options(),
          )));
        }
        Err(e) => {
          let _ = tx.send(Event::Error(e.to_string()));
        }
      }
    });
  }

  fn spawn_notification_poller(&self) {
    let backend = Arc::clone(&self.backend);
    let tx = self.event_tx.clone();
    let interval = Duration::from_secs(self.config.dashboard.notification_poll_secs.max(1));

    tokio::spawn(async move {
      let mut last_seen = 0u64;
      loop {
        match backend.poll_notifications(last_seen).await {
          Ok(notifications) => {
            for notification in notifications {
              last_seen = last_seen.max(notification.id);
              if tx.send(Event::Notification(notification)).is_err() {
                return;
              }
            }
          }
          Err(e) => {
            // Notification delivery is best-effort; keep polling.
            warn!("notification poll failed: {}", e);
          }
        }
        tokio::time::sleep(interval).await;
      }
    });
  }

  // ======================================================================
  // Filter handling
  // ======================================================================

  /// Debounced reload: each call restarts the timer, and only the last
  /// mutation within the quiet period actually reloads.
  fn apply_filters(&mut self, path: OptionPath) {
    if let Some(timer) = self.reload_debounce.take() {
      timer.abort();
    }

    if let Err(e) = self.controller.increment_call_number() {
      warn!("could not bump call number: {}", e);
    }

    let tx = self.event_tx.clone();
    self.reload_debounce = Some(tokio::spawn(async move {
      tokio::time::sleep(RELOAD_DEBOUNCE).await;
      let _ = tx.send(Event::Dashboard(DashboardEvent::ReloadDue(path)));
    }));
  }

  fn select_date_filter(&mut self, period: PeriodType) {
    let offset = self.date_filters.get(period);
    self.spawn_updates(vec![
      (
        dates::date_path("filter"),
        json!(dates::filter_for_offset(period, offset)),
      ),
      (dates::date_path("period"), json!(offset)),
    ]);
    self.apply_filters(dates::date_path("period"));
  }

  fn change_period(&mut self, delta: i32) {
    let period = self.active_period();
    let offset = self.date_filters.shift(period, delta);
    self.spawn_updates(vec![
      (
        dates::date_path("filter"),
        json!(dates::filter_for_offset(period, offset)),
      ),
      (dates::date_path("period"), json!(offset)),
    ]);
    self.apply_filters(dates::date_path("period"));
  }

  fn submit_custom_date(&mut self, field: DateField, input: &str) {
    let trimmed = input.trim();
    if trimmed.is_empty() {
      self.warn_locally("Date cannot be empty");
      return;
    }
    if chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_err() {
      self.warn_locally("Invalid date, expected YYYY-MM-DD");
      return;
    }

    let path = dates::date_path(field.option_leaf());
    self.spawn_updates(vec![
      (path.clone(), json!(trimmed)),
      (dates::date_path("filter"), json!("custom")),
    ]);
    self.apply_filters(path);
  }

  /// Local validation warning; never persisted, never sent anywhere.
  fn warn_locally(&mut self, message: &str) {
    self.notice = Some(Notice {
      title: Some("Warning".to_string()),
      message: message.to_string(),
      kind: NotificationKind::Warning,
      sticky: false,
      shown_at: Instant::now(),
    });
  }

  // ======================================================================
  // Events
  // ======================================================================

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.expire_notice(),
      Event::Dashboard(dashboard_event) => self.handle_dashboard_event(dashboard_event),
      Event::Notification(notification) => self.show_notification(notification),
      Event::Error(message) => {
        self.loading = false;
        self.error = Some(ErrorOverlay {
          title: random_error_title(),
          message,
        });
      }
    }
  }

  fn handle_dashboard_event(&mut self, event: DashboardEvent) {
    match event {
      DashboardEvent::Loading => {
        self.loading = true;
      }
      DashboardEvent::OptionsLoaded(options) => {
        self.date_filters = dates::init_filters(&options);
        self.options = options;
        self.spawn_data_fetch();
      }
      DashboardEvent::OptionsChanged(options) => {
        self.options = options;
      }
      DashboardEvent::DataLoaded { key, data } => {
        // A reload may have moved on; only adopt data for the active report.
        if self.controller.active_key().as_ref() == Some(&key) {
          self.data = Some(*data);
        }
        self.loading = false;
      }
      DashboardEvent::ReloadDue(path) => {
        self.spawn_reload(path);
      }
    }
  }

  fn show_notification(&mut self, notification: Notification) {
    let Notification {
      message,
      sticky,
      title,
      kind,
      message_is_html,
      ..
    } = notification;

    let message = if message_is_html {
      strip_tags(&message)
    } else {
      message
    };

    self.notice = Some(Notice {
      title,
      message,
      kind,
      sticky,
      shown_at: Instant::now(),
    });
  }

  fn expire_notice(&mut self) {
    if let Some(notice) = &self.notice {
      if !notice.sticky && notice.shown_at.elapsed() > NOTICE_TTL {
        self.notice = None;
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match self.mode.clone() {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::DateInput { field, input } => self.handle_date_input_key(key, field, input),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      // Quit
      KeyCode::Char('q') => {
        self.should_quit = true;
      }
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      // Dismiss overlays
      KeyCode::Esc => {
        if self.error.is_some() {
          self.error = None;
        } else {
          self.notice = None;
        }
      }

      // Period filters
      KeyCode::Char('1') => self.select_date_filter(PeriodType::Month),
      KeyCode::Char('2') => self.select_date_filter(PeriodType::Quarter),
      KeyCode::Char('3') => self.select_date_filter(PeriodType::Year),
      KeyCode::Char('[') => self.change_period(-1),
      KeyCode::Char(']') => self.change_period(1),

      // Custom date range
      KeyCode::Char('f') => self.enter_date_input(DateField::From),
      KeyCode::Char('t') => self.enter_date_input(DateField::To),

      // Toggle the breakdown charts row
      KeyCode::Char('b') => self.spawn_toggle(OptionPath::of(["show_breakdown"])),

      // Reload immediately, skipping the debounce
      KeyCode::Char('r') => self.spawn_reload(dates::date_path("filter")),

      _ => {}
    }
  }

  fn enter_date_input(&mut self, field: DateField) {
    let current = self
      .options
      .get_str(&dates::date_path(field.option_leaf()))
      .unwrap_or_default()
      .to_string();
    self.mode = Mode::DateInput {
      field,
      input: current,
    };
  }

  fn handle_date_input_key(&mut self, key: KeyEvent, field: DateField, mut input: String) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
      }
      KeyCode::Enter => {
        self.mode = Mode::Normal;
        self.submit_custom_date(field, &input);
      }
      KeyCode::Backspace => {
        input.pop();
        self.mode = Mode::DateInput { field, input };
      }
      KeyCode::Char(c) => {
        input.push(c);
        self.mode = Mode::DateInput { field, input };
      }
      _ => {
        self.mode = Mode::DateInput { field, input };
      }
    }
  }

  // ======================================================================
  // Accessors for UI rendering
  // ======================================================================

  pub fn title(&self) -> String {
    self
      .config
      .title
      .clone()
      .unwrap_or_else(|| self.config.marketplace.url.clone())
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn data(&self) -> Option<&DashboardData> {
    self.data.as_ref()
  }

  pub fn loading(&self) -> bool {
    self.loading
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref()
  }

  pub fn error(&self) -> Option<&ErrorOverlay> {
    self.error.as_ref()
  }

  pub fn show_breakdown(&self) -> bool {
    self
      .options
      .get(&OptionPath::of(["show_breakdown"]))
      .and_then(Value::as_bool)
      .unwrap_or(true)
  }

  pub fn active_period(&self) -> PeriodType {
    self
      .options
      .get_str(&dates::date_path("period_type"))
      .and_then(|raw| PeriodType::parse(raw).ok())
      .unwrap_or(PeriodType::Year)
  }

  /// Label for the selected range: the period name, or the raw bounds for a
  /// custom range.
  pub fn period_label(&self) -> String {
    let filter = self
      .options
      .get_str(&dates::date_path("filter"))
      .unwrap_or("custom");

    if filter == "custom" {
      let from = self
        .options
        .get_str(&dates::date_path("date_from"))
        .unwrap_or("?");
      let to = self
        .options
        .get_str(&dates::date_path("date_to"))
        .unwrap_or("?");
      return format!("{} to {}", from, to);
    }

    let period = self.active_period();
    let today = chrono::Local::now().date_naive();
    dates::display_period(period, self.date_filters.get(period), today)
  }
}

fn random_error_title() -> String {
  ERROR_TITLES
    .choose(&mut rand::thread_rng())
    .copied()
    .unwrap_or("Error!")
    .to_string()
}

/// Crude tag stripper for HTML-flavored notification bodies; the terminal
/// renders plain text only.
fn strip_tags(raw: &str) -> String {
  let mut output = String::with_capacity(raw.len());
  let mut in_tag = false;
  for c in raw.chars() {
    match c {
      '<' => in_tag = true,
      '>' => in_tag = false,
      c if !in_tag => output.push(c),
      _ => {}
    }
  }
  output
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_strip_tags() {
    assert_eq!(strip_tags("<b>12</b> orders imported"), "12 orders imported");
    assert_eq!(strip_tags("plain"), "plain");
  }

  #[test]
  fn test_random_error_title_is_from_list() {
    let title = random_error_title();
    assert!(ERROR_TITLES.contains(&title.as_str()));
  }
}
