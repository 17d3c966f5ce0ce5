use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::controller::{CacheKey, OptionPath, OptionsTree};
use crate::marketplace::{DashboardData, Notification};

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and notice expiry
  Tick,
  /// Dashboard lifecycle events from background tasks
  Dashboard(DashboardEvent),
  /// Server-pushed user notification
  Notification(Notification),
  /// A background task failed
  Error(String),
}

#[derive(Debug)]
pub enum DashboardEvent {
  /// A load/reload cycle started
  Loading,
  /// Options resolved after a load or reload; a data fetch should follow
  OptionsLoaded(OptionsTree),
  /// Live options mutated locally, no reload needed
  OptionsChanged(OptionsTree),
  /// Chart payload arrived for a report
  DataLoaded {
    key: CacheKey,
    data: Box<DashboardData>,
  },
  /// The filter debounce timer fired; run the coalesced reload
  ReloadDue(OptionPath),
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
  tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn terminal event reader
    let input_tx = tx.clone();
    tokio::spawn(async move {
      loop {
        if event::poll(tick_rate).unwrap_or(false) {
          if let Ok(evt) = event::read() {
            if let CrosstermEvent::Key(key) = evt {
              if input_tx.send(Event::Key(key)).is_err() {
                break;
              }
            }
          }
        } else {
          // Tick
          if input_tx.send(Event::Tick).is_err() {
            break;
          }
        }
      }
    });

    Self { rx, tx }
  }

  /// Sender for background tasks to push events through
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
