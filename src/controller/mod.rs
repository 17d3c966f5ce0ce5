//! Option-cache and reload coordination for the dashboard.
//!
//! This module tree is UI-independent: it owns the per-report caches, the
//! call counters, the session-persisted option state and the invalidation
//! logic that ties them together. The terminal shell in `app`/`ui` only
//! drives it and renders what it holds.

pub mod cache_key;
mod dashboard;
pub mod keep_last;
pub mod options;
pub mod session;

pub use cache_key::{CacheKey, CallCounters};
pub use dashboard::{DashboardController, DASHBOARD_REPORT_ID};
pub use keep_last::KeepLast;
pub use options::{OptionPath, OptionsError, OptionsTree};
pub use session::{session_options_id, MemorySessionStore, SessionStore, SqliteSessionStore};
