//! Latest-wins sequencing for chart-data fetches.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Drops results from superseded calls.
///
/// Each `add` stamps the future with a generation number; if a newer call was
/// issued while the future was in flight, its result resolves to `None`
/// instead. That keeps a slow response for an old filter from overwriting the
/// data of a newer one. Nothing is cancelled, only discarded on arrival.
#[derive(Debug, Clone, Default)]
pub struct KeepLast {
  generation: Arc<AtomicU64>,
}

impl KeepLast {
  pub fn new() -> Self {
    Self::default()
  }

  /// Run `fut`, returning its output only if no newer call superseded it.
  pub async fn add<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
    let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let output = fut.await;
    if self.generation.load(Ordering::SeqCst) == my_generation {
      Some(output)
    } else {
      None
    }
  }
}
