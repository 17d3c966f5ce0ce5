//! Composite cache keys and per-key call counters.

use std::collections::HashMap;
use std::fmt;

/// Identity used to index every per-report cache: `{sections_source_id}_{report_id}`.
///
/// Two option sets with the same (source, report) pair always derive the same
/// key, so the string form is the sole identity the caches need.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
  /// Derive the key for a (sections source, report) pair. Pure and total.
  pub fn derive(sections_source_id: &str, report_id: &str) -> Self {
    Self(format!("{}_{}", sections_source_id, report_id))
  }

  #[allow(dead_code)]
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Monotonic load counters, one per cache key.
///
/// Every option-load request is stamped with the current count for its key so
/// downstream consumers can tell which request was the most recent one. Unseen
/// keys read as zero; there is no error path anywhere in here.
#[derive(Debug, Clone, Default)]
pub struct CallCounters {
  counts: HashMap<CacheKey, u64>,
}

impl CallCounters {
  /// Bump the counter for `key`, creating it at 1 on first use.
  pub fn increment(&mut self, key: &CacheKey) {
    *self.counts.entry(key.clone()).or_insert(0) += 1;
  }

  /// Current count for `key`; zero if the key has never been incremented.
  pub fn get(&self, key: &CacheKey) -> u64 {
    self.counts.get(key).copied().unwrap_or(0)
  }

  /// Overwrite the counter for `key`. Used when a load reroutes to a new key.
  pub fn set(&mut self, key: &CacheKey, value: u64) {
    self.counts.insert(key.clone(), value);
  }

  /// Forget `key` entirely, so a later load sees it as brand new.
  pub fn remove(&mut self, key: &CacheKey) {
    self.counts.remove(key);
  }

  /// Whether `key` has ever been counted. Distinct from `get(key) > 0` only
  /// in intent: first-load detection checks presence, not value.
  pub fn contains(&self, key: &CacheKey) -> bool {
    self.counts.contains_key(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_derive_is_stable() {
    let a = CacheKey::derive("S1", "R1");
    let b = CacheKey::derive("S1", "R1");
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "S1_R1");
  }

  #[test]
  fn test_derive_differs_per_pair() {
    assert_ne!(
      CacheKey::derive("S1", "R1"),
      CacheKey::derive("S2", "R1")
    );
    assert_ne!(
      CacheKey::derive("S1", "R1"),
      CacheKey::derive("S1", "R2")
    );
  }

  #[test]
  fn test_counters_default_to_zero() {
    let counters = CallCounters::default();
    let key = CacheKey::derive("S1", "R1");
    assert_eq!(counters.get(&key), 0);
    assert!(!counters.contains(&key));
  }

  #[test]
  fn test_counters_increment_and_remove() {
    let mut counters = CallCounters::default();
    let key = CacheKey::derive("S1", "R1");

    counters.increment(&key);
    counters.increment(&key);
    assert_eq!(counters.get(&key), 2);
    assert!(counters.contains(&key));

    counters.remove(&key);
    assert_eq!(counters.get(&key), 0);
    assert!(!counters.contains(&key));
  }

  #[test]
  fn test_counters_set() {
    let mut counters = CallCounters::default();
    let key = CacheKey::derive("S2", "R2");
    counters.set(&key, 1);
    assert_eq!(counters.get(&key), 1);
  }
}
