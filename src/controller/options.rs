//! Report options: a nested JSON tree addressed by dotted paths.
//!
//! Every options tree the backend hands out carries `sections_source_id`,
//! `report_id` and `loading_call_number` at the top level, plus arbitrary
//! report-specific nesting below (`date.filter`, `date.period`, ...).
//! Mutation walks the path explicitly and fails with a typed error on a bad
//! segment instead of silently creating structure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::cache_key::CacheKey;

/// Errors from option-tree access. Bad paths and bad operand types are
/// programmer errors: callers pass literal paths, so these should never fire
/// at runtime against a well-formed tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
  #[error("invalid option key `{segment}` in `{path}`")]
  PathNotFound { path: String, segment: String },
  #[error("option `{0}` is not a boolean")]
  NotABool(String),
  #[error("empty option path")]
  EmptyPath,
  #[error("options root must be a JSON object")]
  NotAnObject,
  #[error("options are missing required field `{0}`")]
  MissingField(&'static str),
}

/// An ordered sequence of path segments, parsed once from a dotted string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionPath {
  segments: Vec<String>,
}

impl OptionPath {
  pub fn parse(path: &str) -> Result<Self, OptionsError> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
      return Err(OptionsError::EmptyPath);
    }
    Ok(Self {
      segments: path.split('.').map(String::from).collect(),
    })
  }

  /// Build a path from literal segments, skipping empty ones. Intended for
  /// compile-time-known paths where parsing cannot reasonably fail.
  pub fn of<I, S>(segments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let segments: Vec<String> = segments
      .into_iter()
      .map(Into::into)
      .filter(|s| !s.is_empty())
      .collect();
    debug_assert!(!segments.is_empty(), "option path needs a segment");
    Self { segments }
  }

  /// First segment. Invalidation is keyed on this: any cached tree holding
  /// the root segment as a top-level property is considered stale.
  pub fn root(&self) -> &str {
    &self.segments[0]
  }

  pub fn segments(&self) -> &[String] {
    &self.segments
  }
}

impl FromStr for OptionPath {
  type Err = OptionsError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for OptionPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.segments.join("."))
  }
}

/// The options tree itself. Serializes transparently as the underlying JSON
/// object, so it round-trips unchanged through the backend and the session
/// store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionsTree {
  root: Map<String, Value>,
}

impl OptionsTree {
  pub fn new() -> Self {
    Self::default()
  }

  /// Wrap a JSON value; anything but an object is rejected.
  pub fn from_value(value: Value) -> Result<Self, OptionsError> {
    match value {
      Value::Object(root) => Ok(Self { root }),
      _ => Err(OptionsError::NotAnObject),
    }
  }

  /// Whether `segment` exists as a top-level property.
  pub fn contains_root(&self, segment: &str) -> bool {
    self.root.contains_key(segment)
  }

  pub fn sections_source_id(&self) -> Option<&str> {
    self.root.get("sections_source_id").and_then(Value::as_str)
  }

  pub fn report_id(&self) -> Option<&str> {
    self.root.get("report_id").and_then(Value::as_str)
  }

  #[allow(dead_code)]
  pub fn loading_call_number(&self) -> u64 {
    self
      .root
      .get("loading_call_number")
      .and_then(Value::as_u64)
      .unwrap_or(0)
  }

  /// Cache key this tree belongs to, from its own source and report ids.
  pub fn derived_key(&self) -> Result<CacheKey, OptionsError> {
    let source = self
      .sections_source_id()
      .ok_or(OptionsError::MissingField("sections_source_id"))?;
    let report = self
      .report_id()
      .ok_or(OptionsError::MissingField("report_id"))?;
    Ok(CacheKey::derive(source, report))
  }

  pub fn set_string(&mut self, key: &str, value: &str) {
    self.root.insert(key.to_string(), Value::from(value));
  }

  pub fn set_number(&mut self, key: &str, value: u64) {
    self.root.insert(key.to_string(), Value::from(value));
  }

  /// Read the value at `path`, if the whole path resolves.
  pub fn get(&self, path: &OptionPath) -> Option<&Value> {
    let mut current = self.root.get(path.root())?;
    for segment in &path.segments()[1..] {
      current = current.as_object()?.get(segment)?;
    }
    Some(current)
  }

  /// Convenience for string leaves, the common case for date options.
  pub fn get_str(&self, path: &OptionPath) -> Option<&str> {
    self.get(path).and_then(Value::as_str)
  }

  /// Assign `value` at `path`, creating only the final segment.
  pub fn update(&mut self, path: &OptionPath, value: Value) -> Result<(), OptionsError> {
    let (parent, leaf) = self.walk_to_parent(path)?;
    parent.insert(leaf, value);
    Ok(())
  }

  /// Flip the boolean at `path`. A missing or null leaf counts as `false`,
  /// so the first toggle of a fresh flag turns it on.
  pub fn toggle(&mut self, path: &OptionPath) -> Result<bool, OptionsError> {
    let display = path.to_string();
    let (parent, leaf) = self.walk_to_parent(path)?;
    let toggled = match parent.get(&leaf) {
      None | Some(Value::Null) => true,
      Some(Value::Bool(b)) => !*b,
      Some(_) => return Err(OptionsError::NotABool(display)),
    };
    parent.insert(leaf, Value::Bool(toggled));
    Ok(toggled)
  }

  /// Remove the value at `path`. Removing an absent leaf is a no-op, but the
  /// intermediate segments must still resolve.
  pub fn delete(&mut self, path: &OptionPath) -> Result<(), OptionsError> {
    let (parent, leaf) = self.walk_to_parent(path)?;
    parent.remove(&leaf);
    Ok(())
  }

  /// Descend through all but the last segment, erroring on the first segment
  /// that is absent or not an object.
  fn walk_to_parent(
    &mut self,
    path: &OptionPath,
  ) -> Result<(&mut Map<String, Value>, String), OptionsError> {
    let display = path.to_string();
    let segments = path.segments();
    let (leaf, intermediate) = segments
      .split_last()
      .ok_or(OptionsError::EmptyPath)?;

    let mut current = &mut self.root;
    for segment in intermediate {
      current = current
        .get_mut(segment)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| OptionsError::PathNotFound {
          path: display.clone(),
          segment: segment.clone(),
        })?;
    }
    Ok((current, leaf.clone()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn sample() -> OptionsTree {
    OptionsTree::from_value(json!({
      "sections_source_id": "S1",
      "report_id": "R1",
      "date": {
        "filter": "this_year",
        "period_type": "year",
        "date_from": "2026-01-01",
        "date_to": "2026-12-31",
      },
      "comparison": false,
    }))
    .unwrap()
  }

  #[test]
  fn test_update_round_trip() {
    let mut options = sample();
    let path = OptionPath::parse("date.filter").unwrap();
    options.update(&path, json!("this_month")).unwrap();
    assert_eq!(options.get_str(&path), Some("this_month"));
  }

  #[test]
  fn test_update_deep_path() {
    let mut options = OptionsTree::from_value(json!({
      "a": {"b": {"c": 1}},
    }))
    .unwrap();
    let path = OptionPath::parse("a.b.c").unwrap();
    options.update(&path, json!(42)).unwrap();
    assert_eq!(options.get(&path), Some(&json!(42)));
  }

  #[test]
  fn test_double_toggle_restores() {
    let mut options = sample();
    let path = OptionPath::parse("comparison").unwrap();
    assert_eq!(options.toggle(&path), Ok(true));
    assert_eq!(options.toggle(&path), Ok(false));
    assert_eq!(options.get(&path), Some(&json!(false)));
  }

  #[test]
  fn test_toggle_missing_leaf_turns_on() {
    let mut options = sample();
    let path = OptionPath::parse("date.hide_zero").unwrap();
    assert_eq!(options.toggle(&path), Ok(true));
  }

  #[test]
  fn test_toggle_non_bool_is_error() {
    let mut options = sample();
    let path = OptionPath::parse("date.filter").unwrap();
    assert_eq!(
      options.toggle(&path),
      Err(OptionsError::NotABool("date.filter".to_string()))
    );
  }

  #[test]
  fn test_invalid_intermediate_segment() {
    let mut options = sample();
    let path = OptionPath::parse("nope.filter").unwrap();
    let err = options.update(&path, json!(1)).unwrap_err();
    assert_eq!(
      err,
      OptionsError::PathNotFound {
        path: "nope.filter".to_string(),
        segment: "nope".to_string(),
      }
    );
  }

  #[test]
  fn test_non_object_intermediate_segment() {
    let mut options = sample();
    // `comparison` is a bool, so descending through it must fail.
    let path = OptionPath::parse("comparison.x").unwrap();
    assert!(matches!(
      options.update(&path, json!(1)),
      Err(OptionsError::PathNotFound { .. })
    ));
  }

  #[test]
  fn test_delete() {
    let mut options = sample();
    let path = OptionPath::parse("date.period_type").unwrap();
    options.delete(&path).unwrap();
    assert_eq!(options.get(&path), None);
  }

  #[test]
  fn test_empty_path_rejected() {
    assert_eq!(OptionPath::parse(""), Err(OptionsError::EmptyPath));
    assert_eq!(OptionPath::parse("a..b"), Err(OptionsError::EmptyPath));
  }

  #[test]
  fn test_derived_key() {
    let options = sample();
    assert_eq!(options.derived_key().unwrap().as_str(), "S1_R1");

    let bare = OptionsTree::new();
    assert_eq!(
      bare.derived_key(),
      Err(OptionsError::MissingField("sections_source_id"))
    );
  }

  #[test]
  fn test_serde_transparent() {
    let options = sample();
    let text = serde_json::to_string(&options).unwrap();
    let back: OptionsTree = serde_json::from_str(&text).unwrap();
    assert_eq!(back, options);
  }
}
