//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};

/// Items of a cached list that can be removed by identity.
pub trait Identified: Clone + Send + Sync + 'static {
  /// Value compared when removing an item (secret name, user login, ...)
  fn identity(&self) -> String;
}

/// Snapshot of one cache slot, as seen by subscribers.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  /// Last fetched value, or a local transform of it
  pub value: Option<V>,
  /// True until the first fetch settles successfully
  pub is_loading: bool,
  /// True while a background refetch is in flight
  pub is_validating: bool,
  /// Message of the most recent failed fetch, cleared on success
  pub error: Option<String>,
  /// Where `value` came from
  pub source: CacheSource,
  /// When `value` last changed
  pub updated_at: Option<DateTime<Utc>>,
}

impl<V> CacheEntry<V> {
  pub fn loading() -> Self {
    Self {
      value: None,
      is_loading: true,
      is_validating: false,
      error: None,
      source: CacheSource::Empty,
      updated_at: None,
    }
  }

  /// Entry seeded from a persisted snapshot; still loading until the network answers.
  pub fn from_snapshot(value: V, saved_at: DateTime<Utc>) -> Self {
    Self {
      value: Some(value),
      is_loading: true,
      is_validating: false,
      error: None,
      source: CacheSource::Snapshot,
      updated_at: Some(saved_at),
    }
  }

  pub fn value(&self) -> Option<&V> {
    self.value.as_ref()
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Nothing loaded yet
  Empty,
  /// Value returned by the most recent fetch
  Network,
  /// Value written locally by a mutation
  Local,
  /// Value restored from a previous session
  Snapshot,
}

/// How `set` derives the new value.
pub enum Update<V> {
  /// Overwrite with a known value
  Replace(V),
  /// Transform whatever value is current when the update lands
  Apply(Box<dyn FnOnce(V) -> V + Send>),
}

impl<V> Update<V> {
  pub fn apply<F>(f: F) -> Self
  where
    F: FnOnce(V) -> V + Send + 'static,
  {
    Self::Apply(Box::new(f))
  }
}

impl<V> std::fmt::Debug for Update<V> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Replace(_) => f.write_str("Update::Replace"),
      Self::Apply(_) => f.write_str("Update::Apply"),
    }
  }
}
