//! Keyed resource cache with stale-while-revalidate semantics.
//!
//! One slot exists per active [`ResourceKey`]. Each slot owns a `watch`
//! channel, so every change (fetch completion or local `set`) reaches all
//! subscribers. The slot map sits behind a std mutex that is never held
//! across an await point.

use chrono::Utc;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::key::ResourceKey;
use super::storage::SnapshotStorage;
use super::traits::{CacheEntry, CacheSource, Update};
use crate::api::client::{decode, RemoteFetch};
use crate::api::error::ApiError;

/// Values the cache can hold: fetched as JSON, persisted as JSON, and
/// defaulted when a relative update lands before anything was loaded.
pub trait CacheValue:
  Clone + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<V> CacheValue for V where
  V: Clone + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

/// Cache service mapping resource keys to their current known value.
///
/// Cheap to clone; clones share the same slots.
pub struct ResourceCache<V> {
  inner: Arc<Inner<V>>,
}

impl<V> Clone for ResourceCache<V> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

struct Inner<V> {
  remote: Arc<dyn RemoteFetch>,
  storage: Arc<dyn SnapshotStorage>,
  slots: Mutex<HashMap<ResourceKey, Slot<V>>>,
}

struct Slot<V> {
  tx: watch::Sender<CacheEntry<V>>,
  /// Generation of the fetch whose result will be accepted
  in_flight: Option<u64>,
  generation: u64,
  /// Bumped by every local `set`; fetches started under an older epoch are discarded
  epoch: u64,
  /// A fetch has succeeded during this session
  loaded: bool,
  /// A fetch has settled (either way) during this session
  settled: bool,
  /// Next `get` must refetch
  stale: bool,
  /// Last subscriber left while a fetch was in flight
  released: bool,
}

/// Identifies one fetch so its completion can be matched against the slot.
struct FetchTicket {
  key: ResourceKey,
  generation: u64,
  epoch: u64,
}

impl<V: Clone> Slot<V> {
  fn new(entry: CacheEntry<V>) -> Self {
    let (tx, _rx) = watch::channel(entry);
    Self {
      tx,
      in_flight: None,
      generation: 0,
      epoch: 0,
      loaded: false,
      settled: false,
      stale: false,
      released: false,
    }
  }

  fn entry(&self) -> CacheEntry<V> {
    self.tx.borrow().clone()
  }

  fn needs_fetch(&self) -> bool {
    self.in_flight.is_none() && (self.stale || !self.settled)
  }

  fn begin_fetch(&mut self, key: &ResourceKey) -> FetchTicket {
    self.generation += 1;
    self.in_flight = Some(self.generation);
    self.stale = false;
    self.tx.send_modify(|entry| {
      entry.is_validating = true;
      if entry.value.is_none() {
        entry.is_loading = true;
      }
    });
    FetchTicket {
      key: key.clone(),
      generation: self.generation,
      epoch: self.epoch,
    }
  }
}

impl<V: CacheValue> Inner<V> {
  fn lock(&self) -> MutexGuard<'_, HashMap<ResourceKey, Slot<V>>> {
    // A panic while holding the lock cannot leave a slot half-written
    // (every mutation is a single assignment or send), so recover.
    self.slots.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn slot_mut<'a>(
    &self,
    slots: &'a mut HashMap<ResourceKey, Slot<V>>,
    key: &ResourceKey,
  ) -> &'a mut Slot<V> {
    slots
      .entry(key.clone())
      .or_insert_with(|| Slot::new(self.restore(key)))
  }

  /// Seed a new slot from the snapshot store, if it holds anything usable.
  fn restore(&self, key: &ResourceKey) -> CacheEntry<V> {
    match self.storage.load(key) {
      Ok(Some(snapshot)) => match serde_json::from_slice::<V>(&snapshot.data) {
        Ok(value) => {
          debug!(%key, saved_at = %snapshot.saved_at, "restored snapshot");
          CacheEntry::from_snapshot(value, snapshot.saved_at)
        }
        Err(e) => {
          warn!(%key, error = %e, "discarding unreadable snapshot");
          CacheEntry::loading()
        }
      },
      Ok(None) => CacheEntry::loading(),
      Err(e) => {
        warn!(%key, error = %e, "snapshot lookup failed");
        CacheEntry::loading()
      }
    }
  }

  fn persist(&self, key: &ResourceKey, value: &V) {
    let result = serde_json::to_vec(value)
      .map_err(|e| color_eyre::eyre::eyre!("Failed to serialize {}: {}", key, e))
      .and_then(|data| self.storage.save(key, &data));
    if let Err(e) = result {
      warn!(%key, error = %e, "snapshot write failed");
    }
  }

  fn spawn_fetch(self: &Arc<Self>, ticket: FetchTicket) {
    let inner = Arc::clone(self);
    tokio::spawn(async move {
      let path = ticket.key.collection_path();
      debug!(key = %ticket.key, generation = ticket.generation, "fetch started");
      let result = inner
        .remote
        .request(Method::GET, &path, None)
        .await
        .and_then(decode::<V>);
      if let Some(next) = inner.complete_fetch(ticket, result) {
        inner.spawn_fetch(next);
      }
    });
  }

  /// Apply a fetch result. Returns a follow-up fetch when the result had to
  /// be discarded because a local update landed while it was in flight.
  fn complete_fetch(
    &self,
    ticket: FetchTicket,
    result: Result<V, ApiError>,
  ) -> Option<FetchTicket> {
    let mut slots = self.lock();
    let key = ticket.key;
    let slot = slots.get_mut(&key)?;

    if slot.in_flight != Some(ticket.generation) {
      debug!(%key, generation = ticket.generation, "fetch superseded");
      return None;
    }
    slot.in_flight = None;

    if slot.epoch != ticket.epoch {
      debug!(%key, "fetch raced a local update, refetching");
      return Some(slot.begin_fetch(&key));
    }

    slot.settled = true;
    match result {
      Ok(value) => {
        slot.loaded = true;
        self.persist(&key, &value);
        slot.tx.send_modify(|entry| {
          entry.value = Some(value);
          entry.is_loading = false;
          entry.is_validating = false;
          entry.error = None;
          entry.source = CacheSource::Network;
          entry.updated_at = Some(Utc::now());
        });
      }
      Err(err) => {
        warn!(%key, error = %err, "fetch failed");
        if err.status_code() == Some(404) {
          if let Err(e) = self.storage.remove(&key) {
            warn!(%key, error = %e, "snapshot removal failed");
          }
        }
        slot.tx.send_modify(|entry| {
          entry.is_loading = false;
          entry.is_validating = false;
          entry.error = Some(err.message());
        });
      }
    }

    let orphaned = slot.released && slot.tx.receiver_count() == 0;
    if orphaned {
      slots.remove(&key);
    }
    None
  }
}

impl<V: CacheValue> ResourceCache<V> {
  /// Create a cache without snapshot persistence.
  #[cfg(test)]
  pub fn new(remote: Arc<dyn RemoteFetch>) -> Self {
    Self::with_storage(remote, Arc::new(super::storage::NoopStorage))
  }

  /// Create a cache that seeds cold keys from, and writes values through to, `storage`.
  pub fn with_storage(remote: Arc<dyn RemoteFetch>, storage: Arc<dyn SnapshotStorage>) -> Self {
    Self {
      inner: Arc::new(Inner {
        remote,
        storage,
        slots: Mutex::new(HashMap::new()),
      }),
    }
  }

  /// Current entry for `key`. Starts a background fetch when the key is
  /// new or invalidated; concurrent callers share one in-flight fetch.
  pub fn get(&self, key: &ResourceKey) -> CacheEntry<V> {
    let (entry, ticket) = {
      let mut slots = self.inner.lock();
      let slot = self.inner.slot_mut(&mut slots, key);
      let ticket = slot.needs_fetch().then(|| slot.begin_fetch(key));
      (slot.entry(), ticket)
    };
    if let Some(ticket) = ticket {
      self.inner.spawn_fetch(ticket);
    }
    entry
  }

  /// Current entry without triggering a fetch.
  #[cfg(test)]
  pub fn peek(&self, key: &ResourceKey) -> Option<CacheEntry<V>> {
    self.inner.lock().get(key).map(Slot::entry)
  }

  /// Like [`Self::get`], but keeps the key alive and reports every change.
  pub fn subscribe(&self, key: &ResourceKey) -> Subscription<V> {
    let (rx, ticket) = {
      let mut slots = self.inner.lock();
      let slot = self.inner.slot_mut(&mut slots, key);
      slot.released = false;
      let ticket = slot.needs_fetch().then(|| slot.begin_fetch(key));
      (slot.tx.subscribe(), ticket)
    };
    if let Some(ticket) = ticket {
      self.inner.spawn_fetch(ticket);
    }

    let current = rx.borrow().clone();
    Subscription {
      key: key.clone(),
      rx: Some(rx),
      current,
      cache: self.clone(),
    }
  }

  /// Overwrite the value synchronously and notify subscribers.
  ///
  /// `Update::Apply` runs against the value current right now, so
  /// concurrent relative updates compose instead of clobbering each other.
  /// A background refetch follows when `revalidate` is set or when nothing
  /// had been fetched for the key yet.
  pub fn set(&self, key: &ResourceKey, update: Update<V>, revalidate: bool) {
    let ticket = {
      let mut slots = self.inner.lock();
      let slot = self.inner.slot_mut(&mut slots, key);

      let next = match update {
        Update::Replace(value) => value,
        Update::Apply(f) => f(slot.tx.borrow().value.clone().unwrap_or_default()),
      };
      slot.epoch += 1;
      self.inner.persist(key, &next);
      slot.tx.send_modify(|entry| {
        entry.value = Some(next);
        entry.source = CacheSource::Local;
        entry.updated_at = Some(Utc::now());
      });

      // An in-flight fetch will notice the epoch change and refetch by itself.
      let wants_fetch = revalidate || !slot.loaded;
      (wants_fetch && slot.in_flight.is_none()).then(|| slot.begin_fetch(key))
    };
    if let Some(ticket) = ticket {
      self.inner.spawn_fetch(ticket);
    }
  }

  /// Force the next `get` to refetch regardless of the cached value.
  pub fn invalidate(&self, key: &ResourceKey) {
    if let Some(slot) = self.inner.lock().get_mut(key) {
      slot.stale = true;
    }
  }

  /// Refetch now, superseding any fetch already in flight.
  pub fn revalidate(&self, key: &ResourceKey) {
    let ticket = {
      let mut slots = self.inner.lock();
      let slot = self.inner.slot_mut(&mut slots, key);
      slot.begin_fetch(key)
    };
    self.inner.spawn_fetch(ticket);
  }

  /// Wait until no fetch is in flight for `key` and return the entry.
  #[cfg(test)]
  pub async fn settled(&self, key: &ResourceKey) -> CacheEntry<V> {
    let rx = {
      let slots = self.inner.lock();
      slots.get(key).map(|slot| slot.tx.subscribe())
    };
    let Some(mut rx) = rx else {
      return CacheEntry::loading();
    };
    let result = match rx.wait_for(|entry| !entry.is_validating).await {
      Ok(entry) => entry.clone(),
      Err(_) => CacheEntry::loading(),
    };
    result
  }

  /// Drop the slot once its last subscriber is gone.
  fn release(&self, key: &ResourceKey) {
    let mut slots = self.inner.lock();
    let Some(slot) = slots.get_mut(key) else {
      return;
    };
    if slot.tx.receiver_count() > 0 {
      return;
    }
    if slot.in_flight.is_some() {
      slot.released = true;
    } else {
      slots.remove(key);
      debug!(%key, "released");
    }
  }

  #[cfg(test)]
  fn is_tracked(&self, key: &ResourceKey) -> bool {
    self.inner.lock().contains_key(key)
  }
}

/// A view's handle on one cache key.
///
/// Holds the key alive; dropping the last subscription releases it.
pub struct Subscription<V: CacheValue> {
  key: ResourceKey,
  rx: Option<watch::Receiver<CacheEntry<V>>>,
  current: CacheEntry<V>,
  cache: ResourceCache<V>,
}

impl<V: CacheValue> Subscription<V> {
  /// Entry as of the last `poll`/`changed`.
  pub fn current(&self) -> &CacheEntry<V> {
    &self.current
  }

  pub fn value(&self) -> Option<&V> {
    self.current.value()
  }

  /// Pick up a pending change without blocking. Returns true if the entry changed.
  pub fn poll(&mut self) -> bool {
    let Some(rx) = self.rx.as_mut() else {
      return false;
    };
    match rx.has_changed() {
      Ok(true) => {
        self.current = rx.borrow_and_update().clone();
        true
      }
      _ => false,
    }
  }

  /// Wait for the next change. Returns `None` once the slot is gone.
  #[cfg(test)]
  pub async fn changed(&mut self) -> Option<&CacheEntry<V>> {
    let rx = self.rx.as_mut()?;
    rx.changed().await.ok()?;
    self.current = rx.borrow_and_update().clone();
    Some(&self.current)
  }

  /// Refetch the subscribed key.
  pub fn revalidate(&self) {
    self.cache.revalidate(&self.key);
  }
}

impl<V: CacheValue> Drop for Subscription<V> {
  fn drop(&mut self) {
    // Receiver must be gone before release() counts subscribers.
    self.rx.take();
    self.cache.release(&self.key);
  }
}
