//! Add, remove and edit against cached lists.
//!
//! The coordinator owns the protocol shared by every settings screen:
//! validate, confirm destructive actions, call the server, then fold the
//! result into the cache. At most one mutation per key is in flight.

use async_trait::async_trait;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::key::ResourceKey;
use super::resource::{CacheValue, ResourceCache};
use super::traits::{Identified, Update};
use crate::api::client::{decode, RemoteFetch};
use crate::api::error::ApiError;

/// Client-side rejection of an input before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("{field} is required")]
  Missing { field: &'static str },

  #[error("{field} {reason}")]
  Invalid {
    field: &'static str,
    reason: &'static str,
  },
}

impl ValidationError {
  pub fn missing(field: &'static str) -> Self {
    Self::Missing { field }
  }

  pub fn invalid(field: &'static str, reason: &'static str) -> Self {
    Self::Invalid { field, reason }
  }
}

/// Inputs checked before they are sent.
pub trait Validate {
  fn validate(&self) -> Result<(), ValidationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Api(#[from] ApiError),

  #[error("another change to {key} is still in progress")]
  Busy { key: ResourceKey },

  /// The view that started the mutation closed before it finished
  #[error("view closed before the request finished")]
  StaleView,

  /// The user answered "no" to the confirmation
  #[error("cancelled")]
  Declined,
}

/// Asks the user a yes/no question.
#[async_trait]
pub trait Confirm: Send + Sync {
  async fn confirm(&self, message: &str) -> bool;
}

/// Reports mutation outcomes to the user.
pub trait Notify: Send + Sync {
  fn success(&self, message: &str);
  fn error(&self, message: &str);
}

/// Lifetime marker owned by a view. Dropping it marks every
/// [`ViewGuard`] handed out from it as dead.
#[derive(Debug)]
pub struct ViewScope {
  alive: Arc<AtomicBool>,
}

impl ViewScope {
  pub fn new() -> Self {
    Self {
      alive: Arc::new(AtomicBool::new(true)),
    }
  }

  pub fn guard(&self) -> ViewGuard {
    ViewGuard {
      alive: Arc::clone(&self.alive),
    }
  }
}

impl Default for ViewScope {
  fn default() -> Self {
    Self::new()
  }
}

impl Drop for ViewScope {
  fn drop(&mut self) {
    self.alive.store(false, Ordering::Release);
  }
}

/// Carried by a mutation to tell whether its view still exists.
#[derive(Debug, Clone)]
pub struct ViewGuard {
  alive: Arc<AtomicBool>,
}

impl ViewGuard {
  pub fn is_alive(&self) -> bool {
    self.alive.load(Ordering::Acquire)
  }
}

/// Keys with a mutation in flight.
#[derive(Clone, Default)]
struct InFlight {
  keys: Arc<Mutex<HashSet<ResourceKey>>>,
}

impl InFlight {
  fn acquire(&self, key: &ResourceKey) -> Option<InFlightPermit> {
    let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
    keys.insert(key.clone()).then(|| InFlightPermit {
      keys: Arc::clone(&self.keys),
      key: key.clone(),
    })
  }
}

/// Releases the key when dropped.
struct InFlightPermit {
  keys: Arc<Mutex<HashSet<ResourceKey>>>,
  key: ResourceKey,
}

impl Drop for InFlightPermit {
  fn drop(&mut self) {
    let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
    keys.remove(&self.key);
  }
}

#[derive(Debug, Clone, Copy)]
enum Verb {
  Add,
  Remove,
  Update,
  Enable,
  Disable,
}

impl Verb {
  fn infinitive(self) -> &'static str {
    match self {
      Self::Add => "add",
      Self::Remove => "remove",
      Self::Update => "update",
      Self::Enable => "enable",
      Self::Disable => "disable",
    }
  }
}

/// Runs mutations for one kind of resource (`noun` names it in messages).
pub struct MutationCoordinator<V> {
  cache: ResourceCache<V>,
  remote: Arc<dyn RemoteFetch>,
  confirm: Arc<dyn Confirm>,
  notify: Arc<dyn Notify>,
  in_flight: InFlight,
  noun: &'static str,
}

impl<V> Clone for MutationCoordinator<V> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      remote: Arc::clone(&self.remote),
      confirm: Arc::clone(&self.confirm),
      notify: Arc::clone(&self.notify),
      in_flight: self.in_flight.clone(),
      noun: self.noun,
    }
  }
}

impl<V: CacheValue> MutationCoordinator<V> {
  pub fn new(
    noun: &'static str,
    cache: ResourceCache<V>,
    remote: Arc<dyn RemoteFetch>,
    confirm: Arc<dyn Confirm>,
    notify: Arc<dyn Notify>,
  ) -> Self {
    Self {
      cache,
      remote,
      confirm,
      notify,
      in_flight: InFlight::default(),
      noun,
    }
  }

  /// The cache this coordinator writes into.
  pub fn cache(&self) -> &ResourceCache<V> {
    &self.cache
  }

  /// Validate and serialize an input, reporting rejections.
  fn prepare<I: Validate + Serialize>(&self, verb: Verb, input: &I) -> Result<Value, MutationError> {
    if let Err(e) = input.validate() {
      debug!(noun = self.noun, error = %e, "input rejected");
      self.fail(verb, &e.to_string());
      return Err(e.into());
    }
    serde_json::to_value(input).map_err(|e| {
      let e = ApiError::from(e);
      self.fail(verb, &e.message());
      MutationError::Api(e)
    })
  }

  /// Ask before a destructive call.
  async fn ask(&self, prompt: String, guard: &ViewGuard) -> Result<(), MutationError> {
    if !self.confirm.confirm(&prompt).await {
      debug!(noun = self.noun, "declined");
      return Err(MutationError::Declined);
    }
    if !guard.is_alive() {
      return Err(MutationError::StaleView);
    }
    Ok(())
  }

  /// Issue one request under the per-key guard. The returned permit must be
  /// held until the cache write is done.
  async fn send(
    &self,
    key: &ResourceKey,
    verb: Verb,
    method: Method,
    path: &str,
    body: Option<Value>,
    guard: &ViewGuard,
  ) -> Result<(Value, InFlightPermit), MutationError> {
    let Some(permit) = self.in_flight.acquire(key) else {
      let err = MutationError::Busy { key: key.clone() };
      self.fail(verb, &err.to_string());
      return Err(err);
    };

    debug!(%key, %method, path, "mutation started");
    let result = self.remote.request(method, path, body).await;

    if !guard.is_alive() {
      debug!(%key, "view closed, dropping mutation result");
      if result.is_ok() {
        // The server changed even though nobody gets told; next reader refetches
        self.cache.invalidate(key);
      }
      return Err(MutationError::StaleView);
    }

    match result {
      Ok(value) => Ok((value, permit)),
      Err(e) => {
        warn!(%key, error = %e, "mutation failed");
        self.fail(verb, &e.message());
        Err(e.into())
      }
    }
  }

  fn fail(&self, verb: Verb, message: &str) {
    self
      .notify
      .error(&format!("Unable to {} {}: {}", verb.infinitive(), self.noun, message));
  }

  /// PATCH the resource and replace the cached value with the response.
  pub async fn replace<P>(&self, key: &ResourceKey, patch: &P, guard: &ViewGuard) -> Result<V, MutationError>
  where
    P: Validate + Serialize + Sync,
  {
    let body = self.prepare(Verb::Update, patch)?;
    let (response, _permit) = self
      .send(key, Verb::Update, Method::PATCH, &key.collection_path(), Some(body), guard)
      .await?;

    let value: V = match decode(response) {
      Ok(value) => value,
      Err(e) => {
        // The server applied the change; fall back to reading it back.
        self.fail(Verb::Update, &e.message());
        self.cache.revalidate(key);
        return Err(e.into());
      }
    };
    self.cache.set(key, Update::Replace(value.clone()), false);
    info!(%key, "updated");
    self.notify.success(&format!("Saved {} settings", self.noun));
    Ok(value)
  }

  /// POST to the resource itself and replace the cached value with the response.
  pub async fn enable(&self, key: &ResourceKey, label: &str, guard: &ViewGuard) -> Result<V, MutationError> {
    let (response, _permit) = self
      .send(key, Verb::Enable, Method::POST, &key.collection_path(), None, guard)
      .await?;

    let value: V = match decode(response) {
      Ok(value) => value,
      Err(e) => {
        self.fail(Verb::Enable, &e.message());
        self.cache.revalidate(key);
        return Err(e.into());
      }
    };
    self.cache.set(key, Update::Replace(value.clone()), false);
    info!(%key, "enabled");
    self.notify.success(&format!("Enabled {} {}", self.noun, label));
    Ok(value)
  }

  /// Confirm, DELETE the resource itself, then refetch it.
  pub async fn disable(&self, key: &ResourceKey, label: &str, guard: &ViewGuard) -> Result<(), MutationError> {
    self
      .ask(format!("Disable {} {}?", self.noun, label), guard)
      .await?;
    let (_, _permit) = self
      .send(key, Verb::Disable, Method::DELETE, &key.collection_path(), None, guard)
      .await?;

    self.cache.revalidate(key);
    info!(%key, "disabled");
    self.notify.success(&format!("Disabled {} {}", self.noun, label));
    Ok(())
  }
}

impl<T> MutationCoordinator<Vec<T>>
where
  T: Identified + Serialize + DeserializeOwned,
{
  /// POST a new item and append the server's response to the cached list.
  pub async fn add<I>(&self, key: &ResourceKey, input: &I, guard: &ViewGuard) -> Result<T, MutationError>
  where
    I: Validate + Serialize + Sync,
  {
    let body = self.prepare(Verb::Add, input)?;
    let (response, _permit) = self
      .send(key, Verb::Add, Method::POST, &key.collection_path(), Some(body), guard)
      .await?;

    let item: T = match decode(response) {
      Ok(item) => item,
      Err(e) => {
        self.fail(Verb::Add, &e.message());
        self.cache.revalidate(key);
        return Err(e.into());
      }
    };

    let added = item.clone();
    self.cache.set(
      key,
      Update::apply(move |mut list: Vec<T>| {
        list.push(added);
        list
      }),
      false,
    );
    info!(%key, identity = %item.identity(), "added");
    self
      .notify
      .success(&format!("Added {} {}", self.noun, item.identity()));
    Ok(item)
  }

  /// Confirm, DELETE one item, then drop it from the cached list.
  pub async fn remove(&self, key: &ResourceKey, identity: &str, guard: &ViewGuard) -> Result<(), MutationError> {
    self
      .ask(format!("Delete {} {}?", self.noun, identity), guard)
      .await?;
    let (_, _permit) = self
      .send(key, Verb::Remove, Method::DELETE, &key.item_path(identity), None, guard)
      .await?;

    let removed = identity.to_string();
    self.cache.set(
      key,
      Update::apply(move |mut list: Vec<T>| {
        list.retain(|item| item.identity() != removed);
        list
      }),
      false,
    );
    info!(%key, identity, "removed");
    self
      .notify
      .success(&format!("Removed {} {}", self.noun, identity));
    Ok(())
  }

  /// PATCH one item, then refetch the whole list. The response is not merged.
  pub async fn edit<P>(
    &self,
    key: &ResourceKey,
    identity: &str,
    patch: &P,
    guard: &ViewGuard,
  ) -> Result<(), MutationError>
  where
    P: Validate + Serialize + Sync,
  {
    let body = self.prepare(Verb::Update, patch)?;
    let (_, _permit) = self
      .send(key, Verb::Update, Method::PATCH, &key.item_path(identity), Some(body), guard)
      .await?;

    self.cache.invalidate(key);
    self.cache.revalidate(key);
    info!(%key, identity, "updated");
    self
      .notify
      .success(&format!("Updated {} {}", self.noun, identity));
    Ok(())
  }
}
