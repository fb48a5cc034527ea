//! Test doubles for the remote client and the confirm/notify sinks.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::api::client::RemoteFetch;
use crate::api::error::ApiError;
use crate::api::Services;
use crate::cache::{Confirm, NoopStorage, Notify, SnapshotStorage};

type Reply = Result<Value, ApiError>;

enum Scripted {
  Ready(Reply),
  Gated(oneshot::Receiver<Reply>),
}

/// Scripted server. Replies are queued per (method, path); the last ready
/// reply repeats so background refetches keep working. Unscripted routes 404.
#[derive(Default)]
pub struct FakeRemote {
  routes: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
  calls: Mutex<Vec<(Method, String, Option<Value>)>>,
}

impl FakeRemote {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Queue a reply, replacing a repeating one left over from earlier.
  pub fn respond(&self, method: Method, path: &str, reply: Reply) {
    let mut routes = self.routes.lock().unwrap();
    let queue = routes.entry((method, path.to_string())).or_default();
    if matches!(queue.back(), Some(Scripted::Ready(_))) && queue.len() == 1 {
      queue.clear();
    }
    queue.push_back(Scripted::Ready(reply));
  }

  /// Queue a reply that is held until the returned sender fires.
  pub fn gate(&self, method: Method, path: &str) -> oneshot::Sender<Reply> {
    let (tx, rx) = oneshot::channel();
    let mut routes = self.routes.lock().unwrap();
    let queue = routes.entry((method, path.to_string())).or_default();
    if matches!(queue.back(), Some(Scripted::Ready(_))) && queue.len() == 1 {
      queue.clear();
    }
    queue.push_back(Scripted::Gated(rx));
    tx
  }

  pub fn count(&self, method: Method, path: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|(m, p, _)| *m == method && p == path)
      .count()
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  /// Body of the most recent call to (method, path).
  pub fn last_body(&self, method: Method, path: &str) -> Option<Value> {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .rev()
      .find(|(m, p, _)| *m == method && p == path)
      .and_then(|(_, _, body)| body.clone())
  }

  fn next(&self, method: &Method, path: &str) -> Option<Scripted> {
    let mut routes = self.routes.lock().unwrap();
    let queue = routes.get_mut(&(method.clone(), path.to_string()))?;
    match queue.front() {
      Some(Scripted::Ready(reply)) if queue.len() == 1 => Some(Scripted::Ready(reply.clone())),
      _ => queue.pop_front(),
    }
  }
}

#[async_trait]
impl RemoteFetch for FakeRemote {
  async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Reply {
    self
      .calls
      .lock()
      .unwrap()
      .push((method.clone(), path.to_string(), body));

    match self.next(&method, path) {
      Some(Scripted::Ready(reply)) => reply,
      Some(Scripted::Gated(rx)) => rx
        .await
        .unwrap_or_else(|_| Err(ApiError::network("gate dropped"))),
      None => Err(ApiError::status(404, "Not Found")),
    }
  }
}

/// Answers every confirmation the same way and records the prompts.
pub struct FakeConfirm {
  answer: bool,
  prompts: Mutex<Vec<String>>,
}

impl FakeConfirm {
  pub fn answering(answer: bool) -> Arc<Self> {
    Arc::new(Self {
      answer,
      prompts: Mutex::new(Vec::new()),
    })
  }

  pub fn prompts(&self) -> Vec<String> {
    self.prompts.lock().unwrap().clone()
  }
}

#[async_trait]
impl Confirm for FakeConfirm {
  async fn confirm(&self, message: &str) -> bool {
    self.prompts.lock().unwrap().push(message.to_string());
    self.answer
  }
}

#[derive(Default)]
pub struct RecordingNotify {
  successes: Mutex<Vec<String>>,
  errors: Mutex<Vec<String>>,
}

impl RecordingNotify {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn successes(&self) -> Vec<String> {
    self.successes.lock().unwrap().clone()
  }

  pub fn errors(&self) -> Vec<String> {
    self.errors.lock().unwrap().clone()
  }
}

impl Notify for RecordingNotify {
  fn success(&self, message: &str) {
    self.successes.lock().unwrap().push(message.to_string());
  }

  fn error(&self, message: &str) {
    self.errors.lock().unwrap().push(message.to_string());
  }
}

/// Services over `remote` with no persistence and every confirmation accepted.
pub fn services(remote: &Arc<FakeRemote>) -> (Services, Arc<RecordingNotify>) {
  services_with_storage(remote, Arc::new(NoopStorage))
}

pub fn services_with_storage(
  remote: &Arc<FakeRemote>,
  storage: Arc<dyn SnapshotStorage>,
) -> (Services, Arc<RecordingNotify>) {
  let notify = RecordingNotify::new();
  let services = Services::new(remote.clone(), storage, FakeConfirm::answering(true), notify.clone());
  (services, notify)
}

/// Let spawned fetches and mutations run to completion.
pub async fn settle() {
  for _ in 0..20 {
    tokio::task::yield_now().await;
  }
  tokio::time::sleep(std::time::Duration::from_millis(20)).await;
}
