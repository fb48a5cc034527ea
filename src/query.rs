//! One-shot async work polled from the UI tick.
//!
//! Cached lists go through [`crate::cache::ResourceCache`]. `Query<T>` is
//! for everything else a view waits on: the signed-in user, or the outcome
//! of a form submission that should close the form on success.
//!
//! ```ignore
//! let services = services.clone();
//! let mut viewer = Query::start(move || {
//!   let services = services.clone();
//!   async move { services.viewer().await.map_err(|e| e.message()) }
//! });
//!
//! // On every tick
//! if viewer.poll() {
//!   // redraw
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Never run
  Idle,
  Loading,
  Success(T),
  /// Failed, with a message fit for the user
  Error(String),
}

impl<T> QueryState<T> {
  #[cfg(test)]
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type Job<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;
type Runner<T> = Box<dyn Fn() -> Job<T> + Send + Sync>;

/// A run in flight: its task and where its result lands.
struct Pending<T> {
  task: JoinHandle<()>,
  result: oneshot::Receiver<Result<T, String>>,
}

pub struct Query<T> {
  state: QueryState<T>,
  runner: Runner<T>,
  pending: Option<Pending<T>>,
}

impl<T: Send + 'static> Query<T> {
  /// Build an idle query. `runner` produces a fresh future for every run.
  pub fn new<F, Fut>(runner: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      runner: Box::new(move || Box::pin(runner())),
      pending: None,
    }
  }

  pub fn start<F, Fut>(runner: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    let mut query = Self::new(runner);
    query.fetch();
    query
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Run unless a run is already in flight.
  pub fn fetch(&mut self) {
    if self.pending.is_none() {
      self.spawn();
    }
  }

  /// Abort any run in flight and start over.
  pub fn refetch(&mut self) {
    if let Some(pending) = self.pending.take() {
      pending.task.abort();
    }
    self.spawn();
  }

  /// Move a finished run into `state`. Returns true if the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(pending) = self.pending.as_mut() else {
      return false;
    };

    let outcome = match pending.result.try_recv() {
      Ok(outcome) => outcome,
      Err(oneshot::error::TryRecvError::Empty) => return false,
      // The task died before answering (panic)
      Err(oneshot::error::TryRecvError::Closed) => Err("Task ended without a result".to_string()),
    };
    self.pending = None;
    self.state = match outcome {
      Ok(data) => QueryState::Success(data),
      Err(e) => QueryState::Error(e),
    };
    true
  }

  fn spawn(&mut self) {
    let (tx, result) = oneshot::channel();
    let job = (self.runner)();
    let task = tokio::spawn(async move {
      let _ = tx.send(job.await);
    });
    self.pending = Some(Pending { task, result });
    self.state = QueryState::Loading;
  }
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    if let Some(pending) = self.pending.take() {
      pending.task.abort();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  async fn wait() {
    tokio::time::sleep(Duration::from_millis(20)).await;
  }

  #[tokio::test]
  async fn test_idle_until_fetched() {
    let mut query = Query::new(|| async { Ok::<_, String>("octocat".to_string()) });
    assert!(matches!(query.state(), QueryState::Idle));
    assert!(!query.poll());

    query.fetch();
    assert!(query.state().is_loading());
    wait().await;

    assert!(query.poll());
    assert_eq!(query.data().map(String::as_str), Some("octocat"));
    assert!(!query.poll());
  }

  #[tokio::test]
  async fn test_error_is_kept_as_message() {
    let mut query: Query<()> = Query::start(|| async { Err("Unauthorized".to_string()) });
    wait().await;

    assert!(query.poll());
    assert_eq!(query.error(), Some("Unauthorized"));
  }

  #[tokio::test]
  async fn test_fetch_while_running_does_not_rerun() {
    let runs = Arc::new(AtomicU32::new(0));
    let counter = runs.clone();
    let mut query = Query::new(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, String>(())
      }
    });

    query.fetch();
    query.fetch();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_supersedes_running_job() {
    let runs = Arc::new(AtomicU32::new(0));
    let counter = runs.clone();
    let mut query = Query::new(move || {
      let run = counter.fetch_add(1, Ordering::SeqCst);
      async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok::<_, String>(run)
      }
    });

    query.fetch();
    query.refetch();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(query.poll());
    assert_eq!(query.data(), Some(&1));
  }
}
