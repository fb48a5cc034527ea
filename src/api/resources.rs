//! Typed entry points per resource, shared by every view.

use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::{decode, RemoteFetch};
use super::error::ApiError;
use super::types::{Build, Cron, NewCron, Repo, RepoSettings, Secret, User, UserPatch};
use crate::cache::{
  CacheValue, Confirm, MutationCoordinator, MutationError, Notify, ResourceCache, ResourceKey, SnapshotStorage,
  ViewGuard,
};

const SYNC_PATH: &str = "/api/user/repos?async=true";

/// How often the viewer is re-read while an account sync runs
const SYNC_POLL: Duration = Duration::from_secs(1);

/// Collaborators every cache and coordinator is built from.
struct Wiring<'a> {
  remote: &'a Arc<dyn RemoteFetch>,
  storage: &'a Arc<dyn SnapshotStorage>,
  confirm: &'a Arc<dyn Confirm>,
  notify: &'a Arc<dyn Notify>,
}

impl Wiring<'_> {
  fn cache<V: CacheValue>(&self) -> ResourceCache<V> {
    ResourceCache::with_storage(Arc::clone(self.remote), Arc::clone(self.storage))
  }

  fn coordinator<V: CacheValue>(&self, noun: &'static str, cache: ResourceCache<V>) -> MutationCoordinator<V> {
    MutationCoordinator::new(
      noun,
      cache,
      Arc::clone(self.remote),
      Arc::clone(self.confirm),
      Arc::clone(self.notify),
    )
  }
}

/// Caches and coordinators for every resource the client manages.
///
/// Cheap to clone; views hold their own copy and spawn mutations from it.
#[derive(Clone)]
pub struct Services {
  pub repos: ResourceCache<Vec<Repo>>,
  pub branches: ResourceCache<Vec<Build>>,
  pub repo: MutationCoordinator<Repo>,
  pub secrets: MutationCoordinator<Vec<Secret>>,
  pub org_secrets: MutationCoordinator<Vec<Secret>>,
  pub crons: MutationCoordinator<Vec<Cron>>,
  pub users: MutationCoordinator<Vec<User>>,
  remote: Arc<dyn RemoteFetch>,
  storage: Arc<dyn SnapshotStorage>,
  notify: Arc<dyn Notify>,
  sync_poll: Duration,
}

impl Services {
  pub fn new(
    remote: Arc<dyn RemoteFetch>,
    storage: Arc<dyn SnapshotStorage>,
    confirm: Arc<dyn Confirm>,
    notify: Arc<dyn Notify>,
  ) -> Self {
    let wiring = Wiring {
      remote: &remote,
      storage: &storage,
      confirm: &confirm,
      notify: &notify,
    };

    // Repository and organization secrets share one cache; their keys never overlap.
    let secrets = wiring.coordinator("secret", wiring.cache());
    let org_secrets = wiring.coordinator("organization secret", secrets.cache().clone());

    Self {
      repos: wiring.cache(),
      branches: wiring.cache(),
      repo: wiring.coordinator("repository", wiring.cache()),
      secrets,
      org_secrets,
      crons: wiring.coordinator("cron job", wiring.cache()),
      users: wiring.coordinator("user", wiring.cache()),
      remote: Arc::clone(&remote),
      storage: Arc::clone(&storage),
      notify: Arc::clone(&notify),
      sync_poll: SYNC_POLL,
    }
  }

  /// Saved UI preference. A storage failure reads as unset.
  pub fn preference(&self, name: &str) -> Option<String> {
    self.storage.preference(name).unwrap_or_else(|e| {
      warn!(name, error = %e, "preference read failed");
      None
    })
  }

  pub fn set_preference(&self, name: &str, value: &str) {
    if let Err(e) = self.storage.set_preference(name, value) {
      warn!(name, error = %e, "preference write failed");
    }
  }

  /// The signed-in user.
  pub async fn viewer(&self) -> Result<User, ApiError> {
    let body = self.remote.request(Method::GET, "/api/user", None).await?;
    decode(body)
  }

  /// Create a cron job, defaulting its branch.
  pub async fn add_cron(
    &self,
    namespace: &str,
    name: &str,
    input: NewCron,
    guard: &ViewGuard,
  ) -> Result<Cron, MutationError> {
    self
      .crons
      .add(&ResourceKey::crons(namespace, name), &input.normalized(), guard)
      .await
  }

  /// Grant or revoke admin. The user list is refetched afterwards.
  pub async fn set_admin(&self, login: &str, admin: bool, guard: &ViewGuard) -> Result<(), MutationError> {
    self
      .users
      .edit(&ResourceKey::Users, login, &UserPatch { admin }, guard)
      .await
  }

  pub async fn save_repo_settings(
    &self,
    namespace: &str,
    name: &str,
    settings: &RepoSettings,
    guard: &ViewGuard,
  ) -> Result<Repo, MutationError> {
    let result = self
      .repo
      .replace(&ResourceKey::repo(namespace, name), settings, guard)
      .await;
    self.repos_touched(&result);
    result
  }

  pub async fn enable_repo(&self, namespace: &str, name: &str, guard: &ViewGuard) -> Result<Repo, MutationError> {
    let slug = format!("{}/{}", namespace, name);
    let result = self
      .repo
      .enable(&ResourceKey::repo(namespace, name), &slug, guard)
      .await;
    self.repos_touched(&result);
    result
  }

  pub async fn disable_repo(&self, namespace: &str, name: &str, guard: &ViewGuard) -> Result<(), MutationError> {
    let slug = format!("{}/{}", namespace, name);
    let result = self
      .repo
      .disable(&ResourceKey::repo(namespace, name), &slug, guard)
      .await;
    self.repos_touched(&result);
    result
  }

  /// The dashboard lists every repository's state. Mark it stale whenever a
  /// repository mutation may have reached the server, including one whose
  /// view closed before the answer came back.
  fn repos_touched<T>(&self, result: &Result<T, MutationError>) {
    let never_sent = matches!(
      result,
      Err(MutationError::Validation(_) | MutationError::Busy { .. } | MutationError::Declined)
    );
    if !never_sent {
      self.repos.invalidate(&ResourceKey::Repos);
    }
  }

  /// Ask the server to resynchronise the viewer's repositories, wait for it
  /// to finish, then reload them.
  pub async fn sync_account(&self) -> Result<(), ApiError> {
    match self.run_sync().await {
      Ok(()) => {
        self.repos.revalidate(&ResourceKey::Repos);
        self.notify.success("Repositories synchronised");
        Ok(())
      }
      Err(e) => {
        warn!(error = %e, "account sync failed");
        self.notify.error(&format!("Unable to synchronise repositories: {}", e.message()));
        Err(e)
      }
    }
  }

  async fn run_sync(&self) -> Result<(), ApiError> {
    self.remote.request(Method::POST, SYNC_PATH, None).await?;
    info!("account sync requested");

    // The server syncs in the background and reports progress on the viewer
    let mut ticks = tokio::time::interval(self.sync_poll);
    loop {
      ticks.tick().await;
      let viewer = self.viewer().await?;
      if !viewer.syncing {
        info!(login = %viewer.login, "account sync finished");
        return Ok(());
      }
      debug!("account still syncing");
    }
  }

  #[cfg(test)]
  pub fn with_sync_poll(mut self, every: Duration) -> Self {
    self.sync_poll = every;
    self
  }
}
