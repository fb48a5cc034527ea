//! Server resources and the request bodies that create or change them.
//!
//! Field names follow the server's JSON. Every field is defaulted so that
//! older servers omitting a column still deserialize.

use serde::{Deserialize, Serialize};

use crate::cache::{Identified, Validate, ValidationError};

// ============================================================================
// Resources
// ============================================================================

/// Repository or organization secret. `data` is write-only and never returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Secret {
  pub id: i64,
  pub repo_id: i64,
  pub namespace: String,
  pub name: String,
  pub pull_request: bool,
  pub pull_request_push: bool,
}

/// Scheduled pipeline trigger. `next`/`prev` are unix seconds computed by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cron {
  pub id: i64,
  pub repo_id: i64,
  pub name: String,
  pub expr: String,
  pub next: i64,
  pub prev: i64,
  pub event: String,
  pub branch: String,
  pub target: String,
  pub disabled: bool,
  pub created: i64,
  pub updated: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
  pub id: i64,
  pub login: String,
  pub email: String,
  pub machine: bool,
  pub admin: bool,
  pub active: bool,
  pub avatar: String,
  pub syncing: bool,
  pub synced: i64,
  pub created: i64,
  pub updated: i64,
  pub last_login: i64,
}

/// A pipeline execution. Branch listings are builds, one per branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Build {
  pub id: i64,
  pub repo_id: i64,
  pub number: i64,
  pub status: String,
  pub event: String,
  pub action: String,
  pub link: String,
  pub message: String,
  pub before: String,
  pub after: String,
  #[serde(rename = "ref")]
  pub git_ref: String,
  pub source: String,
  pub target: String,
  pub author_login: String,
  pub author_name: String,
  pub author_avatar: String,
  pub sender: String,
  pub started: i64,
  pub finished: i64,
  pub created: i64,
  pub updated: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repo {
  pub id: i64,
  pub namespace: String,
  pub name: String,
  pub slug: String,
  pub scm: String,
  pub link: String,
  pub default_branch: String,
  pub private: bool,
  pub visibility: String,
  pub active: bool,
  pub config_path: String,
  pub trusted: bool,
  pub protected: bool,
  pub ignore_forks: bool,
  pub ignore_pull_requests: bool,
  pub auto_cancel_pull_requests: bool,
  pub auto_cancel_pushes: bool,
  pub auto_cancel_running: bool,
  pub timeout: i64,
  pub counter: i64,
  pub synced: i64,
  pub created: i64,
  pub updated: i64,
  pub build: Option<Build>,
}

impl Identified for Secret {
  fn identity(&self) -> String {
    self.name.clone()
  }
}

impl Identified for Cron {
  fn identity(&self) -> String {
    self.name.clone()
  }
}

impl Identified for User {
  fn identity(&self) -> String {
    self.login.clone()
  }
}

impl Identified for Build {
  fn identity(&self) -> String {
    self.target.clone()
  }
}

impl Identified for Repo {
  fn identity(&self) -> String {
    self.slug.clone()
  }
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewSecret {
  pub name: String,
  pub data: String,
  pub pull_request: bool,
}

impl Validate for NewSecret {
  fn validate(&self) -> Result<(), ValidationError> {
    require("name", &self.name)?;
    require("value", &self.data)
  }
}

pub const DEFAULT_CRON_BRANCH: &str = "master";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewCron {
  pub name: String,
  pub branch: String,
  pub expr: String,
}

impl NewCron {
  /// Fill in the default branch when none was given.
  pub fn normalized(mut self) -> Self {
    if self.branch.trim().is_empty() {
      self.branch = DEFAULT_CRON_BRANCH.to_string();
    }
    self
  }
}

impl Validate for NewCron {
  fn validate(&self) -> Result<(), ValidationError> {
    require("name", &self.name)?;
    require("schedule", &self.expr)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewUser {
  pub login: String,
  pub email: String,
  pub admin: bool,
  pub machine: bool,
}

impl Validate for NewUser {
  fn validate(&self) -> Result<(), ValidationError> {
    require("login", &self.login)?;
    require("email", &self.email)?;
    if !self.email.contains('@') {
      return Err(ValidationError::invalid("email", "must be an email address"));
    }
    Ok(())
  }
}

/// Only `admin` is editable after creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserPatch {
  pub admin: bool,
}

impl Validate for UserPatch {
  fn validate(&self) -> Result<(), ValidationError> {
    Ok(())
  }
}

pub const VISIBILITIES: &[&str] = &["private", "public", "internal"];

/// Editable subset of a repository, sent as the PATCH body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoSettings {
  pub ignore_pull_requests: bool,
  pub ignore_forks: bool,
  pub protected: bool,
  pub trusted: bool,
  pub visibility: String,
  pub timeout: i64,
  pub config_path: String,
  pub auto_cancel_pull_requests: bool,
  pub auto_cancel_pushes: bool,
  pub auto_cancel_running: bool,
}

impl RepoSettings {
  pub fn from_repo(repo: &Repo) -> Self {
    Self {
      ignore_pull_requests: repo.ignore_pull_requests,
      ignore_forks: repo.ignore_forks,
      protected: repo.protected,
      trusted: repo.trusted,
      visibility: repo.visibility.clone(),
      timeout: repo.timeout,
      config_path: repo.config_path.clone(),
      auto_cancel_pull_requests: repo.auto_cancel_pull_requests,
      auto_cancel_pushes: repo.auto_cancel_pushes,
      auto_cancel_running: repo.auto_cancel_running,
    }
  }

  /// Flip pull request auto-cancel. Running builds can only stay auto-cancelled
  /// while pushes are still auto-cancelled.
  pub fn toggle_auto_cancel_pull_requests(&mut self) {
    self.auto_cancel_pull_requests = !self.auto_cancel_pull_requests;
    if !self.auto_cancel_pushes {
      self.auto_cancel_running = false;
    }
  }

  /// Flip push auto-cancel. Mirrors [`Self::toggle_auto_cancel_pull_requests`].
  pub fn toggle_auto_cancel_pushes(&mut self) {
    self.auto_cancel_pushes = !self.auto_cancel_pushes;
    if !self.auto_cancel_pull_requests {
      self.auto_cancel_running = false;
    }
  }

  pub fn can_auto_cancel_running(&self) -> bool {
    self.auto_cancel_pull_requests || self.auto_cancel_pushes
  }

  /// No-op unless pull requests or pushes are auto-cancelled.
  pub fn toggle_auto_cancel_running(&mut self) {
    if self.can_auto_cancel_running() {
      self.auto_cancel_running = !self.auto_cancel_running;
    }
  }
}

impl Validate for RepoSettings {
  fn validate(&self) -> Result<(), ValidationError> {
    if !VISIBILITIES.contains(&self.visibility.as_str()) {
      return Err(ValidationError::invalid(
        "visibility",
        "must be private, public or internal",
      ));
    }
    if self.timeout <= 0 {
      return Err(ValidationError::invalid("timeout", "must be positive"));
    }
    require("configuration", &self.config_path)
  }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
  if value.trim().is_empty() {
    Err(ValidationError::missing(field))
  } else {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_secret_deserializes_partial_body() {
    let secret: Secret = serde_json::from_value(json!({"id": 3, "name": "docker_password"}))
      .expect("secret");
    assert_eq!(secret.id, 3);
    assert_eq!(secret.identity(), "docker_password");
    assert!(!secret.pull_request);
  }

  #[test]
  fn test_build_ref_field_is_renamed() {
    let build: Build = serde_json::from_value(json!({"ref": "refs/heads/main", "target": "main"}))
      .expect("build");
    assert_eq!(build.git_ref, "refs/heads/main");
    assert_eq!(build.identity(), "main");
  }

  #[test]
  fn test_new_secret_requires_name_and_value() {
    let secret = NewSecret {
      name: "  ".to_string(),
      data: "x".to_string(),
      pull_request: false,
    };
    assert_eq!(secret.validate(), Err(ValidationError::missing("name")));

    let secret = NewSecret {
      name: "token".to_string(),
      data: String::new(),
      pull_request: false,
    };
    assert_eq!(secret.validate(), Err(ValidationError::missing("value")));
  }

  #[test]
  fn test_new_cron_defaults_branch() {
    let cron = NewCron {
      name: "nightly".to_string(),
      branch: String::new(),
      expr: "@daily".to_string(),
    }
    .normalized();
    assert_eq!(cron.branch, "master");

    let cron = NewCron {
      name: "nightly".to_string(),
      branch: "develop".to_string(),
      expr: "@daily".to_string(),
    }
    .normalized();
    assert_eq!(cron.branch, "develop");
  }

  #[test]
  fn test_new_user_requires_email_shape() {
    let user = NewUser {
      login: "bob".to_string(),
      email: "bob".to_string(),
      ..Default::default()
    };
    assert!(user.validate().is_err());

    let user = NewUser {
      login: "bob".to_string(),
      email: "bob@example.com".to_string(),
      ..Default::default()
    };
    assert!(user.validate().is_ok());
  }

  fn settings() -> RepoSettings {
    RepoSettings {
      visibility: "private".to_string(),
      timeout: 60,
      config_path: ".drone.yml".to_string(),
      ..Default::default()
    }
  }

  #[test]
  fn test_auto_cancel_running_requires_a_trigger() {
    let mut s = settings();
    s.toggle_auto_cancel_running();
    assert!(!s.auto_cancel_running);

    s.toggle_auto_cancel_pushes();
    s.toggle_auto_cancel_running();
    assert!(s.auto_cancel_running);
  }

  #[test]
  fn test_disabling_last_trigger_clears_running() {
    let mut s = settings();
    s.toggle_auto_cancel_pushes();
    s.toggle_auto_cancel_running();
    assert!(s.auto_cancel_running);

    // pull requests are off, so switching pushes off drops running too
    s.toggle_auto_cancel_pushes();
    assert!(!s.auto_cancel_pushes);
    assert!(!s.auto_cancel_running);
  }

  #[test]
  fn test_running_survives_while_other_trigger_is_on() {
    let mut s = settings();
    s.toggle_auto_cancel_pushes();
    s.toggle_auto_cancel_pull_requests();
    s.toggle_auto_cancel_running();

    s.toggle_auto_cancel_pull_requests();
    assert!(s.auto_cancel_running);
  }

  #[test]
  fn test_repo_settings_validation() {
    assert!(settings().validate().is_ok());

    let mut s = settings();
    s.visibility = "secret".to_string();
    assert!(s.validate().is_err());

    let mut s = settings();
    s.timeout = 0;
    assert!(s.validate().is_err());
  }
}
