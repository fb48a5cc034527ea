//! Structured cache keys.

use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Absolute path from `segments`, each one percent-encoded so a name
/// holding `/`, `?` or `#` stays a single segment.
fn encoded_path(segments: &[&str]) -> String {
  // Only fails for cannot-be-a-base URLs, which an http URL never is
  let Ok(mut url) = Url::parse("http://drone.invalid/") else {
    return format!("/{}", segments.join("/"));
  };
  if let Ok(mut path) = url.path_segments_mut() {
    path.clear().extend(segments);
  }
  url.path().to_string()
}

/// Identifies one server-side collection (or single resource).
///
/// Keys are compared structurally, so `Secrets { "a/b", "c" }` can never
/// collide with `Secrets { "a", "b/c" }` the way concatenated strings would.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
  /// All users (admin only)
  Users,
  /// Repositories visible to the current user, with their latest build
  Repos,
  /// A single repository
  Repo { namespace: String, name: String },
  /// Latest build per branch of a repository
  Branches { namespace: String, name: String },
  /// Repository secrets
  Secrets { namespace: String, name: String },
  /// Organization secrets shared by every repository in the namespace
  OrgSecrets { namespace: String },
  /// Repository cron jobs
  Crons { namespace: String, name: String },
}

impl ResourceKey {
  pub fn repo(namespace: &str, name: &str) -> Self {
    Self::Repo {
      namespace: namespace.to_string(),
      name: name.to_string(),
    }
  }

  pub fn branches(namespace: &str, name: &str) -> Self {
    Self::Branches {
      namespace: namespace.to_string(),
      name: name.to_string(),
    }
  }

  pub fn secrets(namespace: &str, name: &str) -> Self {
    Self::Secrets {
      namespace: namespace.to_string(),
      name: name.to_string(),
    }
  }

  pub fn org_secrets(namespace: &str) -> Self {
    Self::OrgSecrets {
      namespace: namespace.to_string(),
    }
  }

  pub fn crons(namespace: &str, name: &str) -> Self {
    Self::Crons {
      namespace: namespace.to_string(),
      name: name.to_string(),
    }
  }

  fn collection_segments(&self) -> Vec<&str> {
    match self {
      Self::Users => vec!["api", "users"],
      Self::Repos => vec!["api", "user", "repos"],
      Self::Repo { namespace, name } => vec!["api", "repos", namespace.as_str(), name.as_str()],
      Self::Branches { namespace, name } => vec!["api", "repos", namespace.as_str(), name.as_str(), "branches"],
      Self::Secrets { namespace, name } => vec!["api", "repos", namespace.as_str(), name.as_str(), "secrets"],
      Self::OrgSecrets { namespace } => vec!["api", "secrets", namespace.as_str()],
      Self::Crons { namespace, name } => vec!["api", "repos", namespace.as_str(), name.as_str(), "cron"],
    }
  }

  /// Path the collection is read from and created in.
  pub fn collection_path(&self) -> String {
    let path = encoded_path(&self.collection_segments());
    match self {
      Self::Repos => format!("{}?latest=true", path),
      _ => path,
    }
  }

  /// Path of one member of the collection.
  pub fn item_path(&self, identity: &str) -> String {
    let mut segments = match self {
      Self::Users => vec!["api", "users"],
      // Repositories are identified by their "namespace/name" slug
      Self::Repos => {
        let mut segments = vec!["api", "repos"];
        segments.extend(identity.splitn(2, '/'));
        return encoded_path(&segments);
      }
      // A single-resource key is its own item
      Self::Repo { .. } => return self.collection_path(),
      _ => self.collection_segments(),
    };
    segments.push(identity);
    encoded_path(&segments)
  }

  /// Stable digest used as the snapshot storage key.
  pub fn storage_id(&self) -> String {
    let input = match self {
      Self::Users => "users".to_string(),
      Self::Repos => "repos".to_string(),
      Self::Repo { namespace, name } => format!("repo\0{}\0{}", namespace, name),
      Self::Branches { namespace, name } => format!("branches\0{}\0{}", namespace, name),
      Self::Secrets { namespace, name } => format!("secrets\0{}\0{}", namespace, name),
      Self::OrgSecrets { namespace } => format!("org_secrets\0{}", namespace),
      Self::Crons { namespace, name } => format!("crons\0{}\0{}", namespace, name),
    };

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Users => write!(f, "users"),
      Self::Repos => write!(f, "repos"),
      Self::Repo { namespace, name } => write!(f, "repo {}/{}", namespace, name),
      Self::Branches { namespace, name } => write!(f, "branches of {}/{}", namespace, name),
      Self::Secrets { namespace, name } => write!(f, "secrets of {}/{}", namespace, name),
      Self::OrgSecrets { namespace } => write!(f, "secrets of {}", namespace),
      Self::Crons { namespace, name } => write!(f, "crons of {}/{}", namespace, name),
    }
  }
}
