//! Filtering, ordering and paging of cached lists for display.
//!
//! Cached lists stay in server order; everything here works on borrowed
//! views of them.

use std::cmp::Reverse;

use crate::api::types::{Repo, User};

/// Repositories shown per page on the dashboard.
pub const REPOS_CHUNK_SIZE: usize = 50;
/// Repositories shown in the "recent" strip.
pub const RECENT_REPOS: usize = 6;
/// Users shown per page in the admin panel.
pub const USERS_CHUNK_SIZE: usize = 1000;

pub const CRON_PRESETS: &[&str] = &["@hourly", "@daily", "@weekly", "@monthly", "@yearly"];

/// Build timeout choices, in minutes.
pub const TIMEOUTS: &[i64] = &[
  30, 60, 90, 120, 180, 240, 300, 360, 420, 480, 540, 600, 660, 720, 1440,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepoSort {
  #[default]
  RecentActivity,
  Name,
}

impl RepoSort {
  pub fn label(self) -> &'static str {
    match self {
      Self::RecentActivity => "recent activity",
      Self::Name => "name",
    }
  }

  /// Stable name for saving the choice
  pub fn key(self) -> &'static str {
    match self {
      Self::RecentActivity => "recent",
      Self::Name => "name",
    }
  }

  pub fn from_key(key: &str) -> Option<Self> {
    match key {
      "recent" => Some(Self::RecentActivity),
      "name" => Some(Self::Name),
      _ => None,
    }
  }

  pub fn toggled(self) -> Self {
    match self {
      Self::RecentActivity => Self::Name,
      Self::Name => Self::RecentActivity,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoFilter {
  pub active_only: bool,
  /// Only repositories in this namespace
  pub namespace: Option<String>,
  /// Substring of the slug
  pub text: String,
}

impl RepoFilter {
  pub fn matches(&self, repo: &Repo) -> bool {
    if self.active_only && !repo.active {
      return false;
    }
    if let Some(ns) = &self.namespace {
      if &repo.namespace != ns {
        return false;
      }
    }
    repo.slug.contains(self.text.trim())
  }
}

/// Latest build creation time, repos that never built sort last.
fn activity(repo: &Repo) -> i64 {
  repo.build.as_ref().map(|b| b.created).unwrap_or(i64::MIN)
}

/// Filter and order repositories for the dashboard.
pub fn arrange_repos<'a>(repos: &'a [Repo], filter: &RepoFilter, sort: RepoSort) -> Vec<&'a Repo> {
  let mut out: Vec<&Repo> = repos.iter().filter(|r| filter.matches(r)).collect();
  match sort {
    RepoSort::RecentActivity => out.sort_by_key(|r| Reverse(activity(r))),
    RepoSort::Name => out.sort_by(|a, b| a.slug.cmp(&b.slug)),
  }
  out
}

/// Most recently built repositories, newest first.
pub fn recent_repos(repos: &[Repo]) -> Vec<&Repo> {
  let mut out: Vec<&Repo> = repos.iter().filter(|r| r.build.is_some()).collect();
  out.sort_by_key(|r| Reverse(activity(r)));
  out.truncate(RECENT_REPOS);
  out
}

/// Distinct namespaces, sorted.
pub fn namespaces(repos: &[Repo]) -> Vec<String> {
  let mut out: Vec<String> = repos.iter().map(|r| r.namespace.clone()).collect();
  out.sort();
  out.dedup();
  out
}

/// Users ordered by login.
pub fn sorted_users(users: &[User]) -> Vec<&User> {
  let mut out: Vec<&User> = users.iter().collect();
  out.sort_by(|a, b| a.login.cmp(&b.login));
  out
}

/// First `pages` chunks of `items`.
pub fn page<T>(items: &[T], chunk: usize, pages: usize) -> &[T] {
  let end = chunk.saturating_mul(pages.max(1)).min(items.len());
  &items[..end]
}

pub fn timeout_label(minutes: i64) -> String {
  if minutes > 90 {
    if minutes % 60 == 0 {
      format!("{} hours", minutes / 60)
    } else {
      format!("{:.1} hours", minutes as f64 / 60.0)
    }
  } else {
    format!("{} minutes", minutes)
  }
}

/// Next timeout choice after `current`, wrapping around.
pub fn next_timeout(current: i64) -> i64 {
  TIMEOUTS
    .iter()
    .copied()
    .find(|t| *t > current)
    .unwrap_or(TIMEOUTS[0])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::Build;

  fn repo(slug: &str, active: bool, built: Option<i64>) -> Repo {
    let (namespace, name) = slug.split_once('/').unwrap();
    Repo {
      namespace: namespace.to_string(),
      name: name.to_string(),
      slug: slug.to_string(),
      active,
      build: built.map(|created| Build {
        created,
        ..Default::default()
      }),
      ..Default::default()
    }
  }

  fn slugs(repos: &[&Repo]) -> Vec<String> {
    repos.iter().map(|r| r.slug.clone()).collect()
  }

  fn sample() -> Vec<Repo> {
    vec![
      repo("octocat/hello", true, Some(100)),
      repo("octocat/spoon", false, None),
      repo("acme/api", true, Some(300)),
      repo("acme/web", true, Some(200)),
    ]
  }

  #[test]
  fn test_recent_activity_puts_unbuilt_last() {
    let repos = sample();
    let out = arrange_repos(&repos, &RepoFilter::default(), RepoSort::RecentActivity);
    assert_eq!(
      slugs(&out),
      vec!["acme/api", "acme/web", "octocat/hello", "octocat/spoon"]
    );
  }

  #[test]
  fn test_sort_by_name() {
    let repos = sample();
    let out = arrange_repos(&repos, &RepoFilter::default(), RepoSort::Name);
    assert_eq!(
      slugs(&out),
      vec!["acme/api", "acme/web", "octocat/hello", "octocat/spoon"]
    );
    assert_eq!(RepoSort::Name.toggled(), RepoSort::RecentActivity);
  }

  #[test]
  fn test_filters_combine() {
    let repos = sample();
    let filter = RepoFilter {
      active_only: true,
      namespace: Some("octocat".to_string()),
      text: String::new(),
    };
    assert_eq!(
      slugs(&arrange_repos(&repos, &filter, RepoSort::Name)),
      vec!["octocat/hello"]
    );

    let filter = RepoFilter {
      text: "we".to_string(),
      ..Default::default()
    };
    assert_eq!(
      slugs(&arrange_repos(&repos, &filter, RepoSort::Name)),
      vec!["acme/web"]
    );
  }

  #[test]
  fn test_recent_repos_only_built_and_capped() {
    let mut repos = sample();
    for i in 0..10 {
      repos.push(repo(&format!("bulk/r{}", i), true, Some(i)));
    }
    let recent = recent_repos(&repos);
    assert_eq!(recent.len(), RECENT_REPOS);
    assert_eq!(recent[0].slug, "acme/api");
    assert!(recent.iter().all(|r| r.build.is_some()));
  }

  #[test]
  fn test_namespaces_sorted_unique() {
    assert_eq!(namespaces(&sample()), vec!["acme", "octocat"]);
  }

  #[test]
  fn test_sorted_users() {
    let users: Vec<User> = ["carol", "alice", "bob"]
      .iter()
      .map(|login| User {
        login: login.to_string(),
        ..Default::default()
      })
      .collect();
    let logins: Vec<&str> = sorted_users(&users).iter().map(|u| u.login.as_str()).collect();
    assert_eq!(logins, vec!["alice", "bob", "carol"]);
  }

  #[test]
  fn test_page() {
    let items: Vec<u32> = (0..120).collect();
    assert_eq!(page(&items, REPOS_CHUNK_SIZE, 1).len(), 50);
    assert_eq!(page(&items, REPOS_CHUNK_SIZE, 2).len(), 100);
    assert_eq!(page(&items, REPOS_CHUNK_SIZE, 3).len(), 120);
    assert_eq!(page(&items, REPOS_CHUNK_SIZE, 0).len(), 50);
  }

  #[test]
  fn test_timeout_labels() {
    assert_eq!(timeout_label(30), "30 minutes");
    assert_eq!(timeout_label(90), "90 minutes");
    assert_eq!(timeout_label(120), "2 hours");
    assert_eq!(timeout_label(1440), "24 hours");
  }

  #[test]
  fn test_next_timeout_wraps() {
    assert_eq!(next_timeout(30), 60);
    assert_eq!(next_timeout(720), 1440);
    assert_eq!(next_timeout(1440), 30);
    assert_eq!(next_timeout(45), 60);
  }
}
