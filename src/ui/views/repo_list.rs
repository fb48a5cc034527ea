use crate::api::types::Repo;
use crate::api::Services;
use crate::cache::{ResourceKey, Subscription, ViewScope};
use crate::listing::{self, RepoFilter, RepoSort, REPOS_CHUNK_SIZE};
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{list_title, status_color, time_ago, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  empty_hint, handle_list_navigation, list_block, render_list, BranchListView, CronListView,
  RepoSettingsView, SecretListView, SecretScope,
};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{ListItem, ListState, Paragraph};

/// Dashboard: every repository the viewer can see, with its latest build
pub struct RepoListView {
  services: Services,
  repos: Subscription<Vec<Repo>>,
  scope: ViewScope,
  list_state: ListState,
  search: SearchInput,
  filter: RepoFilter,
  sort: RepoSort,
  pages: usize,
}

const PREF_ACTIVE_ONLY: &str = "repos.active_only";
const PREF_SORT: &str = "repos.sort";
const PREF_NAMESPACE: &str = "repos.namespace";

impl RepoListView {
  /// Filters and sort come back from the last session; an explicit
  /// `namespace` wins over the saved one.
  pub fn new(services: Services, namespace: Option<String>) -> Self {
    let repos = services.repos.subscribe(&ResourceKey::Repos);
    let active_only = services.preference(PREF_ACTIVE_ONLY).as_deref() == Some("true");
    let sort = services
      .preference(PREF_SORT)
      .and_then(|key| RepoSort::from_key(&key))
      .unwrap_or_default();
    let namespace = namespace.or_else(|| services.preference(PREF_NAMESPACE).filter(|ns| !ns.is_empty()));
    Self {
      services,
      repos,
      scope: ViewScope::new(),
      list_state: ListState::default(),
      search: SearchInput::new(),
      filter: RepoFilter {
        namespace,
        active_only,
        ..Default::default()
      },
      sort,
      pages: 1,
    }
  }

  fn save_preferences(&self) {
    let active_only = if self.filter.active_only { "true" } else { "false" };
    self.services.set_preference(PREF_ACTIVE_ONLY, active_only);
    self.services.set_preference(PREF_SORT, self.sort.key());
    self
      .services
      .set_preference(PREF_NAMESPACE, self.filter.namespace.as_deref().unwrap_or_default());
  }

  fn all(&self) -> &[Repo] {
    self.repos.value().map(|v| v.as_slice()).unwrap_or(&[])
  }

  /// Filtered, sorted, and paged rows as displayed
  fn rows(&self) -> Vec<&Repo> {
    let arranged = listing::arrange_repos(self.all(), &self.filter, self.sort);
    listing::page(&arranged, REPOS_CHUNK_SIZE, self.pages).to_vec()
  }

  fn selected(&self) -> Option<&Repo> {
    let idx = self.list_state.selected()?;
    self.rows().get(idx).copied()
  }

  /// Cycle None -> first namespace -> ... -> last -> None
  fn cycle_namespace(&mut self) {
    let namespaces = listing::namespaces(self.all());
    self.filter.namespace = match &self.filter.namespace {
      None => namespaces.first().cloned(),
      Some(current) => namespaces
        .iter()
        .position(|ns| ns == current)
        .and_then(|i| namespaces.get(i + 1))
        .cloned(),
    };
    self.pages = 1;
  }

  fn enable_selected(&self) {
    let Some(repo) = self.selected().filter(|r| !r.active) else {
      return;
    };
    let services = self.services.clone();
    let guard = self.scope.guard();
    let (namespace, name) = (repo.namespace.clone(), repo.name.clone());
    tokio::spawn(async move {
      let _ = services.enable_repo(&namespace, &name, &guard).await;
    });
  }

  fn sync(&self) {
    let services = self.services.clone();
    tokio::spawn(async move {
      let _ = services.sync_account().await;
    });
  }

  fn render_recent(&self, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled(" Recent: ", Style::default().fg(Color::DarkGray))];
    for repo in listing::recent_repos(self.all()) {
      let status = repo.build.as_ref().map(|b| b.status.as_str()).unwrap_or_default();
      spans.push(Span::styled("● ", Style::default().fg(status_color(status))));
      spans.push(Span::raw(format!("{}  ", repo.slug)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let now = Utc::now();
    let total = listing::arrange_repos(self.all(), &self.filter, self.sort).len();
    let rows = self.rows();
    let shown = rows.len();

    let items: Vec<ListItem> = rows
      .iter()
      .map(|repo| {
        let (status, number, branch, when) = match &repo.build {
          Some(build) => (
            build.status.as_str(),
            format!("#{}", build.number),
            build.target.as_str(),
            time_ago(build.created, now),
          ),
          None => ("", String::new(), "", "-".to_string()),
        };
        let slug_style = if repo.active {
          Style::default()
        } else {
          Style::default().fg(Color::DarkGray)
        };
        ListItem::new(Line::from(vec![
          Span::styled("● ", Style::default().fg(status_color(status))),
          Span::styled(format!("{:<40}", truncate(&repo.slug, 40)), slug_style),
          Span::styled(format!("{:<8}", number), Style::default().fg(Color::Cyan)),
          Span::styled(format!("{:<20}", truncate(branch, 20)), Style::default().fg(Color::Yellow)),
          Span::styled(when, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let mut title = list_title("Repositories", self.repos.current(), total);
    title.push_str(&format!("sort: {} ", self.sort.label()));
    if let Some(ns) = &self.filter.namespace {
      title.push_str(&format!("ns: {} ", ns));
    }
    if self.filter.active_only {
      title.push_str("active ");
    }
    if shown < total {
      title.push_str(&format!("showing {} <m> more ", shown));
    }

    let entry = self.repos.current();
    let hint = empty_hint(entry.error(), entry.is_loading, "No repositories found.");
    ensure_valid_selection(&mut self.list_state, shown);
    render_list(frame, area, list_block(title), items, &hint, &mut self.list_state);
  }

  // Key handling helpers for or_else chain pattern
  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.search.handle_key(key) {
      KeyResult::Handled | KeyResult::Event(SearchEvent::Submitted) => Some(ViewAction::None),
      KeyResult::Event(SearchEvent::Changed(text)) => {
        self.filter.text = text;
        self.pages = 1;
        Some(ViewAction::None)
      }
      KeyResult::NotHandled => None,
    }
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    handle_list_navigation(&mut self.list_state, key).then_some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let services = self.services.clone();
    let push = |view: Box<dyn crate::ui::view::View>| Some(ViewAction::Push(view));

    match key.code {
      KeyCode::Enter => {
        let repo = self.selected()?;
        push(Box::new(BranchListView::new(services, &repo.namespace, &repo.name)))
      }
      KeyCode::Char('s') => {
        let repo = self.selected()?;
        let scope = SecretScope::Repo {
          namespace: repo.namespace.clone(),
          name: repo.name.clone(),
        };
        push(Box::new(SecretListView::new(services, scope)))
      }
      KeyCode::Char('c') => {
        let repo = self.selected()?;
        push(Box::new(CronListView::new(services, &repo.namespace, &repo.name)))
      }
      KeyCode::Char('g') => {
        let repo = self.selected()?;
        push(Box::new(RepoSettingsView::new(services, &repo.namespace, &repo.name)))
      }
      KeyCode::Char('e') => {
        self.enable_selected();
        Some(ViewAction::None)
      }
      KeyCode::Char('a') => {
        self.filter.active_only = !self.filter.active_only;
        self.pages = 1;
        self.save_preferences();
        Some(ViewAction::None)
      }
      KeyCode::Char('o') => {
        self.sort = self.sort.toggled();
        self.save_preferences();
        Some(ViewAction::None)
      }
      KeyCode::Char('n') => {
        self.cycle_namespace();
        self.save_preferences();
        Some(ViewAction::None)
      }
      KeyCode::Char('m') => {
        self.pages += 1;
        Some(ViewAction::None)
      }
      KeyCode::Char('r') => {
        self.repos.revalidate();
        Some(ViewAction::None)
      }
      KeyCode::Char('S') => {
        self.sync();
        Some(ViewAction::None)
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

impl View for RepoListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(0)])
      .split(area);
    self.render_recent(frame, chunks[0]);
    self.render_list(frame, chunks[1]);
    self.search.render_overlay(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "Repositories".to_string()
  }

  fn tick(&mut self) {
    self.repos.poll();
  }

  fn resume(&mut self) {
    // Settings and enable/disable mark the list stale
    self.services.repos.get(&ResourceKey::Repos);
  }

  fn captures_input(&self) -> bool {
    self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "filter").with_priority(20),
      ShortcutInfo::new("enter", "branches").with_priority(30),
      ShortcutInfo::new("s", "secrets").with_priority(31),
      ShortcutInfo::new("c", "crons").with_priority(32),
      ShortcutInfo::new("g", "settings").with_priority(33),
      ShortcutInfo::new("a", "active").with_priority(40),
      ShortcutInfo::new("o", "sort").with_priority(41),
      ShortcutInfo::new("n", "namespace").with_priority(42),
      ShortcutInfo::new("S", "sync").with_priority(50),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;
  use crate::testing::{services, services_with_storage, settle, FakeRemote};
  use std::sync::Arc;
  use crossterm::event::KeyModifiers;
  use reqwest::Method;
  use serde_json::json;

  fn key(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
  }

  fn remote_with_repos() -> Arc<FakeRemote> {
    let remote = FakeRemote::new();
    remote.respond(
      Method::GET,
      "/api/user/repos?latest=true",
      Ok(json!([
        {"namespace": "octocat", "name": "hello", "slug": "octocat/hello", "active": true,
         "build": {"number": 4, "status": "success", "created": 100}},
        {"namespace": "acme", "name": "api", "slug": "acme/api", "active": false},
      ])),
    );
    remote
  }

  #[tokio::test]
  async fn test_loads_and_filters() {
    let remote = remote_with_repos();
    let (services, _) = services(&remote);
    let mut view = RepoListView::new(services, None);
    settle().await;
    view.tick();

    assert_eq!(view.rows().len(), 2);
    view.handle_key(key('a'));
    let slugs: Vec<&str> = view.rows().iter().map(|r| r.slug.as_str()).collect();
    assert_eq!(slugs, vec!["octocat/hello"]);
  }

  #[tokio::test]
  async fn test_namespace_cycle_wraps_to_all() {
    let remote = remote_with_repos();
    let (services, _) = services(&remote);
    let mut view = RepoListView::new(services, None);
    settle().await;
    view.tick();

    view.handle_key(key('n'));
    assert_eq!(view.filter.namespace.as_deref(), Some("acme"));
    view.handle_key(key('n'));
    assert_eq!(view.filter.namespace.as_deref(), Some("octocat"));
    view.handle_key(key('n'));
    assert_eq!(view.filter.namespace, None);
  }

  #[tokio::test]
  async fn test_filters_and_sort_survive_restart() {
    let remote = remote_with_repos();
    let storage = Arc::new(SqliteStorage::in_memory().expect("in-memory db"));
    let (services, _) = services_with_storage(&remote, storage);
    let mut view = RepoListView::new(services.clone(), None);
    settle().await;
    view.tick();

    view.handle_key(key('a'));
    view.handle_key(key('o'));
    view.handle_key(key('n'));
    drop(view);

    let restored = RepoListView::new(services.clone(), None);
    assert!(restored.filter.active_only);
    assert_eq!(restored.sort, RepoSort::Name);
    assert_eq!(restored.filter.namespace.as_deref(), Some("acme"));

    // A namespace given at startup wins over the saved one
    let overridden = RepoListView::new(services, Some("octocat".to_string()));
    assert_eq!(overridden.filter.namespace.as_deref(), Some("octocat"));
    assert!(overridden.filter.active_only);
  }

  #[tokio::test]
  async fn test_enter_pushes_branches() {
    let remote = remote_with_repos();
    let (services, _) = services(&remote);
    let mut view = RepoListView::new(services, None);
    settle().await;
    view.tick();
    let shown = view.rows().len();
    ensure_valid_selection(&mut view.list_state, shown);

    let action = view.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
    match action {
      ViewAction::Push(next) => assert_eq!(next.breadcrumb_label(), "octocat/hello"),
      _ => panic!("expected branch view"),
    }
  }

  #[tokio::test]
  async fn test_enable_inactive_repo() {
    let remote = remote_with_repos();
    remote.respond(
      Method::POST,
      "/api/repos/acme/api",
      Ok(json!({"namespace": "acme", "name": "api", "slug": "acme/api", "active": true})),
    );
    let (services, notify) = services(&remote);
    let mut view = RepoListView::new(services, None);
    settle().await;
    view.tick();

    view.list_state.select(Some(1));
    view.handle_key(key('e'));
    settle().await;

    assert_eq!(remote.count(Method::POST, "/api/repos/acme/api"), 1);
    assert_eq!(notify.successes(), vec!["Enabled repository acme/api"]);
  }

  #[tokio::test]
  async fn test_resume_refetches_stale_list() {
    let remote = remote_with_repos();
    let (services, _) = services(&remote);
    let mut view = RepoListView::new(services.clone(), None);
    settle().await;

    services.repos.invalidate(&ResourceKey::Repos);
    view.resume();
    settle().await;
    assert_eq!(remote.count(Method::GET, "/api/user/repos?latest=true"), 2);
  }
}
