use crate::api::types::{Repo, RepoSettings, VISIBILITIES};
use crate::api::Services;
use crate::cache::{CacheSource, ResourceKey, Subscription, ViewScope};
use crate::listing::{next_timeout, timeout_label};
use crate::query::Query;
use crate::ui::components::Form;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::list_title;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  dialog_key, empty_hint, handle_list_navigation, list_block, poll_dialog, render_list, DialogKey,
  FormDialog,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{ListItem, ListState};

/// One editable row of the settings list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setting {
  Protected,
  Trusted,
  IgnoreForks,
  IgnorePullRequests,
  AutoCancelPullRequests,
  AutoCancelPushes,
  AutoCancelRunning,
  Timeout,
  Visibility,
  ConfigPath,
}

const SETTINGS: &[Setting] = &[
  Setting::Protected,
  Setting::Trusted,
  Setting::IgnoreForks,
  Setting::IgnorePullRequests,
  Setting::AutoCancelPullRequests,
  Setting::AutoCancelPushes,
  Setting::AutoCancelRunning,
  Setting::Timeout,
  Setting::Visibility,
  Setting::ConfigPath,
];

impl Setting {
  fn label(self) -> &'static str {
    match self {
      Self::Protected => "Protected",
      Self::Trusted => "Trusted",
      Self::IgnoreForks => "Disable forks",
      Self::IgnorePullRequests => "Disable pull requests",
      Self::AutoCancelPullRequests => "Auto cancel pull requests",
      Self::AutoCancelPushes => "Auto cancel pushes",
      Self::AutoCancelRunning => "Auto cancel running",
      Self::Timeout => "Timeout",
      Self::Visibility => "Visibility",
      Self::ConfigPath => "Configuration",
    }
  }

  fn display(self, s: &RepoSettings) -> String {
    let flag = |on: bool| if on { "[x]" } else { "[ ]" }.to_string();
    match self {
      Self::Protected => flag(s.protected),
      Self::Trusted => flag(s.trusted),
      Self::IgnoreForks => flag(s.ignore_forks),
      Self::IgnorePullRequests => flag(s.ignore_pull_requests),
      Self::AutoCancelPullRequests => flag(s.auto_cancel_pull_requests),
      Self::AutoCancelPushes => flag(s.auto_cancel_pushes),
      Self::AutoCancelRunning => flag(s.auto_cancel_running),
      Self::Timeout => timeout_label(s.timeout),
      Self::Visibility => s.visibility.clone(),
      Self::ConfigPath => s.config_path.clone(),
    }
  }

  fn is_enabled(self, s: &RepoSettings) -> bool {
    self != Self::AutoCancelRunning || s.can_auto_cancel_running()
  }

  /// Toggle a flag or step to the next choice. Returns false for text rows.
  fn advance(self, s: &mut RepoSettings) -> bool {
    match self {
      Self::Protected => s.protected = !s.protected,
      Self::Trusted => s.trusted = !s.trusted,
      Self::IgnoreForks => s.ignore_forks = !s.ignore_forks,
      Self::IgnorePullRequests => s.ignore_pull_requests = !s.ignore_pull_requests,
      Self::AutoCancelPullRequests => s.toggle_auto_cancel_pull_requests(),
      Self::AutoCancelPushes => s.toggle_auto_cancel_pushes(),
      Self::AutoCancelRunning => s.toggle_auto_cancel_running(),
      Self::Timeout => s.timeout = next_timeout(s.timeout),
      Self::Visibility => {
        let idx = VISIBILITIES
          .iter()
          .position(|v| *v == s.visibility)
          .map(|i| (i + 1) % VISIBILITIES.len())
          .unwrap_or(0);
        s.visibility = VISIBILITIES[idx].to_string();
      }
      Self::ConfigPath => return false,
    }
    true
  }
}

/// Edit the settings of one repository, and enable or disable it
pub struct RepoSettingsView {
  services: Services,
  namespace: String,
  name: String,
  repo: Subscription<Repo>,
  scope: ViewScope,
  /// Local edits; None until the repository is loaded
  draft: Option<RepoSettings>,
  dirty: bool,
  list_state: ListState,
  dialog: Option<FormDialog>,
  save: Option<Query<Repo>>,
}

impl RepoSettingsView {
  pub fn new(services: Services, namespace: &str, name: &str) -> Self {
    let repo = services.repo.cache().subscribe(&ResourceKey::repo(namespace, name));
    let mut view = Self {
      services,
      namespace: namespace.to_string(),
      name: name.to_string(),
      repo,
      scope: ViewScope::new(),
      draft: None,
      dirty: false,
      list_state: ListState::default(),
      dialog: None,
      save: None,
    };
    view.sync_draft();
    view
  }

  fn slug(&self) -> String {
    format!("{}/{}", self.namespace, self.name)
  }

  /// Reset the draft from the cached repository unless there are unsaved edits
  fn sync_draft(&mut self) {
    if self.dirty {
      return;
    }
    let entry = self.repo.current();
    if entry.source == CacheSource::Empty {
      return;
    }
    self.draft = entry.value().map(RepoSettings::from_repo);
  }

  fn is_active(&self) -> bool {
    self.repo.value().is_some_and(|r| r.active)
  }

  fn selected(&self) -> Option<Setting> {
    self.list_state.selected().and_then(|i| SETTINGS.get(i).copied())
  }

  fn advance_selected(&mut self) {
    let (Some(setting), Some(draft)) = (self.selected(), self.draft.as_mut()) else {
      return;
    };
    if setting.advance(draft) {
      self.dirty = true;
    } else {
      let form = Form::new("Configuration file").text("config_path", "Path", &draft.config_path);
      self.dialog = Some(FormDialog::new(form));
    }
  }

  fn apply_config_path(&mut self) {
    let (Some(dialog), Some(draft)) = (self.dialog.take(), self.draft.as_mut()) else {
      return;
    };
    draft.config_path = dialog.form.value("config_path").trim().to_string();
    self.dirty = true;
  }

  fn save(&mut self) {
    let Some(settings) = self.draft.clone() else {
      return;
    };
    let services = self.services.clone();
    let (namespace, name) = (self.namespace.clone(), self.name.clone());
    let guard = self.scope.guard();
    self.save = Some(Query::start(move || {
      let (services, namespace, name, guard, settings) = (
        services.clone(),
        namespace.clone(),
        name.clone(),
        guard.clone(),
        settings.clone(),
      );
      async move {
        services
          .save_repo_settings(&namespace, &name, &settings, &guard)
          .await
          .map_err(|e| e.to_string())
      }
    }));
  }

  fn set_enabled(&self, enable: bool) {
    if enable == self.is_active() {
      return;
    }
    let services = self.services.clone();
    let (namespace, name) = (self.namespace.clone(), self.name.clone());
    let guard = self.scope.guard();
    tokio::spawn(async move {
      if enable {
        let _ = services.enable_repo(&namespace, &name, &guard).await;
      } else {
        let _ = services.disable_repo(&namespace, &name, &guard).await;
      }
    });
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = match &self.draft {
      Some(draft) => SETTINGS
        .iter()
        .map(|setting| {
          let style = if setting.is_enabled(draft) {
            Style::default()
          } else {
            Style::default().fg(Color::DarkGray)
          };
          ListItem::new(Line::from(vec![
            Span::styled(format!("{:<28}", setting.label()), style),
            Span::styled(setting.display(draft), Style::default().fg(Color::Yellow)),
          ]))
        })
        .collect(),
      None => Vec::new(),
    };

    let entry = self.repo.current();
    let mut title = list_title(&format!("Settings of {}", self.slug()), entry, SETTINGS.len());
    if self.repo.value().is_some() && !self.is_active() {
      title.push_str("(inactive) ");
    }
    if self.dirty {
      title.push_str("* unsaved ");
    }
    if self.save.is_some() {
      title.push_str("(saving...) ");
    }
    let hint = empty_hint(entry.error(), entry.is_loading, "Repository not found.");
    let count = items.len();
    ensure_valid_selection(&mut self.list_state, count);
    render_list(frame, area, list_block(title), items, &hint, &mut self.list_state);
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let outcome = dialog_key(&mut self.dialog, key)?;
    if outcome == DialogKey::Submit {
      self.apply_config_path();
    }
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char(' ') | KeyCode::Enter => self.advance_selected(),
      KeyCode::Char('w') => self.save(),
      KeyCode::Char('u') => {
        // Drop local edits
        self.dirty = false;
        self.sync_draft();
      }
      KeyCode::Char('E') => self.set_enabled(true),
      KeyCode::Char('D') => self.set_enabled(false),
      KeyCode::Char('r') => self.repo.revalidate(),
      KeyCode::Char('q') | KeyCode::Esc => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for RepoSettingsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| handle_list_navigation(&mut self.list_state, key).then_some(ViewAction::None))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    if let Some(dialog) = &self.dialog {
      dialog.form.render_overlay(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Settings".to_string()
  }

  fn tick(&mut self) {
    if let Some(save) = self.save.as_mut() {
      if save.poll() {
        // On failure the toast already reported it; keep the edits
        if save.data().is_some() {
          self.dirty = false;
        }
        self.save = None;
      }
    }
    if self.repo.poll() {
      self.sync_draft();
    }
    poll_dialog(&mut self.dialog);
  }

  fn captures_input(&self) -> bool {
    self.dialog.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("space", "change").with_priority(10),
      ShortcutInfo::new("w", "save").with_priority(20),
      ShortcutInfo::new("u", "undo").with_priority(25),
      ShortcutInfo::new("E", "enable").with_priority(30),
      ShortcutInfo::new("D", "disable").with_priority(31),
      ShortcutInfo::new("q", "back").with_priority(40),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{services, settle, FakeRemote};
  use crossterm::event::KeyModifiers;
  use reqwest::Method;
  use serde_json::json;

  const PATH: &str = "/api/repos/octocat/hello";

  fn press(view: &mut RepoSettingsView, code: KeyCode) {
    view.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
  }

  fn repo_json(active: bool) -> serde_json::Value {
    json!({
      "namespace": "octocat", "name": "hello", "slug": "octocat/hello", "active": active,
      "visibility": "private", "timeout": 60, "config_path": ".drone.yml",
    })
  }

  async fn loaded(remote: &std::sync::Arc<FakeRemote>) -> (RepoSettingsView, std::sync::Arc<crate::testing::RecordingNotify>) {
    let (services, notify) = services(remote);
    let mut view = RepoSettingsView::new(services, "octocat", "hello");
    settle().await;
    view.tick();
    ensure_valid_selection(&mut view.list_state, SETTINGS.len());
    (view, notify)
  }

  #[tokio::test]
  async fn test_running_needs_another_auto_cancel() {
    let remote = FakeRemote::new();
    remote.respond(Method::GET, PATH, Ok(repo_json(true)));
    let (mut view, _) = loaded(&remote).await;

    view.list_state.select(Some(6));
    press(&mut view, KeyCode::Char(' '));
    assert!(!view.draft.as_ref().unwrap().auto_cancel_running);

    view.list_state.select(Some(5));
    press(&mut view, KeyCode::Char(' '));
    view.list_state.select(Some(6));
    press(&mut view, KeyCode::Char(' '));
    assert!(view.draft.as_ref().unwrap().auto_cancel_running);
    assert!(view.dirty);
  }

  #[tokio::test]
  async fn test_save_sends_patch_and_clears_dirty() {
    let remote = FakeRemote::new();
    remote.respond(Method::GET, PATH, Ok(repo_json(true)));
    let mut saved = repo_json(true);
    saved["trusted"] = json!(true);
    remote.respond(Method::PATCH, PATH, Ok(saved));
    let (mut view, notify) = loaded(&remote).await;

    view.list_state.select(Some(1));
    press(&mut view, KeyCode::Char(' '));
    press(&mut view, KeyCode::Char('w'));
    settle().await;
    view.tick();

    let body = remote.last_body(Method::PATCH, PATH).unwrap();
    assert_eq!(body["trusted"], json!(true));
    assert_eq!(body["timeout"], json!(60));
    assert!(!view.dirty);
    assert!(view.draft.as_ref().unwrap().trusted);
    assert_eq!(notify.successes(), vec!["Saved repository settings"]);
  }

  #[tokio::test]
  async fn test_config_path_edit() {
    let remote = FakeRemote::new();
    remote.respond(Method::GET, PATH, Ok(repo_json(true)));
    let (mut view, _) = loaded(&remote).await;

    view.list_state.select(Some(9));
    press(&mut view, KeyCode::Enter);
    assert!(view.captures_input());
    for _ in 0..3 {
      press(&mut view, KeyCode::Backspace);
    }
    for c in "yaml".chars() {
      press(&mut view, KeyCode::Char(c));
    }
    press(&mut view, KeyCode::Enter);

    assert!(!view.captures_input());
    assert_eq!(view.draft.as_ref().unwrap().config_path, ".drone.yaml");
  }

  #[tokio::test]
  async fn test_disable_confirms_and_refetches() {
    let remote = FakeRemote::new();
    remote.respond(Method::GET, PATH, Ok(repo_json(true)));
    remote.respond(Method::DELETE, PATH, Ok(json!(null)));
    let (mut view, notify) = loaded(&remote).await;

    remote.respond(Method::GET, PATH, Ok(repo_json(false)));
    press(&mut view, KeyCode::Char('D'));
    settle().await;
    view.tick();

    assert_eq!(notify.successes(), vec!["Disabled repository octocat/hello"]);
    assert!(!view.is_active());
  }
}
