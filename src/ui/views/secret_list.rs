use crate::api::types::{NewSecret, Secret};
use crate::api::Services;
use crate::cache::{MutationCoordinator, ResourceKey, Subscription, ViewScope};
use crate::ui::components::{Form, KeyResult, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{list_title, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  dialog_key, empty_hint, handle_list_navigation, list_block, poll_dialog, render_list, DialogKey,
  FormDialog,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{ListItem, ListState};

/// Whose secrets a [`SecretListView`] manages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretScope {
  Repo { namespace: String, name: String },
  Org { namespace: String },
}

impl SecretScope {
  fn key(&self) -> ResourceKey {
    match self {
      Self::Repo { namespace, name } => ResourceKey::secrets(namespace, name),
      Self::Org { namespace } => ResourceKey::org_secrets(namespace),
    }
  }

  fn label(&self) -> String {
    match self {
      Self::Repo { namespace, name } => format!("Secrets of {}/{}", namespace, name),
      Self::Org { namespace } => format!("Organization secrets of {}", namespace),
    }
  }
}

pub struct SecretListView {
  scope: SecretScope,
  key: ResourceKey,
  coordinator: MutationCoordinator<Vec<Secret>>,
  secrets: Subscription<Vec<Secret>>,
  view_scope: ViewScope,
  list_state: ListState,
  search: SearchInput,
  dialog: Option<FormDialog>,
}

impl SecretListView {
  pub fn new(services: Services, scope: SecretScope) -> Self {
    let coordinator = match scope {
      SecretScope::Repo { .. } => services.secrets.clone(),
      SecretScope::Org { .. } => services.org_secrets.clone(),
    };
    let key = scope.key();
    let secrets = coordinator.cache().subscribe(&key);
    Self {
      scope,
      key,
      coordinator,
      secrets,
      view_scope: ViewScope::new(),
      list_state: ListState::default(),
      search: SearchInput::new(),
      dialog: None,
    }
  }

  fn rows(&self) -> Vec<&Secret> {
    let text = self.search.query().trim();
    self
      .secrets
      .value()
      .map(|v| v.iter().filter(|s| s.name.contains(text)).collect())
      .unwrap_or_default()
  }

  fn selected_name(&self) -> Option<String> {
    let idx = self.list_state.selected()?;
    self.rows().get(idx).map(|s| s.name.clone())
  }

  fn open_form(&mut self) {
    let form = Form::new("New secret")
      .text("name", "Name", "")
      .masked("value", "Value")
      .toggle("pull_request", "Pull requests", false);
    self.dialog = Some(FormDialog::new(form));
  }

  fn submit(&mut self) {
    let Some(dialog) = self.dialog.as_mut() else {
      return;
    };
    let input = NewSecret {
      name: dialog.form.value("name").trim().to_string(),
      data: dialog.form.value("value").to_string(),
      pull_request: dialog.form.is_on("pull_request"),
    };
    let coordinator = self.coordinator.clone();
    let key = self.key.clone();
    let guard = self.view_scope.guard();
    dialog.submit(move || {
      let (coordinator, key, guard, input) =
        (coordinator.clone(), key.clone(), guard.clone(), input.clone());
      async move { coordinator.add(&key, &input, &guard).await }
    });
  }

  fn remove_selected(&self) {
    let Some(name) = self.selected_name() else {
      return;
    };
    let coordinator = self.coordinator.clone();
    let key = self.key.clone();
    let guard = self.view_scope.guard();
    tokio::spawn(async move {
      let _ = coordinator.remove(&key, &name, &guard).await;
    });
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = self
      .rows()
      .iter()
      .map(|secret| {
        let pr = if secret.pull_request { "pull requests" } else { "" };
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<40}", truncate(&secret.name, 40)), Style::default().fg(Color::Cyan)),
          Span::styled(pr, Style::default().fg(Color::Yellow)),
        ]))
      })
      .collect();

    let count = items.len();
    let entry = self.secrets.current();
    let title = list_title(&self.scope.label(), entry, count);
    let hint = empty_hint(entry.error(), entry.is_loading, "No secrets. Press 'n' to add one.");
    ensure_valid_selection(&mut self.list_state, count);
    render_list(frame, area, list_block(title), items, &hint, &mut self.list_state);
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    if let Some(outcome) = dialog_key(&mut self.dialog, key) {
      if outcome == DialogKey::Submit {
        self.submit();
      }
      return Some(ViewAction::None);
    }
    match self.search.handle_key(key) {
      KeyResult::NotHandled => None,
      _ => Some(ViewAction::None),
    }
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('n') => self.open_form(),
      KeyCode::Char('d') | KeyCode::Delete => self.remove_selected(),
      KeyCode::Char('r') => self.secrets.revalidate(),
      KeyCode::Char('q') | KeyCode::Esc => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for SecretListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| handle_list_navigation(&mut self.list_state, key).then_some(ViewAction::None))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.search.render_overlay(frame, area);
    if let Some(dialog) = &self.dialog {
      dialog.form.render_overlay(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    match &self.scope {
      SecretScope::Repo { .. } => "Secrets".to_string(),
      SecretScope::Org { namespace } => format!("Secrets ({})", namespace),
    }
  }

  fn tick(&mut self) {
    self.secrets.poll();
    poll_dialog(&mut self.dialog);
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.dialog.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("n", "new").with_priority(10),
      ShortcutInfo::new("d", "delete").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(40),
    ]
  }
}
