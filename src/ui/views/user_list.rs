use crate::api::types::{NewUser, User};
use crate::api::Services;
use crate::cache::{ResourceKey, Subscription, ViewScope};
use crate::listing::{self, USERS_CHUNK_SIZE};
use crate::ui::components::{Form, KeyResult, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{list_title, time_ago, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  dialog_key, empty_hint, handle_list_navigation, list_block, poll_dialog, render_list, DialogKey,
  FormDialog,
};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{ListItem, ListState};

/// Admin panel listing every user of the server
pub struct UserListView {
  services: Services,
  users: Subscription<Vec<User>>,
  scope: ViewScope,
  list_state: ListState,
  search: SearchInput,
  dialog: Option<FormDialog>,
  pages: usize,
}

impl UserListView {
  pub fn new(services: Services) -> Self {
    let users = services.users.cache().subscribe(&ResourceKey::Users);
    Self {
      services,
      users,
      scope: ViewScope::new(),
      list_state: ListState::default(),
      search: SearchInput::new(),
      dialog: None,
      pages: 1,
    }
  }

  fn matching(&self) -> Vec<&User> {
    let text = self.search.query().trim();
    let all = self.users.value().map(|v| v.as_slice()).unwrap_or(&[]);
    listing::sorted_users(all)
      .into_iter()
      .filter(|u| u.login.contains(text) || u.email.contains(text))
      .collect()
  }

  fn rows(&self) -> Vec<&User> {
    listing::page(&self.matching(), USERS_CHUNK_SIZE, self.pages).to_vec()
  }

  fn selected(&self) -> Option<&User> {
    let idx = self.list_state.selected()?;
    self.rows().get(idx).copied()
  }

  fn open_form(&mut self) {
    let form = Form::new("New user")
      .text("login", "Login", "")
      .text("email", "Email", "")
      .toggle("admin", "Admin", false)
      .toggle("machine", "Machine", false);
    self.dialog = Some(FormDialog::new(form));
  }

  fn submit(&mut self) {
    let Some(dialog) = self.dialog.as_mut() else {
      return;
    };
    let input = NewUser {
      login: dialog.form.value("login").trim().to_string(),
      email: dialog.form.value("email").trim().to_string(),
      admin: dialog.form.is_on("admin"),
      machine: dialog.form.is_on("machine"),
    };
    let coordinator = self.services.users.clone();
    let guard = self.scope.guard();
    dialog.submit(move || {
      let (coordinator, guard, input) = (coordinator.clone(), guard.clone(), input.clone());
      async move { coordinator.add(&ResourceKey::Users, &input, &guard).await }
    });
  }

  fn remove_selected(&self) {
    let Some(login) = self.selected().map(|u| u.login.clone()) else {
      return;
    };
    let coordinator = self.services.users.clone();
    let guard = self.scope.guard();
    tokio::spawn(async move {
      let _ = coordinator.remove(&ResourceKey::Users, &login, &guard).await;
    });
  }

  fn toggle_admin(&self) {
    let Some((login, admin)) = self.selected().map(|u| (u.login.clone(), !u.admin)) else {
      return;
    };
    let services = self.services.clone();
    let guard = self.scope.guard();
    tokio::spawn(async move {
      let _ = services.set_admin(&login, admin, &guard).await;
    });
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let now = Utc::now();
    let total = self.matching().len();
    let items: Vec<ListItem> = self
      .rows()
      .iter()
      .map(|user| {
        let mut badges = Vec::new();
        if user.admin {
          badges.push("admin");
        }
        if user.machine {
          badges.push("machine");
        }
        if !user.active {
          badges.push("inactive");
        }
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<24}", truncate(&user.login, 24)), Style::default().fg(Color::Cyan)),
          Span::raw(format!("{:<36}", truncate(&user.email, 36))),
          Span::styled(format!("{:<24}", badges.join(",")), Style::default().fg(Color::Magenta)),
          Span::styled(
            format!("last login {}", time_ago(user.last_login, now)),
            Style::default().fg(Color::DarkGray),
          ),
        ]))
      })
      .collect();

    let shown = items.len();
    let entry = self.users.current();
    let mut title = list_title("Users", entry, total);
    if shown < total {
      title.push_str(&format!("showing {} <m> more ", shown));
    }
    let hint = empty_hint(entry.error(), entry.is_loading, "No users.");
    ensure_valid_selection(&mut self.list_state, shown);
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
      KeyCode::Char('a') => self.toggle_admin(),
      KeyCode::Char('m') => self.pages += 1,
      KeyCode::Char('r') => self.users.revalidate(),
      KeyCode::Char('q') | KeyCode::Esc => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for UserListView {
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
    "Users".to_string()
  }

  fn tick(&mut self) {
    self.users.poll();
    poll_dialog(&mut self.dialog);
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.dialog.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("/", "filter").with_priority(5),
      ShortcutInfo::new("n", "new").with_priority(10),
      ShortcutInfo::new("a", "admin").with_priority(15),
      ShortcutInfo::new("d", "delete").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(30),
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

  fn press(view: &mut UserListView, code: KeyCode) {
    view.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
  }

  fn remote_with_users() -> std::sync::Arc<FakeRemote> {
    let remote = FakeRemote::new();
    remote.respond(
      Method::GET,
      "/api/users",
      Ok(json!([
        {"login": "carol", "email": "carol@example.com"},
        {"login": "alice", "email": "alice@example.com", "admin": true},
      ])),
    );
    remote
  }

  #[tokio::test]
  async fn test_rows_sorted_by_login() {
    let remote = remote_with_users();
    let (services, _) = services(&remote);
    let mut view = UserListView::new(services);
    settle().await;
    view.tick();

    let logins: Vec<&str> = view.rows().iter().map(|u| u.login.as_str()).collect();
    assert_eq!(logins, vec!["alice", "carol"]);
  }

  #[tokio::test]
  async fn test_toggle_admin_patches_and_refetches() {
    let remote = remote_with_users();
    remote.respond(Method::PATCH, "/api/users/carol", Ok(json!({"login": "carol", "admin": true})));
    let (services, notify) = services(&remote);
    let mut view = UserListView::new(services);
    settle().await;
    view.tick();

    view.list_state.select(Some(1));
    press(&mut view, KeyCode::Char('a'));
    settle().await;

    assert_eq!(
      remote.last_body(Method::PATCH, "/api/users/carol"),
      Some(json!({"admin": true}))
    );
    assert_eq!(remote.count(Method::GET, "/api/users"), 2);
    assert_eq!(notify.successes(), vec!["Updated user carol"]);
  }

  #[tokio::test]
  async fn test_invalid_email_stays_in_form() {
    let remote = remote_with_users();
    let (services, notify) = services(&remote);
    let mut view = UserListView::new(services);
    settle().await;

    press(&mut view, KeyCode::Char('n'));
    for c in "dave".chars() {
      press(&mut view, KeyCode::Char(c));
    }
    press(&mut view, KeyCode::Tab);
    for c in "dave.example.com".chars() {
      press(&mut view, KeyCode::Char(c));
    }
    press(&mut view, KeyCode::Enter);
    settle().await;
    view.tick();

    assert!(view.dialog.is_some());
    assert_eq!(remote.count(Method::POST, "/api/users"), 0);
    assert_eq!(notify.errors(), vec!["Unable to add user: email must be an email address"]);
  }
}
