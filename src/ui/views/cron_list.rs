use crate::api::types::{Cron, NewCron, DEFAULT_CRON_BRANCH};
use crate::api::Services;
use crate::cache::{ResourceKey, Subscription, ViewScope};
use crate::listing::CRON_PRESETS;
use crate::ui::components::Form;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{list_title, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  dialog_key, empty_hint, handle_list_navigation, list_block, poll_dialog, render_list, DialogKey,
  FormDialog,
};
use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{ListItem, ListState};

pub struct CronListView {
  services: Services,
  namespace: String,
  name: String,
  key: ResourceKey,
  crons: Subscription<Vec<Cron>>,
  scope: ViewScope,
  list_state: ListState,
  dialog: Option<FormDialog>,
}

/// Local wall-clock time of a unix timestamp, "-" when unset
fn format_time(timestamp: i64) -> String {
  DateTime::from_timestamp(timestamp, 0)
    .filter(|_| timestamp > 0)
    .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "-".to_string())
}

impl CronListView {
  pub fn new(services: Services, namespace: &str, name: &str) -> Self {
    let key = ResourceKey::crons(namespace, name);
    let crons = services.crons.cache().subscribe(&key);
    Self {
      services,
      namespace: namespace.to_string(),
      name: name.to_string(),
      key,
      crons,
      scope: ViewScope::new(),
      list_state: ListState::default(),
      dialog: None,
    }
  }

  fn rows(&self) -> &[Cron] {
    self.crons.value().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn open_form(&mut self) {
    let form = Form::new("New cron job")
      .text("name", "Name", "")
      .text("branch", "Branch", DEFAULT_CRON_BRANCH)
      .select("expr", "Schedule", CRON_PRESETS, "@daily");
    self.dialog = Some(FormDialog::new(form));
  }

  fn submit(&mut self) {
    let Some(dialog) = self.dialog.as_mut() else {
      return;
    };
    let input = NewCron {
      name: dialog.form.value("name").trim().to_string(),
      branch: dialog.form.value("branch").trim().to_string(),
      expr: dialog.form.value("expr").to_string(),
    };
    let services = self.services.clone();
    let (namespace, name) = (self.namespace.clone(), self.name.clone());
    let guard = self.scope.guard();
    dialog.submit(move || {
      let (services, namespace, name, guard, input) = (
        services.clone(),
        namespace.clone(),
        name.clone(),
        guard.clone(),
        input.clone(),
      );
      async move { services.add_cron(&namespace, &name, input, &guard).await }
    });
  }

  fn remove_selected(&self) {
    let Some(cron) = self.list_state.selected().and_then(|i| self.rows().get(i)) else {
      return;
    };
    let coordinator = self.services.crons.clone();
    let key = self.key.clone();
    let name = cron.name.clone();
    let guard = self.scope.guard();
    tokio::spawn(async move {
      let _ = coordinator.remove(&key, &name, &guard).await;
    });
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = self
      .rows()
      .iter()
      .map(|cron| {
        let name_style = if cron.disabled {
          Style::default().fg(Color::DarkGray)
        } else {
          Style::default().fg(Color::Cyan)
        };
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<24}", truncate(&cron.name, 24)), name_style),
          Span::styled(format!("{:<12}", cron.expr), Style::default().fg(Color::Yellow)),
          Span::raw(format!("{:<20}", truncate(&cron.branch, 20))),
          Span::styled(
            format!("next {}", format_time(cron.next)),
            Style::default().fg(Color::DarkGray),
          ),
        ]))
      })
      .collect();

    let count = items.len();
    let entry = self.crons.current();
    let title = list_title(
      &format!("Cron jobs of {}/{}", self.namespace, self.name),
      entry,
      count,
    );
    let hint = empty_hint(entry.error(), entry.is_loading, "No cron jobs. Press 'n' to add one.");
    ensure_valid_selection(&mut self.list_state, count);
    render_list(frame, area, list_block(title), items, &hint, &mut self.list_state);
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let outcome = dialog_key(&mut self.dialog, key)?;
    if outcome == DialogKey::Submit {
      self.submit();
    }
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('n') => self.open_form(),
      KeyCode::Char('d') | KeyCode::Delete => self.remove_selected(),
      KeyCode::Char('r') => self.crons.revalidate(),
      KeyCode::Char('q') | KeyCode::Esc => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for CronListView {
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
    "Cron jobs".to_string()
  }

  fn tick(&mut self) {
    self.crons.poll();
    poll_dialog(&mut self.dialog);
  }

  fn captures_input(&self) -> bool {
    self.dialog.is_some()
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

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{services, settle, FakeRemote};
  use crossterm::event::KeyModifiers;
  use reqwest::Method;
  use serde_json::json;

  const PATH: &str = "/api/repos/octocat/hello/cron";

  fn press(view: &mut CronListView, code: KeyCode) {
    view.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
  }

  #[tokio::test]
  async fn test_add_with_preset_schedule() {
    let remote = FakeRemote::new();
    remote.respond(Method::GET, PATH, Ok(json!([])));
    remote.respond(
      Method::POST,
      PATH,
      Ok(json!({"name": "nightly", "expr": "@weekly", "branch": "master"})),
    );
    let (services, notify) = services(&remote);
    let mut view = CronListView::new(services, "octocat", "hello");
    settle().await;

    press(&mut view, KeyCode::Char('n'));
    for c in "nightly".chars() {
      press(&mut view, KeyCode::Char(c));
    }
    // Clear the prefilled branch, it falls back to the default
    press(&mut view, KeyCode::Tab);
    for _ in 0..DEFAULT_CRON_BRANCH.len() {
      press(&mut view, KeyCode::Backspace);
    }
    press(&mut view, KeyCode::Tab);
    press(&mut view, KeyCode::Right);
    press(&mut view, KeyCode::Enter);
    settle().await;
    view.tick();

    assert!(view.dialog.is_none());
    assert_eq!(
      remote.last_body(Method::POST, PATH),
      Some(json!({"name": "nightly", "branch": "master", "expr": "@weekly"}))
    );
    assert_eq!(view.rows().len(), 1);
    assert_eq!(notify.successes(), vec!["Added cron job nightly"]);
  }

  #[test]
  fn test_format_time_unset() {
    assert_eq!(format_time(0), "-");
  }
}
