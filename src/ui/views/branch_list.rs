use crate::api::types::Build;
use crate::api::Services;
use crate::cache::{ResourceKey, Subscription};
use crate::ui::components::{KeyResult, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{list_title, status_color, time_ago, truncate};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{empty_hint, handle_list_navigation, list_block, render_list};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{ListItem, ListState};

/// Latest build of every branch of one repository
pub struct BranchListView {
  slug: String,
  builds: Subscription<Vec<Build>>,
  list_state: ListState,
  search: SearchInput,
}

impl BranchListView {
  pub fn new(services: Services, namespace: &str, name: &str) -> Self {
    let builds = services.branches.subscribe(&ResourceKey::branches(namespace, name));
    Self {
      slug: format!("{}/{}", namespace, name),
      builds,
      list_state: ListState::default(),
      search: SearchInput::new(),
    }
  }

  fn rows(&self) -> Vec<&Build> {
    let text = self.search.query().trim();
    self
      .builds
      .value()
      .map(|v| v.iter().filter(|b| b.target.contains(text)).collect())
      .unwrap_or_default()
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let now = Utc::now();
    let items: Vec<ListItem> = self
      .rows()
      .iter()
      .map(|build| {
        ListItem::new(Line::from(vec![
          Span::styled("● ", Style::default().fg(status_color(&build.status))),
          Span::styled(
            format!("{:<24}", truncate(&build.target, 24)),
            Style::default().fg(Color::Yellow),
          ),
          Span::styled(format!("#{:<7}", build.number), Style::default().fg(Color::Cyan)),
          Span::raw(format!("{:<48}", truncate(build.message.lines().next().unwrap_or_default(), 48))),
          Span::styled(
            format!("{:<16}", truncate(&build.author_login, 16)),
            Style::default().fg(Color::White),
          ),
          Span::styled(time_ago(build.created, now), Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let count = items.len();
    let entry = self.builds.current();
    let title = list_title(&format!("Branches of {}", self.slug), entry, count);
    let hint = empty_hint(entry.error(), entry.is_loading, "No branches built yet.");
    ensure_valid_selection(&mut self.list_state, count);
    render_list(frame, area, list_block(title), items, &hint, &mut self.list_state);
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.search.handle_key(key) {
      KeyResult::NotHandled => None,
      _ => Some(ViewAction::None),
    }
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('r') => {
        self.builds.revalidate();
        Some(ViewAction::None)
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

impl View for BranchListView {
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
  }

  fn breadcrumb_label(&self) -> String {
    self.slug.clone()
  }

  fn tick(&mut self) {
    self.builds.poll();
  }

  fn captures_input(&self) -> bool {
    self.search.is_active()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{services, settle, FakeRemote};
  use crossterm::event::KeyModifiers;
  use reqwest::Method;
  use serde_json::json;

  #[tokio::test]
  async fn test_filter_by_branch() {
    let remote = FakeRemote::new();
    remote.respond(
      Method::GET,
      "/api/repos/octocat/hello/branches",
      Ok(json!([
        {"number": 3, "status": "success", "target": "main"},
        {"number": 2, "status": "failure", "target": "feature/login"},
      ])),
    );
    let (services, _) = services(&remote);
    let mut view = BranchListView::new(services, "octocat", "hello");
    settle().await;
    view.tick();
    assert_eq!(view.rows().len(), 2);

    for c in "/feat".chars() {
      view.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
    }
    assert!(view.captures_input());
    let targets: Vec<&str> = view.rows().iter().map(|b| b.target.as_str()).collect();
    assert_eq!(targets, vec!["feature/login"]);
  }
}
