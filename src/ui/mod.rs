pub mod components;
pub mod feedback;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::ListState;
use renderfns::{draw_footer, draw_header, HeaderContext};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let viewer = app.viewer();
  let header = HeaderContext {
    title: app.title(),
    viewer: viewer.map(|u| u.login.as_str()),
    viewer_is_admin: viewer.map(|u| u.admin).unwrap_or(false),
  };
  draw_header(frame, chunks[0], &header, &app.shortcuts());
  draw_footer(frame, chunks[2], &app.breadcrumb(), app.toast());

  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[1]);
  }

  app.command_input().render_overlay(frame, chunks[1]);
  if let Some(modal) = app.confirm_modal() {
    modal.render(frame, chunks[1]);
  }
}

/// Keep a list selection inside `0..len`, selecting the first row of a
/// non-empty list when nothing is selected.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    None => state.select(Some(0)),
    Some(i) if i >= len => state.select(Some(len - 1)),
    Some(_) => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ensure_valid_selection() {
    let mut state = ListState::default();
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(0));

    state.select(Some(5));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));

    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);
  }
}
