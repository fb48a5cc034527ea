mod branch_list;
mod cron_list;
mod repo_list;
mod repo_settings;
mod secret_list;
mod user_list;

pub use branch_list::BranchListView;
pub use cron_list::CronListView;
pub use repo_list::RepoListView;
pub use repo_settings::RepoSettingsView;
pub use secret_list::{SecretListView, SecretScope};
pub use user_list::UserListView;

use crate::cache::MutationError;
use crate::query::{Query, QueryState};
use crate::ui::components::{Form, FormEvent, KeyResult};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use std::future::Future;

/// What an open dialog wants from its view after a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DialogKey {
  /// Key consumed by the dialog
  Handled,
  /// Enter pressed; the view should read the form and submit
  Submit,
  /// Dialog dismissed
  Close,
}

/// A form waiting on the mutation it submitted.
///
/// Stays open with the error shown when the mutation fails, closes when
/// it succeeds.
pub(crate) struct FormDialog {
  pub form: Form,
  submission: Option<Query<()>>,
}

impl FormDialog {
  pub fn new(form: Form) -> Self {
    Self {
      form,
      submission: None,
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> DialogKey {
    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Submitted) => DialogKey::Submit,
      KeyResult::Event(FormEvent::Cancelled) => DialogKey::Close,
      _ => DialogKey::Handled,
    }
  }

  pub fn submit<F, Fut, T>(&mut self, run: F)
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, MutationError>> + Send + 'static,
    T: Send + 'static,
  {
    self.form.set_submitting();
    self.submission = Some(Query::start(move || {
      let fut = run();
      async move { fut.await.map(|_| ()).map_err(|e| e.to_string()) }
    }));
  }

  /// Returns true once the submission succeeded
  pub fn poll(&mut self) -> bool {
    let Some(submission) = self.submission.as_mut() else {
      return false;
    };
    if !submission.poll() {
      return false;
    }
    let outcome = match submission.state() {
      QueryState::Success(()) => Ok(()),
      QueryState::Error(e) => Err(e.clone()),
      _ => return false,
    };
    self.submission = None;
    match outcome {
      Ok(()) => true,
      Err(e) => {
        self.form.set_error(e);
        false
      }
    }
  }
}

/// Route a key to an open dialog. Clears `dialog` when it closes.
pub(crate) fn dialog_key(dialog: &mut Option<FormDialog>, key: KeyEvent) -> Option<DialogKey> {
  let outcome = dialog.as_mut()?.handle_key(key);
  if outcome == DialogKey::Close {
    *dialog = None;
  }
  Some(outcome)
}

/// Poll an open dialog's submission, closing it on success
pub(crate) fn poll_dialog(dialog: &mut Option<FormDialog>) {
  if dialog.as_mut().is_some_and(FormDialog::poll) {
    *dialog = None;
  }
}

pub(crate) fn list_block(title: String) -> Block<'static> {
  Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue))
}

/// Render a selectable list, or a hint paragraph when there are no rows
pub(crate) fn render_list(
  frame: &mut Frame,
  area: Rect,
  block: Block,
  items: Vec<ListItem>,
  empty_hint: &str,
  state: &mut ListState,
) {
  if items.is_empty() {
    let paragraph = Paragraph::new(empty_hint)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");
  frame.render_stateful_widget(list, area, state);
}

/// Message for an empty list: the fetch error if there is one
pub(crate) fn empty_hint(error: Option<&str>, loading: bool, nothing: &str) -> String {
  match error {
    Some(e) => format!("Failed to load: {}. Press 'r' to retry.", e),
    None if loading => "Loading...".to_string(),
    None => nothing.to_string(),
  }
}

/// j/k and arrow navigation shared by list views
pub(crate) fn handle_list_navigation(state: &mut ListState, key: KeyEvent) -> bool {
  match key.code {
    KeyCode::Char('j') | KeyCode::Down => state.select_next(),
    KeyCode::Char('k') | KeyCode::Up => state.select_previous(),
    KeyCode::Home => state.select_first(),
    KeyCode::End => state.select_last(),
    _ => return false,
  }
  true
}
