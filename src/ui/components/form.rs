//! Modal form used for the add/edit dialogs.

use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::ui::renderfns::centered_rect;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// Enter pressed; read the values and submit
  Submitted,
  Cancelled,
}

#[derive(Debug, Clone)]
enum FieldKind {
  Text(TextInput),
  /// Text rendered as asterisks (secret values)
  Masked(TextInput),
  Toggle(bool),
  Select { options: Vec<String>, selected: usize },
}

#[derive(Debug, Clone)]
struct Field {
  key: &'static str,
  label: &'static str,
  kind: FieldKind,
}

#[derive(Debug, Clone)]
pub struct Form {
  title: String,
  fields: Vec<Field>,
  focus: usize,
  error: Option<String>,
  submitting: bool,
}

impl Form {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      fields: Vec::new(),
      focus: 0,
      error: None,
      submitting: false,
    }
  }

  pub fn text(mut self, key: &'static str, label: &'static str, value: &str) -> Self {
    self.push(key, label, FieldKind::Text(TextInput::with_value(value)));
    self
  }

  pub fn masked(mut self, key: &'static str, label: &'static str) -> Self {
    self.push(key, label, FieldKind::Masked(TextInput::new()));
    self
  }

  pub fn toggle(mut self, key: &'static str, label: &'static str, on: bool) -> Self {
    self.push(key, label, FieldKind::Toggle(on));
    self
  }

  /// Choice between `options`, starting at `current` when it is one of them
  pub fn select(
    mut self,
    key: &'static str,
    label: &'static str,
    options: &[&str],
    current: &str,
  ) -> Self {
    let selected = options.iter().position(|o| *o == current).unwrap_or(0);
    let options = options.iter().map(|o| o.to_string()).collect();
    self.push(key, label, FieldKind::Select { options, selected });
    self
  }

  fn push(&mut self, key: &'static str, label: &'static str, kind: FieldKind) {
    self.fields.push(Field { key, label, kind });
  }

  fn field(&self, key: &str) -> Option<&FieldKind> {
    self.fields.iter().find(|f| f.key == key).map(|f| &f.kind)
  }

  /// Text of a text, masked, or select field; empty for unknown keys
  pub fn value(&self, key: &str) -> &str {
    match self.field(key) {
      Some(FieldKind::Text(input)) | Some(FieldKind::Masked(input)) => input.value(),
      Some(FieldKind::Select { options, selected }) => {
        options.get(*selected).map(String::as_str).unwrap_or_default()
      }
      _ => "",
    }
  }

  pub fn is_on(&self, key: &str) -> bool {
    matches!(self.field(key), Some(FieldKind::Toggle(true)))
  }

  pub fn set_error(&mut self, error: impl Into<String>) {
    self.error = Some(error.into());
    self.submitting = false;
  }

  pub fn set_submitting(&mut self) {
    self.error = None;
    self.submitting = true;
  }

  #[cfg(test)]
  pub fn is_submitting(&self) -> bool {
    self.submitting
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    match key.code {
      KeyCode::Esc => return KeyResult::Event(FormEvent::Cancelled),
      // One submission at a time
      KeyCode::Enter if self.submitting => return KeyResult::Handled,
      KeyCode::Enter => return KeyResult::Event(FormEvent::Submitted),
      KeyCode::Tab | KeyCode::Down => {
        if !self.fields.is_empty() {
          self.focus = (self.focus + 1) % self.fields.len();
        }
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        if !self.fields.is_empty() {
          self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
        return KeyResult::Handled;
      }
      _ => {}
    }

    let Some(field) = self.fields.get_mut(self.focus) else {
      return KeyResult::NotHandled;
    };

    match &mut field.kind {
      FieldKind::Text(input) | FieldKind::Masked(input) => match input.handle_key(key) {
        InputResult::Consumed => KeyResult::Handled,
        _ => KeyResult::NotHandled,
      },
      FieldKind::Toggle(on) => match key.code {
        KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right => {
          *on = !*on;
          KeyResult::Handled
        }
        _ => KeyResult::NotHandled,
      },
      FieldKind::Select { options, selected } => {
        let len = options.len().max(1);
        match key.code {
          KeyCode::Char(' ') | KeyCode::Right => {
            *selected = (*selected + 1) % len;
            KeyResult::Handled
          }
          KeyCode::Left => {
            *selected = (*selected + len - 1) % len;
            KeyResult::Handled
          }
          _ => KeyResult::NotHandled,
        }
      }
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let height = self.fields.len() as u16 + 4;
    let overlay_area = centered_rect(60, height, area);
    frame.render_widget(Clear, overlay_area);

    let title = if self.submitting {
      format!(" {} (saving...) ", self.title)
    } else {
      format!(" {} ", self.title)
    };
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(title);

    let mut lines: Vec<Line> = self
      .fields
      .iter()
      .enumerate()
      .map(|(i, field)| {
        let focused = i == self.focus;
        let label_style = if focused {
          Style::default().fg(Color::Yellow).bold()
        } else {
          Style::default().fg(Color::DarkGray)
        };
        let value = match &field.kind {
          FieldKind::Text(input) => input.value().to_string(),
          FieldKind::Masked(input) => "*".repeat(input.value().chars().count()),
          FieldKind::Toggle(on) => if *on { "[x]" } else { "[ ]" }.to_string(),
          FieldKind::Select { options, selected } => {
            format!("< {} >", options.get(*selected).map(String::as_str).unwrap_or_default())
          }
        };
        let cursor = match field.kind {
          FieldKind::Text(_) | FieldKind::Masked(_) if focused => "_",
          _ => "",
        };
        Line::from(vec![
          Span::styled(format!("{:>14}: ", field.label), label_style),
          Span::raw(value),
          Span::styled(cursor, Style::default().fg(Color::Yellow)),
        ])
      })
      .collect();

    lines.push(Line::default());
    lines.push(match &self.error {
      Some(error) => Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))),
      None => Line::from(Span::styled(
        "Enter submit  Tab next  Esc cancel",
        Style::default().fg(Color::DarkGray),
      )),
    });

    frame.render_widget(Paragraph::new(lines).block(block), overlay_area);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_str(form: &mut Form, s: &str) {
    for c in s.chars() {
      form.handle_key(key(KeyCode::Char(c)));
    }
  }

  fn secret_form() -> Form {
    Form::new("New secret")
      .text("name", "Name", "")
      .masked("value", "Value")
      .toggle("pull_request", "Pull requests", false)
  }

  #[test]
  fn test_fill_and_submit() {
    let mut form = secret_form();
    type_str(&mut form, "token");
    form.handle_key(key(KeyCode::Tab));
    type_str(&mut form, "s3cr3t");
    form.handle_key(key(KeyCode::Tab));
    form.handle_key(key(KeyCode::Char(' ')));

    assert_eq!(
      form.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(FormEvent::Submitted)
    );
    assert_eq!(form.value("name"), "token");
    assert_eq!(form.value("value"), "s3cr3t");
    assert!(form.is_on("pull_request"));
  }

  #[test]
  fn test_focus_wraps_backwards() {
    let mut form = secret_form();
    form.handle_key(key(KeyCode::BackTab));
    form.handle_key(key(KeyCode::Char(' ')));
    assert!(form.is_on("pull_request"));
  }

  #[test]
  fn test_select_cycles_both_ways() {
    let mut form = Form::new("Settings").select("visibility", "Visibility", &["public", "private", "internal"], "private");
    assert_eq!(form.value("visibility"), "private");
    form.handle_key(key(KeyCode::Right));
    assert_eq!(form.value("visibility"), "internal");
    form.handle_key(key(KeyCode::Right));
    assert_eq!(form.value("visibility"), "public");
    form.handle_key(key(KeyCode::Left));
    assert_eq!(form.value("visibility"), "internal");
  }

  #[test]
  fn test_enter_ignored_while_submitting() {
    let mut form = secret_form();
    form.set_submitting();
    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::Handled);

    form.set_error("name is required");
    assert!(!form.is_submitting());
    assert_eq!(
      form.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(FormEvent::Submitted)
    );
  }

  #[test]
  fn test_escape_cancels() {
    let mut form = secret_form();
    assert_eq!(
      form.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(FormEvent::Cancelled)
    );
  }
}
