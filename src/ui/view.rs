use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// Key hint rendered in the header, lowest priority first
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8,
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// What the app should do with the view stack after a key press
pub enum ViewAction {
  None,
  /// Drill down into another view
  Push(Box<dyn View>),
  /// Leave this view; at the root this quits
  Pop,
}

/// One screen of the navigation stack.
///
/// Views handle their own input modes (filter, forms) and return actions
/// for the App to execute: App → View → Components.
///
/// A view reads its list through a cache subscription and drains it in
/// `tick()`. Dropping the view drops the subscription and its scope, so
/// mutations it started finish silently.
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Segment shown in the footer breadcrumb
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to poll subscriptions and pending submissions
  fn tick(&mut self) {}

  /// Called when the view is back on top after the one above it was popped
  fn resume(&mut self) {}

  /// True while a text field has focus and plain keys must reach it
  fn captures_input(&self) -> bool {
    false
  }

  /// Hints for the header; views with their own keys override this
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "filter").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
