use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::view::ShortcutInfo;

/// What the header shows besides the shortcuts
pub struct HeaderContext<'a> {
  /// Configured title, or the server host
  pub title: &'a str,
  /// Signed-in login, once known
  pub viewer: Option<&'a str>,
  pub viewer_is_admin: bool,
}

/// Draw the header bar with logo, context, and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, ctx: &HeaderContext, shortcuts: &[ShortcutInfo]) {
  let sep = Span::styled("│", Style::default().fg(Color::DarkGray));
  let mut spans = vec![
    Span::styled(" d9s ", Style::default().fg(Color::Cyan).bold()),
    sep.clone(),
    Span::styled(format!(" {} ", ctx.title), Style::default().fg(Color::White)),
    sep,
  ];

  match ctx.viewer {
    Some(login) => {
      spans.push(Span::styled(
        format!(" {} ", login),
        Style::default().fg(Color::Yellow).bold(),
      ));
      if ctx.viewer_is_admin {
        spans.push(Span::styled("(admin) ", Style::default().fg(Color::Magenta)));
      }
    }
    None => spans.push(Span::styled(" ... ", Style::default().fg(Color::DarkGray))),
  }
  spans.push(Span::raw(" "));

  let mut sorted: Vec<&ShortcutInfo> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);
  for shortcut in sorted {
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}   ", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Host part of a server URL, used when no title is configured
pub fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_domain() {
    assert_eq!(extract_domain("https://drone.example.com"), "drone.example.com");
    assert_eq!(extract_domain("https://ci.company.com/api"), "ci.company.com");
    assert_eq!(extract_domain("http://localhost:8080"), "localhost:8080");
  }
}
