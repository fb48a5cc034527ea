use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::feedback::{Toast, ToastLevel};

/// Draw the footer bar: view breadcrumb on the left, latest toast on the right
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], toast: Option<&Toast>) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }
    let style = if i + 1 == breadcrumb.len() {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };
    spans.push(Span::styled(part.clone(), style));
  }

  let chunks = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
    .split(area);

  frame.render_widget(
    Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black)),
    chunks[0],
  );

  let toast_line = match toast {
    Some(toast) => {
      let color = match toast.level {
        ToastLevel::Success => Color::Green,
        ToastLevel::Error => Color::Red,
      };
      Line::from(Span::styled(
        format!("{} ", toast.message),
        Style::default().fg(color).bold(),
      ))
    }
    None => Line::default(),
  };
  frame.render_widget(
    Paragraph::new(toast_line)
      .alignment(Alignment::Right)
      .style(Style::default().bg(Color::Black)),
    chunks[1],
  );
}
