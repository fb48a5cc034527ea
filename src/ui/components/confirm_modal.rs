use crate::event::ConfirmRequest;
use crate::ui::renderfns::centered_rect;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Yes/no modal answering a pending [`ConfirmRequest`].
///
/// Dropping an unanswered modal drops the reply sender, which the
/// waiting task reads as "no".
#[derive(Debug)]
pub struct ConfirmModal {
  request: ConfirmRequest,
}

impl ConfirmModal {
  pub fn new(request: ConfirmRequest) -> Self {
    Self { request }
  }

  pub fn message(&self) -> &str {
    &self.request.message
  }

  /// Returns the answer once one was given; the modal should then be dropped
  pub fn handle_key(self, key: KeyEvent) -> Result<bool, Self> {
    let answer = match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => true,
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => false,
      _ => return Err(self),
    };
    // The mutation may have been abandoned already
    let _ = self.request.reply.send(answer);
    Ok(answer)
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let width = (self.message().chars().count() as u16 + 6).clamp(30, 70);
    let overlay_area = centered_rect(width, 5, area);
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red))
      .title(" Confirm ");

    let text = vec![
      Line::from(Span::styled(self.message(), Style::default().bold())),
      Line::default(),
      Line::from(vec![
        Span::styled("<y>", Style::default().fg(Color::Cyan)),
        Span::styled(" yes   ", Style::default().fg(Color::DarkGray)),
        Span::styled("<n>", Style::default().fg(Color::Cyan)),
        Span::styled(" no", Style::default().fg(Color::DarkGray)),
      ]),
    ];

    frame.render_widget(
      Paragraph::new(text)
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true }),
      overlay_area,
    );
  }
}
