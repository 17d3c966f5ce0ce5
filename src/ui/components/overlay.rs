use crate::app::{ErrorOverlay, Notice};
use crate::marketplace::NotificationKind;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Draw a centered error dialog over the whole view.
pub fn draw_error_overlay(frame: &mut Frame, error: &ErrorOverlay) {
  let area = centered_rect(60, 30, frame.area());

  let block = Block::default()
    .title(format!(" {} ", error.title))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Red));

  let text = vec![
    Line::from(error.message.as_str()),
    Line::from(""),
    Line::from(Span::styled(
      "Press Esc to dismiss",
      Style::default().fg(Color::DarkGray),
    )),
  ];

  let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });

  frame.render_widget(Clear, area);
  frame.render_widget(paragraph, area);
}

/// Draw a one-line notice banner at the bottom of the given area.
pub fn draw_notice(frame: &mut Frame, area: Rect, notice: &Notice) {
  let color = match notice.kind {
    NotificationKind::Success => Color::Green,
    NotificationKind::Warning => Color::Yellow,
    NotificationKind::Danger => Color::Red,
    NotificationKind::Info => Color::Cyan,
  };

  let content = match &notice.title {
    Some(title) => format!(" {}: {}", title, notice.message),
    None => format!(" {}", notice.message),
  };

  let paragraph = Paragraph::new(content).style(Style::default().fg(color));
  frame.render_widget(paragraph, area);
}

/// Center a rect of the given percentage size within `area`.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
  let vertical = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Percentage((100 - percent_y) / 2),
      Constraint::Percentage(percent_y),
      Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(area);

  Layout::default()
    .direction(Direction::Horizontal)
    .constraints([
      Constraint::Percentage((100 - percent_x) / 2),
      Constraint::Percentage(percent_x),
      Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(vertical[1])[1]
}
