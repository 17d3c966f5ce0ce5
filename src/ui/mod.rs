mod components;
pub mod format;
mod views;

use crate::app::{App, Mode};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Length(1), // Filter bar
      Constraint::Min(1),    // Dashboard
      Constraint::Length(1), // Notice
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  draw_header(frame, chunks[0], app);
  components::filter_bar::draw_filter_bar(frame, chunks[1], app);

  if let Some(data) = app.data() {
    views::dashboard::draw_dashboard(frame, chunks[2], data, app.show_breakdown());
  } else {
    let placeholder = if app.loading() {
      "Loading dashboard..."
    } else {
      "No data."
    };
    let paragraph = Paragraph::new(placeholder).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, chunks[2]);
  }

  if let Some(notice) = app.notice() {
    components::overlay::draw_notice(frame, chunks[3], notice);
  }

  draw_status_bar(frame, chunks[4], app);

  if let Some(error) = app.error() {
    components::overlay::draw_error_overlay(frame, error);
  }
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
  let paragraph = Paragraph::new(format!(" {}", app.title()))
    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
  frame.render_widget(paragraph, area);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match app.mode() {
    Mode::Normal => {
      let hint = " 1/2/3:period  [/]:shift  f/t:dates  b:breakdown  r:reload  q:quit";
      (hint.to_string(), Style::default().fg(Color::DarkGray))
    }
    Mode::DateInput { field, input } => {
      let prompt = format!(" {} date (YYYY-MM-DD): {}", field.label(), input);
      (prompt, Style::default().fg(Color::Yellow))
    }
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}
