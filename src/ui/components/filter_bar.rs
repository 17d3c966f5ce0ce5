use crate::app::App;
use crate::dates::PeriodType;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the period filter bar: the three period buttons, the label of the
/// selected range and a loading indicator while a reload is in flight.
pub fn draw_filter_bar(frame: &mut Frame, area: Rect, app: &App) {
  let active = app.active_period();

  let mut spans = Vec::new();
  for (i, period) in PeriodType::ALL.into_iter().enumerate() {
    let style = if period == active {
      Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(Color::DarkGray)
    };
    spans.push(Span::styled(
      format!(" [{}] {}", i + 1, period.as_str()),
      style,
    ));
  }

  spans.push(Span::raw("  "));
  spans.push(Span::styled(
    app.period_label(),
    Style::default().fg(Color::White),
  ));

  if app.loading() {
    spans.push(Span::styled(
      "  (loading...)",
      Style::default().fg(Color::Yellow),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans));
  frame.render_widget(paragraph, area);
}
