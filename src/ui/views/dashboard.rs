use crate::marketplace::{DashboardData, GraphSlice, RankedEntry, Summary};
use crate::ui::format::{format_amount, format_compact, format_delta, truncate};
use ratatui::prelude::*;
use ratatui::widgets::{Axis, BarChart, Block, Borders, Chart, Dataset, GraphType, Paragraph, Row, Table};

/// Draw the full dashboard: KPI tiles on top, the sales chart in the middle,
/// ranked tables and the optional breakdown row below.
pub fn draw_dashboard(frame: &mut Frame, area: Rect, data: &DashboardData, show_breakdown: bool) {
  let constraints = if show_breakdown {
    vec![
      Constraint::Length(5),      // KPI tiles
      Constraint::Percentage(40), // Sales chart
      Constraint::Min(8),         // Ranked tables
      Constraint::Percentage(25), // Breakdown charts
    ]
  } else {
    vec![
      Constraint::Length(5),
      Constraint::Percentage(50),
      Constraint::Min(8),
    ]
  };

  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints(constraints)
    .split(area);

  draw_summary_tiles(frame, rows[0], &data.summary, data);
  draw_sales_chart(frame, rows[1], data);
  draw_ranked_tables(frame, rows[2], data);

  if show_breakdown {
    draw_breakdown_row(frame, rows[3], data);
  }
}

fn draw_summary_tiles(frame: &mut Frame, area: Rect, summary: &Summary, data: &DashboardData) {
  let tiles = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([
      Constraint::Percentage(25),
      Constraint::Percentage(25),
      Constraint::Percentage(25),
      Constraint::Percentage(25),
    ])
    .split(area);

  draw_tile(
    frame,
    tiles[0],
    "Total Orders",
    summary.total_orders.to_string(),
    summary.kpi_total_orders,
  );
  draw_tile(
    frame,
    tiles[1],
    "Total Sales",
    format_amount(summary.total_sales, &data.currency),
    summary.kpi_total_sales,
  );
  draw_tile(
    frame,
    tiles[2],
    "Pending Shipments",
    summary.pending_shipments.to_string(),
    summary.kpi_pending_shipments,
  );
  draw_tile(
    frame,
    tiles[3],
    "Avg Order Value",
    format_amount(summary.avg_order_value, &data.currency),
    summary.kpi_avg_order_value,
  );
}

fn draw_tile(frame: &mut Frame, area: Rect, label: &str, value: String, delta: f64) {
  let delta_color = if delta >= 0.0 { Color::Green } else { Color::Red };

  let block = Block::default()
    .title(format!(" {} ", label))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let text = vec![
    Line::from(Span::styled(
      value,
      Style::default().add_modifier(Modifier::BOLD),
    )),
    Line::from(Span::styled(
      format_delta(delta),
      Style::default().fg(delta_color),
    )),
  ];

  frame.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_sales_chart(frame: &mut Frame, area: Rect, data: &DashboardData) {
  let block = Block::default()
    .title(" Sales ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let graph = &data.sale_graph;
  if graph.amounts.is_empty() {
    let paragraph = Paragraph::new("No sales in this period.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let points: Vec<(f64, f64)> = graph
    .amounts
    .iter()
    .enumerate()
    .map(|(i, amount)| (i as f64, *amount))
    .collect();

  let max_amount = graph.amounts.iter().cloned().fold(0.0_f64, f64::max);
  let x_max = (points.len().saturating_sub(1)).max(1) as f64;

  let first_label = graph.categories.first().map(String::as_str).unwrap_or("");
  let last_label = graph.categories.last().map(String::as_str).unwrap_or("");

  let dataset = Dataset::default()
    .marker(symbols::Marker::Braille)
    .graph_type(GraphType::Line)
    .style(Style::default().fg(Color::Cyan))
    .data(&points);

  let chart = Chart::new(vec![dataset])
    .block(block)
    .x_axis(
      Axis::default()
        .bounds([0.0, x_max])
        .labels(vec![
          Span::raw(first_label.to_string()),
          Span::raw(last_label.to_string()),
        ])
        .style(Style::default().fg(Color::DarkGray)),
    )
    .y_axis(
      Axis::default()
        .bounds([0.0, max_amount.max(1.0)])
        .labels(vec![
          Span::raw("0"),
          Span::raw(format_compact(max_amount / 2.0)),
          Span::raw(format_compact(max_amount)),
        ])
        .style(Style::default().fg(Color::DarkGray)),
    );

  frame.render_widget(chart, area);
}

fn draw_ranked_tables(frame: &mut Frame, area: Rect, data: &DashboardData) {
  let halves = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
    .split(area);

  draw_ranked_table(frame, halves[0], " Best Sellers ", &data.best_sellers, data);
  draw_ranked_table(frame, halves[1], " Top Customers ", &data.top_customers, data);
}

fn draw_ranked_table(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  entries: &[RankedEntry],
  data: &DashboardData,
) {
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if entries.is_empty() {
    let paragraph = Paragraph::new("Nothing to show.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let rows: Vec<Row> = entries
    .iter()
    .map(|entry| {
      let quantity = entry
        .quantity
        .map(|q| format!("{:.0}", q))
        .unwrap_or_default();
      Row::new(vec![
        truncate(&entry.name, 30),
        quantity,
        format_amount(entry.amount, &data.currency),
      ])
    })
    .collect();

  let table = Table::new(
    rows,
    [
      Constraint::Min(20),
      Constraint::Length(6),
      Constraint::Length(14),
    ],
  )
  .header(
    Row::new(vec!["Name", "Qty", "Amount"]).style(Style::default().fg(Color::Cyan)),
  )
  .block(block);

  frame.render_widget(table, area);
}

fn draw_breakdown_row(frame: &mut Frame, area: Rect, data: &DashboardData) {
  let halves = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
    .split(area);

  draw_slice_chart(frame, halves[0], " By Category ", &data.category_graph);
  draw_slice_chart(frame, halves[1], " By Country ", &data.country_graph);
}

fn draw_slice_chart(frame: &mut Frame, area: Rect, title: &str, slices: &[GraphSlice]) {
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if slices.is_empty() {
    let paragraph = Paragraph::new("Nothing to show.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let labels: Vec<String> = slices
    .iter()
    .map(|slice| truncate(&slice.label, 10))
    .collect();
  let bars: Vec<(&str, u64)> = labels
    .iter()
    .zip(slices)
    .map(|(label, slice)| (label.as_str(), slice.amount.max(0.0) as u64))
    .collect();

  let chart = BarChart::default()
    .block(block)
    .bar_width(11)
    .bar_gap(1)
    .bar_style(Style::default().fg(Color::Cyan))
    .value_style(Style::default().fg(Color::Black).bg(Color::Cyan))
    .data(&bars);

  frame.render_widget(chart, area);
}
