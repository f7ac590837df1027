use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Sparkline};

use crate::app::Services;
use crate::backend::User;
use crate::fetch::{Fetch, FetchState};
use crate::journal::Insights;
use crate::ui::renderfns::mood_color;
use crate::ui::view::{Shortcut, View, ViewAction};

/// Read-only statistics over all journal entries
pub struct InsightsView {
  insights: Fetch<Insights>,
}

impl InsightsView {
  pub fn new(services: Services, user: User) -> Self {
    let store = services.store;
    let mut insights = Fetch::new(move || {
      let store = store.clone();
      let user_id = user.id.clone();
      async move {
        let entries = store.journal_entries(&user_id).await?;
        Ok(Insights::compute(&entries, Local::now().date_naive()))
      }
    });
    insights.fetch();
    Self { insights }
  }

  fn render_insights(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Insights ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let insights = match self.insights.state() {
      FetchState::Ready(insights) => insights,
      FetchState::Failed(e) => {
        frame.render_widget(
          Paragraph::new(format!("Error: {}\n\nPress 'r' to retry.", e))
            .style(Style::default().fg(Color::Red)),
          inner,
        );
        return;
      }
      _ => {
        frame.render_widget(
          Paragraph::new("Crunching your entries...").style(Style::default().fg(Color::DarkGray)),
          inner,
        );
        return;
      }
    };

    if insights.total_entries == 0 {
      frame.render_widget(
        Paragraph::new("No entries yet. Write in your journal and come back.")
          .style(Style::default().fg(Color::DarkGray)),
        inner,
      );
      return;
    }

    let [stats_area, charts_area, dist_area] = Layout::vertical([
      Constraint::Length(4),
      Constraint::Min(8),
      Constraint::Length(3),
    ])
    .areas(inner);
    let [trend_area, week_area] =
      Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(charts_area);

    render_stats(frame, stats_area, insights);
    render_trend(frame, trend_area, insights);
    render_week(frame, week_area, insights);
    render_distribution(frame, dist_area, insights);
  }
}

fn stat(label: &str, value: String) -> Vec<Span<'static>> {
  vec![
    Span::styled(format!("{}: ", label), Style::default().fg(Color::DarkGray)),
    Span::styled(value, Style::default().bold()),
    Span::raw("    "),
  ]
}

fn render_stats(frame: &mut Frame, area: Rect, insights: &Insights) {
  let average = insights
    .average_mood
    .map(|m| format!("{:.1} / 5", m))
    .unwrap_or_else(|| "-".to_string());

  let lines = vec![
    Line::from(
      [
        stat("Entries", insights.total_entries.to_string()),
        stat("This month", insights.entries_this_month.to_string()),
      ]
      .concat(),
    ),
    Line::from(
      [
        stat(
          "Tasks",
          format!("{}/{}", insights.completed_tasks, insights.total_tasks),
        ),
        stat("Completion", format!("{}%", insights.completion_rate)),
      ]
      .concat(),
    ),
    Line::from(stat("Average mood", average)),
  ];
  frame.render_widget(Paragraph::new(lines), area);
}

fn render_trend(frame: &mut Frame, area: Rect, insights: &Insights) {
  let data: Vec<u64> = insights.mood_trend.iter().map(|(_, s)| u64::from(*s)).collect();
  let title = match (insights.mood_trend.first(), insights.mood_trend.last()) {
    (Some((from, _)), Some((to, _))) => format!(" Mood trend {} to {} ", from.format("%b %-d"), to.format("%b %-d")),
    _ => " Mood trend ".to_string(),
  };
  let sparkline = Sparkline::default()
    .block(Block::default().title(title).borders(Borders::ALL))
    .data(&data)
    .max(5)
    .style(Style::default().fg(Color::Magenta));
  frame.render_widget(sparkline, area);
}

fn render_week(frame: &mut Frame, area: Rect, insights: &Insights) {
  let bars: Vec<Bar> = insights
    .week_tasks
    .iter()
    .map(|day| {
      Bar::default()
        .label(Line::from(day.date.format("%a").to_string()))
        .value(day.completed as u64)
        .text_value(format!("{}/{}", day.completed, day.total))
    })
    .collect();

  let chart = BarChart::default()
    .block(Block::default().title(" Tasks, last 7 days ").borders(Borders::ALL))
    .data(BarGroup::default().bars(&bars))
    .bar_width(5)
    .bar_gap(1)
    .bar_style(Style::default().fg(Color::Cyan))
    .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
  frame.render_widget(chart, area);
}

fn render_distribution(frame: &mut Frame, area: Rect, insights: &Insights) {
  let mut spans = Vec::new();
  for (mood, count) in &insights.mood_distribution {
    spans.push(Span::styled("● ", Style::default().fg(mood_color(*mood))));
    spans.push(Span::raw(format!("{} {}   ", mood.label(), count)));
  }
  let paragraph = Paragraph::new(Line::from(spans))
    .block(Block::default().title(" Mood distribution ").borders(Borders::ALL));
  frame.render_widget(paragraph, area);
}

impl View for InsightsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.insights.refetch();
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_insights(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Insights".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.insights.poll();
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("r", "refresh").with_priority(20),
      Shortcut::new("q", "back").with_priority(30),
    ]
  }
}
