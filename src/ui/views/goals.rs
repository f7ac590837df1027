use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};

use crate::app::Services;
use crate::backend::User;
use crate::fetch::{Fetch, FetchState};
use crate::journal::{JournalEntry, Progress};
use crate::ui::renderfns::mood_color;
use crate::ui::view::{Shortcut, View, ViewAction};

/// Days shown in the timeline
const TIMELINE_LEN: usize = 10;

/// Goals written day by day, and how many planned tasks got done
pub struct GoalsView {
  entries: Fetch<Vec<JournalEntry>>,
  scroll: u16,
}

impl GoalsView {
  pub fn new(services: Services, user: User) -> Self {
    let store = services.store;
    let mut entries = Fetch::new(move || {
      let store = store.clone();
      let user_id = user.id.clone();
      async move { store.journal_entries(&user_id).await }
    });
    entries.fetch();

    Self { entries, scroll: 0 }
  }

  fn render_stats(&self, frame: &mut Frame, area: Rect, progress: &Progress) {
    let [numbers_area, gauge_area] =
      Layout::vertical([Constraint::Length(2), Constraint::Length(3)]).areas(area);

    let stat = |label: &'static str, value: String| {
      vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().bold()),
        Span::raw("    "),
      ]
    };
    let mut spans = stat("Entries", progress.total_entries.to_string());
    spans.extend(stat("Completed", progress.completed_tasks.to_string()));
    spans.extend(stat("Tasks", progress.total_tasks.to_string()));
    spans.extend(stat("Rate", format!("{}%", progress.completion_rate)));
    frame.render_widget(Paragraph::new(Line::from(spans)), numbers_area);

    let gauge = Gauge::default()
      .block(Block::default().title(" Task completion ").borders(Borders::ALL))
      .gauge_style(Style::default().fg(Color::Green))
      .percent(progress.completion_rate.min(100) as u16)
      .label(format!(
        "{} of {} tasks completed",
        progress.completed_tasks, progress.total_tasks
      ));
    frame.render_widget(gauge, gauge_area);
  }

  fn timeline(written: &[&JournalEntry]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for entry in written.iter().take(TIMELINE_LEN) {
      let mut header = vec![Span::styled(
        entry.entry_date.format("%A, %b %-d, %Y").to_string(),
        Style::default().fg(Color::Cyan).bold(),
      )];
      if let Some(mood) = entry.mood() {
        header.push(Span::raw("  "));
        header.push(Span::styled(mood.label(), Style::default().fg(mood_color(mood))));
      }
      lines.push(Line::from(header));

      let goals = entry
        .goals_desires
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .unwrap_or("No goals written for this day.");
      lines.extend(goals.lines().map(|l| Line::raw(format!("  {}", l))));

      let tasks = &entry.checklist_items;
      let done = tasks.iter().filter(|t| t.completed).count();
      let summary = if tasks.is_empty() {
        "  No tasks planned".to_string()
      } else {
        format!("  {}/{} tasks completed", done, tasks.len())
      };
      lines.push(Line::from(Span::styled(summary, Style::default().fg(Color::DarkGray))));
      lines.push(Line::raw(""));
    }
    lines
  }
}

impl View for GoalsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('r') => {
        self.scroll = 0;
        self.entries.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Goals & progress ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));

    let entries = match self.entries.state() {
      FetchState::Ready(entries) => entries,
      FetchState::Failed(e) => {
        frame.render_widget(
          Paragraph::new(format!("Could not load entries: {}\n\nPress 'r' to retry.", e))
            .block(block)
            .style(Style::default().fg(Color::Red)),
          area,
        );
        return;
      }
      _ => {
        frame.render_widget(
          Paragraph::new("Loading entries...")
            .block(block)
            .style(Style::default().fg(Color::DarkGray)),
          area,
        );
        return;
      }
    };

    let inner = block.inner(area);
    frame.render_widget(block, area);
    let [stats_area, timeline_area] =
      Layout::vertical([Constraint::Length(5), Constraint::Min(3)]).areas(inner);

    let (progress, written) = Progress::compute(entries);
    self.render_stats(frame, stats_area, &progress);

    let timeline_block = Block::default()
      .title(" Recent days ")
      .borders(Borders::TOP);
    if written.is_empty() {
      frame.render_widget(
        Paragraph::new("No entries yet. Write today's goals on the journal screen.")
          .block(timeline_block)
          .style(Style::default().fg(Color::DarkGray)),
        timeline_area,
      );
      return;
    }
    frame.render_widget(
      Paragraph::new(Self::timeline(&written))
        .block(timeline_block)
        .wrap(Wrap { trim: false })
        .scroll((self.scroll, 0)),
      timeline_area,
    );
  }

  fn breadcrumb_label(&self) -> String {
    "Goals".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    if self.entries.poll() {
      if let Some(e) = self.entries.error() {
        return ViewAction::Status(format!("Goals: {}", e));
      }
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("j/k", "scroll").with_priority(20),
      Shortcut::new("r", "refresh").with_priority(25),
      Shortcut::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::journal::{ChecklistItem, EntryPatch, JournalField};
  use chrono::NaiveDate;

  #[tokio::test]
  async fn test_timeline_lists_written_days_only() {
    let memory = crate::backend::MemoryBackend::signed_in("u1", "ada@example.com");
    let (services, _) = Services::in_memory(memory);
    let store = services.store.clone();
    let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();

    let planned = store.create_journal_entry("u1", day(2)).await.unwrap();
    store
      .update_journal_entry(&planned.id, &EntryPatch::text(JournalField::GoalsDesires, "Finish draft"))
      .await
      .unwrap();
    let tasks = store.create_journal_entry("u1", day(1)).await.unwrap();
    let mut item = ChecklistItem::new("walk");
    item.completed = true;
    store
      .update_journal_entry(&tasks.id, &EntryPatch::checklist(vec![item]))
      .await
      .unwrap();
    store.create_journal_entry("u1", day(3)).await.unwrap();

    let entries = store.journal_entries("u1").await.unwrap();
    let (progress, written) = Progress::compute(&entries);
    assert_eq!(progress.total_entries, 2);
    assert_eq!(progress.completion_rate, 100);

    let text: Vec<String> = GoalsView::timeline(&written)
      .iter()
      .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
      .collect();
    assert_eq!(text[0], "Saturday, Mar 2, 2024");
    assert_eq!(text[1], "  Finish draft");
    assert_eq!(text[2], "  No tasks planned");
    assert_eq!(text[4], "Friday, Mar 1, 2024");
    assert_eq!(text[5], "  No goals written for this day.");
    assert_eq!(text[6], "  1/1 tasks completed");
  }
}
