//! Statistics derived from a user's journal entries.
//!
//! Entries are expected newest first, as `JournalStore::journal_entries`
//! returns them. `today` is passed in so the results do not depend on the
//! wall clock.

use chrono::{Datelike, Duration, NaiveDate};

use super::types::{JournalEntry, Mood};

const TREND_LEN: usize = 30;
const WEEK_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct Insights {
  pub total_entries: usize,
  pub entries_this_month: usize,
  pub total_tasks: usize,
  pub completed_tasks: usize,
  /// Rounded percent of completed checklist items
  pub completion_rate: u32,
  /// Mean mood score over entries that have a mood
  pub average_mood: Option<f64>,
  pub mood_trend: Vec<(NaiveDate, u8)>,
  pub week_tasks: Vec<DayTasks>,
  pub mood_distribution: Vec<(Mood, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTasks {
  pub date: NaiveDate,
  pub completed: usize,
  pub total: usize,
}

impl Insights {
  pub fn compute(entries: &[JournalEntry], today: NaiveDate) -> Self {
    let (total_tasks, completed_tasks) = task_counts(entries);

    Self {
      total_entries: entries.len(),
      entries_this_month: entries_in_month(entries, today),
      total_tasks,
      completed_tasks,
      completion_rate: completion_rate(completed_tasks, total_tasks),
      average_mood: average_mood(entries),
      mood_trend: mood_trend(entries),
      week_tasks: week_tasks(entries, today),
      mood_distribution: mood_distribution(entries),
    }
  }
}

/// Goal progress over the days that have something written.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
  pub total_entries: usize,
  pub total_tasks: usize,
  pub completed_tasks: usize,
  pub completion_rate: u32,
}

impl Progress {
  /// Entries with content, in the order given, and the totals over them.
  pub fn compute(entries: &[JournalEntry]) -> (Self, Vec<&JournalEntry>) {
    let written: Vec<&JournalEntry> = entries.iter().filter(|e| e.has_content()).collect();
    let (total_tasks, completed_tasks) = written.iter().fold((0, 0), |(total, done), e| {
      let completed = e.checklist_items.iter().filter(|i| i.completed).count();
      (total + e.checklist_items.len(), done + completed)
    });

    let progress = Self {
      total_entries: written.len(),
      total_tasks,
      completed_tasks,
      completion_rate: completion_rate(completed_tasks, total_tasks),
    };
    (progress, written)
  }
}

/// Score for a stored mood label; labels outside the scale count as neutral.
pub fn mood_score(label: &str) -> u8 {
  Mood::from_label(label).map(Mood::score).unwrap_or(3)
}

pub fn entries_in_month(entries: &[JournalEntry], today: NaiveDate) -> usize {
  entries
    .iter()
    .filter(|e| e.entry_date.year() == today.year() && e.entry_date.month() == today.month())
    .count()
}

/// (total, completed) checklist items across all entries
pub fn task_counts(entries: &[JournalEntry]) -> (usize, usize) {
  entries.iter().fold((0, 0), |(total, done), e| {
    let completed = e.checklist_items.iter().filter(|i| i.completed).count();
    (total + e.checklist_items.len(), done + completed)
  })
}

pub fn completion_rate(completed: usize, total: usize) -> u32 {
  if total == 0 {
    return 0;
  }
  (completed as f64 / total as f64 * 100.0).round() as u32
}

fn moods(entries: &[JournalEntry]) -> impl Iterator<Item = (&JournalEntry, &str)> {
  entries.iter().filter_map(|e| {
    e.mood
      .as_deref()
      .filter(|m| !m.is_empty())
      .map(|m| (e, m))
  })
}

pub fn average_mood(entries: &[JournalEntry]) -> Option<f64> {
  let scores: Vec<u8> = moods(entries).map(|(_, m)| mood_score(m)).collect();
  if scores.is_empty() {
    return None;
  }
  let sum: u32 = scores.iter().map(|&s| u32::from(s)).sum();
  Some(sum as f64 / scores.len() as f64)
}

/// The newest entries with a mood, oldest first.
pub fn mood_trend(entries: &[JournalEntry]) -> Vec<(NaiveDate, u8)> {
  let mut trend: Vec<(NaiveDate, u8)> = moods(entries)
    .take(TREND_LEN)
    .map(|(e, m)| (e.entry_date, mood_score(m)))
    .collect();
  trend.reverse();
  trend
}

/// Checklist progress for each of the last seven days, ending today.
pub fn week_tasks(entries: &[JournalEntry], today: NaiveDate) -> Vec<DayTasks> {
  (0..WEEK_DAYS)
    .rev()
    .map(|back| {
      let date = today - Duration::days(back);
      let entry = entries.iter().find(|e| e.entry_date == date);
      DayTasks {
        date,
        completed: entry
          .map(|e| e.checklist_items.iter().filter(|i| i.completed).count())
          .unwrap_or(0),
        total: entry.map(|e| e.checklist_items.len()).unwrap_or(0),
      }
    })
    .collect()
}

pub fn mood_distribution(entries: &[JournalEntry]) -> Vec<(Mood, usize)> {
  Mood::ALL
    .into_iter()
    .map(|mood| {
      let count = entries
        .iter()
        .filter(|e| e.mood.as_deref() == Some(mood.label()))
        .count();
      (mood, count)
    })
    .filter(|(_, count)| *count > 0)
    .collect()
}
