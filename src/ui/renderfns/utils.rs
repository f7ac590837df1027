use ratatui::prelude::Color;

use crate::journal::Mood;

/// Truncate a string to at most `max_len` characters, adding "..." if cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// First line of a multi-line text, for list rows
pub fn first_line(s: &str) -> &str {
  s.lines().next().unwrap_or_default()
}

/// Parse a `#rrggbb` color
pub fn hex_color(hex: &str) -> Option<Color> {
  let hex = hex.strip_prefix('#')?;
  if hex.len() != 6 {
    return None;
  }
  let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
  Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

pub fn mood_color(mood: Mood) -> Color {
  hex_color(mood.color()).unwrap_or(Color::White)
}
