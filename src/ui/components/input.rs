use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Result of handling a key event in an input component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResult {
  /// Key was handled, text unchanged (cursor movement)
  Consumed,
  /// Key was handled and the text changed
  Changed,
  /// Input finished, here's the value
  Submitted(String),
  /// Escape pressed on a single-line input
  Cancelled,
  /// Key not handled, pass to next handler
  NotHandled,
}

/// Reusable text input component.
///
/// The cursor counts characters, not bytes. In multiline mode Enter inserts
/// a newline and Esc finishes the edit.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
  buffer: String,
  cursor: usize,
  multiline: bool,
}

impl TextInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn multiline() -> Self {
    Self {
      multiline: true,
      ..Self::default()
    }
  }

  /// Start with existing text, cursor at the end
  pub fn with_value(mut self, value: &str) -> Self {
    self.buffer = value.to_string();
    self.cursor = value.chars().count();
    self
  }

  pub fn value(&self) -> &str {
    &self.buffer
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
    self.cursor = 0;
  }

  fn len(&self) -> usize {
    self.buffer.chars().count()
  }

  /// Byte offset of a character position
  fn byte_at(&self, char_idx: usize) -> usize {
    self
      .buffer
      .char_indices()
      .nth(char_idx)
      .map(|(i, _)| i)
      .unwrap_or(self.buffer.len())
  }

  fn insert(&mut self, c: char) {
    let at = self.byte_at(self.cursor);
    self.buffer.insert(at, c);
    self.cursor += 1;
  }

  /// Remove characters in `[from, to)`
  fn remove_range(&mut self, from: usize, to: usize) {
    let (start, end) = (self.byte_at(from), self.byte_at(to));
    self.buffer.replace_range(start..end, "");
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> InputResult {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc if self.multiline => InputResult::Submitted(self.buffer.clone()),
      KeyCode::Esc => InputResult::Cancelled,
      KeyCode::Enter if self.multiline => {
        self.insert('\n');
        InputResult::Changed
      }
      KeyCode::Enter => InputResult::Submitted(self.buffer.clone()),
      KeyCode::Backspace => {
        if self.cursor == 0 {
          return InputResult::Consumed;
        }
        self.remove_range(self.cursor - 1, self.cursor);
        self.cursor -= 1;
        InputResult::Changed
      }
      KeyCode::Delete => {
        if self.cursor >= self.len() {
          return InputResult::Consumed;
        }
        self.remove_range(self.cursor, self.cursor + 1);
        InputResult::Changed
      }
      KeyCode::Left => {
        self.cursor = self.cursor.saturating_sub(1);
        InputResult::Consumed
      }
      KeyCode::Right => {
        self.cursor = (self.cursor + 1).min(self.len());
        InputResult::Consumed
      }
      KeyCode::Home => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::End => {
        self.cursor = self.len();
        InputResult::Consumed
      }
      KeyCode::Char('a') if ctrl => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char('e') if ctrl => {
        self.cursor = self.len();
        InputResult::Consumed
      }
      KeyCode::Char('u') if ctrl => {
        // Clear before cursor
        self.remove_range(0, self.cursor);
        self.cursor = 0;
        InputResult::Changed
      }
      KeyCode::Char('w') if ctrl => {
        // Delete word before cursor
        let chars: Vec<char> = self.buffer.chars().take(self.cursor).collect();
        let mut start = self.cursor;
        while start > 0 && chars[start - 1].is_whitespace() {
          start -= 1;
        }
        while start > 0 && !chars[start - 1].is_whitespace() {
          start -= 1;
        }
        self.remove_range(start, self.cursor);
        self.cursor = start;
        InputResult::Changed
      }
      KeyCode::Char(_) if ctrl => InputResult::NotHandled,
      KeyCode::Char(c) => {
        self.insert(c);
        InputResult::Changed
      }
      _ => InputResult::NotHandled,
    }
  }

  /// Text with a visible cursor marker, for rendering
  pub fn display(&self) -> String {
    let at = self.byte_at(self.cursor);
    format!("{}▏{}", &self.buffer[..at], &self.buffer[at..])
  }

  pub fn cursor_position(&self) -> usize {
    self.cursor
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn ctrl_key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::CONTROL)
  }

  fn type_str(input: &mut TextInput, s: &str) {
    for c in s.chars() {
      input.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_basic_input() {
    let mut input = TextInput::new();
    assert!(input.is_empty());
    assert_eq!(input.handle_key(key(KeyCode::Char('h'))), InputResult::Changed);
    input.handle_key(key(KeyCode::Char('i')));
    assert_eq!(input.value(), "hi");
  }

  #[test]
  fn test_submit_and_cancel() {
    let mut input = TextInput::new();
    type_str(&mut input, "test");
    assert_eq!(
      input.handle_key(key(KeyCode::Enter)),
      InputResult::Submitted("test".to_string())
    );
    assert_eq!(input.handle_key(key(KeyCode::Esc)), InputResult::Cancelled);
  }

  #[test]
  fn test_multiline_enter_inserts_newline() {
    let mut input = TextInput::multiline();
    type_str(&mut input, "one");
    assert_eq!(input.handle_key(key(KeyCode::Enter)), InputResult::Changed);
    type_str(&mut input, "two");
    assert_eq!(
      input.handle_key(key(KeyCode::Esc)),
      InputResult::Submitted("one\ntwo".to_string())
    );
  }

  #[test]
  fn test_non_ascii_editing() {
    let mut input = TextInput::new().with_value("café");
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "caf");

    type_str(&mut input, "é ☀");
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Delete));
    assert_eq!(input.value(), "café☀");
    assert_eq!(input.cursor_position(), 4);
  }

  #[test]
  fn test_cursor_movement() {
    let mut input = TextInput::new();
    type_str(&mut input, "ac");
    assert_eq!(input.handle_key(key(KeyCode::Left)), InputResult::Consumed);
    input.handle_key(key(KeyCode::Char('b')));
    assert_eq!(input.value(), "abc");
  }

  #[test]
  fn test_ctrl_u_clear_before_cursor() {
    let mut input = TextInput::new();
    type_str(&mut input, "hello world");
    for _ in 0..5 {
      input.handle_key(key(KeyCode::Left));
    }
    input.handle_key(ctrl_key(KeyCode::Char('u')));
    assert_eq!(input.value(), "world");
  }

  #[test]
  fn test_ctrl_w_deletes_word() {
    let mut input = TextInput::new();
    type_str(&mut input, "grateful for  tea");
    input.handle_key(ctrl_key(KeyCode::Char('w')));
    assert_eq!(input.value(), "grateful for  ");
    input.handle_key(ctrl_key(KeyCode::Char('w')));
    assert_eq!(input.value(), "grateful ");
  }

  #[test]
  fn test_other_ctrl_keys_pass_through() {
    let mut input = TextInput::new();
    assert_eq!(input.handle_key(ctrl_key(KeyCode::Char('s'))), InputResult::NotHandled);
    assert!(input.is_empty());
  }
}
