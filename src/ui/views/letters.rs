use chrono::{Local, NaiveDate};
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::Services;
use crate::backend::User;
use crate::fetch::{Fetch, FetchState, Task};
use crate::journal::{FutureLetter, LetterPatch, NewLetter};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{Shortcut, View, ViewAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftField {
  Title,
  UnlockDate,
  Content,
}

impl DraftField {
  fn next(self) -> Self {
    match self {
      Self::Title => Self::UnlockDate,
      Self::UnlockDate => Self::Content,
      Self::Content => Self::Title,
    }
  }
}

/// A letter being written
struct Draft {
  field: DraftField,
  title: TextInput,
  unlock_date: TextInput,
  content: TextInput,
}

impl Draft {
  fn new() -> Self {
    Self {
      field: DraftField::Title,
      title: TextInput::new(),
      unlock_date: TextInput::new(),
      content: TextInput::multiline(),
    }
  }

  fn input(&mut self) -> &mut TextInput {
    match self.field {
      DraftField::Title => &mut self.title,
      DraftField::UnlockDate => &mut self.unlock_date,
      DraftField::Content => &mut self.content,
    }
  }

  /// All three fields filled, and a date no earlier than `today`.
  fn letter(&self, today: NaiveDate) -> Result<NewLetter> {
    let title = self.title.value().trim();
    let content = self.content.value().trim();
    if title.is_empty() || content.is_empty() || self.unlock_date.is_empty() {
      return Err(eyre!("Fill in the title, unlock date and letter"));
    }
    let unlock_date = parse_unlock_date(self.unlock_date.value(), today)?;
    Ok(NewLetter {
      title: title.to_string(),
      content: content.to_string(),
      unlock_date,
    })
  }
}

fn parse_unlock_date(text: &str, today: NaiveDate) -> Result<NaiveDate> {
  let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
    .map_err(|_| eyre!("Unlock date must look like 2030-01-31"))?;
  if date < today {
    return Err(eyre!("Pick an unlock date from today on"));
  }
  Ok(date)
}

/// Letters to the future, newest unlock date first
pub struct LettersView {
  services: Services,
  user: User,
  letters: Fetch<Vec<FutureLetter>>,
  list_state: ListState,
  draft: Option<Draft>,
  /// New unlock date being typed for a letter
  reschedule: Option<(String, TextInput)>,
  confirm_delete: Option<String>,
  task: Option<Task<String>>,
}

impl LettersView {
  pub fn new(services: Services, user: User) -> Self {
    let store = services.store.clone();
    let user_id = user.id.clone();
    let mut letters = Fetch::new(move || {
      let store = store.clone();
      let user_id = user_id.clone();
      async move { store.future_letters(&user_id).await }
    });
    letters.fetch();

    Self {
      services,
      user,
      letters,
      list_state: ListState::default(),
      draft: None,
      reschedule: None,
      confirm_delete: None,
      task: None,
    }
  }

  fn letters(&self) -> &[FutureLetter] {
    self.letters.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected(&self) -> Option<&FutureLetter> {
    self.list_state.selected().and_then(|idx| self.letters().get(idx))
  }

  fn handle_draft_key(&mut self, key: KeyEvent) -> ViewAction {
    let Some(draft) = &mut self.draft else {
      return ViewAction::None;
    };

    match key.code {
      KeyCode::Esc => {
        self.draft = None;
        return ViewAction::Status("Letter discarded".to_string());
      }
      KeyCode::Tab => {
        draft.field = draft.field.next();
        return ViewAction::None;
      }
      KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        let letter = match draft.letter(Local::now().date_naive()) {
          Ok(letter) => letter,
          Err(e) => return ViewAction::Status(e.to_string()),
        };
        self.draft = None;
        let store = self.services.store.clone();
        let user_id = self.user.id.clone();
        self.task = Some(Task::spawn(async move {
          let letter = store.create_future_letter(&user_id, &letter).await?;
          Ok(format!("Sealed \"{}\" until {}", letter.title, letter.unlock_date))
        }));
        return ViewAction::None;
      }
      _ => {}
    }

    if let InputResult::Submitted(_) = draft.input().handle_key(key) {
      draft.field = draft.field.next();
    }
    ViewAction::None
  }

  fn handle_reschedule_key(&mut self, key: KeyEvent) -> ViewAction {
    let Some((id, input)) = &mut self.reschedule else {
      return ViewAction::None;
    };

    match input.handle_key(key) {
      InputResult::Submitted(text) => {
        let id = id.clone();
        let unlock_date = match parse_unlock_date(&text, Local::now().date_naive()) {
          Ok(date) => date,
          Err(e) => return ViewAction::Status(e.to_string()),
        };
        self.reschedule = None;
        let store = self.services.store.clone();
        let patch = LetterPatch {
          unlock_date: Some(unlock_date),
          ..LetterPatch::default()
        };
        self.task = Some(Task::spawn(async move {
          store.update_future_letter(&id, &patch).await?;
          Ok(format!("Now opens on {}", unlock_date))
        }));
      }
      InputResult::Cancelled => self.reschedule = None,
      _ => {}
    }
    ViewAction::None
  }

  fn delete_selected(&mut self) -> ViewAction {
    let Some(letter) = self.selected().cloned() else {
      return ViewAction::None;
    };
    if self.confirm_delete.as_deref() != Some(letter.id.as_str()) {
      self.confirm_delete = Some(letter.id.clone());
      return ViewAction::Status(format!("Press d again to delete \"{}\"", letter.title));
    }

    self.confirm_delete = None;
    let store = self.services.store.clone();
    self.task = Some(Task::spawn(async move {
      store.delete_future_letter(&letter.id).await?;
      Ok(format!("Deleted \"{}\"", letter.title))
    }));
    ViewAction::None
  }

  fn render_draft(&self, frame: &mut Frame, area: Rect, draft: &Draft) {
    let block = Block::default()
      .title(" New letter (tab next field, ctrl-s seal, esc discard) ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [title_area, date_area, content_area] = Layout::vertical([
      Constraint::Length(3),
      Constraint::Length(3),
      Constraint::Min(3),
    ])
    .areas(inner);

    let fields = [
      (DraftField::Title, " Title ", &draft.title, "A message to my future self...", title_area),
      (DraftField::UnlockDate, " Opens on (YYYY-MM-DD) ", &draft.unlock_date, "", date_area),
      (DraftField::Content, " Letter ", &draft.content, "Dear Future Me,", content_area),
    ];
    for (field, title, input, placeholder, field_area) in fields {
      let color = if field == draft.field { Color::Yellow } else { Color::DarkGray };
      let text = if input.is_empty() {
        Text::styled(placeholder, Style::default().fg(Color::DarkGray))
      } else {
        Text::raw(input.display())
      };
      frame.render_widget(
        Paragraph::new(text)
          .block(
            Block::default()
              .title(title)
              .borders(Borders::ALL)
              .border_style(Style::default().fg(color)),
          )
          .wrap(Wrap { trim: false }),
        field_area,
      );
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let today = Local::now().date_naive();
    let len = self.letters().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.letters.state() {
      FetchState::Loading => " Future letters (loading...) ".to_string(),
      FetchState::Failed(e) => format!(" Future letters (error: {}) ", e),
      _ => format!(" Future letters ({}) ", len),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));

    if len == 0 && !self.letters.is_loading() {
      let content = if self.letters.error().is_some() {
        "Failed to load letters. Press 'r' to retry."
      } else {
        "No letters yet. Press 'n' to write one."
      };
      frame.render_widget(
        Paragraph::new(content)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    }

    let items: Vec<ListItem> = self
      .letters()
      .iter()
      .map(|letter| {
        let (status, color) = if letter.is_unlocked(today) {
          ("open  ", Color::Green)
        } else {
          ("locked", Color::DarkGray)
        };
        ListItem::new(Line::from(vec![
          Span::styled(format!("{} ", status), Style::default().fg(color)),
          Span::styled(
            format!("{}  ", letter.unlock_date),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(truncate(&letter.title, 60)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for LettersView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.draft.is_some() {
      return self.handle_draft_key(key);
    }
    if self.reschedule.is_some() {
      return self.handle_reschedule_key(key);
    }
    if key.code != KeyCode::Char('d') {
      self.confirm_delete = None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.letters.refetch(),
      KeyCode::Char('n') => self.draft = Some(Draft::new()),
      KeyCode::Char('d') => return self.delete_selected(),
      KeyCode::Char('u') => {
        if let Some(letter) = self.selected() {
          let input = TextInput::new().with_value(&letter.unlock_date.to_string());
          self.reschedule = Some((letter.id.clone(), input));
        }
      }
      KeyCode::Enter => {
        let today = Local::now().date_naive();
        if let Some(letter) = self.selected() {
          if !letter.is_unlocked(today) {
            return ViewAction::Status(format!(
              "\"{}\" stays sealed until {}",
              letter.title, letter.unlock_date
            ));
          }
          return ViewAction::Push(Box::new(LetterView::new(letter.clone())));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    if let Some(draft) = &self.draft {
      self.render_draft(frame, area, draft);
      return;
    }
    let Some((_, input)) = &self.reschedule else {
      self.render_list(frame, area);
      return;
    };
    let text = input.display();
    let [list_area, input_area] =
      Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).areas(area);
    self.render_list(frame, list_area);
    frame.render_widget(
      Paragraph::new(text).block(
        Block::default()
          .title(" New unlock date, YYYY-MM-DD (enter save, esc cancel) ")
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Yellow)),
      ),
      input_area,
    );
  }

  fn breadcrumb_label(&self) -> String {
    "Letters".to_string()
  }

  fn captures_input(&self) -> bool {
    self.draft.is_some() || self.reschedule.is_some()
  }

  fn tick(&mut self) -> ViewAction {
    self.letters.poll();

    let Some(result) = self.task.as_mut().and_then(|t| t.poll()) else {
      return ViewAction::None;
    };
    self.task = None;
    match result {
      Ok(message) => {
        self.letters.refetch();
        ViewAction::Status(message)
      }
      Err(e) => ViewAction::Status(format!("Letters: {}", e)),
    }
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.reschedule.is_some() {
      return vec![Shortcut::new("esc", "cancel").with_priority(10)];
    }
    if self.draft.is_some() {
      return vec![
        Shortcut::new("ctrl-s", "seal").with_priority(10),
        Shortcut::new("esc", "discard").with_priority(20),
      ];
    }
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("enter", "open").with_priority(20),
      Shortcut::new("n", "new").with_priority(21),
      Shortcut::new("d", "delete").with_priority(22),
      Shortcut::new("u", "reschedule").with_priority(23),
      Shortcut::new("r", "refresh").with_priority(25),
      Shortcut::new("q", "back").with_priority(30),
    ]
  }
}

/// One opened letter
pub struct LetterView {
  letter: FutureLetter,
  scroll: u16,
}

impl LetterView {
  pub fn new(letter: FutureLetter) -> Self {
    Self { letter, scroll: 0 }
  }
}

impl View for LetterView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(format!(" {} ", self.letter.title))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));

    let mut lines = vec![
      Line::from(Span::styled(
        format!("Written {}, opened on {}", written_on(&self.letter), self.letter.unlock_date),
        Style::default().fg(Color::DarkGray),
      )),
      Line::raw(""),
    ];
    lines.extend(self.letter.content.lines().map(|l| Line::raw(l.to_string())));

    let paragraph = Paragraph::new(lines)
      .block(block)
      .wrap(Wrap { trim: false })
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    truncate(&self.letter.title, 24)
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![Shortcut::new("j/k", "scroll"), Shortcut::new("q", "back")]
  }
}

/// Date part of the creation timestamp
fn written_on(letter: &FutureLetter) -> &str {
  letter.created_at.get(..10).unwrap_or("some time ago")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::MemoryBackend;
  use crate::cache::EntityKind;
  use chrono::Duration;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn user() -> User {
    User {
      id: "u1".to_string(),
      email: Some("ada@example.com".to_string()),
    }
  }

  async fn settle(view: &mut LettersView) -> ViewAction {
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
    let action = view.tick();
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
    view.tick();
    action
  }

  fn type_text(view: &mut LettersView, text: &str) {
    for c in text.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
  }

  fn status(action: ViewAction) -> Option<String> {
    match action {
      ViewAction::Status(message) => Some(message),
      _ => None,
    }
  }

  #[test]
  fn test_draft_validation() {
    let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let mut draft = Draft::new();
    assert!(draft.letter(today).is_err());

    draft.title = TextInput::new().with_value("Hello");
    draft.content = TextInput::multiline().with_value("Dear me");
    draft.unlock_date = TextInput::new().with_value("next year");
    assert!(draft.letter(today).is_err());

    draft.unlock_date = TextInput::new().with_value("2024-02-29");
    assert!(draft.letter(today).is_err());

    draft.unlock_date = TextInput::new().with_value("2024-03-01");
    let letter = draft.letter(today).unwrap();
    assert_eq!(letter.unlock_date, today);
    assert_eq!(letter.title, "Hello");
  }

  #[tokio::test]
  async fn test_compose_seal_and_delete() {
    let memory = MemoryBackend::signed_in("u1", "ada@example.com");
    let (services, _) = Services::in_memory(memory.clone());
    let mut view = LettersView::new(services, user());
    settle(&mut view).await;

    let unlock = Local::now().date_naive() + Duration::days(365);
    view.handle_key(key(KeyCode::Char('n')));
    assert!(view.captures_input());
    type_text(&mut view, "One year on");
    view.handle_key(key(KeyCode::Enter));
    type_text(&mut view, &unlock.to_string());
    view.handle_key(key(KeyCode::Tab));
    type_text(&mut view, "Did you keep running?");
    view.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
    assert!(!view.captures_input());

    let done = status(settle(&mut view).await);
    assert_eq!(done, Some(format!("Sealed \"One year on\" until {}", unlock)));
    let rows = memory.rows(EntityKind::FutureLetters);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["content"], "Did you keep running?");
    assert_eq!(view.letters().len(), 1);

    view.list_state.select(Some(0));
    let locked = status(view.handle_key(key(KeyCode::Enter)));
    assert!(locked.unwrap().contains("stays sealed"));

    view.handle_key(key(KeyCode::Char('d')));
    view.handle_key(key(KeyCode::Char('d')));
    settle(&mut view).await;
    assert!(memory.rows(EntityKind::FutureLetters).is_empty());
    assert!(view.letters().is_empty());
  }

  #[tokio::test]
  async fn test_reschedule_moves_unlock_date() {
    let memory = MemoryBackend::signed_in("u1", "ada@example.com");
    let (services, _) = Services::in_memory(memory.clone());
    let later = Local::now().date_naive() + Duration::days(30);
    services
      .store
      .create_future_letter(
        "u1",
        &NewLetter {
          title: "Soon".into(),
          content: "Hi".into(),
          unlock_date: later,
        },
      )
      .await
      .unwrap();
    let mut view = LettersView::new(services, user());
    settle(&mut view).await;
    view.list_state.select(Some(0));

    let much_later = later + Duration::days(365);
    view.handle_key(key(KeyCode::Char('u')));
    for _ in 0..10 {
      view.handle_key(key(KeyCode::Backspace));
    }
    type_text(&mut view, "2001-01-01");
    let refused = status(view.handle_key(key(KeyCode::Enter)));
    assert_eq!(refused.as_deref(), Some("Pick an unlock date from today on"));
    assert!(view.captures_input());

    for _ in 0..10 {
      view.handle_key(key(KeyCode::Backspace));
    }
    type_text(&mut view, &much_later.to_string());
    view.handle_key(key(KeyCode::Enter));
    settle(&mut view).await;

    let rows = memory.rows(EntityKind::FutureLetters);
    assert_eq!(rows[0]["unlock_date"], much_later.to_string());
    assert_eq!(view.letters()[0].unlock_date, much_later);
  }

  #[tokio::test]
  async fn test_incomplete_draft_stays_open() {
    let (services, _) = Services::in_memory(MemoryBackend::signed_in("u1", "ada@example.com"));
    let mut view = LettersView::new(services, user());
    view.handle_key(key(KeyCode::Char('n')));
    type_text(&mut view, "Untitled thoughts");

    let message = status(view.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL)));
    assert_eq!(message.as_deref(), Some("Fill in the title, unlock date and letter"));
    assert!(view.captures_input());

    view.handle_key(key(KeyCode::Esc));
    assert!(!view.captures_input());
  }
}
