use chrono::{Duration, Local, NaiveDate};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use tracing::warn;

use crate::app::Services;
use crate::autosave::SaveTarget;
use crate::backend::User;
use crate::fetch::{Fetch, FetchState};
use crate::journal::{ChecklistItem, EntryPatch, JournalEntry, JournalField, Mood};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::mood_color;
use crate::ui::view::{Shortcut, View, ViewAction};

/// What the journal page needs once loaded
#[derive(Debug, Clone)]
pub struct JournalPage {
  entry: JournalEntry,
  greeting_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
  Mood,
  Field(JournalField),
  Checklist,
}

const FOCUS_ORDER: [Focus; 6] = [
  Focus::Mood,
  Focus::Field(JournalField::DailyRecap),
  Focus::Field(JournalField::Gratitude),
  Focus::Field(JournalField::GoalsDesires),
  Focus::Field(JournalField::Learnings),
  Focus::Checklist,
];

enum Editor {
  Field(JournalField, TextInput),
  NewItem(TextInput),
}

/// One day's journal page: mood, four text sections and a checklist
pub struct JournalView {
  services: Services,
  user: User,
  date: NaiveDate,
  page: Fetch<JournalPage>,
  focus: Focus,
  checklist: ListState,
  editor: Option<Editor>,
}

impl JournalView {
  pub fn new(services: Services, user: User) -> Self {
    let today = Local::now().date_naive();
    let mut view = Self {
      page: load(&services, &user, today),
      services,
      user,
      date: today,
      focus: Focus::Mood,
      checklist: ListState::default(),
      editor: None,
    };
    view.page.fetch();
    view
  }

  fn go_to(&mut self, date: NaiveDate) {
    self.date = date;
    self.editor = None;
    self.page = load(&self.services, &self.user, date);
    self.page.fetch();
  }

  fn entry(&self) -> Option<&JournalEntry> {
    self.page.data().map(|p| &p.entry)
  }

  fn entry_mut(&mut self) -> Option<&mut JournalEntry> {
    self.page.data_mut().map(|p| &mut p.entry)
  }

  fn queue_save(&mut self, patch: EntryPatch) {
    if let Some(entry) = self.entry() {
      self.services.autosave.entry_changed(&entry.id, patch);
    }
  }

  /// Apply a checklist change locally and persist it right away.
  fn update_checklist(&mut self, change: impl FnOnce(&mut Vec<ChecklistItem>)) {
    let Some(entry) = self.entry_mut() else {
      return;
    };
    change(&mut entry.checklist_items);
    let (id, items) = (entry.id.clone(), entry.checklist_items.clone());
    self.services.autosave.checklist_changed(&id, items);
  }

  fn cycle_mood(&mut self) {
    let Some(entry) = self.entry_mut() else {
      return;
    };
    let mood = Mood::next(entry.mood());
    entry.mood = Some(mood.label().to_string());
    entry.mood_color = Some(mood.color().to_string());
    self.queue_save(EntryPatch::mood(mood));
  }

  fn move_focus(&mut self, down: bool) {
    let len = self.entry().map(|e| e.checklist_items.len()).unwrap_or(0);
    if self.focus == Focus::Checklist && len > 0 {
      let selected = self.checklist.selected().unwrap_or(0);
      if down && selected + 1 < len {
        self.checklist.select(Some(selected + 1));
        return;
      }
      if !down && selected > 0 {
        self.checklist.select(Some(selected - 1));
        return;
      }
    }

    let idx = FOCUS_ORDER.iter().position(|f| *f == self.focus).unwrap_or(0);
    let next = if down {
      (idx + 1).min(FOCUS_ORDER.len() - 1)
    } else {
      idx.saturating_sub(1)
    };
    self.focus = FOCUS_ORDER[next];
  }

  fn activate(&mut self) {
    match self.focus {
      Focus::Mood => self.cycle_mood(),
      Focus::Field(field) => {
        if let Some(entry) = self.entry() {
          let input = TextInput::multiline().with_value(entry.field(field));
          self.editor = Some(Editor::Field(field, input));
        }
      }
      Focus::Checklist => self.toggle_selected(),
    }
  }

  fn toggle_selected(&mut self) {
    if let Some(idx) = self.checklist.selected() {
      self.update_checklist(|items| {
        if let Some(item) = items.get_mut(idx) {
          item.completed = !item.completed;
        }
      });
    }
  }

  fn delete_selected(&mut self) {
    if let Some(idx) = self.checklist.selected() {
      self.update_checklist(|items| {
        if idx < items.len() {
          items.remove(idx);
        }
      });
    }
  }

  fn handle_editor_key(&mut self, key: KeyEvent) -> ViewAction {
    let Some(editor) = &mut self.editor else {
      return ViewAction::None;
    };

    match editor {
      Editor::Field(field, input) => {
        let field = *field;
        match input.handle_key(key) {
          InputResult::Changed => {
            let text = input.value().to_string();
            if let Some(entry) = self.entry_mut() {
              entry.set_field(field, text.clone());
            }
            self.queue_save(EntryPatch::text(field, text));
          }
          InputResult::Submitted(_) | InputResult::Cancelled => self.editor = None,
          _ => {}
        }
      }
      Editor::NewItem(input) => match input.handle_key(key) {
        InputResult::Submitted(text) => {
          self.editor = None;
          let text = text.trim().to_string();
          if !text.is_empty() {
            self.update_checklist(|items| items.push(ChecklistItem::new(text)));
            self.focus = Focus::Checklist;
            let last = self.entry().map(|e| e.checklist_items.len()).unwrap_or(1) - 1;
            self.checklist.select(Some(last));
          }
        }
        InputResult::Cancelled => self.editor = None,
        _ => {}
      },
    }
    ViewAction::None
  }

  fn render_page(&mut self, frame: &mut Frame, area: Rect) {
    let saving = self
      .entry()
      .is_some_and(|e| self.services.autosave.is_pending(&SaveTarget::JournalEntry(e.id.clone())));
    let title = format!(
      " {}{} ",
      self.date.format("%A, %B %-d, %Y"),
      if saving { " (saving...)" } else { "" }
    );
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let page = match self.page.state() {
      FetchState::Ready(page) => page.clone(),
      FetchState::Failed(e) => {
        let msg = Paragraph::new(format!("Could not load this day: {}\n\nPress 'r' to retry.", e))
          .style(Style::default().fg(Color::Red))
          .wrap(Wrap { trim: true });
        frame.render_widget(msg, inner);
        return;
      }
      _ => {
        frame.render_widget(
          Paragraph::new("Opening your journal...").style(Style::default().fg(Color::DarkGray)),
          inner,
        );
        return;
      }
    };
    let entry = &page.entry;

    let [greeting_area, mood_area, fields_area, checklist_area] = Layout::vertical([
      Constraint::Length(1),
      Constraint::Length(1),
      Constraint::Min(8),
      Constraint::Length((entry.checklist_items.len() as u16 + 2).clamp(3, 10)),
    ])
    .areas(inner);

    frame.render_widget(
      Paragraph::new(format!(" Hello, {}", page.greeting_name)).style(Style::default().italic()),
      greeting_area,
    );
    self.render_mood(frame, mood_area, entry);
    self.render_fields(frame, fields_area, entry);
    self.render_checklist(frame, checklist_area, entry);
  }

  fn render_mood(&self, frame: &mut Frame, area: Rect, entry: &JournalEntry) {
    let marker = if self.focus == Focus::Mood { ">" } else { " " };
    let mut spans = vec![Span::styled(
      format!("{} Mood: ", marker),
      Style::default().fg(Color::DarkGray),
    )];
    match entry.mood() {
      Some(mood) => spans.push(Span::styled(
        mood.label(),
        Style::default().fg(mood_color(mood)).bold(),
      )),
      None => spans.push(Span::styled(
        entry.mood.clone().unwrap_or_else(|| "not set".to_string()),
        Style::default().fg(Color::DarkGray),
      )),
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }

  fn render_fields(&self, frame: &mut Frame, area: Rect, entry: &JournalEntry) {
    let rows = Layout::vertical([Constraint::Ratio(1, 2); 2]).split(area);
    let cells: Vec<Rect> = rows
      .iter()
      .flat_map(|row| Layout::horizontal([Constraint::Ratio(1, 2); 2]).split(*row).to_vec())
      .collect();

    for (field, cell) in JournalField::ALL.into_iter().zip(cells) {
      let focused = self.focus == Focus::Field(field);
      let (text, editing) = match &self.editor {
        Some(Editor::Field(f, input)) if *f == field => (input.display(), true),
        _ => (entry.field(field).to_string(), false),
      };
      let border = if editing {
        Color::Yellow
      } else if focused {
        Color::Cyan
      } else {
        Color::DarkGray
      };
      let block = Block::default()
        .title(format!(" {} ", field.title()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
      frame.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: false }),
        cell,
      );
    }
  }

  fn render_checklist(&mut self, frame: &mut Frame, area: Rect, entry: &JournalEntry) {
    let focused = self.focus == Focus::Checklist;
    ensure_valid_selection(&mut self.checklist, entry.checklist_items.len());

    let done = entry.checklist_items.iter().filter(|i| i.completed).count();
    let title = match &self.editor {
      Some(Editor::NewItem(input)) => format!(" New item: {} ", input.display()),
      _ => format!(" Checklist ({}/{}) ", done, entry.checklist_items.len()),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }));

    if entry.checklist_items.is_empty() {
      frame.render_widget(
        Paragraph::new("Nothing yet. Press 'a' to add an item.")
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    }

    let items: Vec<ListItem> = entry
      .checklist_items
      .iter()
      .map(|item| {
        let (mark, style) = if item.completed {
          ("[x] ", Style::default().fg(Color::DarkGray).crossed_out())
        } else {
          ("[ ] ", Style::default())
        };
        ListItem::new(Line::from(vec![Span::raw(mark), Span::styled(item.text.clone(), style)]))
      })
      .collect();

    let mut list = List::new(items).block(block);
    if focused {
      list = list
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");
    }
    frame.render_stateful_widget(list, area, &mut self.checklist);
  }
}

fn load(services: &Services, user: &User, date: NaiveDate) -> Fetch<JournalPage> {
  let store = services.store.clone();
  let user = user.clone();
  Fetch::new(move || {
    let store = store.clone();
    let user = user.clone();
    async move { open_page(&store, &user, date).await }
  })
}

async fn open_page(store: &crate::journal::JournalStore, user: &User, date: NaiveDate) -> Result<JournalPage> {
  // The journal is the first screen after sign-in, so a missing profile row
  // gets created here.
  let nickname = match store.ensure_profile(user).await {
    Ok(profile) => profile.and_then(|p| p.nickname).filter(|n| !n.is_empty()),
    Err(e) => {
      warn!(user_id = %user.id, error = %e, "could not ensure profile");
      None
    }
  };
  let entry = store.open_journal_entry(&user.id, date).await?;

  Ok(JournalPage {
    entry,
    greeting_name: nickname.unwrap_or_else(|| user.display_name().to_string()),
  })
}

impl View for JournalView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.editor.is_some() {
      return self.handle_editor_key(key);
    }

    match key.code {
      KeyCode::Char('h') | KeyCode::Left => self.go_to(self.date - Duration::days(1)),
      KeyCode::Char('l') | KeyCode::Right => self.go_to(self.date + Duration::days(1)),
      KeyCode::Char('t') => self.go_to(Local::now().date_naive()),
      KeyCode::Char('j') | KeyCode::Down => self.move_focus(true),
      KeyCode::Char('k') | KeyCode::Up => self.move_focus(false),
      KeyCode::Char('m') => self.cycle_mood(),
      KeyCode::Enter => self.activate(),
      KeyCode::Char(' ') | KeyCode::Char('x') if self.focus == Focus::Checklist => {
        self.toggle_selected()
      }
      KeyCode::Char('d') if self.focus == Focus::Checklist => self.delete_selected(),
      KeyCode::Char('a') if self.entry().is_some() => {
        self.editor = Some(Editor::NewItem(TextInput::new()));
      }
      KeyCode::Char('r') => self.page.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_page(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Journal [{}]", self.date)
  }

  fn captures_input(&self) -> bool {
    self.editor.is_some()
  }

  fn tick(&mut self) -> ViewAction {
    if self.page.poll() {
      if let Some(e) = self.page.error() {
        return ViewAction::Status(format!("Journal: {}", e));
      }
      let autosave = self.services.autosave.clone();
      if let Some(entry) = self.entry_mut() {
        if let Some(staged) = autosave.staged_entry(&entry.id) {
          entry.apply(&staged);
        }
      }
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.editor.is_some() {
      return vec![Shortcut::new("esc", "done").with_priority(10)];
    }
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("h/l", "day").with_priority(20),
      Shortcut::new("t", "today").with_priority(21),
      Shortcut::new("m", "mood").with_priority(30),
      Shortcut::new("enter", "edit").with_priority(31),
      Shortcut::new("a", "add item").with_priority(40),
      Shortcut::new("space", "toggle").with_priority(41),
    ]
  }
}
