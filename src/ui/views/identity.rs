use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::Services;
use crate::backend::User;
use crate::fetch::{Fetch, FetchState, Task};
use crate::journal::{IdentityPatch, IdentitySection, IdentityStatement};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{Shortcut, View, ViewAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
  Sections,
  Statements,
}

enum Editor {
  New(IdentitySection, TextInput),
  Edit(String, TextInput),
}

/// Identity statements in their four sections
pub struct IdentityView {
  services: Services,
  user: User,
  statements: Fetch<Vec<IdentityStatement>>,
  pane: Pane,
  sections: ListState,
  list: ListState,
  editor: Option<Editor>,
  confirm_delete: Option<String>,
  task: Option<Task<String>>,
}

impl IdentityView {
  pub fn new(services: Services, user: User) -> Self {
    let store = services.store.clone();
    let user_id = user.id.clone();
    let mut statements = Fetch::new(move || {
      let store = store.clone();
      let user_id = user_id.clone();
      async move { store.identity_statements(&user_id).await }
    });
    statements.fetch();

    let mut sections = ListState::default();
    sections.select(Some(0));

    Self {
      services,
      user,
      statements,
      pane: Pane::Sections,
      sections,
      list: ListState::default(),
      editor: None,
      confirm_delete: None,
      task: None,
    }
  }

  fn section(&self) -> IdentitySection {
    let idx = self.sections.selected().unwrap_or(0);
    IdentitySection::ALL[idx.min(IdentitySection::ALL.len() - 1)]
  }

  fn in_section(&self, section: IdentitySection) -> Vec<&IdentityStatement> {
    self
      .statements
      .data()
      .map(|all| all.iter().filter(|s| s.section == section).collect())
      .unwrap_or_default()
  }

  fn selected(&self) -> Option<IdentityStatement> {
    if self.pane != Pane::Statements {
      return None;
    }
    let idx = self.list.selected()?;
    self.in_section(self.section()).get(idx).map(|s| (*s).clone())
  }

  fn handle_editor_key(&mut self, key: KeyEvent) -> ViewAction {
    let Some(editor) = &mut self.editor else {
      return ViewAction::None;
    };

    match editor {
      Editor::New(section, input) => {
        let section = *section;
        match input.handle_key(key) {
          InputResult::Submitted(text) => {
            let text = text.trim().to_string();
            self.editor = None;
            if text.is_empty() {
              return ViewAction::None;
            }
            let store = self.services.store.clone();
            let user_id = self.user.id.clone();
            self.task = Some(Task::spawn(async move {
              store.create_identity_statement(&user_id, section, &text).await?;
              Ok(format!("Added to {}", section.title()))
            }));
          }
          InputResult::Cancelled => self.editor = None,
          _ => {}
        }
      }
      Editor::Edit(id, input) => match input.handle_key(key) {
        InputResult::Submitted(text) => {
          let id = id.clone();
          let text = text.trim().to_string();
          self.editor = None;
          if text.is_empty() {
            return ViewAction::Status("A statement can't be empty; use d to delete".to_string());
          }
          if let Some(statement) = self
            .statements
            .data_mut()
            .and_then(|all| all.iter_mut().find(|s| s.id == id))
          {
            if statement.content == text {
              return ViewAction::None;
            }
            statement.content = text.clone();
          }
          let store = self.services.store.clone();
          let patch = IdentityPatch {
            content: Some(text),
            ..IdentityPatch::default()
          };
          self.task = Some(Task::spawn(async move {
            store.update_identity_statement(&id, &patch).await?;
            Ok("Statement saved".to_string())
          }));
        }
        InputResult::Cancelled => self.editor = None,
        _ => {}
      },
    }
    ViewAction::None
  }

  fn delete_selected(&mut self) -> ViewAction {
    let Some(statement) = self.selected() else {
      return ViewAction::None;
    };
    if self.confirm_delete.as_deref() != Some(statement.id.as_str()) {
      self.confirm_delete = Some(statement.id.clone());
      return ViewAction::Status(format!(
        "Press d again to delete \"{}\"",
        truncate(&statement.content, 40)
      ));
    }

    self.confirm_delete = None;
    let store = self.services.store.clone();
    self.task = Some(Task::spawn(async move {
      store.delete_identity_statement(&statement.id).await?;
      Ok("Statement deleted".to_string())
    }));
    ViewAction::None
  }

  fn render_sections(&mut self, frame: &mut Frame, area: Rect) {
    let focused = self.pane == Pane::Sections;
    let items: Vec<ListItem> = IdentitySection::ALL
      .iter()
      .map(|section| {
        let count = self.in_section(*section).len();
        ListItem::new(Line::from(vec![
          Span::raw(format!("{:<20}", section.title())),
          Span::styled(format!("{:>3}", count), Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let block = Block::default()
      .title(" Sections ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }));
    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.sections);
  }

  fn render_statements(&mut self, frame: &mut Frame, area: Rect) {
    let section = self.section();
    let [list_area, editor_area] = if self.editor.is_some() {
      Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).areas(area)
    } else {
      [area, Rect::default()]
    };

    let focused = self.pane == Pane::Statements;
    let rows: Vec<String> = self
      .in_section(section)
      .iter()
      .map(|s| s.content.clone())
      .collect();
    ensure_valid_selection(&mut self.list, rows.len());

    let title = match self.statements.state() {
      FetchState::Loading => format!(" {} (loading...) ", section.title()),
      FetchState::Failed(e) => format!(" {} (error: {}) ", section.title(), e),
      _ => format!(" {} ", section.title()),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }));

    if rows.is_empty() {
      frame.render_widget(
        Paragraph::new(format!("{}\n\nPress 'n' to add one.", section.placeholder()))
          .block(block)
          .style(Style::default().fg(Color::DarkGray))
          .wrap(Wrap { trim: true }),
        list_area,
      );
    } else {
      let width = list_area.width.saturating_sub(6) as usize;
      let items: Vec<ListItem> = rows
        .iter()
        .map(|content| ListItem::new(truncate(content, width)))
        .collect();
      let mut list = List::new(items).block(block);
      if focused {
        list = list
          .highlight_style(Style::default().bg(Color::DarkGray))
          .highlight_symbol("> ");
      }
      frame.render_stateful_widget(list, list_area, &mut self.list);
    }

    let (title, input) = match &self.editor {
      Some(Editor::New(section, input)) => (format!(" New: {} ", section.title()), input),
      Some(Editor::Edit(_, input)) => (" Edit statement ".to_string(), input),
      None => return,
    };
    let text = if input.is_empty() {
      Span::styled(section.placeholder(), Style::default().fg(Color::DarkGray))
    } else {
      Span::raw(input.display())
    };
    frame.render_widget(
      Paragraph::new(Line::from(text)).block(
        Block::default()
          .title(format!("{}(enter save, esc cancel) ", title))
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Yellow)),
      ),
      editor_area,
    );
  }
}

impl View for IdentityView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.editor.is_some() {
      return self.handle_editor_key(key);
    }
    if key.code != KeyCode::Char('d') {
      self.confirm_delete = None;
    }

    match key.code {
      KeyCode::Tab | KeyCode::BackTab => {
        self.pane = match self.pane {
          Pane::Sections => Pane::Statements,
          Pane::Statements => Pane::Sections,
        };
      }
      KeyCode::Char('j') | KeyCode::Down => match self.pane {
        Pane::Sections => {
          self.sections.select_next();
          ensure_valid_selection(&mut self.sections, IdentitySection::ALL.len());
          self.list.select(None);
        }
        Pane::Statements => self.list.select_next(),
      },
      KeyCode::Char('k') | KeyCode::Up => match self.pane {
        Pane::Sections => {
          self.sections.select_previous();
          self.list.select(None);
        }
        Pane::Statements => self.list.select_previous(),
      },
      KeyCode::Char('n') => self.editor = Some(Editor::New(self.section(), TextInput::new())),
      KeyCode::Char('e') | KeyCode::Enter => {
        if self.pane == Pane::Sections {
          self.pane = Pane::Statements;
          self.list.select(Some(0));
        } else if let Some(statement) = self.selected() {
          let input = TextInput::new().with_value(&statement.content);
          self.editor = Some(Editor::Edit(statement.id, input));
        }
      }
      KeyCode::Char('d') => return self.delete_selected(),
      KeyCode::Char('r') => self.statements.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Identity ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [sections_area, body_area] =
      Layout::horizontal([Constraint::Length(28), Constraint::Min(20)]).areas(inner);
    self.render_sections(frame, sections_area);
    self.render_statements(frame, body_area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Identity [{}]", self.section().title())
  }

  fn captures_input(&self) -> bool {
    self.editor.is_some()
  }

  fn tick(&mut self) -> ViewAction {
    self.statements.poll();

    let Some(result) = self.task.as_mut().and_then(|t| t.poll()) else {
      return ViewAction::None;
    };
    self.task = None;
    match result {
      Ok(message) => {
        self.statements.refetch();
        ViewAction::Status(message)
      }
      Err(e) => ViewAction::Status(format!("Identity: {}", e)),
    }
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.editor.is_some() {
      return vec![Shortcut::new("esc", "cancel").with_priority(10)];
    }
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("tab", "pane").with_priority(20),
      Shortcut::new("n", "new").with_priority(21),
      Shortcut::new("e", "edit").with_priority(22),
      Shortcut::new("d", "delete").with_priority(23),
      Shortcut::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::MemoryBackend;
  use crate::cache::EntityKind;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn user() -> User {
    User {
      id: "u1".to_string(),
      email: Some("ada@example.com".to_string()),
    }
  }

  async fn settle(view: &mut IdentityView) {
    for _ in 0..2 {
      for _ in 0..10 {
        tokio::task::yield_now().await;
      }
      view.tick();
    }
  }

  fn type_text(view: &mut IdentityView, text: &str) {
    for c in text.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[tokio::test]
  async fn test_statement_lands_in_selected_section() {
    let memory = MemoryBackend::signed_in("u1", "ada@example.com");
    let (services, _) = Services::in_memory(memory.clone());
    let mut view = IdentityView::new(services, user());
    settle(&mut view).await;

    view.handle_key(key(KeyCode::Char('j')));
    assert_eq!(view.section(), IdentitySection::CoreValues);
    view.handle_key(key(KeyCode::Char('n')));
    type_text(&mut view, "Honesty");
    view.handle_key(key(KeyCode::Enter));
    settle(&mut view).await;

    let rows = memory.rows(EntityKind::IdentityStatements);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["section"], "core_values");
    assert_eq!(view.in_section(IdentitySection::CoreValues).len(), 1);
  }

  #[tokio::test]
  async fn test_edit_and_delete_statement() {
    let memory = MemoryBackend::signed_in("u1", "ada@example.com");
    let (services, _) = Services::in_memory(memory.clone());
    services
      .store
      .create_identity_statement("u1", IdentitySection::WhoIAmBecoming, "I am calm")
      .await
      .unwrap();
    let mut view = IdentityView::new(services, user());
    settle(&mut view).await;

    view.handle_key(key(KeyCode::Enter));
    view.handle_key(key(KeyCode::Char('e')));
    type_text(&mut view, " under pressure");
    view.handle_key(key(KeyCode::Enter));
    settle(&mut view).await;
    assert_eq!(
      memory.rows(EntityKind::IdentityStatements)[0]["content"],
      "I am calm under pressure"
    );

    view.handle_key(key(KeyCode::Char('d')));
    view.handle_key(key(KeyCode::Char('d')));
    settle(&mut view).await;
    assert!(memory.rows(EntityKind::IdentityStatements).is_empty());
    assert!(view.in_section(IdentitySection::WhoIAmBecoming).is_empty());
  }
}
