use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::app::Services;
use crate::backend::User;
use crate::fetch::{Fetch, FetchState, Task};
use crate::journal::{VisionBoardItem, VisionCategory, VisionItemPatch};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{Shortcut, View, ViewAction};

enum Editor {
  /// New affirmation; tab cycles the category
  New(usize, TextInput),
  Edit(String, TextInput),
}

/// Vision board: affirmations by life area, in board order
pub struct VisionBoardView {
  services: Services,
  user: User,
  items: Fetch<Vec<VisionBoardItem>>,
  list_state: ListState,
  editor: Option<Editor>,
  /// Item waiting for a second `d`
  confirm_delete: Option<String>,
  /// Write in flight; resolves to a status message
  task: Option<Task<String>>,
}

impl VisionBoardView {
  pub fn new(services: Services, user: User) -> Self {
    let store = services.store.clone();
    let user_id = user.id.clone();
    let mut items = Fetch::new(move || {
      let store = store.clone();
      let user_id = user_id.clone();
      async move { store.vision_items(&user_id).await }
    });
    items.fetch();

    Self {
      services,
      user,
      items,
      list_state: ListState::default(),
      editor: None,
      confirm_delete: None,
      task: None,
    }
  }

  fn items(&self) -> &[VisionBoardItem] {
    self.items.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected(&self) -> Option<VisionBoardItem> {
    let idx = self.list_state.selected()?;
    self.items().get(idx).cloned()
  }

  fn handle_editor_key(&mut self, key: KeyEvent) -> ViewAction {
    let Some(editor) = &mut self.editor else {
      return ViewAction::None;
    };

    match editor {
      Editor::New(category, input) => {
        match key.code {
          KeyCode::Tab => {
            *category = (*category + 1) % VisionCategory::ALL.len();
            return ViewAction::None;
          }
          KeyCode::BackTab => {
            *category = (*category + VisionCategory::ALL.len() - 1) % VisionCategory::ALL.len();
            return ViewAction::None;
          }
          _ => {}
        }
        let category = VisionCategory::ALL[*category];
        match input.handle_key(key) {
          InputResult::Submitted(text) => {
            let text = text.trim().to_string();
            if text.is_empty() {
              return ViewAction::Status("Write an affirmation first".to_string());
            }
            self.editor = None;
            let store = self.services.store.clone();
            let user_id = self.user.id.clone();
            self.task = Some(Task::spawn(async move {
              store.add_vision_item(&user_id, category, &text, None).await?;
              Ok(format!("Added to {:?}", category))
            }));
          }
          InputResult::Cancelled => self.editor = None,
          _ => {}
        }
      }
      Editor::Edit(id, input) => match input.handle_key(key) {
        InputResult::Submitted(text) => {
          let id = id.clone();
          self.editor = None;
          let text = text.trim().to_string();
          if text.is_empty() {
            return ViewAction::Status("An affirmation can't be empty; use d to delete".to_string());
          }
          if let Some(item) = self
            .items
            .data_mut()
            .and_then(|all| all.iter_mut().find(|i| i.id == id))
          {
            if item.affirmation == text {
              return ViewAction::None;
            }
            item.affirmation = text.clone();
          }
          let store = self.services.store.clone();
          let patch = VisionItemPatch {
            affirmation: Some(text),
            ..VisionItemPatch::default()
          };
          self.task = Some(Task::spawn(async move {
            store.update_vision_item(&id, &patch).await?;
            Ok("Affirmation saved".to_string())
          }));
        }
        InputResult::Cancelled => self.editor = None,
        _ => {}
      },
    }
    ViewAction::None
  }

  fn delete_selected(&mut self) -> ViewAction {
    let Some(item) = self.selected() else {
      return ViewAction::None;
    };
    if self.confirm_delete.as_deref() != Some(item.id.as_str()) {
      self.confirm_delete = Some(item.id.clone());
      return ViewAction::Status(format!(
        "Press d again to delete \"{}\"",
        truncate(&item.affirmation, 40)
      ));
    }

    self.confirm_delete = None;
    let store = self.services.store.clone();
    self.task = Some(Task::spawn(async move {
      store.delete_vision_item(&item).await?;
      Ok("Item deleted".to_string())
    }));
    ViewAction::None
  }

  fn render_editor(&self, frame: &mut Frame, area: Rect) {
    let (title, text) = match &self.editor {
      Some(Editor::New(category, input)) => (
        format!(
          " New {:?} affirmation (tab category, enter add, esc cancel) ",
          VisionCategory::ALL[*category]
        ),
        input.display(),
      ),
      Some(Editor::Edit(_, input)) => (
        " Edit affirmation (enter save, esc cancel) ".to_string(),
        input.display(),
      ),
      None => return,
    };
    frame.render_widget(
      Paragraph::new(text).block(
        Block::default()
          .title(title)
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Yellow)),
      ),
      area,
    );
  }
}

impl View for VisionBoardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.editor.is_some() {
      return self.handle_editor_key(key);
    }
    if key.code != KeyCode::Char('d') {
      self.confirm_delete = None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('n') => self.editor = Some(Editor::New(0, TextInput::new())),
      KeyCode::Char('e') | KeyCode::Enter => {
        if let Some(item) = self.selected() {
          let input = TextInput::new().with_value(&item.affirmation);
          self.editor = Some(Editor::Edit(item.id, input));
        }
      }
      KeyCode::Char('d') => return self.delete_selected(),
      KeyCode::Char('r') => self.items.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.items().len();
    ensure_valid_selection(&mut self.list_state, len);

    let [list_area, editor_area] = if self.editor.is_some() {
      Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).areas(area)
    } else {
      [area, Rect::default()]
    };

    let title = match self.items.state() {
      FetchState::Loading => " Vision board (loading...) ".to_string(),
      FetchState::Failed(e) => format!(" Vision board (error: {}) ", e),
      _ => format!(" Vision board ({}) ", len),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));

    if len == 0 && !self.items.is_loading() {
      let content = if self.items.error().is_some() {
        "Failed to load the board. Press 'r' to retry."
      } else {
        "Your board is empty. Press 'n' to add an affirmation."
      };
      frame.render_widget(
        Paragraph::new(content)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        list_area,
      );
    } else {
      let width = list_area.width.saturating_sub(26) as usize;
      let items: Vec<ListItem> = self
        .items()
        .iter()
        .map(|item| {
          let mut spans = vec![
            Span::styled(
              format!("{:<14}", format!("{:?}", item.category)),
              Style::default().fg(Color::Cyan),
            ),
            Span::raw(truncate(&item.affirmation, width)),
          ];
          if item.image_url.is_some() {
            spans.push(Span::styled("  [image]", Style::default().fg(Color::DarkGray)));
          }
          ListItem::new(Line::from(spans))
        })
        .collect();
      let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
      frame.render_stateful_widget(list, list_area, &mut self.list_state);
    }

    self.render_editor(frame, editor_area);
  }

  fn breadcrumb_label(&self) -> String {
    "Vision board".to_string()
  }

  fn captures_input(&self) -> bool {
    self.editor.is_some()
  }

  fn tick(&mut self) -> ViewAction {
    self.items.poll();

    let Some(result) = self.task.as_mut().and_then(|t| t.poll()) else {
      return ViewAction::None;
    };
    self.task = None;
    match result {
      Ok(message) => {
        self.items.refetch();
        ViewAction::Status(message)
      }
      Err(e) => ViewAction::Status(format!("Vision board: {}", e)),
    }
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.editor.is_some() {
      return vec![Shortcut::new("esc", "cancel").with_priority(10)];
    }
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("n", "new").with_priority(20),
      Shortcut::new("e", "edit").with_priority(21),
      Shortcut::new("d", "delete").with_priority(22),
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
  use serde_json::json;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn user() -> User {
    User {
      id: "u1".to_string(),
      email: Some("ada@example.com".to_string()),
    }
  }

  async fn settle(view: &mut VisionBoardView) -> ViewAction {
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

  fn type_text(view: &mut VisionBoardView, text: &str) {
    for c in text.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[tokio::test]
  async fn test_add_edit_and_delete_item() {
    let memory = MemoryBackend::signed_in("u1", "ada@example.com");
    let (services, _) = Services::in_memory(memory.clone());
    let mut view = VisionBoardView::new(services, user());
    settle(&mut view).await;

    view.handle_key(key(KeyCode::Char('n')));
    view.handle_key(key(KeyCode::Tab));
    type_text(&mut view, "I run at dawn");
    view.handle_key(key(KeyCode::Enter));
    settle(&mut view).await;

    let rows = memory.rows(EntityKind::VisionBoard);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["category"], "Health");
    assert_eq!(view.items().len(), 1);

    view.list_state.select(Some(0));
    view.handle_key(key(KeyCode::Char('e')));
    type_text(&mut view, " daily");
    view.handle_key(key(KeyCode::Enter));
    settle(&mut view).await;
    assert_eq!(
      memory.rows(EntityKind::VisionBoard)[0]["affirmation"],
      "I run at dawn daily"
    );

    assert!(matches!(view.handle_key(key(KeyCode::Char('d'))), ViewAction::Status(_)));
    assert_eq!(memory.rows(EntityKind::VisionBoard).len(), 1);
    view.handle_key(key(KeyCode::Char('d')));
    settle(&mut view).await;
    assert!(memory.rows(EntityKind::VisionBoard).is_empty());
    assert!(view.items().is_empty());
  }

  #[tokio::test]
  async fn test_delete_needs_two_presses_in_a_row() {
    let memory = MemoryBackend::signed_in("u1", "ada@example.com");
    memory.seed(
      EntityKind::VisionBoard,
      json!({ "user_id": "u1", "category": "Career", "affirmation": "I lead", "order_index": 0 }),
    );
    let (services, _) = Services::in_memory(memory.clone());
    let mut view = VisionBoardView::new(services, user());
    settle(&mut view).await;
    view.list_state.select(Some(0));

    view.handle_key(key(KeyCode::Char('d')));
    view.handle_key(key(KeyCode::Char('k')));
    assert!(matches!(view.handle_key(key(KeyCode::Char('d'))), ViewAction::Status(_)));
    settle(&mut view).await;
    assert_eq!(memory.rows(EntityKind::VisionBoard).len(), 1);
  }
}
