use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::Services;
use crate::backend::User;
use crate::fetch::{Fetch, FetchState};
use crate::journal::{GuidedReflection, NewReflection, ReflectionPatch, ReflectionTheme};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{first_line, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
  Themes,
  Reflections,
}

enum Editor {
  /// Writing a new reflection for the theme
  Compose(ReflectionTheme, TextInput),
  /// Editing a saved reflection in place
  Edit(String, TextInput),
}

/// Guided reflections grouped by theme
pub struct ReflectionsView {
  services: Services,
  user: User,
  reflections: Fetch<Vec<GuidedReflection>>,
  /// Create request started with ctrl-s
  saving: Option<Fetch<GuidedReflection>>,
  pane: Pane,
  themes: ListState,
  list: ListState,
  editor: Option<Editor>,
}

impl ReflectionsView {
  pub fn new(services: Services, user: User) -> Self {
    let store = services.store.clone();
    let user_id = user.id.clone();
    let mut reflections = Fetch::new(move || {
      let store = store.clone();
      let user_id = user_id.clone();
      async move { store.guided_reflections(&user_id).await }
    });
    reflections.fetch();

    let mut themes = ListState::default();
    themes.select(Some(0));

    Self {
      services,
      user,
      reflections,
      saving: None,
      pane: Pane::Themes,
      themes,
      list: ListState::default(),
      editor: None,
    }
  }

  fn theme(&self) -> ReflectionTheme {
    let idx = self.themes.selected().unwrap_or(0);
    ReflectionTheme::ALL[idx.min(ReflectionTheme::ALL.len() - 1)]
  }

  /// Reflections for the selected theme, newest first
  fn for_theme(&self) -> Vec<&GuidedReflection> {
    let theme = self.theme();
    self
      .reflections
      .data()
      .map(|all| all.iter().filter(|r| r.theme == theme).collect())
      .unwrap_or_default()
  }

  fn selected_reflection(&self) -> Option<GuidedReflection> {
    let idx = self.list.selected()?;
    self.for_theme().get(idx).map(|r| (*r).clone())
  }

  fn start_save(&mut self, theme: ReflectionTheme, text: String) {
    let store = self.services.store.clone();
    let user_id = self.user.id.clone();
    let new = NewReflection::new(theme, text);
    let mut saving = Fetch::new(move || {
      let store = store.clone();
      let user_id = user_id.clone();
      let new = new.clone();
      async move { create(&store, &user_id, &new).await }
    });
    saving.fetch();
    self.saving = Some(saving);
  }

  fn handle_editor_key(&mut self, key: KeyEvent) -> ViewAction {
    let Some(editor) = &mut self.editor else {
      return ViewAction::None;
    };

    match editor {
      Editor::Compose(theme, input) => {
        let theme = *theme;
        if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
          let text = input.value().trim().to_string();
          if text.is_empty() {
            return ViewAction::Status("Write something before saving".to_string());
          }
          self.editor = None;
          self.start_save(theme, text);
          return ViewAction::Status("Saving reflection...".to_string());
        }
        if let InputResult::Submitted(_) = input.handle_key(key) {
          // Esc leaves compose mode without saving
          self.editor = None;
          return ViewAction::Status("Reflection discarded".to_string());
        }
      }
      Editor::Edit(id, input) => match input.handle_key(key) {
        InputResult::Changed => {
          let text = input.value().to_string();
          let id = id.clone();
          if let Some(all) = self.reflections.data_mut() {
            if let Some(r) = all.iter_mut().find(|r| r.id == id) {
              r.reflection = text.clone();
            }
          }
          let patch = ReflectionPatch {
            reflection: Some(text),
          };
          self.services.autosave.reflection_changed(&id, patch);
        }
        InputResult::Submitted(_) | InputResult::Cancelled => self.editor = None,
        _ => {}
      },
    }
    ViewAction::None
  }

  fn render_themes(&mut self, frame: &mut Frame, area: Rect) {
    let focused = self.pane == Pane::Themes;
    let counts: Vec<usize> = ReflectionTheme::ALL
      .iter()
      .map(|theme| {
        self
          .reflections
          .data()
          .map(|all| all.iter().filter(|r| r.theme == *theme).count())
          .unwrap_or(0)
      })
      .collect();

    let items: Vec<ListItem> = ReflectionTheme::ALL
      .iter()
      .zip(counts)
      .map(|(theme, count)| {
        ListItem::new(Line::from(vec![
          Span::raw(format!("{:<16}", theme.title())),
          Span::styled(format!("{:>3}", count), Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let block = Block::default()
      .title(" Themes ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }));
    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.themes);
  }

  fn render_reflections(&mut self, frame: &mut Frame, area: Rect) {
    let theme = self.theme();
    let [prompt_area, body_area] =
      Layout::vertical([Constraint::Length(3), Constraint::Min(3)]).areas(area);

    frame.render_widget(
      Paragraph::new(theme.prompt())
        .style(Style::default().italic())
        .wrap(Wrap { trim: true })
        .block(Block::default().title(format!(" {} ", theme.title())).borders(Borders::TOP)),
      prompt_area,
    );

    if let Some(Editor::Compose(_, input)) = &self.editor {
      let block = Block::default()
        .title(" New reflection (ctrl-s save, esc discard) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
      frame.render_widget(
        Paragraph::new(input.display()).block(block).wrap(Wrap { trim: false }),
        body_area,
      );
      return;
    }

    if let Some(Editor::Edit(_, input)) = &self.editor {
      let block = Block::default()
        .title(" Editing (esc done) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
      frame.render_widget(
        Paragraph::new(input.display()).block(block).wrap(Wrap { trim: false }),
        body_area,
      );
      return;
    }

    let focused = self.pane == Pane::Reflections;
    let title = match self.reflections.state() {
      FetchState::Loading => " Reflections (loading...) ".to_string(),
      FetchState::Failed(e) => format!(" Reflections (error: {}) ", e),
      _ => format!(" Reflections ({}) ", self.for_theme().len()),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }));

    let rows: Vec<(String, String)> = self
      .for_theme()
      .iter()
      .map(|r| (r.created_at.get(..10).unwrap_or_default().to_string(), first_line(&r.reflection).to_string()))
      .collect();
    ensure_valid_selection(&mut self.list, rows.len());

    if rows.is_empty() {
      frame.render_widget(
        Paragraph::new("Nothing written for this theme yet. Press 'n' to begin.")
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        body_area,
      );
      return;
    }

    let width = body_area.width.saturating_sub(16) as usize;
    let items: Vec<ListItem> = rows
      .into_iter()
      .map(|(date, line)| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{}  ", date), Style::default().fg(Color::Cyan)),
          Span::raw(truncate(&line, width)),
        ]))
      })
      .collect();

    let mut list = List::new(items).block(block);
    if focused {
      list = list
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");
    }
    frame.render_stateful_widget(list, body_area, &mut self.list);
  }
}

async fn create(
  store: &crate::journal::JournalStore,
  user_id: &str,
  new: &NewReflection,
) -> Result<GuidedReflection> {
  store.create_guided_reflection(user_id, new).await
}

impl View for ReflectionsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.editor.is_some() {
      return self.handle_editor_key(key);
    }

    match key.code {
      KeyCode::Tab | KeyCode::BackTab => {
        self.pane = match self.pane {
          Pane::Themes => Pane::Reflections,
          Pane::Reflections => Pane::Themes,
        };
      }
      KeyCode::Char('j') | KeyCode::Down => match self.pane {
        Pane::Themes => {
          self.themes.select_next();
          ensure_valid_selection(&mut self.themes, ReflectionTheme::ALL.len());
          self.list.select(None);
        }
        Pane::Reflections => self.list.select_next(),
      },
      KeyCode::Char('k') | KeyCode::Up => match self.pane {
        Pane::Themes => {
          self.themes.select_previous();
          self.list.select(None);
        }
        Pane::Reflections => self.list.select_previous(),
      },
      KeyCode::Char('n') => {
        self.editor = Some(Editor::Compose(self.theme(), TextInput::multiline()));
      }
      KeyCode::Char('e') | KeyCode::Enter => {
        if self.pane == Pane::Themes {
          self.pane = Pane::Reflections;
        } else if let Some(r) = self.selected_reflection() {
          let input = TextInput::multiline().with_value(&r.reflection);
          self.editor = Some(Editor::Edit(r.id, input));
        }
      }
      KeyCode::Char('r') => self.reflections.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Guided reflections ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [themes_area, body_area] =
      Layout::horizontal([Constraint::Length(24), Constraint::Min(20)]).areas(inner);
    self.render_themes(frame, themes_area);
    self.render_reflections(frame, body_area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Reflections [{}]", self.theme().title())
  }

  fn captures_input(&self) -> bool {
    self.editor.is_some()
  }

  fn tick(&mut self) -> ViewAction {
    self.reflections.poll();

    let Some(saving) = &mut self.saving else {
      return ViewAction::None;
    };
    if !saving.poll() {
      return ViewAction::None;
    }
    let action = match saving.state() {
      FetchState::Ready(_) => {
        self.reflections.refetch();
        ViewAction::Status("Reflection saved".to_string())
      }
      FetchState::Failed(e) => ViewAction::Status(format!("Could not save reflection: {}", e)),
      _ => ViewAction::None,
    };
    self.saving = None;
    action
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.editor.is_some() {
      return vec![Shortcut::new("esc", "done").with_priority(10)];
    }
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("tab", "pane").with_priority(20),
      Shortcut::new("n", "new").with_priority(30),
      Shortcut::new("e", "edit").with_priority(31),
      Shortcut::new("q", "back").with_priority(40),
    ]
  }
}
