use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::Services;
use crate::backend::User;
use crate::fetch::{Fetch, FetchState};
use crate::journal::{ProfileField, ProfilePatch, UserProfile};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{Shortcut, View, ViewAction};

/// Profile settings, saved as you type
pub struct SettingsView {
  services: Services,
  user: User,
  profile: Fetch<Option<UserProfile>>,
  list_state: ListState,
  editor: Option<(ProfileField, TextInput)>,
}

impl SettingsView {
  pub fn new(services: Services, user: User) -> Self {
    let store = services.store.clone();
    let user_id = user.id.clone();
    let mut profile = Fetch::new(move || {
      let store = store.clone();
      let user_id = user_id.clone();
      async move { store.profile(&user_id).await }
    });
    profile.fetch();

    let mut list_state = ListState::default();
    list_state.select(Some(0));

    Self {
      services,
      user,
      profile,
      list_state,
      editor: None,
    }
  }

  fn profile(&self) -> Option<&UserProfile> {
    self.profile.data().and_then(|p| p.as_ref())
  }

  fn selected_field(&self) -> ProfileField {
    let idx = self.list_state.selected().unwrap_or(0);
    ProfileField::ALL[idx.min(ProfileField::ALL.len() - 1)]
  }

  fn handle_editor_key(&mut self, key: KeyEvent) -> ViewAction {
    let Some((field, input)) = &mut self.editor else {
      return ViewAction::None;
    };
    let field = *field;

    match input.handle_key(key) {
      InputResult::Changed => {
        let text = input.value().to_string();
        if let Some(Some(profile)) = self.profile.data_mut() {
          profile.set_field(field, text.clone());
        }
        self
          .services
          .autosave
          .profile_changed(&self.user.id, ProfilePatch::field(field, text));
      }
      InputResult::Submitted(_) | InputResult::Cancelled => self.editor = None,
      _ => {}
    }
    ViewAction::None
  }

  fn render_profile(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Settings ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));

    let profile = match self.profile.state() {
      FetchState::Ready(Some(profile)) => profile.clone(),
      FetchState::Ready(None) => {
        let msg = vec![
          Line::from(Span::styled("Account setup required", Style::default().bold())),
          Line::raw(""),
          Line::raw("Your profile could not be found. Use :signout and sign in again to finish setting up your account."),
        ];
        frame.render_widget(Paragraph::new(msg).block(block).wrap(Wrap { trim: true }), area);
        return;
      }
      FetchState::Failed(e) => {
        frame.render_widget(
          Paragraph::new(format!("Could not load profile: {}\n\nPress 'r' to retry.", e))
            .block(block)
            .style(Style::default().fg(Color::Red)),
          area,
        );
        return;
      }
      _ => {
        frame.render_widget(
          Paragraph::new("Loading profile...")
            .block(block)
            .style(Style::default().fg(Color::DarkGray)),
          area,
        );
        return;
      }
    };

    let inner = block.inner(area);
    frame.render_widget(block, area);
    let [account_area, fields_area, editor_area] = Layout::vertical([
      Constraint::Length(2),
      Constraint::Length(ProfileField::ALL.len() as u16),
      Constraint::Min(3),
    ])
    .areas(inner);

    frame.render_widget(
      Paragraph::new(Line::from(vec![
        Span::styled("Account: ", Style::default().fg(Color::DarkGray)),
        Span::raw(profile.email.clone()),
      ])),
      account_area,
    );

    ensure_valid_selection(&mut self.list_state, ProfileField::ALL.len());
    let width = fields_area.width.saturating_sub(28) as usize;
    let items: Vec<ListItem> = ProfileField::ALL
      .iter()
      .map(|field| {
        let value = profile.field(*field);
        let shown = if value.is_empty() {
          Span::styled("not set", Style::default().fg(Color::DarkGray))
        } else {
          Span::raw(truncate(value.lines().next().unwrap_or_default(), width))
        };
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<24}", field.title()), Style::default().fg(Color::Cyan)),
          shown,
        ]))
      })
      .collect();
    let list = List::new(items)
      .highlight_style(Style::default().bg(Color::DarkGray))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, fields_area, &mut self.list_state);

    let field = self.selected_field();
    let (text, color, title) = match &self.editor {
      Some((f, input)) if *f == field => {
        (input.display(), Color::Yellow, format!(" {} (esc done) ", field.title()))
      }
      _ => (
        profile.field(field).to_string(),
        Color::DarkGray,
        format!(" {} ", field.title()),
      ),
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
      editor_area,
    );
  }
}

impl View for SettingsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.editor.is_some() {
      return self.handle_editor_key(key);
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Enter | KeyCode::Char('e') => {
        let field = self.selected_field();
        if let Some(profile) = self.profile() {
          let input = match field {
            ProfileField::VisionStatement | ProfileField::CurrentIdentityFocus => {
              TextInput::multiline()
            }
            _ => TextInput::new(),
          };
          self.editor = Some((field, input.with_value(profile.field(field))));
        }
      }
      KeyCode::Char('r') => self.profile.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_profile(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Settings".to_string()
  }

  fn captures_input(&self) -> bool {
    self.editor.is_some()
  }

  fn tick(&mut self) -> ViewAction {
    if self.profile.poll() {
      let staged = self.services.autosave.staged_profile(&self.user.id);
      if let (Some(staged), Some(Some(profile))) = (staged, self.profile.data_mut()) {
        profile.apply(&staged);
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
      Shortcut::new("enter", "edit").with_priority(20),
      Shortcut::new("q", "back").with_priority(30),
    ]
  }
}
