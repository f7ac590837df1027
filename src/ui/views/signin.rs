use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::app::Services;
use crate::backend::User;
use crate::commands::Route;
use crate::fetch::{Fetch, FetchState};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::view::{Shortcut, View, ViewAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Email,
  Password,
}

/// Shown whenever a screen needs a session and there is none
pub struct SignInView {
  services: Services,
  email: TextInput,
  password: TextInput,
  focus: Field,
  attempt: Option<Fetch<User>>,
}

impl SignInView {
  pub fn new(services: Services, email: Option<&str>) -> Self {
    let email = TextInput::new().with_value(email.unwrap_or_default());
    let focus = if email.is_empty() {
      Field::Email
    } else {
      Field::Password
    };
    Self {
      services,
      email,
      password: TextInput::new(),
      focus,
      attempt: None,
    }
  }

  fn submit(&mut self) -> ViewAction {
    let email = self.email.value().trim().to_string();
    let password = self.password.value().to_string();
    if email.is_empty() || password.is_empty() {
      return ViewAction::Status("Email and password are both required".to_string());
    }

    let auth = self.services.auth.clone();
    let mut attempt = Fetch::new(move || {
      let auth = auth.clone();
      let email = email.clone();
      let password = password.clone();
      async move { auth.sign_in(&email, &password).await }
    });
    attempt.fetch();
    self.attempt = Some(attempt);
    ViewAction::None
  }

  fn signing_in(&self) -> bool {
    self.attempt.as_ref().is_some_and(|a| a.is_loading())
  }
}

impl View for SignInView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.signing_in() {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
        self.focus = match self.focus {
          Field::Email => Field::Password,
          Field::Password => Field::Email,
        };
        ViewAction::None
      }
      _ => {
        let input = match self.focus {
          Field::Email => &mut self.email,
          Field::Password => &mut self.password,
        };
        match input.handle_key(key) {
          InputResult::Submitted(_) if self.focus == Field::Email => {
            self.focus = Field::Password;
            ViewAction::None
          }
          InputResult::Submitted(_) => self.submit(),
          InputResult::Cancelled => ViewAction::Pop,
          _ => ViewAction::None,
        }
      }
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let width = 56.min(area.width);
    let height = 12.min(area.height);
    let card = Rect::new(
      area.x + (area.width - width) / 2,
      area.y + (area.height - height) / 2,
      width,
      height,
    );
    frame.render_widget(Clear, card);

    let block = Block::default()
      .title(" Sign in required ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(card);
    frame.render_widget(block, card);

    let label = |field: Field, name: &'static str| {
      let style = if self.focus == field {
        Style::default().fg(Color::Cyan).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      };
      Span::styled(format!("{:<10}", name), style)
    };
    let masked = "•".repeat(self.password.value().chars().count());
    let password = if self.focus == Field::Password {
      format!("{}▏", masked)
    } else {
      masked
    };
    let email = if self.focus == Field::Email {
      self.email.display()
    } else {
      self.email.value().to_string()
    };

    let status = match self.attempt.as_ref().map(|a| a.state()) {
      Some(FetchState::Loading) => {
        Line::from(Span::styled("Signing in...", Style::default().fg(Color::Yellow)))
      }
      Some(FetchState::Failed(e)) => Line::from(Span::styled(e.clone(), Style::default().fg(Color::Red))),
      _ => Line::raw(""),
    };

    let lines = vec![
      Line::raw("Please sign in to continue."),
      Line::raw(""),
      Line::from(vec![label(Field::Email, "Email"), Span::raw(email)]),
      Line::from(vec![label(Field::Password, "Password"), Span::raw(password)]),
      Line::raw(""),
      status,
      Line::raw(""),
      Line::from(Span::styled(
        "No account yet? Run `reverie signup <email>`.",
        Style::default().fg(Color::DarkGray),
      )),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
  }

  fn breadcrumb_label(&self) -> String {
    Route::SignIn.title().to_string()
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn tick(&mut self) -> ViewAction {
    let Some(attempt) = &mut self.attempt else {
      return ViewAction::None;
    };
    if attempt.poll() && attempt.data().is_some() {
      self.password.clear();
      return ViewAction::Navigate(Route::Journal);
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("tab", "next field").with_priority(10),
      Shortcut::new("enter", "sign in").with_priority(20),
    ]
  }
}
