use crate::autosave::Autosave;
use crate::backend::{Auth, SessionProvider, User};
use crate::commands::{self, CommandAction, Route};
use crate::event::{Event, EventHandler};
use crate::journal::JournalStore;
use crate::prefetch::Prefetcher;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::{
  GoalsView, IdentityView, InsightsView, JournalView, LettersView, ReflectionsView, SettingsView,
  SignInView, VisionBoardView,
};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared handles every screen gets
#[derive(Clone)]
pub struct Services {
  pub store: JournalStore,
  pub autosave: Autosave,
  pub auth: Arc<dyn Auth>,
}

#[cfg(test)]
impl Services {
  /// Services over an in-memory backend with default autosave delays.
  pub fn in_memory(memory: crate::backend::MemoryBackend) -> (Self, Arc<dyn SessionProvider>) {
    let backend = crate::backend::Backend::memory(memory);
    let store = JournalStore::from_backend(
      &backend,
      crate::cache::CacheLayer::new(Arc::new(crate::cache::TtlCache::new())),
      "Asia/Kolkata",
    );
    let services = Services {
      autosave: Autosave::new(store.clone(), &crate::config::AutosaveConfig::default()),
      store,
      auth: backend.auth.clone(),
    };
    (services, backend.session())
  }
}

/// Main application state
pub struct App {
  services: Services,

  /// Answers "who is signed in" on every navigation
  session: Arc<dyn SessionProvider>,

  prefetcher: Prefetcher,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command palette
  command_input: CommandInput,

  /// Session as of the last navigation
  user: Option<User>,

  /// Email to prefill on the sign-in screen
  email_hint: Option<String>,

  /// Last status message for the footer
  status: Option<String>,

  /// Shown in the header
  backend_label: String,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(
    services: Services,
    session: Arc<dyn SessionProvider>,
    backend_label: impl Into<String>,
    email_hint: Option<String>,
  ) -> Self {
    let prefetcher = Prefetcher::new(services.store.clone());
    Self {
      services,
      session,
      prefetcher,
      view_stack: Vec::new(),
      command_input: CommandInput::new(),
      user: None,
      email_hint,
      status: None,
      backend_label: backend_label.into(),
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    let pending = self.services.autosave.pending();
    if pending > 0 {
      warn!(pending, "exiting with unsaved edits still waiting on their timers");
    }
    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(100));
    self.navigate(Route::Journal).await;

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key).await,
        Some(Event::Tick) => self.tick().await,
        Some(Event::Resize) => {}
        None => break,
      }
    }
    Ok(())
  }

  /// Open a top-level screen, replacing the whole stack.
  ///
  /// The session is checked first; screens other than sign-in fall back to
  /// the sign-in screen without one. Prefetching runs in the background.
  pub async fn navigate(&mut self, route: Route) {
    self.user = self.session.current_user().await;
    // Detached; the cache is warm by the time the next screen asks
    let _ = self.prefetcher.on_navigate(route, self.user.as_ref());

    let services = self.services.clone();
    let view: Box<dyn View> = match (route, self.user.clone()) {
      (Route::SignIn, _) | (_, None) => {
        Box::new(SignInView::new(services, self.email_hint.as_deref()))
      }
      (Route::Journal, Some(user)) => Box::new(JournalView::new(services, user)),
      (Route::Insights, Some(user)) => Box::new(InsightsView::new(services, user)),
      (Route::Reflections, Some(user)) => Box::new(ReflectionsView::new(services, user)),
      (Route::Settings, Some(user)) => Box::new(SettingsView::new(services, user)),
      (Route::Letters, Some(user)) => Box::new(LettersView::new(services, user)),
      (Route::Vision, Some(user)) => Box::new(VisionBoardView::new(services, user)),
      (Route::Identity, Some(user)) => Box::new(IdentityView::new(services, user)),
      (Route::Goals, Some(user)) => Box::new(GoalsView::new(services, user)),
    };
    debug!(route = route.title(), signed_in = self.user.is_some(), "navigate");
    self.view_stack = vec![view];
  }

  async fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let captures = self
      .current_view()
      .map(|v| v.captures_input())
      .unwrap_or(false);
    if !captures || self.command_input.is_active() {
      match self.command_input.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(name)) => {
          self.run_command(&name).await;
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    if let Some(view) = self.view_stack.last_mut() {
      let action = view.handle_key(key);
      self.apply(action).await;
    }
  }

  async fn tick(&mut self) {
    if let Some(view) = self.view_stack.last_mut() {
      let action = view.tick();
      self.apply(action).await;
    }
  }

  async fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Navigate(route) => self.navigate(route).await,
      ViewAction::Status(message) => self.status = Some(message),
    }
  }

  async fn run_command(&mut self, name: &str) {
    match commands::action_for(name) {
      Some(CommandAction::Open(route)) => self.navigate(route).await,
      Some(CommandAction::SignOut) => {
        match self.services.auth.sign_out().await {
          Ok(()) => {
            info!("signed out");
            self.status = Some("Signed out".to_string());
          }
          Err(e) => {
            warn!(error = %e, "sign out failed");
            self.status = Some(format!("Sign out failed: {}", e));
          }
        }
        self.navigate(Route::SignIn).await;
      }
      Some(CommandAction::Quit) => self.should_quit = true,
      None if name.is_empty() => {}
      None => self.status = Some(format!("Unknown command: {}", name)),
    }
  }

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.view_stack.iter().map(|v| v.breadcrumb_label()).collect()
  }

  pub fn shortcuts(&self) -> Vec<Shortcut> {
    self
      .current_view()
      .map(|v| v.shortcuts())
      .unwrap_or_default()
  }

  pub fn status(&self) -> Option<&str> {
    self.status.as_deref()
  }

  pub fn backend_label(&self) -> &str {
    &self.backend_label
  }

  pub fn account_label(&self) -> Option<&str> {
    self.user.as_ref().map(|u| u.display_name())
  }

  pub fn should_quit(&self) -> bool {
    self.should_quit
  }
}
