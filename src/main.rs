mod app;
mod autosave;
mod backend;
mod cache;
mod commands;
mod config;
mod event;
mod fetch;
mod journal;
mod logging;
mod prefetch;
mod ui;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::autosave::Autosave;
use crate::backend::{Backend, MemoryBackend, RestBackend, Upload, User};
use crate::cache::{CacheLayer, TtlCache};
use crate::config::Config;
use crate::journal::{IdentitySection, Insights, JournalStore, NewLetter, VisionCategory};

#[derive(Parser, Debug)]
#[command(name = "reverie")]
#[command(about = "A terminal journal with mood tracking, reflections and insights")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/reverie/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Run against an in-memory backend; nothing is persisted
  #[arg(long)]
  local: bool,

  #[command(subcommand)]
  command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Create an account (password from REVERIE_PASSWORD)
  Signup { email: String },

  /// Email a password reset link
  ResetPassword { email: String },

  /// Change the password of the configured account (new one from REVERIE_NEW_PASSWORD)
  SetPassword,

  /// Add a vision board item, optionally with an image
  VisionAdd {
    /// Career, Health, Relationships, Mindset, Lifestyle, Finances, Creativity or Spirituality
    category: String,
    affirmation: String,
    #[arg(long)]
    image: Option<PathBuf>,
  },

  /// Write a letter to your future self
  LetterAdd {
    title: String,
    /// Date the letter opens, YYYY-MM-DD
    unlock_date: NaiveDate,
    /// Letter text; read from --file when omitted
    content: Option<String>,
    #[arg(long)]
    file: Option<PathBuf>,
  },

  /// Add an identity statement
  IdentityAdd {
    /// who_i_am_becoming, core_values, empowering_beliefs or identity_habits
    section: String,
    content: String,
  },

  /// Print journal statistics
  Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // The TUI owns the terminal, so it logs to a file
  let _guard = match args.command {
    None => Some(logging::init_file()?),
    Some(_) => {
      logging::init_stderr()?;
      None
    }
  };

  let config = if args.local {
    Config::load_or_default(args.config.as_deref())?
  } else {
    Config::load(args.config.as_deref())?
  };

  let (backend, label) = connect(&config, args.local).await?;
  let cache = CacheLayer::new(Arc::new(TtlCache::with_default_ttl(config.cache.ttl())))
    .with_ttl(config.cache.ttl());
  let store = JournalStore::from_backend(&backend, cache, &config.default_timezone);

  match args.command {
    None => {
      let services = app::Services {
        autosave: Autosave::new(store.clone(), &config.autosave),
        store,
        auth: backend.auth.clone(),
      };
      let email = config.backend.as_ref().and_then(|b| b.email.clone());
      let mut app = app::App::new(services, backend.session(), label, email);
      app.run().await?;
    }
    Some(cmd) => run_command(cmd, &backend, &store).await?,
  }

  Ok(())
}

/// Build the backend and sign in with the configured account when a password is available.
async fn connect(config: &Config, local: bool) -> Result<(Backend, String)> {
  if local {
    info!("using in-memory backend");
    let memory = MemoryBackend::signed_in("local", "you@localhost");
    return Ok((Backend::memory(memory), "local".to_string()));
  }

  let rest = RestBackend::new(config)?;
  let backend_config = config.backend()?;
  let backend = Backend::rest(rest);

  if let Some(email) = &backend_config.email {
    match Config::get_password() {
      Ok(password) => match backend.auth.sign_in(email, &password).await {
        Ok(user) => info!(user_id = %user.id, "signed in"),
        Err(e) => warn!(error = %e, "sign in at startup failed"),
      },
      Err(_) => info!("REVERIE_PASSWORD not set, starting signed out"),
    }
  }

  Ok((backend, backend_config.url.clone()))
}

async fn require_user(backend: &Backend) -> Result<User> {
  backend.auth.current_user().await.ok_or_else(|| {
    eyre!("Not signed in. Set `backend.email` in the config and REVERIE_PASSWORD in the environment.")
  })
}

async fn run_command(cmd: Cmd, backend: &Backend, store: &JournalStore) -> Result<()> {
  match cmd {
    Cmd::Signup { email } => {
      let password = Config::get_password()?;
      let user = backend.auth.sign_up(&email, &password).await?;
      println!("Account created for {}. Confirm your email, then sign in.", user.display_name());
    }
    Cmd::ResetPassword { email } => {
      backend.auth.send_password_reset(&email).await?;
      println!("If {} has an account, a reset link is on its way.", email);
    }
    Cmd::SetPassword => {
      require_user(backend).await?;
      let password = std::env::var("REVERIE_NEW_PASSWORD")
        .map_err(|_| eyre!("Set REVERIE_NEW_PASSWORD to the new password."))?;
      backend.auth.update_password(&password).await?;
      println!("Password updated.");
    }
    Cmd::VisionAdd {
      category,
      affirmation,
      image,
    } => {
      let user = require_user(backend).await?;
      let category = VisionCategory::parse(&category)
        .ok_or_else(|| eyre!("Unknown category {:?}. Expected one of {:?}", category, VisionCategory::ALL))?;
      let upload = image.as_deref().map(Upload::from_path).transpose()?;
      let item = store
        .add_vision_item(&user.id, category, &affirmation, upload)
        .await?;
      println!("Added {:?} item #{} ({})", item.category, item.order_index, item.id);
    }
    Cmd::LetterAdd {
      title,
      unlock_date,
      content,
      file,
    } => {
      let user = require_user(backend).await?;
      let content = match (content, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
          .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?,
        (None, None) => return Err(eyre!("Give the letter text or --file")),
      };
      let letter = store
        .create_future_letter(
          &user.id,
          &NewLetter {
            title,
            content,
            unlock_date,
          },
        )
        .await?;
      println!("Sealed \"{}\" until {}", letter.title, letter.unlock_date);
    }
    Cmd::IdentityAdd { section, content } => {
      let user = require_user(backend).await?;
      let section = IdentitySection::parse(&section).ok_or_else(|| {
        let known: Vec<&str> = IdentitySection::ALL.iter().map(|s| s.column_value()).collect();
        eyre!("Unknown section {:?}. Expected one of {}", section, known.join(", "))
      })?;
      let statement = store
        .create_identity_statement(&user.id, section, &content)
        .await?;
      println!("Added to {} ({})", section.title(), statement.id);
    }
    Cmd::Stats => {
      let user = require_user(backend).await?;
      let entries = store.journal_entries(&user.id).await?;
      print_stats(&Insights::compute(&entries, Local::now().date_naive()));
    }
  }
  Ok(())
}

fn print_stats(insights: &Insights) {
  println!("Entries:        {}", insights.total_entries);
  println!("This month:     {}", insights.entries_this_month);
  println!(
    "Tasks:          {}/{} ({}%)",
    insights.completed_tasks, insights.total_tasks, insights.completion_rate
  );
  match insights.average_mood {
    Some(mood) => println!("Average mood:   {:.1} / 5", mood),
    None => println!("Average mood:   -"),
  }
  for (mood, count) in &insights.mood_distribution {
    println!("  {:<10} {}", mood.label(), count);
  }
}
