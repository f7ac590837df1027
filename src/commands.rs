/// Available commands, the routes they lead to, and autocomplete logic

/// A top-level screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
  SignIn,
  Journal,
  Insights,
  Reflections,
  Settings,
  Letters,
  Vision,
  Identity,
  Goals,
}

impl Route {
  /// Authentication screens never trigger prefetching.
  pub fn is_auth(self) -> bool {
    matches!(self, Route::SignIn)
  }

  pub fn title(self) -> &'static str {
    match self {
      Route::SignIn => "Sign in",
      Route::Journal => "Journal",
      Route::Insights => "Insights",
      Route::Reflections => "Reflections",
      Route::Settings => "Settings",
      Route::Letters => "Letters",
      Route::Vision => "Vision board",
      Route::Identity => "Identity",
      Route::Goals => "Goals",
    }
  }
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "journal",
    aliases: &["j", "today"],
    description: "Daily journal entry",
  },
  Command {
    name: "insights",
    aliases: &["i", "stats"],
    description: "Mood and task statistics",
  },
  Command {
    name: "reflections",
    aliases: &["r", "reflect"],
    description: "Guided reflections",
  },
  Command {
    name: "settings",
    aliases: &["s", "profile"],
    description: "Profile settings",
  },
  Command {
    name: "letters",
    aliases: &["l", "future"],
    description: "Letters to your future self",
  },
  Command {
    name: "vision",
    aliases: &["v", "board"],
    description: "Vision board affirmations",
  },
  Command {
    name: "identity",
    aliases: &["id", "becoming"],
    description: "Who you are becoming",
  },
  Command {
    name: "goals",
    aliases: &["g", "progress"],
    description: "Goals and task progress by day",
  },
  Command {
    name: "signout",
    aliases: &["logout"],
    description: "Sign out of this account",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit reverie",
  },
];

/// What a resolved command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
  Open(Route),
  SignOut,
  Quit,
}

/// Map a resolved command name to its action.
pub fn action_for(name: &str) -> Option<CommandAction> {
  let action = match name {
    "journal" => CommandAction::Open(Route::Journal),
    "insights" => CommandAction::Open(Route::Insights),
    "reflections" => CommandAction::Open(Route::Reflections),
    "settings" => CommandAction::Open(Route::Settings),
    "letters" => CommandAction::Open(Route::Letters),
    "vision" => CommandAction::Open(Route::Vision),
    "identity" => CommandAction::Open(Route::Identity),
    "goals" => CommandAction::Open(Route::Goals),
    "signout" => CommandAction::SignOut,
    "quit" => CommandAction::Quit,
    _ => return None,
  };
  Some(action)
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_rank(cmd, &input_lower).map(|rank| (cmd, rank)))
    .collect();

  // Stable sort keeps declaration order within a rank
  matches.sort_by_key(|(_, rank)| *rank);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Lower is better; None when the command does not match at all.
fn match_rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("letters");
    assert_eq!(suggestions[0].name, "letters");
  }

  #[test]
  fn test_alias_match() {
    assert_eq!(get_suggestions("stats")[0].name, "insights");
    assert_eq!(get_suggestions("q")[0].name, "quit");
  }

  #[test]
  fn test_every_command_has_an_action() {
    for cmd in COMMANDS {
      assert!(action_for(cmd.name).is_some(), "{} has no action", cmd.name);
    }
  }

  #[test]
  fn test_screen_aliases() {
    assert_eq!(get_suggestions("board")[0].name, "vision");
    assert_eq!(get_suggestions("id")[0].name, "identity");
    assert_eq!(get_suggestions("progress")[0].name, "goals");
  }

  #[test]
  fn test_prefix_match() {
    assert_eq!(get_suggestions("refl")[0].name, "reflections");
  }

  #[test]
  fn test_fuzzy_match() {
    assert_eq!(get_suggestions("sight")[0].name, "insights");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }

  #[test]
  fn test_actions() {
    assert_eq!(action_for("journal"), Some(CommandAction::Open(Route::Journal)));
    assert_eq!(action_for("quit"), Some(CommandAction::Quit));
    assert_eq!(action_for("nope"), None);
    assert_eq!(action_for("vision"), Some(CommandAction::Open(Route::Vision)));
    assert_eq!(action_for("identity"), Some(CommandAction::Open(Route::Identity)));
    assert_eq!(action_for("goals"), Some(CommandAction::Open(Route::Goals)));
    assert!(Route::SignIn.is_auth());
    assert!(!Route::Letters.is_auth());
  }
}
