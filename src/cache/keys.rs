//! Entity kinds and the cache keys derived from them.
//!
//! Every per-user collection is cached under `<prefix><user_id>`, and a write
//! to a kind invalidates everything under that kind's prefix.

use std::fmt;

use crate::backend::{Direction, Order};

/// One table in the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
  JournalEntries,
  VisionBoard,
  IdentityStatements,
  FutureLetters,
  GuidedReflections,
  Profiles,
}

impl EntityKind {
  /// Per-user collections that are listed, cached and prefetched.
  pub const COLLECTIONS: [EntityKind; 5] = [
    EntityKind::JournalEntries,
    EntityKind::VisionBoard,
    EntityKind::IdentityStatements,
    EntityKind::GuidedReflections,
    EntityKind::FutureLetters,
  ];

  /// Backend table name.
  pub fn table(self) -> &'static str {
    match self {
      Self::JournalEntries => "journal_entries",
      Self::VisionBoard => "vision_board_items",
      Self::IdentityStatements => "identity_statements",
      Self::FutureLetters => "future_letters",
      Self::GuidedReflections => "guided_reflections",
      Self::Profiles => "profiles",
    }
  }

  pub fn cache_prefix(self) -> &'static str {
    match self {
      Self::JournalEntries => "journal_entries_",
      Self::VisionBoard => "vision_board_",
      Self::IdentityStatements => "identity_statements_",
      Self::FutureLetters => "future_letters_",
      Self::GuidedReflections => "guided_reflections_",
      Self::Profiles => "profile_",
    }
  }

  /// Ordering used when listing a user's rows.
  pub fn list_order(self) -> Option<Order> {
    let (column, direction) = match self {
      Self::JournalEntries => ("entry_date", Direction::Desc),
      Self::VisionBoard | Self::IdentityStatements => ("order_index", Direction::Asc),
      Self::FutureLetters => ("unlock_date", Direction::Desc),
      Self::GuidedReflections => ("created_at", Direction::Desc),
      Self::Profiles => return None,
    };
    Some(Order { column, direction })
  }

  pub fn cache_key(self, user_id: &str) -> CacheKey {
    CacheKey(format!("{}{}", self.cache_prefix(), user_id))
  }

  /// Human-readable name for logs and error messages.
  pub fn label(self) -> &'static str {
    match self {
      Self::JournalEntries => "journal entries",
      Self::VisionBoard => "vision board items",
      Self::IdentityStatements => "identity statements",
      Self::FutureLetters => "future letters",
      Self::GuidedReflections => "guided reflections",
      Self::Profiles => "profiles",
    }
  }
}

/// Cache key for one user's collection of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_key_format() {
    assert_eq!(
      EntityKind::JournalEntries.cache_key("u1").as_str(),
      "journal_entries_u1"
    );
    assert_eq!(EntityKind::VisionBoard.cache_key("u1").as_str(), "vision_board_u1");
  }

  #[test]
  fn test_prefixes_do_not_shadow_each_other() {
    let kinds = [
      EntityKind::JournalEntries,
      EntityKind::VisionBoard,
      EntityKind::IdentityStatements,
      EntityKind::FutureLetters,
      EntityKind::GuidedReflections,
      EntityKind::Profiles,
    ];
    for a in kinds {
      for b in kinds {
        if a != b {
          let key = b.cache_key("user");
          assert!(
            !key.as_str().starts_with(a.cache_prefix()),
            "{:?} prefix matches {:?} key",
            a,
            b
          );
        }
      }
    }
  }

  #[test]
  fn test_collections_exclude_profiles() {
    assert!(!EntityKind::COLLECTIONS.contains(&EntityKind::Profiles));
    assert_eq!(EntityKind::COLLECTIONS.len(), 5);
  }
}
