//! Caching implementations for journal types.

use crate::cache::{Cacheable, EntityKind};

use super::types::{FutureLetter, GuidedReflection, IdentityStatement, JournalEntry, VisionBoardItem};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for JournalEntry {
  fn kind() -> EntityKind {
    EntityKind::JournalEntries
  }

  fn id(&self) -> &str {
    &self.id
  }
}

impl Cacheable for VisionBoardItem {
  fn kind() -> EntityKind {
    EntityKind::VisionBoard
  }

  fn id(&self) -> &str {
    &self.id
  }
}

impl Cacheable for IdentityStatement {
  fn kind() -> EntityKind {
    EntityKind::IdentityStatements
  }

  fn id(&self) -> &str {
    &self.id
  }
}

impl Cacheable for FutureLetter {
  fn kind() -> EntityKind {
    EntityKind::FutureLetters
  }

  fn id(&self) -> &str {
    &self.id
  }
}

impl Cacheable for GuidedReflection {
  fn kind() -> EntityKind {
    EntityKind::GuidedReflections
  }

  fn id(&self) -> &str {
    &self.id
  }
}
