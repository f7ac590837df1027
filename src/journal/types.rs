use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One day's journal page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
  pub id: String,
  pub user_id: String,
  pub entry_date: NaiveDate,
  pub mood: Option<String>,
  pub mood_color: Option<String>,
  pub daily_recap: Option<String>,
  pub gratitude: Option<String>,
  pub goals_desires: Option<String>,
  pub learnings: Option<String>,
  #[serde(default)]
  pub checklist_items: Vec<ChecklistItem>,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

impl JournalEntry {
  /// True once anything was written or planned for the day.
  pub fn has_content(&self) -> bool {
    let text = [&self.daily_recap, &self.gratitude, &self.goals_desires, &self.mood];
    let has_text = text
      .iter()
      .any(|field| field.as_deref().is_some_and(|t| !t.trim().is_empty()));
    has_text || !self.checklist_items.is_empty()
  }

  pub fn field(&self, field: JournalField) -> &str {
    let value = match field {
      JournalField::DailyRecap => &self.daily_recap,
      JournalField::Gratitude => &self.gratitude,
      JournalField::GoalsDesires => &self.goals_desires,
      JournalField::Learnings => &self.learnings,
    };
    value.as_deref().unwrap_or_default()
  }

  pub fn set_field(&mut self, field: JournalField, text: String) {
    let slot = match field {
      JournalField::DailyRecap => &mut self.daily_recap,
      JournalField::Gratitude => &mut self.gratitude,
      JournalField::GoalsDesires => &mut self.goals_desires,
      JournalField::Learnings => &mut self.learnings,
    };
    *slot = Some(text);
  }

  pub fn mood(&self) -> Option<Mood> {
    self.mood.as_deref().and_then(Mood::from_label)
  }

  /// Show edits that have not been written yet.
  pub fn apply(&mut self, patch: &EntryPatch) {
    macro_rules! put {
      ($($field:ident),*) => {
        $(if let Some(value) = &patch.$field { self.$field = Some(value.clone()); })*
      };
    }
    put!(mood, mood_color, daily_recap, gratitude, goals_desires, learnings);
    if let Some(items) = &patch.checklist_items {
      self.checklist_items = items.clone();
    }
  }
}

/// Embedded checklist row, stored inside the entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
  pub id: String,
  pub text: String,
  #[serde(default)]
  pub completed: bool,
  #[serde(default)]
  pub created_at: String,
}

impl ChecklistItem {
  pub fn new(text: impl Into<String>) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      text: text.into(),
      completed: false,
      created_at: Utc::now().to_rfc3339(),
    }
  }
}

/// The four free-text sections of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JournalField {
  DailyRecap,
  Gratitude,
  GoalsDesires,
  Learnings,
}

impl JournalField {
  pub const ALL: [JournalField; 4] = [
    JournalField::DailyRecap,
    JournalField::Gratitude,
    JournalField::GoalsDesires,
    JournalField::Learnings,
  ];

  pub fn title(self) -> &'static str {
    match self {
      Self::DailyRecap => "Daily Recap",
      Self::Gratitude => "Gratitude",
      Self::GoalsDesires => "Goals & Desires",
      Self::Learnings => "Learnings",
    }
  }
}

/// Partial update of a journal entry. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mood: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mood_color: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub daily_recap: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub gratitude: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub goals_desires: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub learnings: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub checklist_items: Option<Vec<ChecklistItem>>,
}

impl EntryPatch {
  pub fn text(field: JournalField, text: impl Into<String>) -> Self {
    let mut patch = Self::default();
    patch.set_text(field, text);
    patch
  }

  pub fn mood(mood: Mood) -> Self {
    Self {
      mood: Some(mood.label().to_string()),
      mood_color: Some(mood.color().to_string()),
      ..Self::default()
    }
  }

  pub fn checklist(items: Vec<ChecklistItem>) -> Self {
    Self {
      checklist_items: Some(items),
      ..Self::default()
    }
  }

  pub fn set_text(&mut self, field: JournalField, text: impl Into<String>) {
    let slot = match field {
      JournalField::DailyRecap => &mut self.daily_recap,
      JournalField::Gratitude => &mut self.gratitude,
      JournalField::GoalsDesires => &mut self.goals_desires,
      JournalField::Learnings => &mut self.learnings,
    };
    *slot = Some(text.into());
  }

  /// Overlay `other` on top of this patch; fields set in `other` win.
  pub fn merge(&mut self, other: EntryPatch) {
    macro_rules! take {
      ($($field:ident),*) => {
        $(if other.$field.is_some() { self.$field = other.$field; })*
      };
    }
    take!(mood, mood_color, daily_recap, gratitude, goals_desires, learnings, checklist_items);
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mood {
  Excellent,
  Good,
  Neutral,
  Challenging,
  Difficult,
}

impl Mood {
  pub const ALL: [Mood; 5] = [
    Mood::Excellent,
    Mood::Good,
    Mood::Neutral,
    Mood::Challenging,
    Mood::Difficult,
  ];

  pub fn label(self) -> &'static str {
    match self {
      Self::Excellent => "Excellent",
      Self::Good => "Good",
      Self::Neutral => "Neutral",
      Self::Challenging => "Challenging",
      Self::Difficult => "Difficult",
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|m| m.label() == label)
  }

  /// Hex color stored alongside the mood
  pub fn color(self) -> &'static str {
    match self {
      Self::Excellent => "#10b981",
      Self::Good => "#0ea5e9",
      Self::Neutral => "#f59e0b",
      Self::Challenging => "#8b5cf6",
      Self::Difficult => "#dc2626",
    }
  }

  pub fn score(self) -> u8 {
    match self {
      Self::Excellent => 5,
      Self::Good => 4,
      Self::Neutral => 3,
      Self::Challenging => 2,
      Self::Difficult => 1,
    }
  }

  /// Next mood in selector order, wrapping around.
  pub fn next(current: Option<Mood>) -> Mood {
    match current {
      None => Self::ALL[0],
      Some(mood) => {
        let idx = Self::ALL.iter().position(|m| *m == mood).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
      }
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisionCategory {
  Career,
  Health,
  Relationships,
  Mindset,
  Lifestyle,
  Finances,
  Creativity,
  Spirituality,
}

impl VisionCategory {
  pub const ALL: [VisionCategory; 8] = [
    VisionCategory::Career,
    VisionCategory::Health,
    VisionCategory::Relationships,
    VisionCategory::Mindset,
    VisionCategory::Lifestyle,
    VisionCategory::Finances,
    VisionCategory::Creativity,
    VisionCategory::Spirituality,
  ];

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|c| format!("{:?}", c).eq_ignore_ascii_case(s))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionBoardItem {
  pub id: String,
  pub user_id: String,
  pub category: VisionCategory,
  pub image_url: Option<String>,
  pub affirmation: String,
  #[serde(default)]
  pub order_index: i64,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewVisionItem {
  pub category: VisionCategory,
  pub image_url: Option<String>,
  pub affirmation: String,
  pub order_index: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisionItemPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<VisionCategory>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub affirmation: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order_index: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySection {
  WhoIAmBecoming,
  CoreValues,
  EmpoweringBeliefs,
  IdentityHabits,
}

impl IdentitySection {
  pub const ALL: [IdentitySection; 4] = [
    IdentitySection::WhoIAmBecoming,
    IdentitySection::CoreValues,
    IdentitySection::EmpoweringBeliefs,
    IdentitySection::IdentityHabits,
  ];

  pub fn column_value(self) -> &'static str {
    match self {
      Self::WhoIAmBecoming => "who_i_am_becoming",
      Self::CoreValues => "core_values",
      Self::EmpoweringBeliefs => "empowering_beliefs",
      Self::IdentityHabits => "identity_habits",
    }
  }

  pub fn title(self) -> &'static str {
    match self {
      Self::WhoIAmBecoming => "Who I Am Becoming",
      Self::CoreValues => "Core Values",
      Self::EmpoweringBeliefs => "Empowering Beliefs",
      Self::IdentityHabits => "Identity Habits",
    }
  }

  /// Sentence starter shown in an empty input
  pub fn placeholder(self) -> &'static str {
    match self {
      Self::WhoIAmBecoming => "I am becoming someone who...",
      Self::CoreValues => "I value...",
      Self::EmpoweringBeliefs => "I believe that...",
      Self::IdentityHabits => "I am someone who regularly...",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|section| section.column_value() == s)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityStatement {
  pub id: String,
  pub user_id: String,
  pub section: IdentitySection,
  pub content: String,
  #[serde(default)]
  pub order_index: i64,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentityPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order_index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureLetter {
  pub id: String,
  pub user_id: String,
  pub title: String,
  pub content: String,
  pub unlock_date: NaiveDate,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

impl FutureLetter {
  pub fn is_unlocked(&self, today: NaiveDate) -> bool {
    self.unlock_date <= today
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewLetter {
  pub title: String,
  pub content: String,
  pub unlock_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LetterPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub unlock_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReflectionTheme {
  Release,
  Forgiveness,
  #[serde(rename = "Deep Gratitude")]
  DeepGratitude,
  Dreams,
  #[serde(rename = "Facing Fears")]
  FacingFears,
  Growth,
}

impl ReflectionTheme {
  pub const ALL: [ReflectionTheme; 6] = [
    ReflectionTheme::Release,
    ReflectionTheme::Forgiveness,
    ReflectionTheme::DeepGratitude,
    ReflectionTheme::Dreams,
    ReflectionTheme::FacingFears,
    ReflectionTheme::Growth,
  ];

  pub fn title(self) -> &'static str {
    match self {
      Self::Release => "Release",
      Self::Forgiveness => "Forgiveness",
      Self::DeepGratitude => "Deep Gratitude",
      Self::Dreams => "Dreams",
      Self::FacingFears => "Facing Fears",
      Self::Growth => "Growth",
    }
  }

  pub fn prompt(self) -> &'static str {
    match self {
      Self::Release => "What are you ready to let go of? What no longer serves you?",
      Self::Forgiveness => "Who or what do you need to forgive? How can you extend compassion?",
      Self::DeepGratitude => "What are you deeply grateful for? Why does it matter to you?",
      Self::Dreams => "What are your biggest dreams? What would your ideal life look like?",
      Self::FacingFears => {
        "What fears are holding you back? What would you do if you weren't afraid?"
      }
      Self::Growth => "How have you grown recently? What lessons have you learned?",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidedReflection {
  pub id: String,
  pub user_id: String,
  pub theme: ReflectionTheme,
  pub prompt: String,
  pub reflection: String,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReflection {
  pub theme: ReflectionTheme,
  pub prompt: String,
  pub reflection: String,
}

impl NewReflection {
  pub fn new(theme: ReflectionTheme, reflection: impl Into<String>) -> Self {
    Self {
      theme,
      prompt: theme.prompt().to_string(),
      reflection: reflection.into(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReflectionPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reflection: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
  pub id: String,
  pub user_id: String,
  #[serde(default)]
  pub email: String,
  pub nickname: Option<String>,
  pub vision_statement: Option<String>,
  pub current_identity_focus: Option<String>,
  pub mood_baseline: Option<String>,
  #[serde(default)]
  pub timezone: String,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

impl UserProfile {
  pub fn field(&self, field: ProfileField) -> &str {
    match field {
      ProfileField::Nickname => self.nickname.as_deref().unwrap_or_default(),
      ProfileField::VisionStatement => self.vision_statement.as_deref().unwrap_or_default(),
      ProfileField::CurrentIdentityFocus => {
        self.current_identity_focus.as_deref().unwrap_or_default()
      }
      ProfileField::MoodBaseline => self.mood_baseline.as_deref().unwrap_or_default(),
      ProfileField::Timezone => &self.timezone,
    }
  }

  pub fn set_field(&mut self, field: ProfileField, text: String) {
    match field {
      ProfileField::Nickname => self.nickname = Some(text),
      ProfileField::VisionStatement => self.vision_statement = Some(text),
      ProfileField::CurrentIdentityFocus => self.current_identity_focus = Some(text),
      ProfileField::MoodBaseline => self.mood_baseline = Some(text),
      ProfileField::Timezone => self.timezone = text,
    }
  }

  pub fn apply(&mut self, patch: &ProfilePatch) {
    for field in ProfileField::ALL {
      let value = match field {
        ProfileField::Nickname => &patch.nickname,
        ProfileField::VisionStatement => &patch.vision_statement,
        ProfileField::CurrentIdentityFocus => &patch.current_identity_focus,
        ProfileField::MoodBaseline => &patch.mood_baseline,
        ProfileField::Timezone => &patch.timezone,
      };
      if let Some(text) = value {
        self.set_field(field, text.clone());
      }
    }
  }
}

/// Editable profile settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
  Nickname,
  VisionStatement,
  CurrentIdentityFocus,
  MoodBaseline,
  Timezone,
}

impl ProfileField {
  pub const ALL: [ProfileField; 5] = [
    ProfileField::Nickname,
    ProfileField::VisionStatement,
    ProfileField::CurrentIdentityFocus,
    ProfileField::MoodBaseline,
    ProfileField::Timezone,
  ];

  pub fn title(self) -> &'static str {
    match self {
      Self::Nickname => "Nickname",
      Self::VisionStatement => "Vision Statement",
      Self::CurrentIdentityFocus => "Current Identity Focus",
      Self::MoodBaseline => "Mood Baseline",
      Self::Timezone => "Timezone",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub nickname: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub vision_statement: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub current_identity_focus: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mood_baseline: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timezone: Option<String>,
}

impl ProfilePatch {
  pub fn field(field: ProfileField, text: impl Into<String>) -> Self {
    let mut patch = Self::default();
    patch.set(field, text);
    patch
  }

  pub fn set(&mut self, field: ProfileField, text: impl Into<String>) {
    let text = Some(text.into());
    match field {
      ProfileField::Nickname => self.nickname = text,
      ProfileField::VisionStatement => self.vision_statement = text,
      ProfileField::CurrentIdentityFocus => self.current_identity_focus = text,
      ProfileField::MoodBaseline => self.mood_baseline = text,
      ProfileField::Timezone => self.timezone = text,
    }
  }

  pub fn merge(&mut self, other: ProfilePatch) {
    macro_rules! take {
      ($($field:ident),*) => {
        $(if other.$field.is_some() { self.$field = other.$field; })*
      };
    }
    take!(nickname, vision_statement, current_identity_focus, mood_baseline, timezone);
  }
}
