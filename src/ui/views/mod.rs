mod goals;
mod identity;
mod insights;
mod journal;
mod letters;
mod reflections;
mod settings;
mod signin;
mod vision;

pub use goals::GoalsView;
pub use identity::IdentityView;
pub use insights::InsightsView;
pub use journal::JournalView;
pub use letters::LettersView;
pub use reflections::ReflectionsView;
pub use settings::SettingsView;
pub use signin::SignInView;
pub use vision::VisionBoardView;
