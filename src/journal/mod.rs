mod cache;
pub mod insights;
mod store;
mod types;

pub use insights::{Insights, Progress};
pub use store::JournalStore;
pub use types::*;
