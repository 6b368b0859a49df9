pub mod fallback;
pub mod types;

pub use types::{ClassifiedIntent, DetailLevel, IntentKind};
