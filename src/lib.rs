pub mod config;
pub mod intent;
pub mod kernel;
pub mod services;
pub mod vision;

// Re-export specific items if needed for convenient access
pub use config::OrchestratorConfig;
pub use kernel::reactor::{Orchestrator, OrchestratorHandle};
pub use kernel::state::Mode;
