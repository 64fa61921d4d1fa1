pub mod history;
pub mod orchestrator;
pub mod prompt;

pub use history::{HistoryService, SessionListing};
pub use orchestrator::{OrchestratorSettings, QueryHandle, QueryOrchestrator};
