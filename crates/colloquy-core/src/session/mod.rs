pub mod manager;

pub use manager::{ResolvedSession, SessionManager};
