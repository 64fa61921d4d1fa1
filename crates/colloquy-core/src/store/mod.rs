pub mod durable;
pub mod fast;

pub use durable::{DurableStore, SessionPage, UpsertReport};
pub use fast::FastStore;
