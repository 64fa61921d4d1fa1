//! Business logic and port trait definitions for Colloquy.
//!
//! This crate defines the store and upstream "ports" that the infrastructure
//! layer implements, and the engine built on them: tier policy, session
//! manager, query orchestrator, history listing, and reconciliation. It
//! depends only on `colloquy-types` -- never on `colloquy-infra` or any
//! database/IO crate.

pub mod query;
pub mod session;
pub mod store;
pub mod sync;
pub mod tier;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;
