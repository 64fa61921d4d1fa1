//! Shared domain types for Colloquy.
//!
//! Sessions, chat entries, tiers, callers, query events, upstream request
//! shapes, configuration and the error enums used across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod identity;
pub mod query;
pub mod tier;
pub mod upstream;
