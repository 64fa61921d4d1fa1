//! Infrastructure layer for Colloquy.
//!
//! Contains implementations of the ports defined in `colloquy-core`: the
//! SQLite durable and fast stores, the HTTP retrieval client, the Gemini
//! generation client, and the configuration loader.

pub mod config;
pub mod generation;
pub mod retrieval;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod test_http;
