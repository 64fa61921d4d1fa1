//! HTTP layer for Colloquy.
//!
//! Axum API at `/api/v1/chats/`: an SSE query endpoint plus JSON history
//! endpoints using the envelope response format. Caller identity comes from
//! gateway headers.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
