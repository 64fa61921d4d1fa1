//! Retrieval service client.
//!
//! Concrete [`Retriever`](colloquy_core::upstream::Retriever) backed by the
//! knowledge-base HTTP service.

pub mod client;

pub use client::HttpRetrievalClient;
