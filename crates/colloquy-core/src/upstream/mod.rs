//! Ports for the external retrieval and generation services.
//!
//! One-shot calls use RPITIT. The streaming call returns a boxed stream so
//! it can be handed to a spawned producer task with a `'static` lifetime.

use std::pin::Pin;

use futures_util::Stream;

use colloquy_types::error::{GenerationError, RetrievalError};
use colloquy_types::upstream::{GenerationEvent, GenerationRequest, RetrievalResult};

/// Boxed stream of generation events.
pub type GenerationStream =
    Pin<Box<dyn Stream<Item = Result<GenerationEvent, GenerationError>> + Send + 'static>>;

/// Knowledge-base lookup.
pub trait Retriever: Send + Sync {
    /// Fetch up to `k` ranked passages for `query`.
    fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> impl std::future::Future<Output = Result<RetrievalResult, RetrievalError>> + Send;
}

/// Language-model backend.
pub trait Generator: Send + Sync {
    /// Generate a full answer in one call.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl std::future::Future<Output = Result<String, GenerationError>> + Send;

    /// Stream an answer. The stream ends after `GenerationEvent::Done` or the
    /// first error.
    fn stream(&self, request: GenerationRequest) -> GenerationStream;

    /// Translate `text` into the language with ISO code `target_language`.
    fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> impl std::future::Future<Output = Result<String, GenerationError>> + Send;
}
