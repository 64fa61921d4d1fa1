//! SSE stream for `:streamGenerateContent?alt=sse`.
//!
//! Each `data:` line carries a full [`GenerateContentResponse`] holding the
//! next slice of text. Slices are re-chunked into single words (each
//! followed by a space) so downstream consumers see a steady, word-aligned
//! stream regardless of how the provider batches its output.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;

use colloquy_core::upstream::GenerationStream;
use colloquy_types::error::GenerationError;
use colloquy_types::upstream::GenerationEvent;

use super::client::status_error;
use super::types::GenerateContentResponse;

/// Open the SSE connection described by `request` and map it to
/// [`GenerationEvent`]s.
///
/// The stream ends with `Done` after the provider closes the connection, or
/// with the first error.
pub fn create_gemini_stream(request: reqwest::RequestBuilder) -> GenerationStream {
    Box::pin(async_stream::try_stream! {
        let response = request.send().await.map_err(|e| GenerationError::Provider {
            message: format!("HTTP request failed: {e}"),
        })?;

        let status = response.status();
        let response = if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            Err::<reqwest::Response, _>(status_error(status.as_u16(), body))?
        } else {
            response
        };

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| GenerationError::Stream(e.to_string()))?;
            for word in words_in_event(&event.data)? {
                yield GenerationEvent::Chunk(word);
            }
        }

        yield GenerationEvent::Done;
    })
}

/// Decode one SSE payload into word chunks.
fn words_in_event(data: &str) -> Result<Vec<String>, GenerationError> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(Vec::new());
    }

    let payload: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| GenerationError::Deserialization(format!("invalid stream payload: {e}")))?;

    if let Some(error) = payload.error {
        return Err(status_error(error.code, error.message));
    }
    if let Some(reason) = payload.block_reason() {
        return Err(GenerationError::Provider {
            message: format!("prompt blocked: {reason}"),
        });
    }

    Ok(payload
        .text()
        .split_whitespace()
        .map(|word| format!("{word} "))
        .collect())
}
