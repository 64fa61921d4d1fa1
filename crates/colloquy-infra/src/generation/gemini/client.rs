//! GeminiClient -- concrete [`Generator`] for the Google Generative Language API.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and only exposed when
//! building the `x-goog-api-key` header.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use colloquy_core::upstream::{GenerationStream, Generator};
use colloquy_types::config::GenerationConfig;
use colloquy_types::error::GenerationError;
use colloquy_types::upstream::GenerationRequest;

use super::streaming::create_gemini_stream;
use super::types::{GenerateContentResponse, GeminiRequest};

/// Map a non-success HTTP status (or an in-band error code) to a
/// [`GenerationError`].
pub(crate) fn status_error(status: u16, body: String) -> GenerationError {
    match status {
        401 | 403 => GenerationError::AuthenticationFailed,
        429 => GenerationError::RateLimited,
        _ => GenerationError::Provider {
            message: format!("HTTP {status}: {body}"),
        },
    }
}

/// Substitute `{text}` and `{language}` into a translation prompt template.
pub fn render_translate_prompt(template: &str, text: &str, target_language: &str) -> String {
    template
        .replace("{language}", target_language)
        .replace("{text}", text)
}

/// Gemini generation client. Does not derive `Debug`.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    translate_prompt: String,
}

impl GeminiClient {
    pub fn new(api_key: SecretString, config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            // Connection setup only; streamed answers may run long.
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GenerationError::Provider {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            translate_prompt: config.translate_prompt.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{method}", self.base_url, self.model)
    }

    fn post(&self, url: &str, body: &GeminiRequest) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(body)
    }
}

impl Generator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = GeminiRequest::from(request);
        let response = self
            .post(&self.url("generateContent"), &body)
            .send()
            .await
            .map_err(|e| GenerationError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), error_body));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            GenerationError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        let text = parsed.text();
        if text.trim().is_empty() {
            if let Some(reason) = parsed.block_reason() {
                return Err(GenerationError::Provider {
                    message: format!("prompt blocked: {reason}"),
                });
            }
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }

    fn stream(&self, request: GenerationRequest) -> GenerationStream {
        let body = GeminiRequest::from(&request);
        let url = format!("{}?alt=sse", self.url("streamGenerateContent"));
        create_gemini_stream(self.post(&url, &body))
    }

    async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<String, GenerationError> {
        let prompt = render_translate_prompt(&self.translate_prompt, text, target_language);
        let translated = self.generate(&GenerationRequest::one_shot(prompt)).await?;
        Ok(translated.trim().to_string())
    }
}
