//! Generation service clients.
//!
//! Concrete implementations of the [`Generator`](colloquy_core::upstream::Generator)
//! port. Gemini is the only provider.

pub mod gemini;

use secrecy::SecretString;

use colloquy_types::config::GenerationConfig;
use colloquy_types::error::GenerationError;

use self::gemini::GeminiClient;

/// Build the configured generator, reading its API key from the environment
/// variable named in `config.api_key_env`.
pub fn create_generator(config: &GenerationConfig) -> Result<GeminiClient, GenerationError> {
    let key = match std::env::var(&config.api_key_env) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            tracing::warn!(
                env = %config.api_key_env,
                "generation API key not set"
            );
            return Err(GenerationError::AuthenticationFailed);
        }
    };
    GeminiClient::new(SecretString::from(key), config)
}
