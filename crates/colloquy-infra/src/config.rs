//! Service configuration loader for Colloquy.
//!
//! Reads `config.toml` from the data directory (`~/.colloquy/` by default)
//! and deserializes it into [`ServiceConfig`]. Falls back to defaults when
//! the file is missing or malformed, then applies environment overrides.

use std::path::{Path, PathBuf};

use colloquy_types::config::ServiceConfig;

use crate::sqlite::pool::database_url;

pub const DATA_DIR_ENV: &str = "COLLOQUY_DATA_DIR";
pub const RETRIEVAL_URL_ENV: &str = "COLLOQUY_RETRIEVAL_URL";
pub const GENERATION_MODEL_ENV: &str = "COLLOQUY_GENERATION_MODEL";

/// Resolve the data directory.
///
/// Priority:
/// 1. `COLLOQUY_DATA_DIR` environment variable
/// 2. `~/.colloquy`
/// 3. `./.colloquy`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".colloquy");
    }

    PathBuf::from(".colloquy")
}

/// Load configuration from `{data_dir}/config.toml` and apply environment
/// overrides.
///
/// - Missing file: defaults.
/// - Unreadable or unparsable file: logs a warning and uses defaults.
pub async fn load_service_config(data_dir: &Path) -> ServiceConfig {
    let config_path = data_dir.join("config.toml");

    let config = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => match toml::from_str::<ServiceConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    "Failed to parse {}: {err}, using defaults",
                    config_path.display()
                );
                ServiceConfig::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            ServiceConfig::default()
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            ServiceConfig::default()
        }
    };

    apply_env_overrides(config, |key| std::env::var(key).ok())
}

/// Overlay environment variables on a loaded config. `lookup` abstracts
/// `std::env::var` so callers can supply a fixed environment.
pub fn apply_env_overrides(
    mut config: ServiceConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ServiceConfig {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty(RETRIEVAL_URL_ENV) {
        config.retrieval.base_url = url;
    }
    if let Some(model) = non_empty(GENERATION_MODEL_ENV) {
        config.generation.model = model;
    }
    config
}

/// Database URLs for the durable and fast stores, defaulting to files in
/// the data directory.
pub fn store_urls(config: &ServiceConfig, data_dir: &Path) -> (String, String) {
    let durable = config
        .stores
        .durable_url
        .clone()
        .unwrap_or_else(|| database_url(data_dir, "durable.db"));
    let fast = config
        .stores
        .fast_url
        .clone()
        .unwrap_or_else(|| database_url(data_dir, "fast.db"));
    (durable, fast)
}
