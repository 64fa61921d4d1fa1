//! Service configuration types for Colloquy.
//!
//! `ServiceConfig` represents the `config.toml` in the data directory. Every
//! field has a default, so an empty or missing file yields a working setup.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Fast-store lifetime of a session and its entries, refreshed on write.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Language the knowledge base is written in; queries in other
    /// languages are translated before retrieval.
    #[serde(default = "default_knowledge_language")]
    pub knowledge_language: String,

    #[serde(default = "default_guest_cookie_max_age_secs")]
    pub guest_cookie_max_age_secs: u64,

    #[serde(default)]
    pub stores: StoreConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

fn default_knowledge_language() -> String {
    "en".to_string()
}

fn default_guest_cookie_max_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl_secs(),
            knowledge_language: default_knowledge_language(),
            guest_cookie_max_age_secs: default_guest_cookie_max_age_secs(),
            stores: StoreConfig::default(),
            reconcile: ReconcileConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

/// Database locations. `None` means "a file inside the data directory".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub durable_url: Option<String>,
    pub fast_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_reconcile_interval_secs")]
    pub interval_secs: u64,

    /// Durable entries copied back into the fast store when a session is
    /// rehydrated on a new device.
    #[serde(default = "default_hydrate_entries")]
    pub hydrate_entries: usize,
}

fn default_reconcile_interval_secs() -> u64 {
    30
}

fn default_hydrate_entries() -> usize {
    20
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_interval_secs(),
            hydrate_entries: default_hydrate_entries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_url")]
    pub base_url: String,

    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_retrieval_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_retrieval_timeout_secs() -> u64 {
    15
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: default_retrieval_url(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_url")]
    pub base_url: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Translation prompt; `{text}` and `{language}` are substituted.
    #[serde(default = "default_translate_prompt")]
    pub translate_prompt: String,
}

fn default_generation_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_generation_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_translate_prompt() -> String {
    "Translate the following text to the language with ISO code '{language}'. \
     Reply with the translation only, without quotes or commentary.\n\n{text}"
        .to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_url(),
            model: default_generation_model(),
            api_key_env: default_api_key_env(),
            translate_prompt: default_translate_prompt(),
        }
    }
}
