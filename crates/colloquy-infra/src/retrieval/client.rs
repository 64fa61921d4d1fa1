//! HttpRetrievalClient -- `POST {base_url}/ask` with `{ query, k }`.
//!
//! The service returns `{ results: [...], message }`. Each result's `topics`
//! field comes back either as a JSON array, as a string holding a JSON array,
//! or as a comma-separated string; all three are normalized to a list.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use colloquy_core::upstream::Retriever;
use colloquy_types::chat::SourceCitation;
use colloquy_types::error::RetrievalError;
use colloquy_types::upstream::RetrievalResult;

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    #[serde(default)]
    results: Vec<AskResult>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AskResult {
    #[serde(default)]
    content: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    article_number: String,
    #[serde(default)]
    topics: Option<RawTopics>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTopics {
    List(Vec<String>),
    Text(String),
}

impl RawTopics {
    fn into_topics(self) -> Vec<String> {
        match self {
            RawTopics::List(list) => list,
            RawTopics::Text(text) => parse_topics(&text),
        }
    }
}

/// Normalize a topics string: a JSON array if it parses as one, otherwise a
/// comma-separated list. Blank items are dropped.
pub fn parse_topics(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
        return list;
    }
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// HTTP client for the knowledge-base retrieval service.
pub struct HttpRetrievalClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRetrievalClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RetrievalError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn decode(body: &str) -> Result<RetrievalResult, RetrievalError> {
        let parsed: AskResponse = serde_json::from_str(body)
            .map_err(|e| RetrievalError::Decode(e.to_string()))?;

        let results = parsed
            .results
            .into_iter()
            .map(|r| SourceCitation {
                content: r.content,
                source: r.source,
                article_number: r.article_number,
                topics: r.topics.map(RawTopics::into_topics).unwrap_or_default(),
            })
            .collect();

        Ok(RetrievalResult {
            results,
            message: parsed.message,
        })
    }
}

impl Retriever for HttpRetrievalClient {
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        let url = format!("{}/ask", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&AskRequest { query, k })
            .send()
            .await
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result = Self::decode(&body)?;
        tracing::debug!(k, results = result.results.len(), "retrieval complete");
        Ok(result)
    }
}
