//! OpenAI-compatible embedding provider.
//!
//! One blocking HTTP request per call, no retries: failures surface as
//! [`RetrievalError::EmbeddingService`] and the caller decides what to do.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{RetrievalError, Result};

/// Blocking embeddings client that talks to OpenAI-compatible endpoints.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    requested_dimensions: Option<usize>,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: &str,
        api_base: &str,
        model: &str,
        dimensions: Option<usize>,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(service_error("missing OpenAI API key (set OPENAI_API_KEY)"));
        }
        if model.trim().is_empty() {
            return Err(service_error("missing embedding model name"));
        }
        let native = native_dimensions(model);
        let resolved = dimensions.or(native).ok_or_else(|| {
            service_error(format!(
                "unknown dimensions for model '{model}'; set embedding.dimensions"
            ))
        })?;

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| service_error("invalid OpenAI API key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| service_error(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", api_base.trim_end_matches('/')),
            model: model.to_string(),
            dimensions: resolved,
            // Only send `dimensions` when it differs from what the model returns natively.
            requested_dimensions: dimensions.filter(|d| Some(*d) != native),
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config.api_key.as_deref().unwrap_or_default();
        Self::new(
            api_key,
            &config.api_base,
            &config.model,
            config.dimensions,
            config.timeout(),
        )
    }

    fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.requested_dimensions,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| service_error(format!("request to {} failed: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(service_error(format!(
                "embeddings request failed ({status}): {}",
                truncate(&text, 300)
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| service_error(format!("failed to parse embedding response: {e}")))?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != inputs.len() {
            return Err(service_error(format!(
                "service returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }
        if parsed.data.iter().any(|entry| entry.embedding.is_empty()) {
            return Err(service_error("service returned an empty embedding"));
        }

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text])?;
        vectors
            .pop()
            .ok_or_else(|| service_error("service returned no embedding"))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Output size of well-known embedding models.
fn native_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

fn service_error(msg: impl Into<String>) -> RetrievalError {
    RetrievalError::EmbeddingService(msg.into())
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models_have_dimensions() {
        assert_eq!(native_dimensions("text-embedding-3-small"), Some(1536));
        assert_eq!(native_dimensions("text-embedding-3-large"), Some(3072));
        assert_eq!(native_dimensions("my-custom-model"), None);
    }

    #[test]
    fn unknown_model_requires_dimensions() {
        let err = OpenAiEmbedder::new(
            "sk-test",
            "http://localhost:1",
            "my-custom-model",
            None,
            Duration::from_secs(1),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("embedding.dimensions"));
    }

    #[test]
    fn dimension_override_is_reported() {
        let embedder = OpenAiEmbedder::new(
            "sk-test",
            "http://localhost:1/v1/",
            "text-embedding-3-small",
            Some(256),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(embedder.dimensions(), 256);
        assert_eq!(embedder.endpoint, "http://localhost:1/v1/embeddings");
        assert_eq!(embedder.requested_dimensions, Some(256));
    }

    #[test]
    fn truncate_long_bodies() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 3), "abc...");
    }
}
