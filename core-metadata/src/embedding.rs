//! Text Embedding Client
//!
//! OpenAI-compatible embeddings adapter: `POST {base_url}/embeddings` with
//! `{model, input}` and the vector read from `data[0].embedding`.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_runtime::config::EmbeddingApiConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{MetadataError, Result};

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Embedder backed by the host [`HttpClient`].
pub struct HttpTextEmbedder {
    http_client: Arc<dyn HttpClient>,
    url: String,
    model: String,
    api_key: String,
}

impl HttpTextEmbedder {
    /// Creates the embedder.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Configuration`] when no API key is configured.
    pub fn new(http_client: Arc<dyn HttpClient>, config: &EmbeddingApiConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();

        Ok(Self {
            http_client,
            url: config.embeddings_url(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextEmbedder for HttpTextEmbedder {
    #[instrument(skip(self, text), fields(model = %self.model, chars = text.len()), level = "debug")]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = HttpRequest::new(HttpMethod::Post, self.url.clone())
            .bearer_token(self.api_key.as_str())
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })?;

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            return Err(MetadataError::from_status("Embeddings endpoint", &response));
        }

        let parsed: EmbeddingResponse = serde_json::from_slice(&response.body).map_err(|e| {
            MetadataError::MalformedResponse(format!("Embedding response is not valid: {}", e))
        })?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| {
                MetadataError::MalformedResponse("Embedding response has no vector".to_string())
            })?;

        debug!(dimension = vector.len(), "Received embedding");
        Ok(vector)
    }
}
