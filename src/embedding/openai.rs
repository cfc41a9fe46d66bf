//! OpenAI-compatible embeddings client.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{check_dimension, Embedder};
use crate::config::OpenAiConfig;
use crate::error::ProviderError;

/// Sends one request per text. Failures are returned as-is, never retried.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &OpenAiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::config("missing OpenAI API key"));
        }
        if config.model.trim().is_empty() {
            return Err(ProviderError::config("missing embedding model name"));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ProviderError::config("invalid OpenAI API key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let payload = EmbeddingRequest {
            model: &self.model,
            input: text,
            encoding_format: "float",
        };

        let response = self.client.post(&self.endpoint).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let embedding = parse_embedding_response(&body)?;
        check_dimension(&embedding, self.dimension)?;
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn parse_embedding_response(body: &[u8]) -> Result<Vec<f32>, ProviderError> {
    let response: EmbeddingResponse = serde_json::from_slice(body)
        .map_err(|e| ProviderError::malformed(format!("failed to parse response: {}", e)))?;

    response
        .data
        .into_iter()
        .min_by_key(|entry| entry.index)
        .map(|entry| entry.embedding)
        .ok_or_else(|| ProviderError::malformed("response contained no embeddings"))
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}
