//! OpenAI embedding provider implementation.
//!
//! This module implements `EmbeddingProvider` on top of the OpenAI (or any
//! OpenAI-compatible) `/embeddings` endpoint. Every call sends all units in a
//! single request and wraps it in the configured [`RetryPolicy`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::retry::RetryPolicy;
use super::{EmbeddingError, EmbeddingMatrix, EmbeddingProvider, EmbeddingResult};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Public OpenAI API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Output dimension of the known remote models.
pub fn model_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "text-embedding-ada-002" => Some(1536),
        "text-similarity-babbage-001" => Some(2048),
        _ => None,
    }
}

/// Token accounting reported by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    pub prompt_tokens: u64,
    pub total_tokens: u64,
}

/// Response metadata returned next to the embedding matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    /// Model that actually served the request
    pub model: String,
    pub usage: Option<EmbeddingUsage>,
}

/// OpenAI embedding provider configuration.
#[derive(Debug, Clone)]
pub struct OpenAIEmbedding {
    client: Client,

    /// Full `/embeddings` URL
    endpoint: String,

    /// Model identifier (e.g., "text-embedding-3-small")
    model: String,

    /// Expected dimension of the embedding vectors
    embedding_dimension: usize,

    retry: RetryPolicy,
}

impl OpenAIEmbedding {
    /// Create a new OpenAI embedding provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (defaults to "text-embedding-3-small" if None)
    /// * `base_url` - API root (defaults to the public OpenAI API if None)
    /// * `retry` - Retry policy applied to every request
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` if the key is blank, the model is
    /// unknown, or the HTTP client cannot be built
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        retry: RetryPolicy,
    ) -> EmbeddingResult<Self> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::ConfigError("missing OpenAI API key".to_string()));
        }
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let embedding_dimension = model_dimension(&model).ok_or_else(|| {
            EmbeddingError::ConfigError(format!(
                "unknown embedding model '{}' (known: text-embedding-3-small, text-embedding-3-large, \
                 text-embedding-ada-002, text-similarity-babbage-001)",
                model
            ))
        })?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| EmbeddingError::ConfigError(format!("invalid OpenAI API key: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            model,
            embedding_dimension,
            retry,
        })
    }

    /// Embed `units` and also return the response metadata.
    ///
    /// An empty `units` returns an empty matrix without contacting the endpoint.
    ///
    /// # Errors
    /// Returns `EmbeddingError::RetriesExhausted` when transient failures
    /// outlast the retry policy, `ApiError` for rejected requests, and
    /// `ShapeMismatch` if the response has the wrong number of rows
    pub async fn embed_with_metadata(
        &self,
        units: &[String],
    ) -> EmbeddingResult<(EmbeddingMatrix, EmbeddingMetadata)> {
        if units.is_empty() {
            let metadata = EmbeddingMetadata {
                model: self.model.clone(),
                usage: None,
            };
            return Ok((EmbeddingMatrix::empty(self.embedding_dimension), metadata));
        }
        self.retry
            .run("OpenAI embeddings request", || self.request_once(units))
            .await
    }

    async fn request_once(&self, units: &[String]) -> EmbeddingResult<(EmbeddingMatrix, EmbeddingMetadata)> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: units,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            let message = format!("OpenAI embeddings request failed ({}): {}", status, body);
            return Err(if is_retryable_status(status) {
                EmbeddingError::Transient(message)
            } else {
                EmbeddingError::ApiError(message)
            });
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("failed to parse embedding response: {}", e)))?;
        parsed.data.sort_by_key(|entry| entry.index);
        debug!(
            "OpenAI returned {} embeddings for {} inputs",
            parsed.data.len(),
            units.len()
        );

        let matrix = EmbeddingMatrix::from_rows(parsed.data.into_iter().map(|d| d.embedding).collect())?
            .ensure_rows(units.len())?;
        if matrix.dimension() != self.embedding_dimension {
            return Err(EmbeddingError::ApiError(format!(
                "model '{}' returned {}-dimensional vectors, expected {}",
                self.model,
                matrix.dimension(),
                self.embedding_dimension
            )));
        }
        let metadata = EmbeddingMetadata {
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            usage: parsed.usage,
        };
        Ok((matrix, metadata))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn classify_transport_error(err: reqwest::Error) -> EmbeddingError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        EmbeddingError::Transient(err.to_string())
    } else {
        EmbeddingError::ApiError(err.to_string())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedding {
    async fn embed(&self, units: &[String]) -> EmbeddingResult<EmbeddingMatrix> {
        self.embed_with_metadata(units).await.map(|(matrix, _)| matrix)
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
