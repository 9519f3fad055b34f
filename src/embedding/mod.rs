//! Embedding provider abstraction and implementations.
//!
//! This module defines the interface every embedding backend implements and
//! the [`EmbeddingMatrix`] they all return. Three backends are provided:
//!
//! - [`openai::OpenAIEmbedding`]: hosted OpenAI-compatible `/embeddings` endpoint
//! - [`fastembed::FastEmbedProvider`]: local sentence-transformer via fastembed
//! - [`dual_encoder::DualEncoderProvider`]: local two-headed sentence/paragraph encoder
//!
//! Whatever the backend, row `i` of the returned matrix is the embedding of
//! input unit `i`, and the matrix has exactly as many rows as there were
//! inputs. Similarity matrices downstream index straight into these rows.

pub mod dual_encoder;
pub mod fastembed;
pub mod openai;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::{EmbeddingBackend, EmbeddingSettings};
use crate::models::EmbeddingConfig;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Network failure, timeout, rate limit or server error; worth retrying
    #[error("Transient embedding failure: {0}")]
    Transient(String),

    /// The backend rejected the request (auth, bad request, malformed response)
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Transient failures persisted through the whole retry budget
    #[error("Embedding failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },

    /// Invalid input text
    #[error("Invalid input text: {0}")]
    InvalidInput(String),

    /// Configuration error (e.g., missing API key, unknown model)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The backend returned a different number of rows than inputs
    #[error("Embedding backend returned {actual_rows} rows for {expected_rows} inputs")]
    ShapeMismatch {
        expected_rows: usize,
        actual_rows: usize,
    },

    /// Rows of one matrix disagree on their dimension
    #[error("Embedding row {row} has dimension {actual}, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Other unexpected errors
    #[error("Unexpected error: {0}")]
    Other(String),
}

impl EmbeddingError {
    /// Whether the retry policy should try the call again.
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbeddingError::Transient(_))
    }
}

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Stacked embedding vectors, one row per text unit, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    rows: usize,
    dimension: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// A matrix with no rows.
    pub fn empty(dimension: usize) -> Self {
        Self {
            rows: 0,
            dimension,
            data: Vec::new(),
        }
    }

    /// Stack row vectors into a matrix.
    ///
    /// # Errors
    /// Returns `EmbeddingError::RaggedRows` if the rows differ in length
    pub fn from_rows(rows: Vec<Vec<f32>>) -> EmbeddingResult<Self> {
        let dimension = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * dimension);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dimension {
                return Err(EmbeddingError::RaggedRows {
                    row: i,
                    expected: dimension,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            dimension,
            data,
        })
    }

    /// Build from row-major data.
    ///
    /// # Errors
    /// Returns `EmbeddingError::Other` if `data` does not hold `rows * dimension` values
    pub fn from_flat(rows: usize, dimension: usize, data: Vec<f32>) -> EmbeddingResult<Self> {
        if data.len() != rows * dimension {
            return Err(EmbeddingError::Other(format!(
                "{} values cannot form a {}x{} matrix",
                data.len(),
                rows,
                dimension
            )));
        }
        Ok(Self {
            rows,
            dimension,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Embedding of unit `i`, or `None` past the last row.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.rows {
            return None;
        }
        self.data.get(i * self.dimension..(i + 1) * self.dimension)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.rows).filter_map(move |i| self.row(i))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Frobenius norm of the whole matrix.
    pub fn frobenius_norm(&self) -> f32 {
        self.data.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Divide every row by `max(‖row‖₂, eps)`.
    pub fn l2_normalize_rows(mut self, eps: f32) -> Self {
        if self.dimension == 0 {
            return self;
        }
        for row in self.data.chunks_mut(self.dimension) {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt().max(eps);
            row.iter_mut().for_each(|v| *v /= norm);
        }
        self
    }

    /// Check the row count against the number of inputs that produced it.
    ///
    /// # Errors
    /// Returns `EmbeddingError::ShapeMismatch` when they differ
    pub fn ensure_rows(self, expected_rows: usize) -> EmbeddingResult<Self> {
        if self.rows != expected_rows {
            return Err(EmbeddingError::ShapeMismatch {
                expected_rows,
                actual_rows: self.rows,
            });
        }
        Ok(self)
    }
}

/// Trait for text embedding providers.
///
/// # Example Usage
/// ```ignore
/// let provider = FastEmbedProvider::new(None, None, 512)?;
/// let units = segmenter.segment(&review.text);
/// let matrix = provider.embed(&units).await?;
/// assert_eq!(matrix.rows(), units.len());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a sequence of text units.
    ///
    /// # Arguments
    /// * `units` - Text units in the order their rows should appear
    ///
    /// # Returns
    /// A matrix with one row per unit. An empty `units` yields an empty matrix.
    ///
    /// # Errors
    /// Returns `EmbeddingError` if the backend fails, or `ShapeMismatch` if it
    /// returns the wrong number of rows
    async fn embed(&self, units: &[String]) -> EmbeddingResult<EmbeddingMatrix>;

    /// Get the dimension of embeddings produced by this provider.
    fn dimension(&self) -> usize;

    /// Get the model name/identifier for this provider.
    fn model_name(&self) -> &str;

    /// Provenance record for this provider.
    fn config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            model_name: self.model_name().to_string(),
            dimension: self.dimension(),
        }
    }
}

/// Instantiate the backend named in `settings`.
///
/// # Arguments
/// * `settings` - Backend, model and retry settings
/// * `api_key` - Required for the OpenAI backend, ignored otherwise
///
/// # Errors
/// Returns `EmbeddingError::ConfigError` if the backend cannot be constructed
pub fn build_provider(
    settings: &EmbeddingSettings,
    api_key: Option<String>,
) -> EmbeddingResult<Arc<dyn EmbeddingProvider>> {
    match settings.backend {
        EmbeddingBackend::OpenAI => {
            let api_key = api_key.ok_or_else(|| {
                EmbeddingError::ConfigError("OPENAI_API_KEY is required for the openai backend".to_string())
            })?;
            let provider = openai::OpenAIEmbedding::new(
                api_key,
                settings.model.clone(),
                settings.base_url.clone(),
                settings.retry.policy(),
            )?;
            info!("Using OpenAI embeddings: {}", provider.model_name());
            Ok(Arc::new(provider))
        }
        EmbeddingBackend::FastEmbed => {
            let model = settings
                .model
                .as_deref()
                .map(fastembed::parse_model)
                .transpose()?;
            let provider = fastembed::FastEmbedProvider::new(
                model,
                settings.cache_dir.clone(),
                settings.max_length,
            )?;
            info!("Using FastEmbed embeddings: {}", provider.model_name());
            Ok(Arc::new(provider))
        }
    }
}
