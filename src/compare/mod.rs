//! Similarity matrices between two chunk sequences.
//!
//! A [`Comparator`] embeds a left and a right sequence of text units,
//! possibly with two different providers, and scores every (left, right)
//! pair. Entry `[i, j]` of the result compares left unit `i` with right unit `j`.
//!
//! Two scoring modes are available:
//!
//! - [`SimilarityMode::Dot`]: `A · Bᵀ`, unbounded
//! - [`SimilarityMode::Cosine`]: `A · Bᵀ / (‖A‖_F · ‖B‖_F)`
//!
//! Cosine mode divides the whole dot-product matrix by one scalar, the product
//! of the two matrices' Frobenius norms. It is not a per-pair cosine: entries
//! shrink as either sequence gets longer. Results are kept comparable with
//! earlier analyses that used this normalisation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::embedding::{EmbeddingError, EmbeddingMatrix, EmbeddingProvider};
use crate::models::EmbeddingConfig;

/// Errors that can occur while comparing chunk sequences.
#[derive(Debug, Error)]
pub enum CompareError {
    /// The two sides produce vectors of different lengths
    #[error(
        "Embedding dimension mismatch: left provider '{left_model}' has dimension {left_dimension}, \
         right provider '{right_model}' has dimension {right_dimension}"
    )]
    DimensionMismatch {
        left_model: String,
        left_dimension: usize,
        right_model: String,
        right_dimension: usize,
    },

    /// Embedding either side failed
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Result type for comparator operations.
pub type CompareResult<T> = Result<T, CompareError>;

/// How similarity scores are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMode {
    /// Raw dot product
    #[default]
    Dot,
    /// Dot product scaled by the product of the two matrices' Frobenius norms
    Cosine,
}

impl std::fmt::Display for SimilarityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityMode::Dot => write!(f, "dot"),
            SimilarityMode::Cosine => write!(f, "cosine"),
        }
    }
}

/// Scores between two chunk sequences, stored row-major.
///
/// Deserializing checks that `values` holds exactly `rows * cols` scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSimilarityMatrix")]
pub struct SimilarityMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct RawSimilarityMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
}

impl TryFrom<RawSimilarityMatrix> for SimilarityMatrix {
    type Error = String;

    fn try_from(raw: RawSimilarityMatrix) -> Result<Self, Self::Error> {
        if raw.rows.checked_mul(raw.cols) != Some(raw.values.len()) {
            return Err(format!(
                "{} scores cannot form a {}x{} similarity matrix",
                raw.values.len(),
                raw.rows,
                raw.cols
            ));
        }
        Ok(Self {
            rows: raw.rows,
            cols: raw.cols,
            values: raw.values,
        })
    }
}

impl SimilarityMatrix {
    /// An all-zero matrix of the given shape.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
        }
    }

    /// `left · rightᵀ`. Both matrices must share their dimension.
    fn dot(left: &EmbeddingMatrix, right: &EmbeddingMatrix) -> Self {
        let mut values = Vec::with_capacity(left.rows() * right.rows());
        for a in left.iter_rows() {
            for b in right.iter_rows() {
                values.push(a.iter().zip(b).map(|(x, y)| x * y).sum());
            }
        }
        Self {
            rows: left.rows(),
            cols: right.rows(),
            values,
        }
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Score between left unit `i` and right unit `j`.
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        (i < self.rows && j < self.cols).then(|| self.values[i * self.cols + j])
    }

    /// Scores of left unit `i` against every right unit.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.rows {
            return None;
        }
        self.values.get(i * self.cols..(i + 1) * self.cols)
    }

    /// All scores in row-major order.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Consume the matrix into its row-major scores.
    pub fn into_flat(self) -> Vec<f32> {
        self.values
    }
}

/// Embeds two chunk sequences and scores them against each other.
///
/// # Example
/// ```ignore
/// let comparator = Comparator::symmetric(provider);
/// let matrix = comparator.compare_dot(&preprint_chunks, &review_chunks).await?;
/// assert_eq!(matrix.shape(), (preprint_chunks.len(), review_chunks.len()));
/// ```
#[derive(Clone)]
pub struct Comparator {
    left: Arc<dyn EmbeddingProvider>,
    right: Arc<dyn EmbeddingProvider>,
}

impl Comparator {
    /// Use one provider for both sides.
    pub fn symmetric(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            right: Arc::clone(&provider),
            left: provider,
        }
    }

    /// Use `left` for the first sequence and `right` for the second.
    ///
    /// # Errors
    /// Returns `CompareError::DimensionMismatch` if the providers declare different dimensions
    pub fn paired(
        left: Arc<dyn EmbeddingProvider>,
        right: Arc<dyn EmbeddingProvider>,
    ) -> CompareResult<Self> {
        if left.dimension() != right.dimension() {
            return Err(CompareError::DimensionMismatch {
                left_model: left.model_name().to_string(),
                left_dimension: left.dimension(),
                right_model: right.model_name().to_string(),
                right_dimension: right.dimension(),
            });
        }
        Ok(Self { left, right })
    }

    /// Provenance of the (left, right) providers.
    pub fn embedding_configs(&self) -> (EmbeddingConfig, EmbeddingConfig) {
        (self.left.config(), self.right.config())
    }

    /// Score `left_units` against `right_units` in the given mode.
    ///
    /// If either sequence is empty the result has a zero dimension and no
    /// embedding call is made.
    ///
    /// # Errors
    /// Returns `CompareError::Embedding` if a provider fails or returns the
    /// wrong number of rows, and `CompareError::DimensionMismatch` if the two
    /// embedding matrices cannot be multiplied
    pub async fn compare(
        &self,
        left_units: &[String],
        right_units: &[String],
        mode: SimilarityMode,
    ) -> CompareResult<SimilarityMatrix> {
        if left_units.is_empty() || right_units.is_empty() {
            return Ok(SimilarityMatrix::zeros(left_units.len(), right_units.len()));
        }

        let a = self.left.embed(left_units).await?.ensure_rows(left_units.len())?;
        let b = self.right.embed(right_units).await?.ensure_rows(right_units.len())?;
        if a.dimension() != b.dimension() {
            return Err(CompareError::DimensionMismatch {
                left_model: self.left.model_name().to_string(),
                left_dimension: a.dimension(),
                right_model: self.right.model_name().to_string(),
                right_dimension: b.dimension(),
            });
        }

        let mut similarity = SimilarityMatrix::dot(&a, &b);
        if mode == SimilarityMode::Cosine {
            let denominator = a.frobenius_norm() * b.frobenius_norm();
            if denominator > 0.0 {
                similarity.values.iter_mut().for_each(|v| *v /= denominator);
            } else {
                similarity.values.iter_mut().for_each(|v| *v = 0.0);
            }
        }
        debug!(
            "Compared {}x{} units ({}, dim {})",
            similarity.rows,
            similarity.cols,
            mode,
            a.dimension()
        );
        Ok(similarity)
    }

    /// Dot-product similarity matrix.
    pub async fn compare_dot(
        &self,
        left_units: &[String],
        right_units: &[String],
    ) -> CompareResult<SimilarityMatrix> {
        self.compare(left_units, right_units, SimilarityMode::Dot).await
    }

    /// Dot-product matrix divided by the product of both matrices' Frobenius norms.
    pub async fn compare_cosine(
        &self,
        left_units: &[String],
        right_units: &[String],
    ) -> CompareResult<SimilarityMatrix> {
        self.compare(left_units, right_units, SimilarityMode::Cosine).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::StubEmbeddingProvider;
    use crate::embedding::EmbeddingResult;
    use async_trait::async_trait;

    fn units(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    fn stub() -> Arc<StubEmbeddingProvider> {
        Arc::new(
            StubEmbeddingProvider::new(2)
                .with_vector("a", vec![1.0, 2.0])
                .with_vector("b", vec![3.0, 4.0])
                .with_vector("x", vec![1.0, 0.0])
                .with_vector("y", vec![0.0, 1.0])
                .with_vector("z", vec![1.0, 1.0]),
        )
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 1e-5, "{} != {}", actual, expected);
    }

    /// Returns one row fewer than asked for.
    struct DroppingProvider;

    #[async_trait]
    impl EmbeddingProvider for DroppingProvider {
        async fn embed(&self, units: &[String]) -> EmbeddingResult<EmbeddingMatrix> {
            EmbeddingMatrix::from_rows(vec![vec![1.0, 0.0]; units.len().saturating_sub(1)])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "dropping"
        }
    }

    #[tokio::test]
    async fn test_compare_dot_known_values() {
        let comparator = Comparator::symmetric(stub());
        let m = comparator
            .compare_dot(&units(&["a", "b"]), &units(&["x", "y", "z"]))
            .await
            .unwrap();

        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.row(0).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(m.row(1).unwrap(), &[3.0, 4.0, 7.0]);
        assert!(m.row(2).is_none());
        assert_eq!(m.get(1, 2), Some(7.0));
        assert_eq!(m.get(2, 0), None);
    }

    #[tokio::test]
    async fn test_compare_cosine_uses_global_norms() {
        let comparator = Comparator::symmetric(stub());
        let m = comparator
            .compare_cosine(&units(&["a", "b"]), &units(&["x", "y", "z"]))
            .await
            .unwrap();

        // ‖A‖_F = √30, ‖B‖_F = 2
        let denominator = 30f32.sqrt() * 2.0;
        let expected = [1.0, 2.0, 3.0, 3.0, 4.0, 7.0];
        for (value, dot) in m.values().iter().zip(expected) {
            assert_close(*value, dot / denominator);
        }
    }

    #[tokio::test]
    async fn test_cosine_mode_is_not_pairwise_cosine() {
        // Flags the known discrepancy: identical vectors score 1.0 under a
        // pairwise cosine but less than that here once more rows are added.
        let comparator = Comparator::symmetric(stub());
        let m = comparator
            .compare_cosine(&units(&["x", "y"]), &units(&["x", "y"]))
            .await
            .unwrap();

        let pairwise_cosine_x_x = 1.0;
        assert_close(m.get(0, 0).unwrap(), 0.5);
        assert!(m.get(0, 0).unwrap() < pairwise_cosine_x_x);
    }

    #[tokio::test]
    async fn test_cosine_single_pair_matches_pairwise() {
        let comparator = Comparator::symmetric(stub());
        let m = comparator.compare_cosine(&units(&["a"]), &units(&["z"])).await.unwrap();
        let pairwise = 3.0 / (5f32.sqrt() * 2f32.sqrt());
        assert_close(m.get(0, 0).unwrap(), pairwise);
    }

    #[tokio::test]
    async fn test_cosine_zero_vectors_give_zero_matrix() {
        let provider = Arc::new(StubEmbeddingProvider::new(2).with_vector("zero", vec![0.0, 0.0]));
        let comparator = Comparator::symmetric(provider);
        let m = comparator
            .compare_cosine(&units(&["zero"]), &units(&["zero", "zero"]))
            .await
            .unwrap();
        assert_eq!(m.values(), &[0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_empty_sequences_give_empty_matrix_without_embedding() {
        let provider = stub();
        let comparator = Comparator::symmetric(provider.clone());

        let m = comparator.compare_dot(&[], &units(&["x", "y", "z"])).await.unwrap();
        assert_eq!(m.shape(), (0, 3));
        assert!(m.is_empty());

        let m = comparator.compare_cosine(&units(&["a", "b"]), &[]).await.unwrap();
        assert_eq!(m.shape(), (2, 0));
        assert!(m.is_empty());

        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_paired_providers_embed_their_own_side() {
        let left = stub();
        let right = stub();
        let comparator = Comparator::paired(left.clone(), right.clone()).unwrap();

        comparator
            .compare_dot(&units(&["a", "b"]), &units(&["x"]))
            .await
            .unwrap();
        assert_eq!(left.embedded_units(), units(&["a", "b"]));
        assert_eq!(right.embedded_units(), units(&["x"]));
    }

    #[test]
    fn test_paired_rejects_declared_dimension_mismatch() {
        let left: Arc<dyn EmbeddingProvider> = Arc::new(StubEmbeddingProvider::new(384));
        let right: Arc<dyn EmbeddingProvider> = Arc::new(StubEmbeddingProvider::new(1536));

        let err = Comparator::paired(left, right).err().unwrap();
        let message = err.to_string();
        assert!(message.contains("384"));
        assert!(message.contains("1536"));
        assert!(matches!(
            err,
            CompareError::DimensionMismatch { left_dimension: 384, right_dimension: 1536, .. }
        ));
    }

    #[tokio::test]
    async fn test_actual_dimension_mismatch_fails_before_product() {
        // Declares 2 dimensions but returns 3 for "wide"
        let left = Arc::new(StubEmbeddingProvider::new(2).with_vector("wide", vec![1.0, 1.0, 1.0]));
        let comparator = Comparator::paired(left, stub()).unwrap();

        let err = comparator
            .compare_dot(&units(&["wide"]), &units(&["x"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompareError::DimensionMismatch { left_dimension: 3, right_dimension: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_row_count_violation_is_fatal() {
        let comparator = Comparator::symmetric(Arc::new(DroppingProvider));
        let err = comparator
            .compare_dot(&units(&["a", "b"]), &units(&["x"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompareError::Embedding(EmbeddingError::ShapeMismatch { expected_rows: 2, actual_rows: 1 })
        ));
    }

    #[test]
    fn test_embedding_configs() {
        let comparator = Comparator::symmetric(stub());
        let (left, right) = comparator.embedding_configs();
        assert_eq!(left, right);
        assert_eq!(left.dimension, 2);
    }

    #[test]
    fn test_matrix_json_shape_is_checked() {
        let m: SimilarityMatrix =
            serde_json::from_str(r#"{"rows":2,"cols":1,"values":[0.5,0.25]}"#).unwrap();
        assert_eq!(m.shape(), (2, 1));
        assert_eq!(m.row(1).unwrap(), &[0.25]);

        let err = serde_json::from_str::<SimilarityMatrix>(r#"{"rows":2,"cols":2,"values":[0.5,0.25]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("2x2"));
    }
}
