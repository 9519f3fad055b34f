//! Local dual-encoder embedding provider.
//!
//! The dual encoder is a pretrained twin network with two encoder heads, one
//! trained on sentences and one on paragraphs, sharing a single backbone. A
//! [`DualEncoderProvider`] is bound to one head at construction. Inputs are
//! tokenized to exactly the model's sequence length (padded or truncated)
//! and the resulting representations are L2-normalised row by row.
//!
//! The network itself sits behind the [`TwinEncoder`] trait; this module only
//! owns tokenization, shape checks, and normalisation. No configured backend
//! builds a dual encoder: callers supply their own [`TwinEncoder`], usually
//! paired with a [`FixedLengthTokenizer::from_file`] tokenizer, and wrap the
//! provider in a comparator themselves.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use super::{EmbeddingError, EmbeddingMatrix, EmbeddingProvider, EmbeddingResult};

/// Floor on the row norm during normalisation.
pub const NORMALIZE_EPS: f32 = 1e-12;

/// Which encoder of the twin network to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderHead {
    Sentence,
    Paragraph,
}

impl EncoderHead {
    /// Position of this head in the twin's encoder list.
    pub fn index(self) -> usize {
        match self {
            EncoderHead::Sentence => 0,
            EncoderHead::Paragraph => 1,
        }
    }
}

impl std::fmt::Display for EncoderHead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderHead::Sentence => write!(f, "sentence"),
            EncoderHead::Paragraph => write!(f, "paragraph"),
        }
    }
}

/// Turns text into token id sequences of one fixed length.
pub trait SequenceTokenizer: Send + Sync {
    /// Length of every sequence returned by `encode_fixed`.
    fn seq_length(&self) -> usize;

    /// Tokenize `texts`, padding or truncating each to `seq_length()` ids.
    fn encode_fixed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<u32>>>;
}

/// Boundary to the pretrained twin network.
pub trait TwinEncoder: Send + Sync {
    /// Sequence length the network was trained with.
    fn seq_length(&self) -> usize;

    /// Size of the representation produced by each head.
    fn representation_dim(&self) -> usize;

    /// Run one head over a batch of token id sequences, one output row per sequence.
    fn encode(&self, head: EncoderHead, input_ids: &[Vec<u32>]) -> EmbeddingResult<Vec<Vec<f32>>>;
}

/// A Hugging Face tokenizer configured for fixed-length output.
pub struct FixedLengthTokenizer {
    inner: Tokenizer,
    seq_length: usize,
}

impl FixedLengthTokenizer {
    /// Configure `tokenizer` to pad and truncate to `seq_length` tokens.
    ///
    /// The pad id is the tokenizer's `<pad>` (or `[PAD]`) token, or 0 if it has neither.
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` if truncation cannot be configured
    pub fn new(mut tokenizer: Tokenizer, seq_length: usize) -> EmbeddingResult<Self> {
        let (pad_token, pad_id) = ["<pad>", "[PAD]"]
            .iter()
            .find_map(|token| tokenizer.token_to_id(token).map(|id| (token.to_string(), id)))
            .unwrap_or_else(|| ("<pad>".to_string(), 0));

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: seq_length,
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::ConfigError(format!("failed to configure truncation: {}", e)))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(seq_length),
            pad_id,
            pad_token,
            ..Default::default()
        }));

        Ok(Self {
            inner: tokenizer,
            seq_length,
        })
    }

    /// Load a `tokenizer.json` file.
    pub fn from_file(path: &Path, seq_length: usize) -> EmbeddingResult<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            EmbeddingError::ConfigError(format!("failed to load tokenizer {}: {}", path.display(), e))
        })?;
        Self::new(tokenizer, seq_length)
    }
}

impl SequenceTokenizer for FixedLengthTokenizer {
    fn seq_length(&self) -> usize {
        self.seq_length
    }

    fn encode_fixed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<u32>>> {
        let encodings = self
            .inner
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::InvalidInput(format!("tokenization failed: {}", e)))?;
        Ok(encodings.iter().map(|enc| enc.get_ids().to_vec()).collect())
    }
}

/// Embedding provider backed by one head of a twin encoder.
pub struct DualEncoderProvider {
    tokenizer: Arc<dyn SequenceTokenizer>,
    encoder: Arc<dyn TwinEncoder>,
    head: EncoderHead,
    model_name: String,
}

impl DualEncoderProvider {
    /// Bind a provider to `head` of `encoder`.
    ///
    /// Sentence and paragraph providers built from the same `encoder` share its weights.
    ///
    /// # Arguments
    /// * `name` - Identifier of the pretrained checkpoint, used in provenance records
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` if the tokenizer and encoder
    /// disagree on sequence length
    pub fn new(
        name: impl Into<String>,
        tokenizer: Arc<dyn SequenceTokenizer>,
        encoder: Arc<dyn TwinEncoder>,
        head: EncoderHead,
    ) -> EmbeddingResult<Self> {
        if tokenizer.seq_length() != encoder.seq_length() {
            return Err(EmbeddingError::ConfigError(format!(
                "tokenizer produces {} tokens but the encoder expects {}",
                tokenizer.seq_length(),
                encoder.seq_length()
            )));
        }
        Ok(Self {
            model_name: format!("{}/{}", name.into(), head),
            tokenizer,
            encoder,
            head,
        })
    }

    pub fn head(&self) -> EncoderHead {
        self.head
    }
}

#[async_trait]
impl EmbeddingProvider for DualEncoderProvider {
    async fn embed(&self, units: &[String]) -> EmbeddingResult<EmbeddingMatrix> {
        if units.is_empty() {
            return Ok(EmbeddingMatrix::empty(self.encoder.representation_dim()));
        }

        let input_ids = self.tokenizer.encode_fixed(units)?;
        let seq_length = self.encoder.seq_length();
        if let Some(bad) = input_ids.iter().find(|ids| ids.len() != seq_length) {
            return Err(EmbeddingError::Other(format!(
                "tokenizer produced a sequence of {} ids, expected {}",
                bad.len(),
                seq_length
            )));
        }

        let representations = self.encoder.encode(self.head, &input_ids)?;
        let matrix = EmbeddingMatrix::from_rows(representations)?.ensure_rows(units.len())?;
        if matrix.dimension() != self.encoder.representation_dim() {
            return Err(EmbeddingError::Other(format!(
                "encoder returned {}-dimensional representations, expected {}",
                matrix.dimension(),
                self.encoder.representation_dim()
            )));
        }
        Ok(matrix.l2_normalize_rows(NORMALIZE_EPS))
    }

    fn dimension(&self) -> usize {
        self.encoder.representation_dim()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
