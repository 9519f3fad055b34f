//! FastEmbed embedding provider implementation.
//!
//! Local sentence-encoder backend: the ONNX model is loaded once at
//! construction and every `embed` call runs in-process. Inputs longer than
//! `max_length` tokens are truncated by the model's tokenizer. No network is
//! involved, so no retry policy is applied.

use super::{EmbeddingError, EmbeddingMatrix, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Default token truncation length.
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Resolve a configured model name to a fastembed model.
///
/// Accepts both the enum variant name (`"BGESmallENV15"`) and the Hugging Face
/// repository id (`"BAAI/bge-small-en-v1.5"`), case-insensitively.
///
/// # Errors
/// Returns `EmbeddingError::ConfigError` for a name that matches no supported model
pub fn parse_model(name: &str) -> EmbeddingResult<EmbeddingModel> {
    let model = match name.to_ascii_lowercase().as_str() {
        "allminilml6v2" | "sentence-transformers/all-minilm-l6-v2" | "all-minilm-l6-v2" => {
            EmbeddingModel::AllMiniLML6V2
        }
        "bgesmallenv15" | "baai/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "bgebaseenv15" | "baai/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "bgelargeenv15" | "baai/bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
        "nomicembedtextv15" | "nomic-ai/nomic-embed-text-v1.5" => EmbeddingModel::NomicEmbedTextV15,
        "paraphrasemlminilml12v2" | "sentence-transformers/paraphrase-multilingual-minilm-l12-v2" => {
            EmbeddingModel::ParaphraseMLMiniLML12V2
        }
        "paraphrasemlmpnetbasev2" | "sentence-transformers/paraphrase-multilingual-mpnet-base-v2" => {
            EmbeddingModel::ParaphraseMLMpnetBaseV2
        }
        _ => {
            return Err(EmbeddingError::ConfigError(format!(
                "unsupported FastEmbed model '{}'",
                name
            )))
        }
    };
    Ok(model)
}

fn model_dimension(model: &EmbeddingModel) -> usize {
    match model {
        EmbeddingModel::AllMiniLML6V2 => 384,
        EmbeddingModel::BGESmallENV15 => 384,
        EmbeddingModel::BGEBaseENV15 => 768,
        EmbeddingModel::BGELargeENV15 => 1024,
        EmbeddingModel::NomicEmbedTextV15 => 768,
        EmbeddingModel::ParaphraseMLMiniLML12V2 => 384,
        EmbeddingModel::ParaphraseMLMpnetBaseV2 => 768,
        _ => 384,
    }
}

/// FastEmbed embedding provider.
#[derive(Clone)]
pub struct FastEmbedProvider {
    /// The embedding model instance (wrapped in Arc<Mutex> for thread-safety)
    model: Arc<Mutex<TextEmbedding>>,

    /// Model identifier
    model_name: String,

    /// Expected dimension of the embedding vectors
    embedding_dimension: usize,

    max_length: usize,
}

impl FastEmbedProvider {
    /// Load a FastEmbed model.
    ///
    /// # Arguments
    /// * `model` - Model to use (defaults to AllMiniLML6V2)
    /// * `cache_dir` - Cache directory for model files (fastembed's default if None)
    /// * `max_length` - Token length inputs are truncated to
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` if model initialization fails
    pub fn new(
        model: Option<EmbeddingModel>,
        cache_dir: Option<PathBuf>,
        max_length: usize,
    ) -> EmbeddingResult<Self> {
        let model_type = model.unwrap_or(EmbeddingModel::AllMiniLML6V2);
        let model_name = format!("{:?}", model_type);
        let embedding_dimension = model_dimension(&model_type);

        let mut init_options = InitOptions::new(model_type).with_max_length(max_length);
        if let Some(dir) = cache_dir {
            init_options = init_options.with_cache_dir(dir);
        }

        let text_embedding = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::ConfigError(format!("Failed to initialize FastEmbed model: {}", e)))?;

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name,
            embedding_dimension,
            max_length,
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, units: &[String]) -> EmbeddingResult<EmbeddingMatrix> {
        if units.is_empty() {
            return Ok(EmbeddingMatrix::empty(self.embedding_dimension));
        }

        let mut model = self.model.lock().await;
        let embeddings = model
            .embed(units.to_vec(), None)
            .map_err(|e| EmbeddingError::Other(format!("Batch embedding generation failed: {}", e)))?;
        debug!("{} embedded {} units", self.model_name, embeddings.len());

        EmbeddingMatrix::from_rows(embeddings)?.ensure_rows(units.len())
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// TextEmbedding does not implement Debug
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .field("max_length", &self.max_length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_provider() -> FastEmbedProvider {
        FastEmbedProvider::new(None, None, DEFAULT_MAX_LENGTH).expect("Failed to create default FastEmbedProvider")
    }

    #[test]
    fn test_parse_model_names() {
        assert!(matches!(parse_model("AllMiniLML6V2"), Ok(EmbeddingModel::AllMiniLML6V2)));
        assert!(matches!(parse_model("BAAI/bge-base-en-v1.5"), Ok(EmbeddingModel::BGEBaseENV15)));
        assert!(matches!(
            parse_model("sentence-transformers/all-MiniLM-L6-v2"),
            Ok(EmbeddingModel::AllMiniLML6V2)
        ));
        assert!(matches!(parse_model("word2vec"), Err(EmbeddingError::ConfigError(_))));
    }

    #[test]
    fn test_known_dimensions() {
        assert_eq!(model_dimension(&EmbeddingModel::AllMiniLML6V2), 384);
        assert_eq!(model_dimension(&EmbeddingModel::BGEBaseENV15), 768);
        assert_eq!(model_dimension(&EmbeddingModel::BGELargeENV15), 1024);
    }

    #[tokio::test]
    #[ignore = "downloads model weights"]
    async fn test_row_count_matches_input() {
        let provider = create_test_provider();
        let units = vec![
            "First test sentence.".to_string(),
            "Second test sentence with different content.".to_string(),
            "Third sentence about embeddings.".to_string(),
        ];

        let matrix = provider.embed(&units).await.unwrap();
        assert_eq!(matrix.rows(), units.len());
        assert_eq!(matrix.dimension(), provider.dimension());
        assert!(matrix.as_slice().iter().all(|x| x.is_finite()));
        assert_ne!(matrix.row(0).unwrap(), matrix.row(1).unwrap());
    }

    #[tokio::test]
    #[ignore = "downloads model weights"]
    async fn test_empty_input_yields_empty_matrix() {
        let provider = create_test_provider();
        let matrix = provider.embed(&[]).await.unwrap();
        assert!(matrix.is_empty());
        assert_eq!(matrix.dimension(), 384);
    }

    #[tokio::test]
    #[ignore = "downloads model weights"]
    async fn test_long_text_is_truncated_not_rejected() {
        let provider = create_test_provider();
        let long_text = "This is a longer piece of text. ".repeat(400);
        let matrix = provider.embed(&[long_text]).await.unwrap();
        assert_eq!(matrix.rows(), 1);
    }

    #[tokio::test]
    #[ignore = "downloads model weights"]
    async fn test_embedding_is_deterministic() {
        let provider = create_test_provider();
        let units = vec!["Consistency test text".to_string()];
        let first = provider.embed(&units).await.unwrap();
        let second = provider.embed(&units).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    #[ignore = "downloads model weights"]
    fn test_debug_implementation() {
        let debug_str = format!("{:?}", create_test_provider());
        assert!(debug_str.contains("FastEmbedProvider"));
        assert!(debug_str.contains("AllMiniLML6V2"));
    }
}
