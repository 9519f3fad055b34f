//! Review Overlap - measuring how much of a preprint its peer reviews echo.
//!
//! This library embeds chunks of preprint text and chunks of referee reports,
//! scores every chunk pair, and contrasts the scores of true preprint/review
//! pairs with those of randomly mismatched pairs.
//!
//! # Architecture
//!
//! The system is organized into several key modules:
//!
//! - **config**: Run configuration loaded from JSON (sections, granularity, sample size, backend)
//! - **models**: Core data structures (Preprint, Review, ReviewProcess, ReviewedPreprint)
//! - **segment**: Paragraph and sentence splitting with length and boilerplate filters
//! - **embedding**: Embedding providers (OpenAI, FastEmbed, dual encoder) and retry policy
//! - **compare**: Pairwise dot/cosine similarity matrices between two unit lists
//! - **source**: Retrieval boundary that resolves identifiers into documents
//! - **storage**: Directory-tree persistence of a corpus
//! - **corpus**: Ordered, index-addressable collection of reviewed preprints
//! - **sampler**: Enriched (cognate) and null (non-cognate) similarity distributions
//!
//! # Workflow
//!
//! 1. Build a corpus from identifiers through a `CorpusSource`, or load a saved one
//! 2. Segment the chosen preprint sections and each review into units
//! 3. Embed both sides and score every unit pair
//! 4. Repeat for cognate and non-cognate pairs and flatten the scores
//!
//! # Example
//!
//! ```ignore
//! use review_overlap::{
//!     config::AnalysisConfig,
//!     compare::Comparator,
//!     corpus::Corpus,
//!     embedding::build_provider,
//!     sampler::Sampler,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AnalysisConfig::from_file("analysis.json")?;
//!     let corpus = Corpus::load("corpus/").await?;
//!     let provider = build_provider(&config.embedding, std::env::var("OPENAI_API_KEY").ok())?;
//!
//!     let mut sampler = Sampler::new(
//!         &corpus,
//!         Comparator::symmetric(provider),
//!         config.segmenter(),
//!         config.sample_size,
//!         config.seed,
//!     )?
//!     .with_sections(config.sections.clone())
//!     .with_mode(config.similarity);
//!     let distributions = sampler.sample().await?;
//!
//!     println!("{:?}", distributions.enriched_summary());
//!     Ok(())
//! }
//! ```

// Public modules
pub mod compare;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod models;
pub mod sampler;
pub mod segment;
pub mod source;
pub mod storage;

// Re-export commonly used types at the crate root
pub use compare::{Comparator, SimilarityMatrix, SimilarityMode};
pub use config::AnalysisConfig;
pub use corpus::Corpus;
pub use embedding::{EmbeddingMatrix, EmbeddingProvider};
pub use models::{CorpusEntry, EmbeddingConfig, Preprint, Review, ReviewProcess, ReviewedPreprint};
pub use sampler::{Sampler, SimilarityDistributions};
pub use segment::{Granularity, Segmenter};
pub use source::CorpusSource;
pub use storage::CorpusStorage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
