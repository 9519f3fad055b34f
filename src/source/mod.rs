//! Corpus source abstraction.
//!
//! A `CorpusSource` resolves a document identifier into its preprint and its
//! review process. Retrieval from the bioRxiv and Early Evidence Base APIs,
//! and section extraction from JATS XML, live behind this trait; the corpus
//! only sees fully parsed [`Preprint`] and [`ReviewProcess`] values.

mod memory;

pub use memory::InMemorySource;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CorpusEntry, ModelError, Preprint, ReviewProcess, ReviewedPreprint};

/// Errors that can occur when resolving a document from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source has no record for the identifier
    #[error("Not found in source: {0}")]
    NotFound(String),

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A record was retrieved but could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A parsed record failed validation
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Other source-specific errors
    #[error("Source error: {0}")]
    Other(String),
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Trait for resolving document identifiers into corpus entries.
///
/// # Design Notes
///
/// - Implementations handle their own pagination, rate limiting, and caching
/// - A missing document is an error; the corpus decides whether that is fatal
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Fetch and parse the preprint for `doi`.
    ///
    /// # Errors
    /// Returns `SourceError::NotFound` if the source has no such preprint
    async fn fetch_preprint(&self, doi: &str) -> SourceResult<Preprint>;

    /// Fetch the review process for `doi`.
    ///
    /// # Errors
    /// Returns `SourceError::NotFound` if the document was never reviewed
    async fn fetch_review_process(&self, doi: &str) -> SourceResult<ReviewProcess>;

    /// Fetch both halves of a corpus entry.
    ///
    /// # Errors
    /// Returns the first failure of either fetch, or `SourceError::Model` if
    /// the two halves carry different identifiers
    async fn fetch_entry(&self, doi: &str) -> SourceResult<CorpusEntry> {
        let preprint = self.fetch_preprint(doi).await?;
        let review_process = self.fetch_review_process(doi).await?;
        Ok(ReviewedPreprint::from_parts(preprint, review_process)?)
    }

    /// Get a human-readable name of this source, for logging.
    fn name(&self) -> &str;
}
