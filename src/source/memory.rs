//! Source backed by records already held in memory.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{CorpusSource, SourceError, SourceResult};
use crate::models::{Preprint, ReviewProcess};

/// A `CorpusSource` over preloaded preprints and review processes.
///
/// Useful for corpora assembled by another tool and for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    name: String,
    preprints: HashMap<String, Preprint>,
    review_processes: HashMap<String, ReviewProcess>,
}

impl InMemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Register a preprint under its own identifier.
    pub fn with_preprint(mut self, preprint: Preprint) -> Self {
        self.preprints.insert(preprint.doi.clone(), preprint);
        self
    }

    /// Register a review process under its own identifier.
    pub fn with_review_process(mut self, review_process: ReviewProcess) -> Self {
        self.review_processes
            .insert(review_process.doi.clone(), review_process);
        self
    }

    pub fn len(&self) -> usize {
        self.preprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preprints.is_empty()
    }
}

#[async_trait]
impl CorpusSource for InMemorySource {
    async fn fetch_preprint(&self, doi: &str) -> SourceResult<Preprint> {
        self.preprints
            .get(doi)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("preprint {}", doi)))
    }

    async fn fetch_review_process(&self, doi: &str) -> SourceResult<ReviewProcess> {
        self.review_processes
            .get(doi)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("review process {}", doi)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelError, Review};
    use crate::source::SourceError;

    fn source() -> InMemorySource {
        InMemorySource::new("fixtures")
            .with_preprint(Preprint::new("10.1101/1").with_section("introduction", "Intro text."))
            .with_review_process(ReviewProcess::new("10.1101/1", vec![Review::from_text("1", "Looks fine.")]))
            .with_preprint(Preprint::new("10.1101/2"))
    }

    #[tokio::test]
    async fn test_fetch_entry() {
        let entry = source().fetch_entry("10.1101/1").await.unwrap();
        assert_eq!(entry.doi, "10.1101/1");
        assert!(entry.is_complete());
        assert_eq!(
            entry.preprint.unwrap().introduction(),
            Some("Intro text.")
        );
    }

    #[tokio::test]
    async fn test_missing_review_process() {
        let err = source().fetch_entry("10.1101/2").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(msg) if msg.contains("review process")));
    }

    #[tokio::test]
    async fn test_missing_preprint() {
        let err = source().fetch_preprint("10.1101/404").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mismatched_halves_rejected() {
        // Review process registered under a different key than its own doi
        let mut src = source();
        src.review_processes
            .insert("10.1101/2".to_string(), ReviewProcess::new("10.1101/1", vec![]));
        let err = src.fetch_entry("10.1101/2").await.unwrap_err();
        assert!(matches!(err, SourceError::Model(ModelError::IdentifierMismatch { .. })));
    }

    #[test]
    fn test_name_and_len() {
        let src = source();
        assert_eq!(src.name(), "fixtures");
        assert_eq!(src.len(), 2);
        assert!(!src.is_empty());
    }
}
