//! The corpus: an ordered, index-addressable set of reviewed preprints.
//!
//! A corpus is built eagerly from a list of identifiers and never changes
//! afterwards. Building fails as a whole if any identifier cannot be
//! resolved; no partial corpus is ever returned. Persistence is delegated to
//! a [`CorpusStorage`], so the corpus only decides what to save and in which
//! order.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::models::CorpusEntry;
use crate::source::{CorpusSource, SourceError};
use crate::storage::{CorpusStorage, DirectoryStorage, StorageError};

/// Errors that can occur while building, saving or loading a corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// One identifier could not be resolved
    #[error("Failed to resolve '{doi}': {source}")]
    Unresolved {
        doi: String,
        #[source]
        source: SourceError,
    },

    /// Resolved entry count differs from the number of identifiers requested
    #[error("Corpus incomplete: resolved {resolved} of {requested} identifiers")]
    Incomplete { requested: usize, resolved: usize },

    /// The same identifier was requested twice
    #[error("Duplicate identifier in corpus: {0}")]
    DuplicateIdentifier(String),

    /// Persistence failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for corpus operations.
pub type CorpusResult<T> = Result<T, CorpusError>;

/// Ordered collection of corpus entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
}

impl Corpus {
    /// Wrap already resolved entries, keeping their order.
    ///
    /// # Errors
    /// Returns `CorpusError::DuplicateIdentifier` if two entries share an identifier
    pub fn from_entries(entries: Vec<CorpusEntry>) -> CorpusResult<Self> {
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.doi.as_str()) {
                return Err(CorpusError::DuplicateIdentifier(entry.doi.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Resolve every identifier through `source`, in order.
    ///
    /// # Arguments
    /// * `identifiers` - Document identifiers, in corpus order
    /// * `source` - Resolves each identifier into a preprint and its review process
    ///
    /// # Errors
    /// Returns `CorpusError::Unresolved` for the first identifier that fails.
    /// Nothing is returned for the identifiers resolved before it.
    pub async fn build(identifiers: &[String], source: &dyn CorpusSource) -> CorpusResult<Self> {
        info!(
            "Building corpus of {} documents from {}",
            identifiers.len(),
            source.name()
        );
        let mut entries = Vec::with_capacity(identifiers.len());
        for doi in identifiers {
            let entry = source
                .fetch_entry(doi)
                .await
                .map_err(|source| CorpusError::Unresolved {
                    doi: doi.clone(),
                    source,
                })?;
            debug!("Resolved {}", doi);
            entries.push(entry);
        }
        if entries.len() != identifiers.len() {
            return Err(CorpusError::Incomplete {
                requested: identifiers.len(),
                resolved: entries.len(),
            });
        }
        Self::from_entries(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CorpusEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CorpusEntry> {
        self.entries.iter()
    }

    /// Identifiers in corpus order.
    pub fn identifiers(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.doi.clone()).collect()
    }

    /// Persist the corpus through `storage`.
    ///
    /// # Errors
    /// Returns `CorpusError::Storage` if the manifest or any entry cannot be written
    pub async fn save_to(&self, storage: &dyn CorpusStorage) -> CorpusResult<()> {
        storage.write_manifest(&self.identifiers()).await?;
        for entry in &self.entries {
            storage.write_entry(entry).await?;
        }
        info!("Saved corpus of {} documents", self.len());
        Ok(())
    }

    /// Rebuild a corpus from `storage`, in manifest order.
    ///
    /// # Errors
    /// Returns `CorpusError::Storage` if the manifest or any listed entry cannot be read
    pub async fn load_from(storage: &dyn CorpusStorage) -> CorpusResult<Self> {
        let identifiers = storage.read_manifest().await?;
        let mut entries = Vec::with_capacity(identifiers.len());
        for doi in &identifiers {
            entries.push(storage.read_entry(doi).await?);
        }
        if entries.len() != identifiers.len() {
            return Err(CorpusError::Incomplete {
                requested: identifiers.len(),
                resolved: entries.len(),
            });
        }
        info!("Loaded corpus of {} documents", entries.len());
        Self::from_entries(entries)
    }

    /// Save as a directory tree (see [`DirectoryStorage`]).
    pub async fn save(&self, directory: impl AsRef<Path>) -> CorpusResult<()> {
        self.save_to(&DirectoryStorage::new(directory.as_ref())).await
    }

    /// Load a corpus saved with [`Corpus::save`].
    pub async fn load(directory: impl AsRef<Path>) -> CorpusResult<Self> {
        Self::load_from(&DirectoryStorage::new(directory.as_ref())).await
    }
}

impl std::ops::Index<usize> for Corpus {
    type Output = CorpusEntry;

    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{Preprint, Review, ReviewProcess};
    use crate::source::InMemorySource;

    pub const LONG_INTRO: &str = "The retina develops from a neuroepithelium whose progenitors give rise to seven major cell classes.";
    pub const LONG_RESULTS: &str = "Enhancer deletion reduced reporter expression in the neural retina but not in the pigmented epithelium.";

    /// Identifiers `10.1101/000i` for `i` in `0..n`.
    pub fn identifiers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("10.1101/000{}", i)).collect()
    }

    pub fn preprint(doi: &str) -> Preprint {
        Preprint::new(doi)
            .with_section("introduction", format!("{} ({})", LONG_INTRO, doi))
            .with_section("results", format!("{} ({})", LONG_RESULTS, doi))
    }

    pub fn review_process(doi: &str, reviews: usize) -> ReviewProcess {
        let reviews = (0..reviews)
            .map(|i| {
                Review::from_text(
                    i.to_string(),
                    format!(
                        "Referee {} on {}: the conclusions require genetic experiments in the native genomic context.",
                        i, doi
                    ),
                )
            })
            .collect();
        ReviewProcess::new(doi, reviews)
    }

    /// A source holding `n` complete documents with two reviews each.
    pub fn source(n: usize) -> InMemorySource {
        identifiers(n)
            .iter()
            .fold(InMemorySource::new("fixtures"), |src, doi| {
                src.with_preprint(preprint(doi))
                    .with_review_process(review_process(doi, 2))
            })
    }
}
