//! Corpus persistence abstraction and implementations.
//!
//! This module defines the interface for persisting and reloading corpus
//! entries. The corpus orchestrates a save or load; a `CorpusStorage`
//! implementation owns the actual layout and I/O.

pub mod directory;

pub use directory::DirectoryStorage;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::CorpusEntry;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error, with the path that caused it
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Data serialization/deserialization error
    #[error("Serialization error at {path}: {message}")]
    SerializationError { path: String, message: String },

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Two identifiers would be stored at the same location
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// A name cannot be used as a file name
    #[error("Invalid name: {0}")]
    InvalidName(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for corpus storage backends.
#[async_trait]
pub trait CorpusStorage: Send + Sync {
    /// Record the ordered list of identifiers making up the corpus.
    ///
    /// # Errors
    /// Returns `StorageError::DuplicateEntry` if two identifiers cannot be
    /// stored side by side, or other `StorageError` variants for I/O failures
    async fn write_manifest(&self, identifiers: &[String]) -> StorageResult<()>;

    /// Read back the identifier list, in corpus order.
    ///
    /// # Errors
    /// Returns `StorageError::NotFound` if no manifest has been written
    async fn read_manifest(&self) -> StorageResult<Vec<String>>;

    /// Persist one entry, replacing any earlier copy.
    async fn write_entry(&self, entry: &CorpusEntry) -> StorageResult<()>;

    /// Load one entry.
    ///
    /// Parts that were never stored come back as `None`.
    ///
    /// # Errors
    /// Returns `StorageError::NotFound` if nothing is stored for `doi`
    async fn read_entry(&self, doi: &str) -> StorageResult<CorpusEntry>;
}
