//! Directory-tree corpus storage.
//!
//! Layout under the root directory:
//!
//! ```text
//! corpus.json                          ordered identifier manifest
//! <safe-id>/preprint/<section>.txt     one file per section
//! <safe-id>/preprint/metadata.json     bioRxiv metadata, when known
//! <safe-id>/reviews/review_<i>/content.txt
//! <safe-id>/reviews/review_<i>/review.json
//! ```
//!
//! `<safe-id>` is the identifier with `.` replaced by `_` and `/` by `-`.
//! `content.txt` is authoritative for the review text; `review.json` carries
//! the remaining review fields.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use super::{CorpusStorage, StorageError, StorageResult};
use crate::models::{
    sanitize_identifier, CorpusEntry, Preprint, PreprintMetadata, Review, ReviewProcess, ReviewedPreprint,
};

const MANIFEST_FILE: &str = "corpus.json";
const PREPRINT_DIR: &str = "preprint";
const METADATA_FILE: &str = "metadata.json";
const REVIEWS_DIR: &str = "reviews";
const REVIEW_DIR_PREFIX: &str = "review_";
const REVIEW_TEXT_FILE: &str = "content.txt";
const REVIEW_FIELDS_FILE: &str = "review.json";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    identifiers: Vec<String>,
}

/// Stores a corpus as a tree of plain-text and JSON files.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding everything stored for `doi`.
    pub fn entry_dir(&self, doi: &str) -> PathBuf {
        self.root.join(sanitize_identifier(doi))
    }

    async fn write_preprint(&self, dir: &Path, preprint: &Preprint) -> StorageResult<()> {
        create_dir_all(dir).await?;
        for (name, text) in &preprint.sections {
            check_file_name(name)?;
            write_file(&dir.join(format!("{}.txt", name)), text.as_bytes()).await?;
        }
        if let Some(metadata) = &preprint.metadata {
            write_json(&dir.join(METADATA_FILE), metadata).await?;
        }
        Ok(())
    }

    async fn read_preprint(&self, dir: &Path, doi: &str) -> StorageResult<Preprint> {
        let mut preprint = Preprint::new(doi);
        for path in list_dir(dir).await? {
            match path.file_name().and_then(|n| n.to_str()) {
                Some(METADATA_FILE) => {
                    let metadata: PreprintMetadata = read_json(&path).await?;
                    preprint = preprint.with_metadata(metadata);
                }
                Some(file) if file.ends_with(".txt") => {
                    let name = file.trim_end_matches(".txt");
                    let text = read_to_string(&path).await?;
                    preprint = preprint.with_section(name, text);
                }
                _ => {}
            }
        }
        Ok(preprint)
    }

    async fn write_reviews(&self, dir: &Path, review_process: &ReviewProcess) -> StorageResult<()> {
        create_dir_all(dir).await?;
        for (i, review) in review_process.reviews.iter().enumerate() {
            let review_dir = dir.join(format!("{}{}", REVIEW_DIR_PREFIX, i));
            create_dir_all(&review_dir).await?;
            write_file(&review_dir.join(REVIEW_TEXT_FILE), review.text.as_bytes()).await?;
            write_json(&review_dir.join(REVIEW_FIELDS_FILE), review).await?;
        }
        Ok(())
    }

    async fn read_reviews(&self, dir: &Path, doi: &str) -> StorageResult<ReviewProcess> {
        let mut numbered = Vec::new();
        for path in list_dir(dir).await? {
            let index = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(REVIEW_DIR_PREFIX))
                .and_then(|i| i.parse::<usize>().ok());
            if let Some(index) = index {
                numbered.push((index, path));
            }
        }
        numbered.sort_by_key(|(index, _)| *index);

        let mut reviews = Vec::with_capacity(numbered.len());
        for (index, review_dir) in numbered {
            let text = read_to_string(&review_dir.join(REVIEW_TEXT_FILE)).await?;
            let fields_path = review_dir.join(REVIEW_FIELDS_FILE);
            let review = if exists(&fields_path).await? {
                let mut review: Review = read_json(&fields_path).await?;
                review.text = text;
                review
            } else {
                Review::from_text(index.to_string(), text)
            };
            reviews.push(review);
        }
        Ok(ReviewProcess::new(doi, reviews))
    }
}

#[async_trait]
impl CorpusStorage for DirectoryStorage {
    async fn write_manifest(&self, identifiers: &[String]) -> StorageResult<()> {
        let mut seen: HashMap<String, &str> = HashMap::new();
        for doi in identifiers {
            if let Some(previous) = seen.insert(sanitize_identifier(doi), doi) {
                return Err(StorageError::DuplicateEntry(format!(
                    "'{}' and '{}' map to the same directory",
                    previous, doi
                )));
            }
        }
        create_dir_all(&self.root).await?;
        let manifest = Manifest {
            identifiers: identifiers.to_vec(),
        };
        write_json(&self.root.join(MANIFEST_FILE), &manifest).await
    }

    async fn read_manifest(&self) -> StorageResult<Vec<String>> {
        let path = self.root.join(MANIFEST_FILE);
        if !exists(&path).await? {
            return Err(StorageError::NotFound(format!("no corpus manifest at {}", path.display())));
        }
        let manifest: Manifest = read_json(&path).await?;
        Ok(manifest.identifiers)
    }

    async fn write_entry(&self, entry: &CorpusEntry) -> StorageResult<()> {
        let dir = self.entry_dir(&entry.doi);
        if exists(&dir).await? {
            fs::remove_dir_all(&dir).await.map_err(|e| io_error(&dir, e))?;
        }
        create_dir_all(&dir).await?;
        if let Some(preprint) = &entry.preprint {
            self.write_preprint(&dir.join(PREPRINT_DIR), preprint).await?;
        }
        if let Some(review_process) = &entry.review_process {
            self.write_reviews(&dir.join(REVIEWS_DIR), review_process).await?;
        }
        debug!("Stored {} in {}", entry.doi, dir.display());
        Ok(())
    }

    async fn read_entry(&self, doi: &str) -> StorageResult<CorpusEntry> {
        let dir = self.entry_dir(doi);
        if !exists(&dir).await? {
            return Err(StorageError::NotFound(format!("{} (expected {})", doi, dir.display())));
        }

        let preprint_dir = dir.join(PREPRINT_DIR);
        let preprint = if exists(&preprint_dir).await? {
            Some(self.read_preprint(&preprint_dir, doi).await?)
        } else {
            None
        };
        let reviews_dir = dir.join(REVIEWS_DIR);
        let review_process = if exists(&reviews_dir).await? {
            Some(self.read_reviews(&reviews_dir, doi).await?)
        } else {
            None
        };

        Ok(ReviewedPreprint {
            doi: doi.to_string(),
            preprint,
            review_process,
        })
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn check_file_name(name: &str) -> StorageResult<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(StorageError::InvalidName(format!("section name '{}'", name)));
    }
    Ok(())
}

/// `Ok(false)` only if `path` is genuinely absent; any other failure is an I/O error.
async fn exists(path: &Path) -> StorageResult<bool> {
    fs::try_exists(path).await.map_err(|e| io_error(path, e))
}

async fn create_dir_all(path: &Path) -> StorageResult<()> {
    fs::create_dir_all(path).await.map_err(|e| io_error(path, e))
}

async fn write_file(path: &Path, contents: &[u8]) -> StorageResult<()> {
    fs::write(path, contents).await.map_err(|e| io_error(path, e))
}

async fn read_to_string(path: &Path) -> StorageResult<String> {
    fs::read_to_string(path).await.map_err(|e| io_error(path, e))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| StorageError::SerializationError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    write_file(path, &json).await
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let bytes = fs::read(path).await.map_err(|e| io_error(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| StorageError::SerializationError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

async fn list_dir(path: &Path) -> StorageResult<Vec<PathBuf>> {
    let mut entries = fs::read_dir(path).await.map_err(|e| io_error(path, e))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(path, e))? {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}
