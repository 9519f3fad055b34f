//! Run configuration.
//!
//! An [`AnalysisConfig`] gathers everything a sampling run needs apart from
//! the corpus itself and the API key. Every field has a default, so a config
//! file only has to name what it changes:
//!
//! ```json
//! {
//!   "sections": "introduction+discussion",
//!   "granularity": "sentence",
//!   "sample_size": 200,
//!   "seed": 42,
//!   "embedding": { "backend": "fast-embed" }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compare::SimilarityMode;
use crate::embedding::fastembed::DEFAULT_MAX_LENGTH;
use crate::embedding::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, DEFAULT_MULTIPLIER};
use crate::models::{SECTION_DELIMITER, SECTION_NAMES};
use crate::sampler::{DEFAULT_SAMPLE_SIZE, DEFAULT_SECTIONS};
use crate::segment::{Granularity, Segmenter, DEFAULT_MIN_LENGTH, REVIEW_COMMONS_BOILERPLATE};

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for this schema
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingBackend {
    /// Hosted OpenAI-compatible endpoint
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    /// Local model through fastembed
    FastEmbed,
}

/// Retry settings for remote embedding calls, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: usize,
    pub multiplier_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            multiplier_ms: DEFAULT_MULTIPLIER.as_millis() as u64,
            max_delay_ms: DEFAULT_MAX_DELAY.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            multiplier: Duration::from_millis(self.multiplier_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Which embedding backend to use and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    /// Model name; the backend's default when unset
    pub model: Option<String>,
    /// Endpoint root for the OpenAI backend
    pub base_url: Option<String>,
    /// Model cache for the fastembed backend
    pub cache_dir: Option<PathBuf>,
    /// Token limit per unit for the fastembed backend
    pub max_length: usize,
    pub retry: RetrySettings,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: None,
            base_url: None,
            cache_dir: None,
            max_length: DEFAULT_MAX_LENGTH,
            retry: RetrySettings::default(),
        }
    }
}

/// Settings of one sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Preprint sections to compare, joined by `+`
    pub sections: String,
    pub granularity: Granularity,
    /// Units shorter than this many characters are dropped
    pub min_chunk_length: usize,
    /// Units containing any of these phrases are dropped
    pub boilerplate: Vec<String>,
    /// Target number of pairs per distribution
    pub sample_size: usize,
    pub similarity: SimilarityMode,
    pub seed: Option<u64>,
    pub embedding: EmbeddingSettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sections: DEFAULT_SECTIONS.to_string(),
            granularity: Granularity::default(),
            min_chunk_length: DEFAULT_MIN_LENGTH,
            boilerplate: REVIEW_COMMONS_BOILERPLATE
                .iter()
                .map(|phrase| phrase.to_string())
                .collect(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            similarity: SimilarityMode::default(),
            seed: None,
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load and validate a JSON config file.
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if the file cannot be read, `ConfigError::Parse`
    /// if it is not valid, and `ConfigError::Invalid` if validation fails
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sections.trim().is_empty() {
            return Err(ConfigError::Invalid("sections must name at least one section".into()));
        }
        for name in self.sections.split(SECTION_DELIMITER).map(str::trim) {
            if !SECTION_NAMES.contains(&name) {
                return Err(ConfigError::Invalid(format!(
                    "unknown section '{}' (expected one of {})",
                    name,
                    SECTION_NAMES.join(", ")
                )));
            }
        }
        if self.embedding.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("embedding.retry.max_attempts must be at least 1".into()));
        }
        if self.embedding.retry.multiplier_ms > self.embedding.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "embedding.retry.multiplier_ms must not exceed max_delay_ms".into(),
            ));
        }
        if self.embedding.max_length == 0 {
            return Err(ConfigError::Invalid("embedding.max_length must be positive".into()));
        }
        Ok(())
    }

    /// Segmenter described by this config.
    pub fn segmenter(&self) -> Segmenter {
        Segmenter::new(self.granularity)
            .with_min_length(self.min_chunk_length)
            .with_boilerplate(self.boilerplate.iter().cloned())
    }
}
