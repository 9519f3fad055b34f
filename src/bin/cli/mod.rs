//! Argument types and logging setup shared by the binaries.

use clap::ValueEnum;
use review_overlap::{compare::SimilarityMode, config::EmbeddingBackend, segment::Granularity};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Unit size
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GranularityArg {
    Paragraph,
    Sentence,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Paragraph => Granularity::Paragraph,
            GranularityArg::Sentence => Granularity::Sentence,
        }
    }
}

/// Similarity score
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Raw dot product
    Dot,
    /// Dot product over the product of Frobenius norms
    Cosine,
}

impl From<ModeArg> for SimilarityMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Dot => SimilarityMode::Dot,
            ModeArg::Cosine => SimilarityMode::Cosine,
        }
    }
}

/// Embedding provider type
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendArg {
    /// OpenAI cloud-based embedding provider (requires OPENAI_API_KEY)
    #[value(name = "openai")]
    OpenAI,
    /// FastEmbed local embedding provider (no API required)
    FastEmbed,
}

impl From<BackendArg> for EmbeddingBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::OpenAI => EmbeddingBackend::OpenAI,
            BackendArg::FastEmbed => EmbeddingBackend::FastEmbed,
        }
    }
}

/// Initialize logging subsystem with the specified level
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_names() {
        assert!(matches!(BackendArg::from_str("openai", false), Ok(BackendArg::OpenAI)));
        assert!(matches!(BackendArg::from_str("fast-embed", false), Ok(BackendArg::FastEmbed)));
        assert!(matches!(GranularityArg::from_str("sentence", false), Ok(GranularityArg::Sentence)));
        assert!(matches!(ModeArg::from_str("cosine", false), Ok(ModeArg::Cosine)));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(EmbeddingBackend::from(BackendArg::FastEmbed), EmbeddingBackend::FastEmbed);
        assert_eq!(Granularity::from(GranularityArg::Paragraph), Granularity::Paragraph);
        assert_eq!(SimilarityMode::from(ModeArg::Cosine), SimilarityMode::Cosine);
    }
}
