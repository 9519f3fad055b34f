//! Null-distribution binary entry point.
//!
//! Loads a saved corpus, draws cognate and non-cognate preprint/review pairs,
//! and writes both similarity distributions with a sampling report as JSON.
//!
//! # Examples
//!
//! Default settings (OpenAI embeddings, introduction+results, paragraphs):
//! ```bash
//! OPENAI_API_KEY=sk-... null-distribution corpus/ --output distributions.json
//! ```
//!
//! Local embeddings, sentence units, reproducible draw:
//! ```bash
//! null-distribution corpus/ --embedding-backend fast-embed --granularity sentence --seed 42
//! ```

mod cli;

use anyhow::{Context, Result};
use cli::{init_logging, BackendArg, GranularityArg, ModeArg};
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use review_overlap::{
    compare::Comparator,
    config::{AnalysisConfig, EmbeddingBackend},
    corpus::Corpus,
    embedding::build_provider,
    sampler::{DistributionSummary, Sampler, SimilarityDistributions},
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sample enriched and null similarity distributions from a saved corpus
#[derive(Parser, Debug)]
#[command(
    name = "null-distribution",
    version,
    about = "Sample cognate and non-cognate preprint/review similarity distributions",
    long_about = "Loads a corpus directory written by Corpus::save, compares each sampled preprint with one of its own reviews (enriched distribution) and with a review of an unrelated preprint (null distribution), and writes both as JSON.

Command-line flags override values from --config.

EXAMPLES:
  OpenAI embeddings with defaults:
    OPENAI_API_KEY=sk-... null-distribution corpus/

  Local embeddings on sentences, fixed seed:
    null-distribution corpus/ --embedding-backend fast-embed --granularity sentence --seed 42"
)]
struct Args {
    /// Corpus directory
    #[arg(value_name = "DIR")]
    corpus: PathBuf,

    /// JSON config file; defaults apply to anything it leaves out
    #[arg(short, long, value_name = "FILE", env = "REVIEW_OVERLAP_CONFIG")]
    config: Option<PathBuf>,

    /// Where to write the distributions
    #[arg(short, long, value_name = "FILE", default_value = "null_distribution.json")]
    output: PathBuf,

    /// Preprint sections to compare, joined by '+'
    #[arg(long, value_name = "SPEC")]
    sections: Option<String>,

    /// Unit size
    #[arg(long, value_enum)]
    granularity: Option<GranularityArg>,

    /// Drop units shorter than this many characters
    #[arg(long, value_name = "CHARS")]
    min_chunk_length: Option<usize>,

    /// Pairs per distribution
    #[arg(short = 'n', long, value_name = "N")]
    sample_size: Option<usize>,

    /// Similarity score
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Random seed for a reproducible draw
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Embedding provider to use
    #[arg(long, value_enum)]
    embedding_backend: Option<BackendArg>,

    /// Specific embedding model name (provider-dependent)
    #[arg(long, value_name = "MODEL")]
    embedding_model: Option<String>,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Merge the config file (if any) with command-line overrides
fn resolve_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => AnalysisConfig::default(),
    };

    if let Some(sections) = &args.sections {
        config.sections = sections.clone();
    }
    if let Some(granularity) = args.granularity {
        config.granularity = granularity.into();
    }
    if let Some(min_chunk_length) = args.min_chunk_length {
        config.min_chunk_length = min_chunk_length;
    }
    if let Some(sample_size) = args.sample_size {
        config.sample_size = sample_size;
    }
    if let Some(mode) = args.mode {
        config.similarity = mode.into();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(backend) = args.embedding_backend {
        config.embedding.backend = backend.into();
    }
    if args.embedding_model.is_some() {
        config.embedding.model = args.embedding_model.clone();
    }
    if args.cache_dir.is_some() {
        config.embedding.cache_dir = args.cache_dir.clone();
    }
    if config.embedding.backend == EmbeddingBackend::FastEmbed && config.embedding.cache_dir.is_none() {
        let default_cache = dirs::cache_dir()
            .map(|p| p.join("fastembed"))
            .unwrap_or_else(|| PathBuf::from(".cache/fastembed"));
        debug!("Using default cache directory: {:?}", default_cache);
        config.embedding.cache_dir = Some(default_cache);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Spinner shown while a long step runs
fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("[{elapsed_precise}] {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn summary_row(name: &str, summary: Option<DistributionSummary>) -> Vec<Cell> {
    match summary {
        Some(s) => vec![
            Cell::new(name),
            Cell::new(s.count),
            Cell::new(format!("{:.4}", s.mean)),
            Cell::new(format!("{:.4}", s.std_dev)),
            Cell::new(format!("{:.4}", s.min)),
            Cell::new(format!("{:.4}", s.max)),
        ],
        None => vec![
            Cell::new(name),
            Cell::new(0),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
        ],
    }
}

/// Print per-distribution statistics and realised pair counts
fn print_summary(distributions: &SimilarityDistributions) {
    let report = &distributions.report;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Distribution").add_attribute(Attribute::Bold),
        Cell::new("Scores").add_attribute(Attribute::Bold),
        Cell::new("Mean").add_attribute(Attribute::Bold),
        Cell::new("Std").add_attribute(Attribute::Bold),
        Cell::new("Min").add_attribute(Attribute::Bold),
        Cell::new("Max").add_attribute(Attribute::Bold),
    ]);
    table.add_row(summary_row("enriched", distributions.enriched_summary()));
    table.add_row(summary_row("null", distributions.null_summary()));

    println!("{table}");
    println!(
        "Pairs: {}/{} cognate, {}/{} non-cognate ({} skipped) | {} on '{}' ({} units) | {}",
        report.cognate_pairs,
        report.requested,
        report.non_cognate_pairs,
        report.requested,
        report.skipped.len(),
        report.mode,
        report.sections,
        report.granularity,
        report.left_embedding.model_name
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("Starting null-distribution sampling");
    debug!("CLI arguments: {:?}", args);
    let start_time = Instant::now();

    let config = resolve_config(&args)?;
    debug!("Resolved config: {:?}", config);

    if !args.corpus.is_dir() {
        anyhow::bail!("Corpus directory not found: {:?}", args.corpus);
    }
    let corpus = Corpus::load(&args.corpus)
        .await
        .with_context(|| format!("Failed to load corpus from {:?}", args.corpus))?;
    info!("Loaded {} corpus entries from {:?}", corpus.len(), args.corpus);

    let provider = build_provider(&config.embedding, std::env::var("OPENAI_API_KEY").ok())
        .context("Failed to create embedding provider")?;

    let mut sampler = Sampler::new(
        &corpus,
        Comparator::symmetric(provider),
        config.segmenter(),
        config.sample_size,
        config.seed,
    )
    .context("Cannot sample from this corpus")?
    .with_sections(config.sections.clone())
    .with_mode(config.similarity);

    let spinner = create_spinner(&format!("Comparing {} pairs per distribution", config.sample_size));
    let result = sampler.sample().await;
    spinner.finish_and_clear();
    let distributions = result.context("Sampling failed")?;

    if !distributions.report.is_complete() {
        warn!(
            "{} pairs were skipped for missing preprints or reviews",
            distributions.report.skipped.len()
        );
    }

    let json = serde_json::to_string_pretty(&distributions).context("Failed to serialize distributions")?;
    std::fs::write(&args.output, json)
        .with_context(|| format!("Failed to write {:?}", args.output))?;
    info!("Wrote distributions to {:?}", args.output);

    print_summary(&distributions);
    info!("Completed in {:.2?}", start_time.elapsed());

    Ok(())
}
