//! Compare binary entry point.
//!
//! Segments two text files, embeds both sides with the same provider, and
//! prints the unit-by-unit similarity matrix.
//!
//! # Examples
//!
//! Preprint section against a review, paragraph units:
//! ```bash
//! compare introduction.txt review.txt --embedding-backend fast-embed
//! ```
//!
//! Sentence units, cosine scores, JSON output:
//! ```bash
//! compare introduction.txt review.txt --granularity sentence --mode cosine --format json
//! ```

mod cli;

use anyhow::{Context, Result};
use cli::{init_logging, BackendArg, GranularityArg, ModeArg};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use review_overlap::{
    compare::{Comparator, SimilarityMatrix, SimilarityMode},
    config::{EmbeddingBackend, EmbeddingSettings},
    embedding::build_provider,
    segment::{Segmenter, DEFAULT_MIN_LENGTH},
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Output format for the similarity matrix
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Matrix table with the strongest pair per row highlighted
    Table,
    /// Units and scores as JSON
    Json,
}

/// Compare two texts unit by unit
#[derive(Parser, Debug)]
#[command(
    name = "compare",
    version,
    about = "Print the similarity matrix between the units of two text files"
)]
struct Args {
    /// Left text (rows), typically preprint sections
    #[arg(value_name = "LEFT")]
    left: PathBuf,

    /// Right text (columns), typically a review
    #[arg(value_name = "RIGHT")]
    right: PathBuf,

    /// Unit size
    #[arg(long, value_enum, default_value = "paragraph")]
    granularity: GranularityArg,

    /// Drop units shorter than this many characters
    #[arg(long, value_name = "CHARS", default_value_t = DEFAULT_MIN_LENGTH)]
    min_chunk_length: usize,

    /// Similarity score
    #[arg(long, value_enum, default_value = "dot")]
    mode: ModeArg,

    /// Embedding provider to use
    #[arg(long, value_enum, default_value = "fast-embed")]
    embedding_backend: BackendArg,

    /// Specific embedding model name (provider-dependent)
    #[arg(long, value_name = "MODEL")]
    embedding_model: Option<String>,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    left_units: &'a [String],
    right_units: &'a [String],
    mode: SimilarityMode,
    similarity: &'a SimilarityMatrix,
}

fn embedding_settings(args: &Args) -> EmbeddingSettings {
    let mut settings = EmbeddingSettings {
        backend: args.embedding_backend.into(),
        model: args.embedding_model.clone(),
        cache_dir: args.cache_dir.clone(),
        ..Default::default()
    };
    if settings.backend == EmbeddingBackend::FastEmbed && settings.cache_dir.is_none() {
        settings.cache_dir = dirs::cache_dir().map(|p| p.join("fastembed"));
    }
    settings
}

fn read_units(path: &Path, segmenter: &Segmenter) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let units = segmenter.segment(&text);
    debug!("{:?}: {} units", path, units.len());
    Ok(units)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Print the matrix with one row per left unit and one column per right unit
fn print_table(left: &[String], right: &[String], similarity: &SimilarityMatrix) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![Cell::new("Left unit").add_attribute(Attribute::Bold)];
    header.extend((1..=right.len()).map(|j| Cell::new(format!("R{}", j)).add_attribute(Attribute::Bold)));
    table.set_header(header);

    for (i, unit) in left.iter().enumerate() {
        let Some(row) = similarity.row(i) else { continue };
        let best = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(j, _)| j);

        let mut cells = vec![Cell::new(format!("L{}: {}", i + 1, truncate(unit, 50)))];
        cells.extend(row.iter().enumerate().map(|(j, score)| {
            let cell = Cell::new(format!("{:.4}", score));
            if Some(j) == best {
                cell.fg(Color::Green)
            } else {
                cell
            }
        }));
        table.add_row(cells);
    }

    println!("{table}");
    for (j, unit) in right.iter().enumerate() {
        println!("R{}: {}", j + 1, truncate(unit, 100));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);
    debug!("CLI arguments: {:?}", args);

    let segmenter = Segmenter::new(args.granularity.into()).with_min_length(args.min_chunk_length);
    let left = read_units(&args.left, &segmenter)?;
    let right = read_units(&args.right, &segmenter)?;
    info!("Comparing {} left units with {} right units", left.len(), right.len());

    let provider = build_provider(&embedding_settings(&args), std::env::var("OPENAI_API_KEY").ok())
        .context("Failed to create embedding provider")?;
    let comparator = Comparator::symmetric(provider);

    let mode: SimilarityMode = args.mode.into();
    let similarity = comparator
        .compare(&left, &right, mode)
        .await
        .context("Comparison failed")?;

    match args.format {
        OutputFormat::Table => {
            if similarity.is_empty() {
                println!(
                    "Nothing to compare: {} left and {} right units after filtering",
                    left.len(),
                    right.len()
                );
            } else {
                print_table(&left, &right, &similarity);
            }
        }
        OutputFormat::Json => {
            let output = JsonOutput {
                left_units: &left,
                right_units: &right,
                mode,
                similarity: &similarity,
            };
            println!("{}", serde_json::to_string_pretty(&output).context("Failed to serialize output")?);
        }
    }

    Ok(())
}
