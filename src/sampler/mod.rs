//! Null-distribution sampling.
//!
//! The sampler estimates how similar preprint text is to its *own* reviews
//! (the enriched, or cognate, distribution) compared with reviews of
//! *unrelated* preprints (the null, or non-cognate, distribution).
//!
//! For a corpus of `N` entries and a sample size `n` (with `N >= 2n`):
//!
//! 1. `n` cognate indices are drawn without replacement from `0..N`.
//! 2. The remaining `N - n` indices form a pool, from which `n` non-cognate
//!    indices are drawn without replacement, so the two sets are disjoint.
//! 3. Each cognate preprint is compared with one random review of itself,
//!    and with one random review of the non-cognate entry at the same position.
//! 4. Every similarity matrix is flattened row-major into its distribution,
//!    so a distribution holds one score per chunk pair, not per document pair.
//!
//! Entries missing a preprint or reviews are skipped and recorded in the
//! [`SampleReport`]; `n` is a target, not a guarantee.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compare::{CompareError, Comparator, SimilarityMode};
use crate::corpus::Corpus;
use crate::models::{CorpusEntry, EmbeddingConfig, ModelError, Review};
use crate::segment::{Granularity, Segmenter};

/// Section spec used when none is configured.
pub const DEFAULT_SECTIONS: &str = "introduction+results";

/// Sample size used when none is configured.
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;

/// Errors that can occur while sampling.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// The corpus cannot supply two disjoint samples of the requested size
    #[error(
        "Corpus too small: {corpus_size} entries cannot supply two disjoint samples of {sample_size} \
         (need at least {required})"
    )]
    InsufficientCorpus {
        corpus_size: usize,
        sample_size: usize,
        required: usize,
    },

    /// The section spec names a section preprints do not have
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Embedding or comparing a pair failed
    #[error(transparent)]
    Compare(#[from] CompareError),
}

/// Result type for sampling operations.
pub type SamplerResult<T> = Result<T, SamplerError>;

/// Cognate and non-cognate corpus indices of one sampling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDraw {
    /// Entries whose preprints are compared, in draw order
    pub cognate: Vec<usize>,
    /// Entries supplying unrelated reviews, paired by position with `cognate`
    pub non_cognate: Vec<usize>,
}

impl SampleDraw {
    /// Draw two disjoint index sets of size `sample_size` from `0..corpus_size`.
    ///
    /// # Errors
    /// Returns `SamplerError::InsufficientCorpus` if `corpus_size < 2 * sample_size`
    pub fn draw<R: Rng + ?Sized>(corpus_size: usize, sample_size: usize, rng: &mut R) -> SamplerResult<Self> {
        let required = sample_size.saturating_mul(2);
        if corpus_size < required {
            return Err(SamplerError::InsufficientCorpus {
                corpus_size,
                sample_size,
                required,
            });
        }

        let cognate = rand::seq::index::sample(rng, corpus_size, sample_size).into_vec();
        let mut taken = vec![false; corpus_size];
        for &i in &cognate {
            taken[i] = true;
        }
        let pool: Vec<usize> = (0..corpus_size).filter(|&i| !taken[i]).collect();
        let non_cognate = pool.choose_multiple(rng, sample_size).copied().collect();

        Ok(Self { cognate, non_cognate })
    }
}

/// Which distribution a pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairKind {
    Cognate,
    NonCognate,
}

/// A pair left out of its distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub kind: PairKind,
    /// Corpus index of the entry whose data was missing
    pub corpus_index: usize,
    pub doi: String,
    pub reason: String,
}

/// What a sampling run actually did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleReport {
    /// Requested number of pairs per distribution
    pub requested: usize,
    /// Cognate pairs that contributed to the enriched distribution
    pub cognate_pairs: usize,
    /// Non-cognate pairs that contributed to the null distribution
    pub non_cognate_pairs: usize,
    pub skipped: Vec<SkippedPair>,
    pub draw: SampleDraw,
    pub sections: String,
    pub granularity: Granularity,
    pub mode: SimilarityMode,
    pub left_embedding: EmbeddingConfig,
    pub right_embedding: EmbeddingConfig,
}

impl SampleReport {
    /// True if every requested pair made it into its distribution.
    pub fn is_complete(&self) -> bool {
        self.cognate_pairs == self.requested && self.non_cognate_pairs == self.requested
    }
}

/// Output of a sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityDistributions {
    /// Scores of preprints against reviews of other preprints
    pub null: Vec<f32>,
    /// Scores of preprints against their own reviews
    pub enriched: Vec<f32>,
    pub report: SampleReport,
}

impl SimilarityDistributions {
    pub fn null_summary(&self) -> Option<DistributionSummary> {
        DistributionSummary::from_scores(&self.null)
    }

    pub fn enriched_summary(&self) -> Option<DistributionSummary> {
        DistributionSummary::from_scores(&self.enriched)
    }
}

/// Descriptive statistics of one distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl DistributionSummary {
    /// Summarise `scores`, or `None` if there are none.
    pub fn from_scores(scores: &[f32]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let count = scores.len();
        let mean = scores.iter().map(|&s| s as f64).sum::<f64>() / count as f64;
        let variance = scores
            .iter()
            .map(|&s| (s as f64 - mean).powi(2))
            .sum::<f64>()
            / count as f64;
        let (min, max) = scores.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s as f64), hi.max(s as f64))
        });
        Some(Self {
            count,
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        })
    }
}

/// Draws cognate and non-cognate pairs from a corpus and scores them.
///
/// Indices are drawn once, at construction; [`Sampler::sample`] only picks
/// reviews and runs the comparisons.
///
/// # Example
/// ```ignore
/// let mut sampler = Sampler::new(&corpus, comparator, segmenter, 1000, Some(42))?
///     .with_sections("introduction+results");
/// let distributions = sampler.sample().await?;
/// ```
pub struct Sampler<'a> {
    corpus: &'a Corpus,
    comparator: Comparator,
    segmenter: Segmenter,
    sections: String,
    mode: SimilarityMode,
    sample_size: usize,
    draw: SampleDraw,
    rng: StdRng,
}

impl<'a> Sampler<'a> {
    /// Check the corpus size and draw the index sets.
    ///
    /// # Arguments
    /// * `corpus` - Population to sample from; read only
    /// * `comparator` - Embeds preprint chunks (left) and review chunks (right)
    /// * `segmenter` - Splits preprint sections and reviews into chunks
    /// * `sample_size` - Target number of pairs per distribution
    /// * `seed` - Fixes every random choice of the run when set
    ///
    /// # Errors
    /// Returns `SamplerError::InsufficientCorpus` if the corpus has fewer than
    /// `2 * sample_size` entries. Nothing is embedded in that case.
    pub fn new(
        corpus: &'a Corpus,
        comparator: Comparator,
        segmenter: Segmenter,
        sample_size: usize,
        seed: Option<u64>,
    ) -> SamplerResult<Self> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let draw = SampleDraw::draw(corpus.len(), sample_size, &mut rng)?;
        Ok(Self {
            corpus,
            comparator,
            segmenter,
            sections: DEFAULT_SECTIONS.to_string(),
            mode: SimilarityMode::Dot,
            sample_size,
            draw,
            rng,
        })
    }

    /// Preprint sections to compare, joined by `+`.
    pub fn with_sections(mut self, sections: impl Into<String>) -> Self {
        self.sections = sections.into();
        self
    }

    pub fn with_mode(mut self, mode: SimilarityMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn draw(&self) -> &SampleDraw {
        &self.draw
    }

    /// Pick one review uniformly at random, or explain why there is none.
    fn pick_review(&mut self, entry: &'a CorpusEntry) -> Result<&'a Review, String> {
        let review_process = entry
            .review_process
            .as_ref()
            .ok_or_else(|| "review process missing".to_string())?;
        review_process
            .reviews
            .choose(&mut self.rng)
            .ok_or_else(|| "review process has no reviews".to_string())
    }

    fn skip(&self, skipped: &mut Vec<SkippedPair>, kind: PairKind, corpus_index: usize, reason: String) {
        let doi = self.corpus[corpus_index].doi.clone();
        warn!("Skipping {:?} pair for {} (index {}): {}", kind, doi, corpus_index, reason);
        skipped.push(SkippedPair {
            kind,
            corpus_index,
            doi,
            reason,
        });
    }

    /// Run the comparisons and collect both distributions.
    ///
    /// # Errors
    /// Returns `SamplerError::Model` if the section spec is invalid and
    /// `SamplerError::Compare` if embedding fails. Missing data is not an
    /// error; it is recorded in the report.
    pub async fn sample(&mut self) -> SamplerResult<SimilarityDistributions> {
        let corpus = self.corpus;
        let draw = self.draw.clone();
        info!(
            "Sampling {} cognate and {} non-cognate pairs from {} entries ({} on '{}')",
            draw.cognate.len(),
            draw.non_cognate.len(),
            corpus.len(),
            self.mode,
            self.sections
        );

        let mut skipped = Vec::new();

        // Preprint chunks of every cognate entry, by draw position
        let mut preprint_chunks: Vec<Option<Vec<String>>> = Vec::with_capacity(draw.cognate.len());
        for &index in &draw.cognate {
            match &corpus[index].preprint {
                Some(preprint) => {
                    preprint_chunks.push(Some(preprint.get_chunks(&self.segmenter, &self.sections)?));
                }
                None => {
                    self.skip(&mut skipped, PairKind::Cognate, index, "preprint missing".to_string());
                    preprint_chunks.push(None);
                }
            }
        }

        let mut enriched = Vec::new();
        let mut cognate_pairs = 0;
        for (position, &index) in draw.cognate.iter().enumerate() {
            let Some(left) = &preprint_chunks[position] else { continue };
            let review = match self.pick_review(&corpus[index]) {
                Ok(review) => review,
                Err(reason) => {
                    self.skip(&mut skipped, PairKind::Cognate, index, reason);
                    continue;
                }
            };
            let right = review.get_chunks(&self.segmenter);
            let similarity = self.comparator.compare(left, &right, self.mode).await?;
            debug!(
                "Cognate pair {}: {}x{}",
                corpus[index].doi,
                similarity.rows(),
                similarity.cols()
            );
            enriched.extend(similarity.into_flat());
            cognate_pairs += 1;
        }

        let mut null = Vec::new();
        let mut non_cognate_pairs = 0;
        for (position, &index) in draw.non_cognate.iter().enumerate() {
            let Some(left) = &preprint_chunks[position] else {
                let reason = format!("preprint of cognate entry {} missing", corpus[draw.cognate[position]].doi);
                self.skip(&mut skipped, PairKind::NonCognate, index, reason);
                continue;
            };
            let review = match self.pick_review(&corpus[index]) {
                Ok(review) => review,
                Err(reason) => {
                    self.skip(&mut skipped, PairKind::NonCognate, index, reason);
                    continue;
                }
            };
            let right = review.get_chunks(&self.segmenter);
            let similarity = self.comparator.compare(left, &right, self.mode).await?;
            debug!(
                "Non-cognate pair {} / {}: {}x{}",
                corpus[draw.cognate[position]].doi,
                corpus[index].doi,
                similarity.rows(),
                similarity.cols()
            );
            null.extend(similarity.into_flat());
            non_cognate_pairs += 1;
        }

        let (left_embedding, right_embedding) = self.comparator.embedding_configs();
        let report = SampleReport {
            requested: self.sample_size,
            cognate_pairs,
            non_cognate_pairs,
            skipped,
            draw,
            sections: self.sections.clone(),
            granularity: self.segmenter.granularity(),
            mode: self.mode,
            left_embedding,
            right_embedding,
        };
        info!(
            "Sampled {} enriched and {} null scores ({} of {} cognate, {} of {} non-cognate pairs)",
            enriched.len(),
            null.len(),
            report.cognate_pairs,
            report.requested,
            report.non_cognate_pairs,
            report.requested
        );
        Ok(SimilarityDistributions { null, enriched, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::fixtures;
    use crate::embedding::testing::StubEmbeddingProvider;
    use crate::models::{ReviewProcess, ReviewedPreprint};
    use std::collections::HashSet;
    use std::sync::Arc;

    async fn corpus(n: usize) -> Corpus {
        Corpus::build(&fixtures::identifiers(n), &fixtures::source(n)).await.unwrap()
    }

    fn comparator(provider: &Arc<StubEmbeddingProvider>) -> Comparator {
        Comparator::symmetric(provider.clone())
    }

    fn segmenter() -> Segmenter {
        Segmenter::new(Granularity::Paragraph)
    }

    #[test]
    fn test_draw_disjoint_and_sized() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..200 {
            let draw = SampleDraw::draw(10, 4, &mut rng).unwrap();
            assert_eq!(draw.cognate.len(), 4);
            assert_eq!(draw.non_cognate.len(), 4);
            let cognate: HashSet<_> = draw.cognate.iter().collect();
            let non_cognate: HashSet<_> = draw.non_cognate.iter().collect();
            assert_eq!(cognate.len(), 4, "no repeats within a set");
            assert_eq!(non_cognate.len(), 4, "no repeats within a set");
            assert!(cognate.is_disjoint(&non_cognate));
            assert!(draw.cognate.iter().chain(&draw.non_cognate).all(|&i| i < 10));
        }
    }

    #[test]
    fn test_draw_four_by_two_uses_every_entry() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let draw = SampleDraw::draw(4, 2, &mut rng).unwrap();
            let mut all: Vec<_> = draw.cognate.iter().chain(&draw.non_cognate).copied().collect();
            all.sort_unstable();
            assert_eq!(all, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_draw_rejects_small_corpus() {
        let mut rng = StdRng::seed_from_u64(2);
        let err = SampleDraw::draw(3, 2, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            SamplerError::InsufficientCorpus { corpus_size: 3, sample_size: 2, required: 4 }
        ));
        assert!(err.to_string().contains("need at least 4"));
    }

    #[tokio::test]
    async fn test_insufficient_corpus_fails_before_embedding() {
        let corpus = corpus(3).await;
        let provider = Arc::new(StubEmbeddingProvider::new(4));

        let result = Sampler::new(&corpus, comparator(&provider), segmenter(), 2, Some(0));
        assert!(matches!(result, Err(SamplerError::InsufficientCorpus { .. })));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sample_four_by_two() {
        let corpus = corpus(4).await;
        let provider = Arc::new(StubEmbeddingProvider::new(4));
        let mut sampler = Sampler::new(&corpus, comparator(&provider), segmenter(), 2, Some(7)).unwrap();

        let distributions = sampler.sample().await.unwrap();
        let report = &distributions.report;

        assert!(report.is_complete());
        assert!(report.skipped.is_empty());
        // Each preprint has 2 chunks (introduction, results), each review 1
        assert_eq!(distributions.enriched.len(), 2 * 2);
        assert_eq!(distributions.null.len(), 2 * 2);
        // Stub vectors are all ones
        assert!(distributions.enriched.iter().all(|&s| s == 4.0));
        // Two comparisons per pair kind, two embed calls per comparison
        assert_eq!(provider.call_count(), 8);
    }

    #[tokio::test]
    async fn test_reviews_come_from_the_drawn_entries() {
        let corpus = corpus(6).await;
        let provider = Arc::new(StubEmbeddingProvider::new(4));
        let mut sampler = Sampler::new(&corpus, comparator(&provider), segmenter(), 3, Some(11)).unwrap();
        let draw = sampler.draw().clone();

        sampler.sample().await.unwrap();

        // Units are embedded as: preprint chunks, then review chunks, per pair
        let embedded = provider.embedded_units();
        let review_units: Vec<_> = embedded.iter().filter(|u| u.starts_with("Referee")).collect();
        assert_eq!(review_units.len(), 6);
        for (unit, &index) in review_units.iter().zip(draw.cognate.iter().chain(&draw.non_cognate)) {
            assert!(unit.contains(&corpus[index].doi), "{} should review {}", unit, corpus[index].doi);
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_result() {
        let corpus = corpus(8).await;
        let provider = Arc::new(StubEmbeddingProvider::new(4));

        let mut first = Sampler::new(&corpus, comparator(&provider), segmenter(), 3, Some(5)).unwrap();
        let mut second = Sampler::new(&corpus, comparator(&provider), segmenter(), 3, Some(5)).unwrap();
        let a = first.sample().await.unwrap();
        let b = second.sample().await.unwrap();

        assert_eq!(a.report.draw, b.report.draw);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_missing_data_is_skipped_and_reported() {
        // Even indices have no reviews, odd indices no preprint
        let entries = fixtures::identifiers(6)
            .into_iter()
            .enumerate()
            .map(|(i, doi)| {
                if i % 2 == 0 {
                    ReviewedPreprint::new(doi.clone(), Some(fixtures::preprint(&doi)), None).unwrap()
                } else {
                    ReviewedPreprint::new(doi.clone(), None, Some(fixtures::review_process(&doi, 1))).unwrap()
                }
            })
            .collect();
        let corpus = Corpus::from_entries(entries).unwrap();
        let provider = Arc::new(StubEmbeddingProvider::new(4));
        let mut sampler = Sampler::new(&corpus, comparator(&provider), segmenter(), 3, Some(3)).unwrap();

        let distributions = sampler.sample().await.unwrap();
        let report = &distributions.report;

        // A cognate pair needs both halves of one entry, so none survive
        assert_eq!(report.cognate_pairs, 0);
        assert!(distributions.enriched.is_empty());
        assert!(!report.is_complete());

        let skipped_cognate = report.skipped.iter().filter(|s| s.kind == PairKind::Cognate).count();
        let skipped_null = report.skipped.iter().filter(|s| s.kind == PairKind::NonCognate).count();
        assert_eq!(report.cognate_pairs + skipped_cognate, 3);
        assert_eq!(report.non_cognate_pairs + skipped_null, 3);
        assert_eq!(distributions.null.len(), report.non_cognate_pairs * 2);
    }

    #[tokio::test]
    async fn test_empty_review_process_is_skipped() {
        let entries = fixtures::identifiers(2)
            .into_iter()
            .map(|doi| {
                ReviewedPreprint::from_parts(fixtures::preprint(&doi), ReviewProcess::new(doi, vec![])).unwrap()
            })
            .collect();
        let corpus = Corpus::from_entries(entries).unwrap();
        let provider = Arc::new(StubEmbeddingProvider::new(4));
        let mut sampler = Sampler::new(&corpus, comparator(&provider), segmenter(), 1, Some(0)).unwrap();

        let distributions = sampler.sample().await.unwrap();
        assert_eq!(distributions.report.skipped.len(), 2);
        assert!(distributions.report.skipped[0].reason.contains("no reviews"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_section_is_fatal() {
        let corpus = corpus(2).await;
        let provider = Arc::new(StubEmbeddingProvider::new(4));
        let mut sampler = Sampler::new(&corpus, comparator(&provider), segmenter(), 1, Some(0))
            .unwrap()
            .with_sections("introduction+conclusion");

        let err = sampler.sample().await.unwrap_err();
        assert!(matches!(err, SamplerError::Model(ModelError::UnknownSection { .. })));
    }

    #[tokio::test]
    async fn test_report_serialises_with_distribution_keys() {
        let corpus = corpus(2).await;
        let provider = Arc::new(StubEmbeddingProvider::new(2));
        let mut sampler = Sampler::new(&corpus, comparator(&provider), segmenter(), 1, Some(0))
            .unwrap()
            .with_mode(SimilarityMode::Cosine);

        let distributions = sampler.sample().await.unwrap();
        let json = serde_json::to_value(&distributions).unwrap();
        assert!(json["null"].is_array());
        assert!(json["enriched"].is_array());
        assert_eq!(json["report"]["mode"], "cosine");
        assert_eq!(json["report"]["left_embedding"]["dimension"], 2);
    }

    #[test]
    fn test_distribution_summary() {
        let summary = DistributionSummary::from_scores(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(summary.count, 4);
        assert!((summary.mean - 2.5).abs() < 1e-12);
        assert!((summary.std_dev - 1.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert!(DistributionSummary::from_scores(&[]).is_none());
    }
}
