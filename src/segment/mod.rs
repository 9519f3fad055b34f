//! Text segmentation into comparable units.
//!
//! A [`Segmenter`] turns raw section or review text into an ordered list of
//! text units (paragraphs or sentences) and drops the ones that are too short
//! to carry meaning or that contain platform boilerplate. Unit order always
//! follows the input, since it becomes the row/column order of similarity
//! matrices downstream.

mod sentences;

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use sentences::split_sentences;

/// Default minimum unit length, in characters.
pub const DEFAULT_MIN_LENGTH: usize = 70;

/// Phrases injected by Review Commons into every review it posts.
pub const REVIEW_COMMONS_BOILERPLATE: [&str; 2] = [
    "This preprint has been reviewed by subject experts for *Review Commons*",
    "Learn more at [Review Commons]",
];

/// Unit size produced by a [`Segmenter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// One unit per paragraph
    #[default]
    Paragraph,
    /// One unit per sentence
    Sentence,
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Paragraph => write!(f, "paragraph"),
            Granularity::Sentence => write!(f, "sentence"),
        }
    }
}

/// Splits text into filtered units of a fixed granularity.
///
/// # Example
/// ```ignore
/// let segmenter = Segmenter::new(Granularity::Paragraph).with_min_length(70);
/// let units = segmenter.segment(&review.text);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Segmenter {
    granularity: Granularity,
    min_length: usize,
    boilerplate: Vec<String>,
}

impl Segmenter {
    /// Create a segmenter with the default length floor and the Review Commons boilerplate list.
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            min_length: DEFAULT_MIN_LENGTH,
            boilerplate: REVIEW_COMMONS_BOILERPLATE
                .iter()
                .map(|phrase| phrase.to_string())
                .collect(),
        }
    }

    /// Units with fewer characters than `min_length` are dropped.
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// Replace the boilerplate phrase list.
    pub fn with_boilerplate<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.boilerplate = phrases.into_iter().map(Into::into).collect();
        self
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn boilerplate(&self) -> &[String] {
        &self.boilerplate
    }

    /// Split `text` into units and filter them.
    ///
    /// Empty input, or input where every unit is filtered out, yields an
    /// empty list.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let units = match self.granularity {
            Granularity::Paragraph => split_paragraphs(text),
            Granularity::Sentence => split_sentences(text),
        };
        units.into_iter().filter(|unit| self.keep(unit)).collect()
    }

    /// Whether a single unit passes the length and boilerplate filters.
    ///
    /// Length is counted in characters, not bytes. Boilerplate matching is a
    /// case-sensitive substring test.
    pub fn keep(&self, unit: &str) -> bool {
        if unit.is_empty() || unit.chars().count() < self.min_length {
            return false;
        }
        !self
            .boilerplate
            .iter()
            .any(|phrase| !phrase.is_empty() && unit.contains(phrase.as_str()))
    }
}

fn line_breaks() -> &'static Regex {
    static LINE_BREAKS: OnceLock<Regex> = OnceLock::new();
    // Any run of line endings, including whitespace-only lines between them
    LINE_BREAKS.get_or_init(|| {
        Regex::new(r"(?:\r\n|\r|\n)(?:[ \t\x0B\x0C]*(?:\r\n|\r|\n))*")
            .expect("line break pattern is valid")
    })
}

/// Normalize line endings and collapse blank-line runs into a single `\n`.
pub fn clean_text(text: &str) -> String {
    line_breaks().replace_all(text, "\n").into_owned()
}

/// Split text into paragraphs.
///
/// Every line break is a paragraph boundary: reviews are written with one
/// paragraph per line and preprint sections join paragraphs with blank
/// lines, so both collapse to the same separator. Each paragraph is trimmed
/// and empty ones are dropped. No length or boilerplate filtering happens here.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    clean_text(text)
        .split('\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
