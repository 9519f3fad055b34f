//! Core data models for preprints, their peer reviews, and embedding provenance.
//!
//! These types mirror the records returned by the external retrieval services
//! (bioRxiv details records and Early Evidence Base review processes). Raw API
//! values are parsed once, in the `from_api_*` constructors; a record that lacks
//! a required field is rejected there instead of failing on first use.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::segment::Segmenter;

/// Canonical preprint section names, in document order.
pub const SECTION_NAMES: [&str; 7] = [
    "introduction",
    "results",
    "result_headings",
    "figures",
    "fig_titles",
    "methods",
    "discussion",
];

/// Delimiter used to combine several sections in one section spec
/// (e.g. `"introduction+results"`).
pub const SECTION_DELIMITER: char = '+';

/// Errors raised while building or querying model objects.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A required field is absent from a raw API record
    #[error("Missing required field '{field}' in {record}")]
    MissingField { record: &'static str, field: String },

    /// A field is present but has the wrong shape
    #[error("Malformed {record}: {message}")]
    Malformed { record: &'static str, message: String },

    /// A section spec names a section the preprint does not have
    #[error("Unknown section '{section}' (available: {available})")]
    UnknownSection { section: String, available: String },

    /// Preprint and review process belong to different documents
    #[error("Identifier mismatch: preprint is '{preprint}' but review process is '{review_process}'")]
    IdentifierMismatch {
        preprint: String,
        review_process: String,
    },
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Make a document identifier safe to use as a directory name.
///
/// Dots become underscores and slashes become dashes, so
/// `10.1101/2021.05.12.443743` maps to `10_1101-2021_05_12_443743`.
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier.replace('.', "_").replace('/', "-")
}

fn as_object<'a>(value: &'a Value, record: &'static str) -> ModelResult<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| ModelError::Malformed {
        record,
        message: "expected a JSON object".to_string(),
    })
}

fn required_str(obj: &Map<String, Value>, record: &'static str, field: &str) -> ModelResult<String> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ModelError::MissingField {
            record,
            field: field.to_string(),
        }),
        Some(Value::String(s)) => Ok(s.clone()),
        // Some API records carry numbers where strings are documented (e.g. version).
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ModelError::Malformed {
            record,
            message: format!("field '{}' should be a string, got {}", field, other),
        }),
    }
}

fn optional_str(obj: &Map<String, Value>, record: &'static str, field: &str) -> ModelResult<Option<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_str(obj, record, field).map(Some),
    }
}

fn required_str_list(obj: &Map<String, Value>, record: &'static str, field: &str) -> ModelResult<Vec<String>> {
    let items = obj
        .get(field)
        .ok_or_else(|| ModelError::MissingField {
            record,
            field: field.to_string(),
        })?
        .as_array()
        .ok_or_else(|| ModelError::Malformed {
            record,
            message: format!("field '{}' should be a list", field),
        })?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| ModelError::Malformed {
                record,
                message: format!("field '{}' should only contain strings", field),
            })
        })
        .collect()
}

/// Metadata of a bioRxiv preprint, as returned by the bioRxiv details API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprintMetadata {
    pub doi: String,
    pub title: String,
    /// Semicolon-separated author list, exactly as the API returns it
    pub authors: String,
    pub author_corresponding: String,
    pub author_corresponding_institution: String,
    pub date: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub license: String,
    pub category: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub published: String,
    pub server: String,
}

impl PreprintMetadata {
    const RECORD: &'static str = "preprint metadata";

    /// Parse a bioRxiv details record.
    ///
    /// # Errors
    /// Returns `ModelError::MissingField` if any documented field is absent.
    pub fn from_api_value(value: &Value) -> ModelResult<Self> {
        let obj = as_object(value, Self::RECORD)?;
        let field = |name: &str| required_str(obj, Self::RECORD, name);
        Ok(Self {
            doi: field("doi")?,
            title: field("title")?,
            authors: field("authors")?,
            author_corresponding: field("author_corresponding")?,
            author_corresponding_institution: field("author_corresponding_institution")?,
            date: field("date")?,
            version: field("version")?,
            kind: field("type")?,
            license: field("license")?,
            category: field("category")?,
            abstract_text: field("abstract")?,
            published: field("published")?,
            server: field("server")?,
        })
    }
}

/// A preprint broken down into named text sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprint {
    /// Document identifier (DOI)
    pub doi: String,

    /// bioRxiv metadata, when it was retrieved
    pub metadata: Option<PreprintMetadata>,

    /// Section name to plain text. Paragraphs inside a section are separated by blank lines.
    pub sections: BTreeMap<String, String>,
}

impl Preprint {
    /// Create a preprint with every canonical section present but empty.
    pub fn new(doi: impl Into<String>) -> Self {
        let sections = SECTION_NAMES
            .iter()
            .map(|name| (name.to_string(), String::new()))
            .collect();
        Self {
            doi: doi.into(),
            metadata: None,
            sections,
        }
    }

    /// Set (or add) a section's text.
    pub fn with_section(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.sections.insert(name.into(), text.into());
        self
    }

    pub fn with_metadata(mut self, metadata: PreprintMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }

    pub fn introduction(&self) -> Option<&str> {
        self.section("introduction")
    }

    pub fn results(&self) -> Option<&str> {
        self.section("results")
    }

    pub fn methods(&self) -> Option<&str> {
        self.section("methods")
    }

    pub fn discussion(&self) -> Option<&str> {
        self.section("discussion")
    }

    /// True if at least one section has non-blank text.
    pub fn has_content(&self) -> bool {
        self.sections.values().any(|text| !text.trim().is_empty())
    }

    /// Segment one or more sections into text units.
    ///
    /// # Arguments
    /// * `segmenter` - The segmenter applied to each section's text
    /// * `section_spec` - Section names joined by `+`, e.g. `"introduction+results"`
    ///
    /// # Returns
    /// The units of every listed section, concatenated in spec order
    ///
    /// # Errors
    /// Returns `ModelError::UnknownSection` if a listed section does not exist
    pub fn get_chunks(&self, segmenter: &Segmenter, section_spec: &str) -> ModelResult<Vec<String>> {
        let mut chunks = Vec::new();
        for name in section_spec.split(SECTION_DELIMITER).map(str::trim) {
            let text = self.section(name).ok_or_else(|| ModelError::UnknownSection {
                section: name.to_string(),
                available: self.sections.keys().cloned().collect::<Vec<_>>().join(", "),
            })?;
            chunks.extend(segmenter.segment(text));
        }
        Ok(chunks)
    }
}

/// One referee report, as returned by the Early Evidence Base API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub posting_date: String,
    pub hypothesis_id: String,
    pub review_idx: String,
    pub tags: Vec<String>,
    pub related_article_uri: String,
    pub highlight: String,
    pub related_article_doi: String,
    /// Full review text (markdown)
    pub text: String,
    pub reviewed_by: String,
    pub link_html: String,
    pub link_json: String,
    /// Review DOI; not every review has one
    pub doi: Option<String>,
    pub link_incontext: String,
}

impl Review {
    const RECORD: &'static str = "review";

    /// Parse one review record from an EEB review process response.
    ///
    /// # Errors
    /// Returns `ModelError::MissingField` for any absent field other than `doi`.
    pub fn from_api_value(value: &Value) -> ModelResult<Self> {
        let obj = as_object(value, Self::RECORD)?;
        let field = |name: &str| required_str(obj, Self::RECORD, name);
        Ok(Self {
            posting_date: field("posting_date")?,
            hypothesis_id: field("hypothesis_id")?,
            review_idx: field("review_idx")?,
            tags: required_str_list(obj, Self::RECORD, "tags")?,
            related_article_uri: field("related_article_uri")?,
            highlight: field("highlight")?,
            related_article_doi: field("related_article_doi")?,
            text: field("text")?,
            reviewed_by: field("reviewed_by")?,
            link_html: field("link_html")?,
            link_json: field("link_json")?,
            doi: optional_str(obj, Self::RECORD, "doi")?,
            link_incontext: field("link_incontext")?,
        })
    }

    /// Build a review that carries only its index and text.
    pub fn from_text(review_idx: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            posting_date: String::new(),
            hypothesis_id: String::new(),
            review_idx: review_idx.into(),
            tags: Vec::new(),
            related_article_uri: String::new(),
            highlight: String::new(),
            related_article_doi: String::new(),
            text: text.into(),
            reviewed_by: String::new(),
            link_html: String::new(),
            link_json: String::new(),
            doi: None,
            link_incontext: String::new(),
        }
    }

    /// Segment the review text into text units.
    pub fn get_chunks(&self, segmenter: &Segmenter) -> Vec<String> {
        segmenter.segment(&self.text)
    }
}

/// The ordered set of referee reports written about one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewProcess {
    pub doi: String,
    pub reviews: Vec<Review>,
}

impl ReviewProcess {
    pub fn new(doi: impl Into<String>, reviews: Vec<Review>) -> Self {
        Self {
            doi: doi.into(),
            reviews,
        }
    }

    /// Parse an EEB referee-report response (`{"review_process": {"reviews": [...]}}`).
    pub fn from_api_response(doi: impl Into<String>, response: &Value) -> ModelResult<Self> {
        let reviews = response
            .get("review_process")
            .ok_or_else(|| ModelError::MissingField {
                record: "review process response",
                field: "review_process".to_string(),
            })?
            .get("reviews")
            .ok_or_else(|| ModelError::MissingField {
                record: "review process response",
                field: "review_process.reviews".to_string(),
            })?
            .as_array()
            .ok_or_else(|| ModelError::Malformed {
                record: "review process response",
                message: "'review_process.reviews' should be a list".to_string(),
            })?
            .iter()
            .map(Review::from_api_value)
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(Self::new(doi, reviews))
    }

    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }
}

/// A preprint together with its review process: one corpus entry.
///
/// Either side may be absent when retrieval failed or the persisted copy is
/// incomplete. Consumers decide how to treat a partial entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewedPreprint {
    pub doi: String,
    pub preprint: Option<Preprint>,
    pub review_process: Option<ReviewProcess>,
}

/// Alias used by the corpus and sampler.
pub type CorpusEntry = ReviewedPreprint;

impl ReviewedPreprint {
    /// Create an entry, checking that every present part belongs to `doi`.
    ///
    /// # Errors
    /// Returns `ModelError::IdentifierMismatch` if a part carries another identifier
    pub fn new(
        doi: impl Into<String>,
        preprint: Option<Preprint>,
        review_process: Option<ReviewProcess>,
    ) -> ModelResult<Self> {
        let doi = doi.into();
        if let Some(p) = &preprint {
            if p.doi != doi {
                return Err(ModelError::IdentifierMismatch {
                    preprint: p.doi.clone(),
                    review_process: doi,
                });
            }
        }
        if let Some(rp) = &review_process {
            if rp.doi != doi {
                return Err(ModelError::IdentifierMismatch {
                    preprint: doi,
                    review_process: rp.doi.clone(),
                });
            }
        }
        Ok(Self {
            doi,
            preprint,
            review_process,
        })
    }

    /// Pair a fully retrieved preprint with its review process.
    pub fn from_parts(preprint: Preprint, review_process: ReviewProcess) -> ModelResult<Self> {
        let doi = preprint.doi.clone();
        Self::new(doi, Some(preprint), Some(review_process))
    }

    /// True when both the preprint and at least one review are available.
    pub fn is_complete(&self) -> bool {
        self.preprint.is_some()
            && self
                .review_process
                .as_ref()
                .map(|rp| !rp.is_empty())
                .unwrap_or(false)
    }
}

/// Provenance of an embedding provider.
///
/// Recorded next to every similarity distribution so that results produced
/// with different models are never mixed up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Name/identifier of the embedding model (e.g., "text-embedding-3-small")
    pub model_name: String,

    /// Dimension of the embedding vectors
    pub dimension: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{Granularity, Segmenter};
    use serde_json::json;

    fn biorxiv_record() -> Value {
        json!({
            "doi": "10.1101/339747",
            "title": "Oxygen restriction induces a viable but non-culturable population in bacteria",
            "authors": "Kvich, L. A.; Fritz, B. G.",
            "author_corresponding": "Thomas  Bjarnsholt",
            "author_corresponding_institution": "University of Copenhagen",
            "date": "2018-06-05",
            "version": "1",
            "type": "new results",
            "license": "cc_no",
            "category": "microbiology",
            "jatsxml": "https://www.biorxiv.org/content/early/2018/06/05/339747.source.xml",
            "abstract": "Induction of...",
            "published": "NA",
            "server": "biorxiv"
        })
    }

    fn eeb_review(idx: &str, text: &str) -> Value {
        json!({
            "posting_date": "2020-09-09T12:18:53.424343+00:00",
            "hypothesis_id": "oDimTPKWEeqldYv8lyZT3A",
            "review_idx": idx,
            "tags": ["PeerReviewed"],
            "related_article_uri": "https://www.biorxiv.org/content/10.1101/2020.05.14.095968v1",
            "highlight": "...",
            "related_article_doi": "10.1101/2020.05.14.095968",
            "text": text,
            "reviewed_by": "review commons",
            "link_html": "https://hypothes.is/a/oDimTPKWEeqldYv8lyZT3A",
            "link_json": "https://hypothes.is/api/annotations/oDimTPKWEeqldYv8lyZT3A",
            "link_incontext": "https://hyp.is/oDimTPKWEeqldYv8lyZT3A/www.biorxiv.org/content/10.1101/2020.05.14.095968v1"
        })
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("10.12345/abs.0132913"), "10_12345-abs_0132913");
    }

    #[test]
    fn test_parse_preprint_metadata() {
        let meta = PreprintMetadata::from_api_value(&biorxiv_record()).unwrap();
        assert_eq!(meta.doi, "10.1101/339747");
        assert_eq!(meta.kind, "new results");
        assert_eq!(meta.abstract_text, "Induction of...");
    }

    #[test]
    fn test_parse_preprint_metadata_missing_field() {
        let mut record = biorxiv_record();
        record.as_object_mut().unwrap().remove("category");

        match PreprintMetadata::from_api_value(&record) {
            Err(ModelError::MissingField { field, .. }) => assert_eq!(field, "category"),
            other => panic!("Expected MissingField error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_metadata_rejects_non_object() {
        let result = PreprintMetadata::from_api_value(&json!(["not", "an", "object"]));
        assert!(matches!(result, Err(ModelError::Malformed { .. })));
    }

    #[test]
    fn test_metadata_serializes_with_api_field_names() {
        let meta = PreprintMetadata::from_api_value(&biorxiv_record()).unwrap();
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["type"], "new results");
        assert_eq!(value["abstract"], "Induction of...");

        // Persisted metadata must parse back through the same validating path
        let reparsed = PreprintMetadata::from_api_value(&value).unwrap();
        assert_eq!(reparsed, meta);
    }

    #[test]
    fn test_parse_review_without_doi() {
        let review = Review::from_api_value(&eeb_review("1", "Some text")).unwrap();
        assert_eq!(review.review_idx, "1");
        assert_eq!(review.tags, vec!["PeerReviewed".to_string()]);
        assert!(review.doi.is_none());
    }

    #[test]
    fn test_parse_review_missing_text() {
        let mut record = eeb_review("1", "x");
        record.as_object_mut().unwrap().remove("text");
        assert!(matches!(
            Review::from_api_value(&record),
            Err(ModelError::MissingField { .. })
        ));
    }

    #[test]
    fn test_review_process_from_api_response() {
        let response = json!({
            "review_process": {
                "reviews": [eeb_review("1", "first"), eeb_review("2", "second")],
                "response": {},
                "annot": []
            }
        });
        let process = ReviewProcess::from_api_response("10.1101/2020.05.14.095968", &response).unwrap();
        assert_eq!(process.len(), 2);
        assert_eq!(process.reviews[1].text, "second");
    }

    #[test]
    fn test_review_process_missing_reviews() {
        let response = json!({ "review_process": {} });
        assert!(ReviewProcess::from_api_response("x", &response).is_err());
    }

    #[test]
    fn test_preprint_get_chunks_combines_sections_in_order() {
        let intro = "The introduction paragraph is long enough to survive the default length filter.";
        let results = "The results paragraph is also comfortably longer than the seventy character floor.";
        let preprint = Preprint::new("10.1/x")
            .with_section("introduction", intro)
            .with_section("results", results);
        let segmenter = Segmenter::new(Granularity::Paragraph);

        let chunks = preprint.get_chunks(&segmenter, "results+introduction").unwrap();
        assert_eq!(chunks, vec![results.to_string(), intro.to_string()]);
    }

    #[test]
    fn test_preprint_get_chunks_unknown_section() {
        let preprint = Preprint::new("10.1/x");
        let segmenter = Segmenter::new(Granularity::Paragraph);

        match preprint.get_chunks(&segmenter, "introduction+conclusion") {
            Err(ModelError::UnknownSection { section, .. }) => assert_eq!(section, "conclusion"),
            other => panic!("Expected UnknownSection error, got {:?}", other),
        }
    }

    #[test]
    fn test_new_preprint_has_canonical_empty_sections() {
        let preprint = Preprint::new("10.1/x");
        assert_eq!(preprint.sections.len(), SECTION_NAMES.len());
        assert_eq!(preprint.introduction(), Some(""));
        assert!(!preprint.has_content());
    }

    #[test]
    fn test_reviewed_preprint_identifier_mismatch() {
        let preprint = Preprint::new("10.1/a");
        let process = ReviewProcess::new("10.1/b", vec![]);
        assert!(matches!(
            ReviewedPreprint::from_parts(preprint, process),
            Err(ModelError::IdentifierMismatch { .. })
        ));
    }

    #[test]
    fn test_reviewed_preprint_completeness() {
        let complete = ReviewedPreprint::from_parts(
            Preprint::new("10.1/a"),
            ReviewProcess::new("10.1/a", vec![Review::from_text("1", "text")]),
        )
        .unwrap();
        assert!(complete.is_complete());

        let no_reviews = ReviewedPreprint::from_parts(
            Preprint::new("10.1/a"),
            ReviewProcess::new("10.1/a", vec![]),
        )
        .unwrap();
        assert!(!no_reviews.is_complete());

        let missing = ReviewedPreprint::new("10.1/a", None, None).unwrap();
        assert!(!missing.is_complete());
    }
}
