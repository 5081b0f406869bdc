//! Core domain types for Triage.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::TriageError;

// ---------------------------------------------------------------------------
// DocumentId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for document identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// Generate a new time-sortable document identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// FileFormat
// ---------------------------------------------------------------------------

/// Declared or detected format of an incoming document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Text,
    Pdf,
    Image,
}

impl FileFormat {
    /// All formats, in declaration order.
    pub const ALL: [FileFormat; 3] = [Self::Text, Self::Pdf, Self::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = TriageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            "image" | "img" => Ok(Self::Image),
            other => Err(TriageError::unsupported(format!(
                "'{other}' (expected text, pdf or image)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// The three document categories a support document can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Invoice,
    SupportTicket,
    FeatureRequest,
}

impl Category {
    /// All categories, in declaration (tie-break) order.
    pub const ALL: [Category; 3] = [Self::Invoice, Self::SupportTicket, Self::FeatureRequest];

    /// Number of categories.
    pub const COUNT: usize = 3;

    /// Stable index into per-category arrays.
    pub fn index(&self) -> usize {
        match self {
            Self::Invoice => 0,
            Self::SupportTicket => 1,
            Self::FeatureRequest => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::SupportTicket => "support_ticket",
            Self::FeatureRequest => "feature_request",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TriageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match norm.as_str() {
            "invoice" | "invoice_agent" => Ok(Self::Invoice),
            "support_ticket" | "support_ticket_agent" => Ok(Self::SupportTicket),
            "feature_request" | "feature_request_agent" => Ok(Self::FeatureRequest),
            _ => Err(TriageError::validation(format!(
                "unknown category '{s}' (expected invoice, support_ticket or feature_request)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An ingested document. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    format: FileFormat,
    #[serde(skip)]
    raw: Vec<u8>,
    text: String,
    content_hash: String,
    received_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl Document {
    /// Build a document from raw bytes and the text extracted from them.
    pub fn new(raw: Vec<u8>, format: FileFormat, text: String, source: Option<String>) -> Self {
        let content_hash = sha256_hex(&raw);
        Self {
            id: DocumentId::new(),
            format,
            raw,
            text,
            content_hash,
            received_at: Utc::now(),
            source,
        }
    }

    /// Build a document whose raw bytes are the text itself.
    pub fn from_text(text: impl Into<String>, format: FileFormat) -> Self {
        let text = text.into();
        Self::new(text.as_bytes().to_vec(), format, text, None)
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Raw bytes as received. Empty after deserialization.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Normalized extracted text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Hex SHA-256 of the raw bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Label used in logs and errors: the source path, or the id.
    pub fn label(&self) -> String {
        self.source.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// CategoryScores
// ---------------------------------------------------------------------------

/// Calibrated probability per category. Entries lie in [0, 1] and sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub invoice: f64,
    pub support_ticket: f64,
    pub feature_request: f64,
}

impl CategoryScores {
    /// The uniform distribution (no evidence).
    pub fn uniform() -> Self {
        let p = 1.0 / Category::COUNT as f64;
        Self::from_array([p, p, p])
    }

    /// Build from an array indexed by [`Category::index`]. Values are
    /// clamped to [0, 1] and renormalized; non-finite input yields uniform.
    pub fn from_array(values: [f64; Category::COUNT]) -> Self {
        if values.iter().any(|v| !v.is_finite()) {
            return Self::uniform();
        }
        let clamped = values.map(|v| v.clamp(0.0, 1.0));
        let total: f64 = clamped.iter().sum();
        if total <= 0.0 {
            return Self::uniform();
        }
        let [invoice, support_ticket, feature_request] =
            clamped.map(|v| (v / total).clamp(0.0, 1.0));
        Self {
            invoice,
            support_ticket,
            feature_request,
        }
    }

    pub fn to_array(&self) -> [f64; Category::COUNT] {
        [self.invoice, self.support_ticket, self.feature_request]
    }

    pub fn get(&self, category: Category) -> f64 {
        self.to_array()[category.index()]
    }

    /// The winning category and its probability. Ties resolve in
    /// declaration order.
    pub fn best(&self) -> (Category, f64) {
        let values = self.to_array();
        let mut best = Category::Invoice;
        for category in Category::ALL {
            if values[category.index()] > values[best.index()] {
                best = category;
            }
        }
        (best, values[best.index()])
    }
}

// ---------------------------------------------------------------------------
// Disposition
// ---------------------------------------------------------------------------

/// What should happen with a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Confident enough to route automatically.
    Accepted,
    /// Below the review threshold; a human should confirm.
    NeedsReview,
}

impl Disposition {
    /// Decide the disposition for a confidence against a threshold.
    pub fn for_confidence(confidence: f64, threshold: f64) -> Self {
        if confidence >= threshold {
            Self::Accepted
        } else {
            Self::NeedsReview
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::NeedsReview => "needs_review",
        }
    }
}

// ---------------------------------------------------------------------------
// ClassificationResult
// ---------------------------------------------------------------------------

/// The outcome of classifying one document. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    document_id: DocumentId,
    document_type: Category,
    file_format: FileFormat,
    confidence_score: f64,
    scores: CategoryScores,
    disposition: Disposition,
    classified_at: DateTime<Utc>,
}

impl ClassificationResult {
    /// Build a result from calibrated scores. The label and confidence are
    /// derived from `scores` so they can never disagree.
    pub fn from_scores(
        document_id: DocumentId,
        file_format: FileFormat,
        scores: CategoryScores,
        review_threshold: f64,
    ) -> Self {
        let (document_type, confidence) = scores.best();
        let confidence_score = confidence.clamp(0.0, 1.0);
        Self {
            document_id,
            document_type,
            file_format,
            confidence_score,
            scores,
            disposition: Disposition::for_confidence(confidence_score, review_threshold),
            classified_at: Utc::now(),
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn document_type(&self) -> Category {
        self.document_type
    }

    pub fn file_format(&self) -> FileFormat {
        self.file_format
    }

    pub fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    pub fn scores(&self) -> &CategoryScores {
        &self.scores
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    pub fn needs_review(&self) -> bool {
        self.disposition == Disposition::NeedsReview
    }

    pub fn classified_at(&self) -> DateTime<Utc> {
        self.classified_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_roundtrip() {
        let id = DocumentId::new();
        let parsed: DocumentId = id.to_string().parse().expect("parse DocumentId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn category_parses_agent_names() {
        assert_eq!("invoice".parse::<Category>().unwrap(), Category::Invoice);
        assert_eq!(
            "Support_Ticket_Agent".parse::<Category>().unwrap(),
            Category::SupportTicket
        );
        assert_eq!(
            "feature-request".parse::<Category>().unwrap(),
            Category::FeatureRequest
        );
        assert!("general".parse::<Category>().is_err());
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&Category::SupportTicket).unwrap();
        assert_eq!(json, r#""support_ticket""#);
        let parsed: std::result::Result<Category, _> = serde_json::from_str(r#""refund""#);
        assert!(parsed.is_err());
    }

    #[test]
    fn file_format_parse_and_display() {
        assert_eq!("PDF".parse::<FileFormat>().unwrap(), FileFormat::Pdf);
        assert_eq!(FileFormat::Image.to_string(), "image");
        assert!("docx".parse::<FileFormat>().is_err());
    }

    #[test]
    fn scores_normalize_and_clamp() {
        let scores = CategoryScores::from_array([2.0, 0.5, -1.0]);
        let sum: f64 = scores.to_array().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(scores.to_array().iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(scores.feature_request, 0.0);
    }

    #[test]
    fn scores_non_finite_fall_back_to_uniform() {
        let scores = CategoryScores::from_array([f64::NAN, 0.2, 0.3]);
        assert_eq!(scores, CategoryScores::uniform());
    }

    #[test]
    fn best_breaks_ties_in_declaration_order() {
        let (category, p) = CategoryScores::uniform().best();
        assert_eq!(category, Category::Invoice);
        assert!((p - 1.0 / 3.0).abs() < 1e-9);

        let scores = CategoryScores::from_array([0.2, 0.4, 0.4]);
        assert_eq!(scores.best().0, Category::SupportTicket);
    }

    #[test]
    fn result_json_shape() {
        let scores = CategoryScores::from_array([0.94, 0.04, 0.02]);
        let result =
            ClassificationResult::from_scores(DocumentId::new(), FileFormat::Pdf, scores, 0.75);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["document_type"], "invoice");
        assert_eq!(value["file_format"], "pdf");
        assert!((value["confidence_score"].as_f64().unwrap() - 0.94).abs() < 1e-9);
        assert_eq!(value["disposition"], "accepted");
    }

    #[test]
    fn low_confidence_needs_review() {
        let result = ClassificationResult::from_scores(
            DocumentId::new(),
            FileFormat::Text,
            CategoryScores::uniform(),
            0.75,
        );
        assert!(result.needs_review());
        assert_eq!(result.disposition(), Disposition::NeedsReview);
    }

    #[test]
    fn document_hashes_raw_bytes() {
        let doc = Document::from_text("hello", FileFormat::Text);
        assert_eq!(
            doc.content_hash(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(doc.text(), "hello");
        assert_eq!(doc.label(), doc.id().to_string());
    }

    #[test]
    fn sha256_hex_is_full_width_lowercase() {
        let empty = sha256_hex(b"");
        assert_eq!(
            empty,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        // Digest starting with a zero byte keeps its leading zeros.
        let hash = sha256_hex(b"286");
        assert_eq!(
            hash,
            "00328ce57bbc14b33bd6695bc8eb32cdf2fb5f3a7d89ec14a42825e15d39df60"
        );
        assert_eq!(hash.len(), 64);
    }
}
