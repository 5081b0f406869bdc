//! Document category classifier with calibrated confidence.
//!
//! Three sources of evidence are summed into one logit per category:
//!
//! 1. a multinomial naive Bayes model over unigrams and bigrams, averaged
//!    per known token and scaled by `ln(1 + min(known, max_evidence_tokens))`
//!    so long documents cannot push confidence to certainty,
//! 2. weighted routing rules (regular expressions per category),
//! 3. a per-format prior (scanned PDFs and images lean toward invoices).
//!
//! The logits go through a temperature-scaled softmax. The temperature is
//! fitted on leave-one-out logits of the training set, and the result is
//! mixed with the uniform distribution according to the leave-one-out error
//! rate. The reported confidence is a calibrated probability rather than a
//! margin, and never exceeds the estimated accuracy.
//!
//! A [`Classifier`] is immutable after construction and safe to share
//! across threads.

mod calibration;
mod model;
mod rules;
mod samples;
mod seed;
mod tokenize;

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use triage_shared::{
    Category, CategoryScores, ClassificationResult, ClassifierConfig, Document, FileFormat,
    FormatBiasConfig, Result, TriageError, expand_home,
};

pub use calibration::{
    CategoryStats, EvaluationReport, MAX_TEMPERATURE, MAX_UNIFORM_MIX, MIN_TEMPERATURE,
    PRIOR_TEMPERATURE, Prediction, fit_temperature, fit_uniform_mix, shrink_to_uniform, softmax,
    summarize,
};
pub use samples::{LabeledSample, load_samples, parse_samples};

use model::NaiveBayes;

/// Current schema version of the saved model file.
pub const MODEL_SCHEMA_VERSION: u32 = 2;

/// Laplace smoothing constant.
const DEFAULT_ALPHA: f64 = 1.0;

const K: usize = Category::COUNT;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Runtime knobs that are not part of the trained model.
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    /// Confidence below this routes to human review.
    pub review_threshold: f64,
    /// Cap on how many known tokens count as evidence.
    pub max_evidence_tokens: u32,
    /// Replaces the fitted temperature when set.
    pub temperature_override: Option<f64>,
    /// Per-format invoice prior.
    pub format_bias: FormatBiasConfig,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self::from(&ClassifierConfig::default())
    }
}

impl From<&ClassifierConfig> for ClassifierSettings {
    fn from(config: &ClassifierConfig) -> Self {
        Self {
            review_threshold: config.review_threshold,
            max_evidence_tokens: config.max_evidence_tokens.max(1),
            temperature_override: config.temperature,
            format_bias: config.format_bias.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Explanation
// ---------------------------------------------------------------------------

/// Why a text scored the way it did.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub scores: CategoryScores,
    /// Naive Bayes contribution, centered on the best class.
    pub model_logits: [f64; K],
    pub rule_logits: [f64; K],
    pub format_logits: [f64; K],
    pub matched_rules: Vec<&'static str>,
    pub known_tokens: usize,
    pub temperature: f64,
    /// Weight of the uniform distribution mixed into the scores.
    pub uniform_mix: f64,
}

struct Breakdown {
    model: [f64; K],
    rules: [f64; K],
    format: [f64; K],
    matched_rules: Vec<&'static str>,
    known_tokens: usize,
}

impl Breakdown {
    fn total(&self) -> [f64; K] {
        std::array::from_fn(|c| self.model[c] + self.rules[c] + self.format[c])
    }
}

// ---------------------------------------------------------------------------
// Model file
// ---------------------------------------------------------------------------

/// On-disk representation of a trained classifier.
#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    schema_version: u32,
    created_at: DateTime<Utc>,
    sample_count: usize,
    temperature: f64,
    uniform_mix: f64,
    naive_bayes: NaiveBayes,
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Trained, calibrated document classifier.
pub struct Classifier {
    model: NaiveBayes,
    temperature: f64,
    uniform_mix: f64,
    sample_count: usize,
    settings: ClassifierSettings,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("vocabulary_size", &self.model.vocabulary_size())
            .field("sample_count", &self.sample_count)
            .field("temperature", &self.temperature)
            .field("uniform_mix", &self.uniform_mix)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Classifier {
    /// Train on the built-in seed corpus only.
    pub fn with_seed_corpus(settings: ClassifierSettings) -> Result<Self> {
        Self::fit(seed_samples(), settings)
    }

    /// Train on the seed corpus plus `samples`.
    pub fn train(samples: &[LabeledSample], settings: ClassifierSettings) -> Result<Self> {
        let mut all = seed_samples();
        all.extend_from_slice(samples);
        Self::fit(all, settings)
    }

    /// Train on `samples` alone, without the seed corpus.
    pub fn train_only(samples: &[LabeledSample], settings: ClassifierSettings) -> Result<Self> {
        Self::fit(samples.to_vec(), settings)
    }

    /// Build the classifier described by the config: a saved model when
    /// `model_path` is set, the seed model otherwise.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let settings = ClassifierSettings::from(config);
        match &config.model_path {
            Some(path) => Self::load(&expand_home(path), settings),
            None => Self::with_seed_corpus(settings),
        }
    }

    #[instrument(skip_all, fields(samples = samples.len()))]
    fn fit(samples: Vec<LabeledSample>, settings: ClassifierSettings) -> Result<Self> {
        if samples.is_empty() {
            return Err(TriageError::model("training set is empty"));
        }

        let tokenized: Vec<Vec<String>> =
            samples.iter().map(|s| tokenize::tokenize(&s.text)).collect();

        let mut model = NaiveBayes::new(DEFAULT_ALPHA);
        for (tokens, sample) in tokenized.iter().zip(&samples) {
            model.add_document(tokens, sample.label);
        }

        let mut classifier = Self {
            model,
            temperature: PRIOR_TEMPERATURE,
            uniform_mix: 0.0,
            sample_count: samples.len(),
            settings,
        };

        let held_out: Vec<[f64; K]> = tokenized
            .iter()
            .zip(&samples)
            .map(|(tokens, s)| {
                classifier
                    .breakdown(&s.text, tokens, s.format, Some(s.label))
                    .total()
            })
            .collect();
        let labels: Vec<Category> = samples.iter().map(|s| s.label).collect();
        classifier.temperature = fit_temperature(&held_out, &labels);
        classifier.uniform_mix = fit_uniform_mix(&held_out, &labels);

        info!(
            samples = classifier.sample_count,
            vocabulary = classifier.model.vocabulary_size(),
            temperature = classifier.temperature,
            uniform_mix = classifier.uniform_mix,
            "classifier trained"
        );
        Ok(classifier)
    }

    /// Load a model saved with [`save`](Self::save).
    pub fn load(path: &Path, settings: ClassifierSettings) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TriageError::io(path, e))?;
        let file: ModelFile = serde_json::from_str(&content).map_err(|e| {
            TriageError::model(format!("failed to parse {}: {e}", path.display()))
        })?;

        if file.schema_version != MODEL_SCHEMA_VERSION {
            return Err(TriageError::model(format!(
                "model schema_version {} not supported (expected {MODEL_SCHEMA_VERSION})",
                file.schema_version
            )));
        }
        if !(file.temperature.is_finite() && file.temperature > 0.0) {
            return Err(TriageError::model(format!(
                "model temperature {} is not positive",
                file.temperature
            )));
        }
        if !(0.0..=MAX_UNIFORM_MIX).contains(&file.uniform_mix) {
            return Err(TriageError::model(format!(
                "model uniform_mix {} is outside [0, {MAX_UNIFORM_MIX}]",
                file.uniform_mix
            )));
        }
        if !file.naive_bayes.is_consistent() {
            return Err(TriageError::model("model token counts are inconsistent"));
        }

        debug!(path = %path.display(), samples = file.sample_count, "model loaded");
        Ok(Self {
            model: file.naive_bayes,
            temperature: file.temperature,
            uniform_mix: file.uniform_mix,
            sample_count: file.sample_count,
            settings,
        })
    }

    /// Write the trained model as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TriageError::io(parent, e))?;
        }
        let file = ModelFile {
            schema_version: MODEL_SCHEMA_VERSION,
            created_at: Utc::now(),
            sample_count: self.sample_count,
            temperature: self.temperature,
            uniform_mix: self.uniform_mix,
            naive_bayes: self.model.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| TriageError::model(format!("failed to serialize model: {e}")))?;
        std::fs::write(path, json).map_err(|e| TriageError::io(path, e))?;
        info!(path = %path.display(), "model saved");
        Ok(())
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    /// Temperature actually applied (override or fitted).
    pub fn temperature(&self) -> f64 {
        self.settings.temperature_override.unwrap_or(self.temperature)
    }

    /// Temperature fitted during training.
    pub fn fitted_temperature(&self) -> f64 {
        self.temperature
    }

    /// Uniform mixing weight fitted during training.
    pub fn uniform_mix(&self) -> f64 {
        self.uniform_mix
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn vocabulary_size(&self) -> usize {
        self.model.vocabulary_size()
    }

    /// Calibrated per-category probabilities for `text`.
    pub fn score(&self, text: &str, format: FileFormat) -> CategoryScores {
        self.explain(text, format).scores
    }

    /// Scores plus the contribution of each evidence source.
    pub fn explain(&self, text: &str, format: FileFormat) -> Explanation {
        let tokens = tokenize::tokenize(text);
        let breakdown = self.breakdown(text, &tokens, format, None);
        let temperature = self.temperature();
        let probs = softmax(breakdown.total(), temperature);
        let scores = CategoryScores::from_array(shrink_to_uniform(probs, self.uniform_mix));
        Explanation {
            scores,
            model_logits: breakdown.model,
            rule_logits: breakdown.rules,
            format_logits: breakdown.format,
            matched_rules: breakdown.matched_rules,
            known_tokens: breakdown.known_tokens,
            temperature,
            uniform_mix: self.uniform_mix,
        }
    }

    /// Classify a document. Fails only when the document has no text; a
    /// low-confidence outcome is reported through the result's disposition.
    pub fn classify(&self, document: &Document) -> Result<ClassificationResult> {
        if document.text().trim().is_empty() {
            return Err(TriageError::empty(document.label()));
        }
        let scores = self.score(document.text(), document.format());
        let result = ClassificationResult::from_scores(
            document.id(),
            document.format(),
            scores,
            self.settings.review_threshold,
        );
        debug!(
            document_id = %result.document_id(),
            category = %result.document_type(),
            confidence = result.confidence_score(),
            disposition = result.disposition().as_str(),
            "document classified"
        );
        Ok(result)
    }

    /// Score a labeled set and summarize accuracy and calibration.
    pub fn evaluate(&self, samples: &[LabeledSample]) -> EvaluationReport {
        let predictions: Vec<Prediction> = samples
            .iter()
            .map(|s| {
                let scores = self.score(&s.text, s.format);
                Prediction {
                    truth: s.label,
                    scores,
                    needs_review: scores.best().1 < self.settings.review_threshold,
                }
            })
            .collect();
        summarize(&predictions)
    }

    fn breakdown(
        &self,
        text: &str,
        tokens: &[String],
        format: FileFormat,
        holdout: Option<Category>,
    ) -> Breakdown {
        let evidence = match holdout {
            Some(category) => self.model.evidence_excluding(tokens, category),
            None => self.model.evidence(tokens),
        };

        let model = if evidence.known_tokens == 0 {
            [0.0; K]
        } else {
            let capped = evidence
                .known_tokens
                .min(self.settings.max_evidence_tokens as usize);
            let weight = (1.0 + capped as f64).ln();
            let raw: [f64; K] = std::array::from_fn(|c| {
                evidence.mean_log_likelihood[c] * weight + evidence.log_prior[c]
            });
            let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            raw.map(|l| l - max)
        };

        let hits = rules::evaluate(text);
        Breakdown {
            model,
            rules: hits.logits,
            format: self.settings.format_bias.offsets(format),
            matched_rules: hits.matched,
            known_tokens: evidence.known_tokens,
        }
    }
}

/// The built-in labeled corpus.
pub fn seed_samples() -> Vec<LabeledSample> {
    seed::SEED_SAMPLES
        .iter()
        .map(|(text, label)| LabeledSample::new(*text, *label))
        .collect()
}

/// `(name, category, weight)` for every routing rule.
pub fn rule_catalog() -> Vec<(&'static str, Category, f64)> {
    rules::rule_catalog()
}
