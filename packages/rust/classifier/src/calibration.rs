//! Temperature scaling and calibration metrics.
//!
//! Raw logits are turned into probabilities with `softmax(logits / T)`. The
//! temperature is fitted on held-out logits so that a reported 0.9 means
//! "right about nine times in ten" rather than "large margin".
//!
//! A small training set is often separable, and a plain likelihood fit then
//! drives `T` toward zero. The fit is therefore a MAP estimate under a
//! log-normal prior centered on [`PRIOR_TEMPERATURE`]. After scaling, the
//! distribution is mixed with the uniform one so that the top confidence
//! never exceeds the held-out accuracy estimate.

use std::collections::BTreeMap;

use serde::Serialize;

use triage_shared::{Category, CategoryScores};

const K: usize = Category::COUNT;

/// Smallest temperature considered by [`fit_temperature`].
pub const MIN_TEMPERATURE: f64 = 1.0;

/// Largest temperature considered by [`fit_temperature`].
pub const MAX_TEMPERATURE: f64 = 4.0;

/// Center of the temperature prior, and the result when there is no data.
pub const PRIOR_TEMPERATURE: f64 = 2.0;

/// Weight of the squared log-distance from [`PRIOR_TEMPERATURE`].
const PRIOR_STRENGTH: f64 = 0.25;

const TEMPERATURE_STEP: f64 = 0.05;

/// Upper bound on the uniform mixing weight from [`fit_uniform_mix`].
pub const MAX_UNIFORM_MIX: f64 = 0.1;

/// Number of equal-width confidence bins for the calibration error.
const ECE_BINS: usize = 10;

/// Temperature-scaled softmax. Non-finite input yields the uniform
/// distribution.
pub fn softmax(logits: [f64; K], temperature: f64) -> [f64; K] {
    let uniform = [1.0 / K as f64; K];
    if !(temperature.is_finite() && temperature > 0.0) || logits.iter().any(|l| !l.is_finite()) {
        return uniform;
    }
    let scaled = logits.map(|l| l / temperature);
    let max = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps = scaled.map(|l| (l - max).exp());
    let sum: f64 = exps.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return uniform;
    }
    exps.map(|e| e / sum)
}

/// Pick the temperature in [`MIN_TEMPERATURE`, `MAX_TEMPERATURE`] that
/// minimizes mean negative log-likelihood of `labels` plus the prior
/// penalty. Returns [`PRIOR_TEMPERATURE`] when there is nothing to fit.
pub fn fit_temperature(logits: &[[f64; K]], labels: &[Category]) -> f64 {
    if logits.is_empty() || logits.len() != labels.len() {
        return PRIOR_TEMPERATURE;
    }

    let steps = ((MAX_TEMPERATURE - MIN_TEMPERATURE) / TEMPERATURE_STEP).round() as usize;
    let mut best_t = PRIOR_TEMPERATURE;
    let mut best_loss = f64::INFINITY;

    for i in 0..=steps {
        let t = (MIN_TEMPERATURE + i as f64 * TEMPERATURE_STEP).min(MAX_TEMPERATURE);
        let loss = mean_nll(logits, labels, t) + prior_penalty(t);
        if loss < best_loss - 1e-12 {
            best_loss = loss;
            best_t = t;
        }
    }
    best_t
}

fn prior_penalty(temperature: f64) -> f64 {
    PRIOR_STRENGTH * (temperature / PRIOR_TEMPERATURE).ln().powi(2)
}

/// Uniform mixing weight from the held-out error rate.
///
/// The error rate carries a Beta(1, 1) prior, so a set with no mistakes
/// still yields a non-zero weight. The weight is chosen so that a fully
/// confident prediction reports the estimated accuracy after
/// [`shrink_to_uniform`]. Capped at [`MAX_UNIFORM_MIX`].
pub fn fit_uniform_mix(logits: &[[f64; K]], labels: &[Category]) -> f64 {
    if logits.is_empty() || logits.len() != labels.len() {
        return MAX_UNIFORM_MIX;
    }
    let errors = logits
        .iter()
        .zip(labels)
        .filter(|(l, label)| argmax(l) != label.index())
        .count();
    let error_rate = (errors as f64 + 1.0) / (logits.len() as f64 + 2.0);
    (error_rate * K as f64 / (K - 1) as f64).min(MAX_UNIFORM_MIX)
}

/// `(1 - mix) * probs + mix * uniform`. Keeps the ranking and the sum.
pub fn shrink_to_uniform(probs: [f64; K], mix: f64) -> [f64; K] {
    let mix = if mix.is_finite() { mix.clamp(0.0, 1.0) } else { 0.0 };
    probs.map(|p| (1.0 - mix) * p + mix / K as f64)
}

/// Index of the largest logit; ties resolve to the lowest index.
fn argmax(logits: &[f64; K]) -> usize {
    let mut best = 0;
    for (i, l) in logits.iter().enumerate() {
        if *l > logits[best] {
            best = i;
        }
    }
    best
}

fn mean_nll(logits: &[[f64; K]], labels: &[Category], temperature: f64) -> f64 {
    let total: f64 = logits
        .iter()
        .zip(labels)
        .map(|(l, label)| -softmax(*l, temperature)[label.index()].max(1e-12).ln())
        .sum();
    total / logits.len() as f64
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Per-category tallies.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryStats {
    /// Samples whose true label is this category.
    pub support: usize,
    /// Of those, how many were predicted correctly.
    pub correct: usize,
    /// Samples predicted as this category.
    pub predicted: usize,
}

impl CategoryStats {
    pub fn recall(&self) -> f64 {
        ratio(self.correct, self.support)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.correct, self.predicted)
    }
}

/// Accuracy and calibration summary over a labeled set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub mean_confidence: f64,
    /// Expected calibration error over equal-width confidence bins.
    pub expected_calibration_error: f64,
    /// Share of samples that fell below the review threshold.
    pub review_rate: f64,
    pub per_category: BTreeMap<Category, CategoryStats>,
    /// `confusion[truth][predicted]`, indexed by [`Category::index`].
    pub confusion: [[usize; K]; K],
}

/// One prediction to be scored.
#[derive(Debug, Clone, Copy)]
pub struct Prediction {
    pub truth: Category,
    pub scores: CategoryScores,
    pub needs_review: bool,
}

/// Build a report from predictions.
pub fn summarize(predictions: &[Prediction]) -> EvaluationReport {
    let mut report = EvaluationReport {
        total: predictions.len(),
        ..EvaluationReport::default()
    };
    for category in Category::ALL {
        report.per_category.insert(category, CategoryStats::default());
    }
    if predictions.is_empty() {
        return report;
    }

    let mut bins = [(0usize, 0usize, 0.0f64); ECE_BINS];
    let mut confidence_sum = 0.0;
    let mut reviews = 0usize;

    for p in predictions {
        let (predicted, confidence) = p.scores.best();
        let hit = predicted == p.truth;

        report.confusion[p.truth.index()][predicted.index()] += 1;
        if let Some(stats) = report.per_category.get_mut(&p.truth) {
            stats.support += 1;
            if hit {
                stats.correct += 1;
            }
        }
        if let Some(stats) = report.per_category.get_mut(&predicted) {
            stats.predicted += 1;
        }
        if hit {
            report.correct += 1;
        }
        if p.needs_review {
            reviews += 1;
        }
        confidence_sum += confidence;

        let bin = ((confidence * ECE_BINS as f64) as usize).min(ECE_BINS - 1);
        bins[bin].0 += 1;
        bins[bin].1 += usize::from(hit);
        bins[bin].2 += confidence;
    }

    let n = predictions.len() as f64;
    report.accuracy = report.correct as f64 / n;
    report.mean_confidence = confidence_sum / n;
    report.review_rate = reviews as f64 / n;
    report.expected_calibration_error = bins
        .iter()
        .filter(|(count, _, _)| *count > 0)
        .map(|&(count, hits, conf_sum)| {
            let acc = hits as f64 / count as f64;
            let conf = conf_sum / count as f64;
            (acc - conf).abs() * count as f64 / n
        })
        .sum();

    report
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
