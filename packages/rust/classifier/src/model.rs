//! Multinomial naive Bayes over unigram + bigram tokens.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use triage_shared::Category;

const K: usize = Category::COUNT;

/// Per-class token statistics with Laplace smoothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NaiveBayes {
    alpha: f64,
    doc_counts: [u32; K],
    token_totals: [u64; K],
    token_counts: HashMap<String, [u32; K]>,
}

/// What the model knows about one token sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Evidence {
    /// Mean log-likelihood per known token, per class.
    pub mean_log_likelihood: [f64; K],
    /// Log class prior.
    pub log_prior: [f64; K],
    /// Token occurrences that appear in the vocabulary.
    pub known_tokens: usize,
}

impl NaiveBayes {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            doc_counts: [0; K],
            token_totals: [0; K],
            token_counts: HashMap::new(),
        }
    }

    pub fn add_document(&mut self, tokens: &[String], category: Category) {
        let c = category.index();
        self.doc_counts[c] += 1;
        self.token_totals[c] += tokens.len() as u64;
        for token in tokens {
            self.token_counts.entry(token.clone()).or_insert([0; K])[c] += 1;
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.token_counts.len()
    }

    #[cfg(test)]
    pub fn document_count(&self) -> u32 {
        self.doc_counts.iter().sum()
    }

    /// Evidence for `tokens` under the full model.
    pub fn evidence(&self, tokens: &[String]) -> Evidence {
        self.evidence_with(tokens, None)
    }

    /// Evidence for a training document as if it had not been trained on
    /// (leave-one-out). `tokens` must be exactly what was passed to
    /// [`add_document`](Self::add_document) with `category`.
    pub fn evidence_excluding(&self, tokens: &[String], category: Category) -> Evidence {
        self.evidence_with(tokens, Some(category))
    }

    fn evidence_with(&self, tokens: &[String], holdout: Option<Category>) -> Evidence {
        let mut own: HashMap<&str, u32> = HashMap::new();
        if holdout.is_some() {
            for token in tokens {
                *own.entry(token.as_str()).or_insert(0) += 1;
            }
        }

        let mut doc_counts = self.doc_counts;
        let mut totals = self.token_totals;
        if let Some(h) = holdout {
            let h = h.index();
            doc_counts[h] = doc_counts[h].saturating_sub(1);
            totals[h] = totals[h].saturating_sub(tokens.len() as u64);
        }

        let n_docs: u32 = doc_counts.iter().sum();
        let log_prior = std::array::from_fn(|c| {
            ((doc_counts[c] as f64 + 1.0) / (n_docs as f64 + K as f64)).ln()
        });

        let vocab = self.vocabulary_size().max(1) as f64;
        let denominators: [f64; K] =
            std::array::from_fn(|c| totals[c] as f64 + self.alpha * vocab);

        let mut sums = [0.0; K];
        let mut known = 0usize;
        for token in tokens {
            let Some(counts) = self.token_counts.get(token) else {
                continue;
            };
            let mut counts = *counts;
            if let Some(h) = holdout {
                let mine = own.get(token.as_str()).copied().unwrap_or(0);
                counts[h.index()] = counts[h.index()].saturating_sub(mine);
            }
            if counts.iter().all(|&n| n == 0) {
                continue;
            }
            known += 1;
            for c in 0..K {
                sums[c] += ((counts[c] as f64 + self.alpha) / denominators[c]).ln();
            }
        }

        let mean_log_likelihood = if known == 0 {
            [0.0; K]
        } else {
            sums.map(|s| s / known as f64)
        };

        Evidence {
            mean_log_likelihood,
            log_prior,
            known_tokens: known,
        }
    }

    /// Structural sanity check for models read from disk.
    pub fn is_consistent(&self) -> bool {
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return false;
        }
        let mut recount = [0u64; K];
        for counts in self.token_counts.values() {
            for c in 0..K {
                recount[c] += counts[c] as u64;
            }
        }
        recount == self.token_totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn tiny_model() -> NaiveBayes {
        let mut nb = NaiveBayes::new(1.0);
        nb.add_document(&toks(&["invoice", "total"]), Category::Invoice);
        nb.add_document(&toks(&["error", "login"]), Category::SupportTicket);
        nb.add_document(&toks(&["add", "feature"]), Category::FeatureRequest);
        nb
    }

    #[test]
    fn counts_accumulate() {
        let nb = tiny_model();
        assert_eq!(nb.vocabulary_size(), 6);
        assert_eq!(nb.document_count(), 3);
        assert!(nb.is_consistent());
    }

    #[test]
    fn known_token_favors_its_class() {
        let nb = tiny_model();
        let ev = nb.evidence(&toks(&["invoice"]));
        assert_eq!(ev.known_tokens, 1);
        let ll = ev.mean_log_likelihood;
        assert!(ll[0] > ll[1]);
        assert!(ll[0] > ll[2]);
        assert!((ll[1] - ll[2]).abs() < 1e-12);
    }

    #[test]
    fn unknown_tokens_give_no_evidence() {
        let nb = tiny_model();
        let ev = nb.evidence(&toks(&["weather", "sunny"]));
        assert_eq!(ev.known_tokens, 0);
        assert_eq!(ev.mean_log_likelihood, [0.0; K]);
    }

    #[test]
    fn leave_one_out_forgets_unique_tokens() {
        let nb = tiny_model();
        let doc = toks(&["invoice", "total"]);
        let ev = nb.evidence_excluding(&doc, Category::Invoice);
        assert_eq!(ev.known_tokens, 0);
        // The held-out class loses its only document from the prior.
        assert!(ev.log_prior[0] < ev.log_prior[1]);
    }

    #[test]
    fn leave_one_out_keeps_shared_tokens() {
        let mut nb = tiny_model();
        nb.add_document(&toks(&["invoice", "due"]), Category::Invoice);
        let ev = nb.evidence_excluding(&toks(&["invoice", "due"]), Category::Invoice);
        assert_eq!(ev.known_tokens, 1);
        assert!(ev.mean_log_likelihood[0] > ev.mean_log_likelihood[1]);
    }

    #[test]
    fn serde_roundtrip_preserves_counts() {
        let nb = tiny_model();
        let json = serde_json::to_string(&nb).unwrap();
        let back: NaiveBayes = serde_json::from_str(&json).unwrap();
        assert_eq!(back.vocabulary_size(), 6);
        assert!(back.is_consistent());
        assert_eq!(back.evidence(&toks(&["error"])), nb.evidence(&toks(&["error"])));
    }
}
