//! Weighted pattern signals per category.
//!
//! These carry the routing knowledge a support desk writes down by hand
//! ("invoice or billing goes to accounts", "error or not working is a
//! ticket", "can you add is a feature request"). They work without any
//! training data and keep short inputs classifiable when the statistical
//! model has never seen their words.

use std::sync::LazyLock;

use regex::Regex;

use triage_shared::Category;

/// A single weighted pattern. Contributes `weight` to its category's logit
/// at most once per document.
pub(crate) struct Rule {
    pub name: &'static str,
    pub category: Category,
    pub weight: f64,
    pattern: Regex,
}

impl Rule {
    fn new(name: &'static str, category: Category, weight: f64, pattern: &str) -> Self {
        Self {
            name,
            category,
            weight,
            pattern: Regex::new(pattern).expect("valid rule regex"),
        }
    }
}

/// Logit contributions and the names of the rules that fired.
#[derive(Debug, Clone, Default)]
pub(crate) struct RuleHits {
    pub logits: [f64; Category::COUNT],
    pub matched: Vec<&'static str>,
}

static DEFAULT_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    use Category::{FeatureRequest, Invoice, SupportTicket};

    vec![
        // --- invoice -----------------------------------------------------
        Rule::new(
            "invoice_keyword",
            Invoice,
            1.5,
            r"(?i)\b(invoice|invoices|invoiced|invoicing)\b",
        ),
        Rule::new(
            "invoice_number",
            Invoice,
            2.0,
            r"(?i)\b(invoice|inv|bill|receipt)\s*(no\.?|number|num|#)?\s*[:#]?\s*[a-z]{0,4}-?\d{2,}",
        ),
        Rule::new(
            "currency_amount",
            Invoice,
            1.0,
            r"(?i)([$€£¥₹]\s?\d[\d,]*(\.\d{2})?|\b\d[\d,]*\.\d{2}\s?(usd|eur|gbp|inr|cad|aud)\b)",
        ),
        Rule::new(
            "amount_due",
            Invoice,
            1.5,
            r"(?i)\b(total|amount|balance)\s+(due|payable|owed|outstanding)\b|\bdue\s+date\b",
        ),
        Rule::new(
            "billing_terms",
            Invoice,
            0.75,
            r"(?i)\b(billing|billed|remit|remittance|subtotal|vat|receipt|purchase\s+order|net\s?(15|30|60))\b",
        ),
        // --- support ticket ---------------------------------------------
        Rule::new(
            "error_report",
            SupportTicket,
            1.5,
            r"(?i)\b(error|errors|exception|crash|crashes|crashed|crashing|bug|fails|failed|failing|failure)\b",
        ),
        Rule::new(
            "not_working",
            SupportTicket,
            2.0,
            r"(?i)\b(not|isn['’]?t|doesn['’]?t|won['’]?t|stopped)\s+(work|works|working|load|loading|respond|responding|open|opening|sync|syncing)\b|\bbroken\b|\b(is|are|went)\s+down\b",
        ),
        Rule::new(
            "access_problem",
            SupportTicket,
            2.0,
            r"(?i)\b(can['’]?t|cannot|unable\s+to|couldn['’]?t)\s+(log\s?in|sign\s?in|login|access|connect|reset)\b|\blocked\s+out\b|\baccount\s+(is\s+)?locked\b|\breset\s+(my\s+)?password\b",
        ),
        Rule::new(
            "error_code",
            SupportTicket,
            1.0,
            r"(?i)\b(error|code|status|http)\s*:?\s*#?\d{3}\b",
        ),
        Rule::new(
            "help_request",
            SupportTicket,
            0.75,
            r"(?i)\b(help|issue|problem|urgent|troubleshoot|slow|timeout|timed\s+out|outage)\b",
        ),
        // --- feature request --------------------------------------------
        Rule::new(
            "add_request",
            FeatureRequest,
            2.0,
            r"(?i)\b(can|could|would)\s+(we|you|they)\s+(please\s+)?(add|have|get|support|implement|include|build)\b",
        ),
        Rule::new(
            "wish_phrase",
            FeatureRequest,
            2.0,
            r"(?i)\bit\s+would\s+be\s+(nice|great|helpful|useful|awesome)\b|\bi['’]?d\s+(like|love)\s+(to\s+see|a|an)\b|\bi\s+wish\b|\bwould\s+love\b",
        ),
        Rule::new(
            "feature_keyword",
            FeatureRequest,
            1.5,
            r"(?i)\b(feature|features|enhancement|suggestion|suggest|roadmap|improvement)\b",
        ),
        Rule::new(
            "new_capability",
            FeatureRequest,
            0.75,
            r"(?i)\b(add|adding|support\s+for|option\s+to|ability\s+to|allow\s+(us|users)\s+to)\b",
        ),
    ]
});

/// Evaluate every default rule against `text`.
pub(crate) fn evaluate(text: &str) -> RuleHits {
    let mut hits = RuleHits::default();
    for rule in DEFAULT_RULES.iter() {
        if rule.pattern.is_match(text) {
            hits.logits[rule.category.index()] += rule.weight;
            hits.matched.push(rule.name);
        }
    }
    hits
}

/// Names and categories of all default rules.
pub(crate) fn rule_catalog() -> Vec<(&'static str, Category, f64)> {
    DEFAULT_RULES
        .iter()
        .map(|r| (r.name, r.category, r.weight))
        .collect()
}
