//! Labeled samples for training and evaluation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use triage_shared::{Category, FileFormat, Result, TriageError};

/// A text with its known category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub text: String,
    #[serde(alias = "document_type", alias = "category")]
    pub label: Category,
    #[serde(default = "default_format", alias = "file_format")]
    pub format: FileFormat,
}

fn default_format() -> FileFormat {
    FileFormat::Text
}

impl LabeledSample {
    pub fn new(text: impl Into<String>, label: Category) -> Self {
        Self {
            text: text.into(),
            label,
            format: FileFormat::Text,
        }
    }
}

/// Load samples from a JSON array or a JSON Lines file.
pub fn load_samples(path: &Path) -> Result<Vec<LabeledSample>> {
    let content = std::fs::read_to_string(path).map_err(|e| TriageError::io(path, e))?;
    parse_samples(&content).map_err(|e| match e {
        TriageError::Validation { message } => {
            TriageError::validation(format!("{}: {message}", path.display()))
        }
        other => other,
    })
}

/// Parse samples from a JSON array or JSON Lines text.
pub fn parse_samples(content: &str) -> Result<Vec<LabeledSample>> {
    let trimmed = content.trim_start();
    let samples: Vec<LabeledSample> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| TriageError::validation(e.to_string()))?
    } else {
        let mut out = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let sample = serde_json::from_str(line)
                .map_err(|e| TriageError::validation(format!("line {}: {e}", i + 1)))?;
            out.push(sample);
        }
        out
    };

    if let Some(blank) = samples.iter().position(|s| s.text.trim().is_empty()) {
        return Err(TriageError::validation(format!(
            "sample {} has empty text",
            blank + 1
        )));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_array_with_aliases() {
        let content = r#"[
            {"text": "Invoice 12 total due $5", "label": "invoice", "format": "pdf"},
            {"text": "App crashes", "document_type": "support_ticket"}
        ]"#;
        let samples = parse_samples(content).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].format, FileFormat::Pdf);
        assert_eq!(samples[1].label, Category::SupportTicket);
        assert_eq!(samples[1].format, FileFormat::Text);
    }

    #[test]
    fn parses_json_lines_skipping_blanks() {
        let content = "\n{\"text\": \"Add dark mode\", \"category\": \"feature_request\"}\n\n// comment\n{\"text\": \"Login broken\", \"label\": \"support_ticket\"}\n";
        let samples = parse_samples(content).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label, Category::FeatureRequest);
    }

    #[test]
    fn unknown_label_reports_line() {
        let content = "{\"text\": \"ok\", \"label\": \"invoice\"}\n{\"text\": \"hmm\", \"label\": \"general\"}\n";
        let err = parse_samples(content).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_text_rejected() {
        let content = r#"[{"text": "  ", "label": "invoice"}]"#;
        let err = parse_samples(content).unwrap_err();
        assert!(err.to_string().contains("sample 1"));
    }
}
