//! Escalation of low-confidence results to human reviewers.
//!
//! The review queue itself lives outside this system. A [`ReviewSink`] hands
//! results to it: [`LogReviewSink`] only emits a warning, [`JsonlReviewSink`]
//! appends to an outbox file another process drains.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use triage_shared::{ClassificationResult, Result, ReviewConfig, TriageError, expand_home};

/// Destination for results that need a human decision.
pub trait ReviewSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Hand one result to the review queue.
    fn submit(&self, result: &ClassificationResult, source: Option<&str>) -> Result<()>;
}

/// Logs each escalation at warn level.
pub struct LogReviewSink;

impl ReviewSink for LogReviewSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn submit(&self, result: &ClassificationResult, source: Option<&str>) -> Result<()> {
        warn!(
            document_id = %result.document_id(),
            source = source.unwrap_or("<inline>"),
            category = %result.document_type(),
            confidence = result.confidence_score(),
            "document needs human review"
        );
        Ok(())
    }
}

/// One line of the review outbox.
#[derive(Debug, Serialize)]
struct ReviewEntry<'a> {
    #[serde(flatten)]
    result: &'a ClassificationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    routed_at: DateTime<Utc>,
}

/// Appends one JSON object per escalated result to a file.
pub struct JsonlReviewSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlReviewSink {
    /// Create the sink; the parent directory is created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TriageError::io(parent, e))?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReviewSink for JsonlReviewSink {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn submit(&self, result: &ClassificationResult, source: Option<&str>) -> Result<()> {
        let entry = ReviewEntry {
            result,
            source,
            routed_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| TriageError::validation(format!("failed to encode review entry: {e}")))?;
        line.push('\n');

        // Whole lines only, even with concurrent submitters.
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TriageError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| TriageError::io(&self.path, e))?;
        Ok(())
    }
}

/// The sink configured in `[review]`: the JSONL outbox when a path is set,
/// log-only otherwise.
pub fn review_sink_from_config(config: &ReviewConfig) -> Result<Arc<dyn ReviewSink>> {
    match &config.outbox_path {
        Some(path) => Ok(Arc::new(JsonlReviewSink::new(expand_home(path))?)),
        None => Ok(Arc::new(LogReviewSink)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_shared::{CategoryScores, DocumentId, FileFormat};

    fn low_confidence() -> ClassificationResult {
        ClassificationResult::from_scores(
            DocumentId::new(),
            FileFormat::Image,
            CategoryScores::uniform(),
            0.75,
        )
    }

    #[test]
    fn jsonl_sink_appends_lines() {
        let path = std::env::temp_dir()
            .join(format!("triage_review_{}", uuid::Uuid::now_v7()))
            .join("outbox.jsonl");
        let sink = JsonlReviewSink::new(&path).unwrap();

        sink.submit(&low_confidence(), Some("scan-1.png")).unwrap();
        sink.submit(&low_confidence(), None).unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["source"], "scan-1.png");
        assert_eq!(first["disposition"], "needs_review");
        assert_eq!(first["file_format"], "image");
        assert!(first.get("routed_at").is_some());

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert!(second.get("source").is_none());
    }

    #[test]
    fn config_selects_sink() {
        let log = review_sink_from_config(&ReviewConfig::default()).unwrap();
        assert_eq!(log.name(), "log");

        let path =
            std::env::temp_dir().join(format!("triage_outbox_{}.jsonl", uuid::Uuid::now_v7()));
        let config = ReviewConfig {
            outbox_path: Some(path.display().to_string()),
        };
        let jsonl = review_sink_from_config(&config).unwrap();
        assert_eq!(jsonl.name(), "jsonl");
    }

    #[test]
    fn log_sink_never_fails() {
        assert!(LogReviewSink.submit(&low_confidence(), None).is_ok());
    }
}
