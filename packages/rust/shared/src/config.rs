//! Application configuration for Triage.
//!
//! User config lives at `~/.triage/triage.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TriageError};
use crate::types::{Category, FileFormat};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "triage.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".triage";

// ---------------------------------------------------------------------------
// Config structs (matching triage.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Classifier settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Ingestion limits.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Batch processing.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Result audit log.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Human review routing.
    #[serde(default)]
    pub review: ReviewConfig,
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Results with confidence below this go to human review.
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f64,

    /// Cap on how many known tokens count as evidence.
    #[serde(default = "default_max_evidence_tokens")]
    pub max_evidence_tokens: u32,

    /// Trained model file. The built-in seed model is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,

    /// Override the fitted calibration temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Additive invoice log-prior per file format.
    #[serde(default)]
    pub format_bias: FormatBiasConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            review_threshold: default_review_threshold(),
            max_evidence_tokens: default_max_evidence_tokens(),
            model_path: None,
            temperature: None,
            format_bias: FormatBiasConfig::default(),
        }
    }
}

fn default_review_threshold() -> f64 {
    0.75
}
fn default_max_evidence_tokens() -> u32 {
    8
}

/// `[classifier.format_bias]` section.
///
/// Scanned PDFs and photos in a support inbox are mostly bills and receipts,
/// so those formats nudge toward [`Category::Invoice`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatBiasConfig {
    #[serde(default)]
    pub text: f64,
    #[serde(default = "default_binary_bias")]
    pub pdf: f64,
    #[serde(default = "default_binary_bias")]
    pub image: f64,
}

impl Default for FormatBiasConfig {
    fn default() -> Self {
        Self {
            text: 0.0,
            pdf: default_binary_bias(),
            image: default_binary_bias(),
        }
    }
}

impl FormatBiasConfig {
    /// Log-prior offsets per category for `format`.
    pub fn offsets(&self, format: FileFormat) -> [f64; Category::COUNT] {
        let bias = match format {
            FileFormat::Text => self.text,
            FileFormat::Pdf => self.pdf,
            FileFormat::Image => self.image,
        };
        let mut offsets = [0.0; Category::COUNT];
        offsets[Category::Invoice.index()] = bias;
        offsets
    }
}

fn default_binary_bias() -> f64 {
    0.4
}

/// `[ingest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Largest accepted raw input, in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Suffix of the OCR sidecar file written next to PDFs and images.
    #[serde(default = "default_sidecar_suffix")]
    pub sidecar_suffix: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            sidecar_suffix: default_sidecar_suffix(),
        }
    }
}

fn default_max_bytes() -> u64 {
    50 * 1024 * 1024
}
fn default_sidecar_suffix() -> String {
    ".txt".into()
}

/// `[batch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum documents classified at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Whether results are written to the audit log.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Database path; `~` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: default_db_path(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_db_path() -> String {
    "~/.triage/triage.db".into()
}

/// `[review]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// JSON Lines outbox consumed by the escalation queue. Review items are
    /// only logged when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbox_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Validation and path helpers
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Reject values that would break classification invariants.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.classifier.review_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(TriageError::config(format!(
                "classifier.review_threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.classifier.max_evidence_tokens == 0 {
            return Err(TriageError::config(
                "classifier.max_evidence_tokens must be at least 1",
            ));
        }
        if let Some(t) = self.classifier.temperature {
            if !(t.is_finite() && t > 0.0) {
                return Err(TriageError::config(format!(
                    "classifier.temperature must be positive, got {t}"
                )));
            }
        }
        let bias = &self.classifier.format_bias;
        if ![bias.text, bias.pdf, bias.image].iter().all(|b| b.is_finite()) {
            return Err(TriageError::config("classifier.format_bias values must be finite"));
        }
        if self.batch.concurrency == 0 {
            return Err(TriageError::config("batch.concurrency must be at least 1"));
        }
        if self.ingest.max_bytes == 0 {
            return Err(TriageError::config("ingest.max_bytes must be at least 1"));
        }
        Ok(())
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.triage/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| TriageError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.triage/triage.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TriageError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        TriageError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TriageError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TriageError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TriageError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("review_threshold"));
        assert!(toml_str.contains("sidecar_suffix"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.classifier.review_threshold, 0.75);
        assert_eq!(parsed.batch.concurrency, 4);
        assert_eq!(parsed.ingest.max_bytes, 50 * 1024 * 1024);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[classifier]
review_threshold = 0.9

[classifier.format_bias]
pdf = 0.0

[review]
outbox_path = "/tmp/outbox.jsonl"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.classifier.review_threshold, 0.9);
        assert_eq!(config.classifier.max_evidence_tokens, 8);
        assert_eq!(config.classifier.format_bias.pdf, 0.0);
        assert_eq!(config.classifier.format_bias.image, 0.4);
        assert_eq!(config.review.outbox_path.as_deref(), Some("/tmp/outbox.jsonl"));
        assert!(config.storage.enabled);
    }

    #[test]
    fn validation_rejects_bad_threshold() {
        let mut config = AppConfig::default();
        config.classifier.review_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("review_threshold"));
    }

    #[test]
    fn validation_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.batch.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_non_positive_temperature() {
        let mut config = AppConfig::default();
        config.classifier.temperature = Some(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn format_bias_targets_invoice() {
        let bias = FormatBiasConfig::default();
        assert_eq!(bias.offsets(FileFormat::Pdf), [0.4, 0.0, 0.0]);
        assert_eq!(bias.offsets(FileFormat::Text), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn load_config_from_file_validates() {
        let path = std::env::temp_dir().join(format!("triage_cfg_{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&path, "[batch]\nconcurrency = 0\n").unwrap();
        let result = load_config_from(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.unwrap_err().to_string().contains("concurrency"));
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/var/db.sqlite"), PathBuf::from("/var/db.sqlite"));
    }
}
