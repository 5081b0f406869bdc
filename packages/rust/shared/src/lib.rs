//! Shared types, error model, and configuration for Triage.
//!
//! This crate is the foundation depended on by all other Triage crates.
//! It provides:
//! - [`TriageError`], the unified error type
//! - Domain types ([`Document`], [`Category`], [`FileFormat`], [`ClassificationResult`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchConfig, ClassifierConfig, FormatBiasConfig, IngestConfig, ReviewConfig,
    StorageConfig, config_dir, config_file_path, expand_home, init_config, load_config,
    load_config_from,
};
pub use error::{Result, TriageError};
pub use types::{
    Category, CategoryScores, ClassificationResult, Disposition, Document, DocumentId,
    FileFormat, sha256_hex,
};
