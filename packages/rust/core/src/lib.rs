//! Classification workflows for Triage.
//!
//! This crate ties ingestion, the classifier, the history database and the
//! review queue together into single-document and batch pipelines.

pub mod pipeline;
pub mod review;

pub use pipeline::{
    BatchItem, BatchReport, BatchSummary, PipelineContext, ProgressReporter, SilentProgress,
    classify_batch, classify_path, classify_text, collect_inputs, explain_path, explain_text,
};
pub use review::{JsonlReviewSink, LogReviewSink, ReviewSink, review_sink_from_config};
