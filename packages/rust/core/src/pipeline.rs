//! Classification pipeline: load → classify → record → route.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use triage_classifier::{Classifier, Explanation};
use triage_ingest::{
    ChainExtractor, SidecarExtractor, TextExtractor, document_from_text, load_document,
};
use triage_shared::{
    AppConfig, Category, ClassificationResult, Document, FileFormat, IngestConfig, Result,
    TriageError, expand_home,
};
use triage_storage::Storage;

use crate::review::{ReviewSink, review_sink_from_config};

/// Extensions whose text comes from an OCR sidecar file.
const SCANNED_EXTS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// Everything a classification run needs.
pub struct PipelineContext {
    pub classifier: Arc<Classifier>,
    pub ingest: IngestConfig,
    pub concurrency: usize,
    pub extractor: Arc<dyn TextExtractor>,
    pub storage: Option<Storage>,
    pub review: Arc<dyn ReviewSink>,
}

impl PipelineContext {
    /// Context without storage, using the configured extractor and review sink.
    pub fn new(classifier: Arc<Classifier>, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            classifier,
            ingest: config.ingest.clone(),
            concurrency: config.batch.concurrency.max(1),
            extractor: Arc::new(ChainExtractor::new(config.ingest.sidecar_suffix.clone())),
            storage: None,
            review: review_sink_from_config(&config.review)?,
        })
    }

    /// Build the classifier from config and open storage when enabled.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let classifier_config = config.classifier.clone();
        let classifier =
            tokio::task::spawn_blocking(move || Classifier::from_config(&classifier_config))
                .await
                .map_err(|e| TriageError::Task(e.to_string()))??;

        let mut ctx = Self::new(Arc::new(classifier), config)?;
        if config.storage.enabled {
            let db_path = expand_home(&config.storage.db_path);
            ctx.storage = Some(Storage::open(&db_path).await?);
        }
        Ok(ctx)
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_review_sink(mut self, review: Arc<dyn ReviewSink>) -> Self {
        self.review = review;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Escalate the result when it needs review, then record it.
    ///
    /// Both steps always run; a failed history write never drops an
    /// escalation. The first error is returned.
    async fn finish(
        &self,
        document: &Document,
        result: ClassificationResult,
    ) -> Result<ClassificationResult> {
        let routed = if result.needs_review() {
            self.review.submit(&result, document.source())
        } else {
            Ok(())
        };
        if let Err(e) = &routed {
            warn!(
                document_id = %result.document_id(),
                sink = self.review.name(),
                error = %e,
                "review routing failed"
            );
        }

        let recorded = match &self.storage {
            Some(storage) => {
                storage
                    .record_result(&result, document.source(), Some(document.content_hash()))
                    .await
            }
            None => Ok(()),
        };
        if let Err(e) = &recorded {
            warn!(document_id = %result.document_id(), error = %e, "history write failed");
        }

        routed?;
        recorded?;
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Single documents
// ---------------------------------------------------------------------------

fn analyze(
    path: &Path,
    classifier: &Classifier,
    extractor: &dyn TextExtractor,
    ingest: &IngestConfig,
) -> Result<(Document, ClassificationResult)> {
    let document = load_document(path, ingest, extractor)?;
    let result = classifier.classify(&document)?;
    Ok((document, result))
}

async fn analyze_blocking(
    path: PathBuf,
    ctx: &PipelineContext,
) -> Result<(Document, ClassificationResult)> {
    let classifier = Arc::clone(&ctx.classifier);
    let extractor = Arc::clone(&ctx.extractor);
    let ingest = ctx.ingest.clone();
    tokio::task::spawn_blocking(move || analyze(&path, &classifier, extractor.as_ref(), &ingest))
        .await
        .map_err(|e| TriageError::Task(e.to_string()))?
}

/// Classify one file.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn classify_path(path: &Path, ctx: &PipelineContext) -> Result<ClassificationResult> {
    let (document, result) = analyze_blocking(path.to_path_buf(), ctx).await?;
    ctx.finish(&document, result).await
}

/// Classify inline text with a declared format.
#[instrument(skip_all, fields(format = %format, chars = text.len()))]
pub async fn classify_text(
    text: &str,
    format: FileFormat,
    ctx: &PipelineContext,
) -> Result<ClassificationResult> {
    let document = document_from_text(text, format)?;
    let result = ctx.classifier.classify(&document)?;
    ctx.finish(&document, result).await
}

/// Score breakdown for one file, computed from the same extracted and
/// normalized text [`classify_path`] classifies. Nothing is recorded.
pub async fn explain_path(path: &Path, ctx: &PipelineContext) -> Result<Explanation> {
    let classifier = Arc::clone(&ctx.classifier);
    let extractor = Arc::clone(&ctx.extractor);
    let ingest = ctx.ingest.clone();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let document = load_document(&path, &ingest, extractor.as_ref())?;
        Ok(classifier.explain(document.text(), document.format()))
    })
    .await
    .map_err(|e| TriageError::Task(e.to_string()))?
}

/// Score breakdown for inline text after the same normalization
/// [`classify_text`] applies. Nothing is recorded.
pub fn explain_text(text: &str, format: FileFormat, ctx: &PipelineContext) -> Result<Explanation> {
    let document = document_from_text(text, format)?;
    Ok(ctx.classifier.explain(document.text(), document.format()))
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// Outcome for one input of a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub outcome: Result<ClassificationResult>,
}

/// All outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    pub elapsed: Duration,
}

/// Counts over a [`BatchReport`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub classified: usize,
    pub failed: usize,
    pub needs_review: usize,
    pub per_category: BTreeMap<Category, usize>,
    pub elapsed_ms: u128,
}

impl BatchReport {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.items.len(),
            elapsed_ms: self.elapsed.as_millis(),
            per_category: Category::ALL.iter().map(|c| (*c, 0)).collect(),
            ..BatchSummary::default()
        };
        for item in &self.items {
            match &item.outcome {
                Ok(result) => {
                    summary.classified += 1;
                    if result.needs_review() {
                        summary.needs_review += 1;
                    }
                    *summary.per_category.entry(result.document_type()).or_insert(0) += 1;
                }
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Progress callback for batch runs.
pub trait ProgressReporter: Send + Sync {
    /// Called once before any document is processed.
    fn started(&self, total: usize);
    /// Called as each document finishes, in input order.
    fn document_done(&self, path: &Path, current: usize, total: usize, ok: bool);
    /// Called when the batch completes.
    fn done(&self, report: &BatchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn started(&self, _total: usize) {}
    fn document_done(&self, _path: &Path, _current: usize, _total: usize, _ok: bool) {}
    fn done(&self, _report: &BatchReport) {}
}

/// Classify many files in parallel. A failing document is reported in its
/// slot and never stops the others.
#[instrument(skip_all, fields(documents = paths.len(), concurrency = ctx.concurrency))]
pub async fn classify_batch(
    paths: &[PathBuf],
    ctx: &PipelineContext,
    progress: &dyn ProgressReporter,
) -> BatchReport {
    let start = Instant::now();
    let total = paths.len();
    progress.started(total);

    let semaphore = Arc::new(Semaphore::new(ctx.concurrency.max(1)));
    let mut handles = Vec::with_capacity(total);

    for path in paths {
        let sem = Arc::clone(&semaphore);
        let classifier = Arc::clone(&ctx.classifier);
        let extractor = Arc::clone(&ctx.extractor);
        let ingest = ctx.ingest.clone();
        let path = path.clone();

        handles.push(tokio::spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| TriageError::Task(e.to_string()))?;
            tokio::task::spawn_blocking(move || {
                analyze(&path, &classifier, extractor.as_ref(), &ingest)
            })
            .await
            .map_err(|e| TriageError::Task(e.to_string()))?
        }));
    }

    // Storage writes and routing stay on this task.
    let mut items = Vec::with_capacity(total);
    for (i, (path, handle)) in paths.iter().zip(handles).enumerate() {
        let outcome = match handle.await {
            Ok(Ok((document, result))) => ctx.finish(&document, result).await,
            Ok(Err(e)) => Err(e),
            Err(e) => Err(TriageError::Task(e.to_string())),
        };
        if let Err(e) = &outcome {
            warn!(path = %path.display(), error = %e, "document failed");
        }
        progress.document_done(path, i + 1, total, outcome.is_ok());
        items.push(BatchItem {
            path: path.clone(),
            outcome,
        });
    }

    let report = BatchReport {
        items,
        elapsed: start.elapsed(),
    };
    let summary = report.summary();
    info!(
        classified = summary.classified,
        failed = summary.failed,
        needs_review = summary.needs_review,
        elapsed_ms = summary.elapsed_ms as u64,
        "batch complete"
    );
    progress.done(&report);
    report
}

/// Expand directories (one level, sorted) and drop OCR sidecar files whose
/// scanned original is also part of the input.
pub fn collect_inputs(paths: &[PathBuf], sidecar_suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(|e| TriageError::io(path, e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            entries.sort();
            files.extend(entries);
        } else {
            files.push(path.clone());
        }
    }

    let sidecars = SidecarExtractor::new(sidecar_suffix);
    let skip: HashSet<PathBuf> = files
        .iter()
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SCANNED_EXTS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .flat_map(|p| sidecars.candidates(p))
        .collect();

    let before = files.len();
    files.retain(|p| !skip.contains(p));
    debug!(inputs = files.len(), sidecars = before - files.len(), "collected inputs");
    Ok(files)
}
