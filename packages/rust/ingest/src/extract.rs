//! Text acquisition from the ingestion/OCR collaborator.
//!
//! Turning PDFs and images into text is done by an external service. Its
//! output reaches us as a sidecar text file written next to the original;
//! plain-text documents are read directly.

use std::path::{Path, PathBuf};

use tracing::debug;

use triage_shared::{FileFormat, Result, TriageError};

/// Source of extracted text for a raw document.
pub trait TextExtractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Return the raw (un-normalized) text for the document at `path`.
    fn extract(&self, path: &Path, bytes: &[u8], format: FileFormat) -> Result<String>;
}

/// Reads text documents as UTF-8 (lossy).
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn extract(&self, path: &Path, bytes: &[u8], format: FileFormat) -> Result<String> {
        if format != FileFormat::Text {
            return Err(TriageError::Extraction(format!(
                "{} is a {format} document with no text layer",
                path.display()
            )));
        }
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Reads the text the OCR service wrote next to a PDF or image.
#[derive(Debug, Clone)]
pub struct SidecarExtractor {
    suffix: String,
}

impl SidecarExtractor {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// Candidate sidecar paths, most specific first: `scan.png.txt`, then
    /// `scan.txt`.
    pub fn candidates(&self, path: &Path) -> Vec<PathBuf> {
        let mut out = Vec::with_capacity(2);
        let mut appended = path.as_os_str().to_owned();
        appended.push(&self.suffix);
        out.push(PathBuf::from(appended));

        if let Some(stem) = path.file_stem() {
            let mut replaced = stem.to_owned();
            replaced.push(&self.suffix);
            let sibling = path.with_file_name(replaced);
            if sibling != path && !out.contains(&sibling) {
                out.push(sibling);
            }
        }
        out
    }
}

impl TextExtractor for SidecarExtractor {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    fn extract(&self, path: &Path, _bytes: &[u8], _format: FileFormat) -> Result<String> {
        let candidates = self.candidates(path);
        for candidate in &candidates {
            if candidate.is_file() {
                debug!(sidecar = %candidate.display(), "reading OCR sidecar");
                let bytes =
                    std::fs::read(candidate).map_err(|e| TriageError::io(candidate, e))?;
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
        }
        Err(TriageError::Extraction(format!(
            "no extracted text for {}; expected OCR output at {}",
            path.display(),
            candidates[0].display()
        )))
    }
}

/// Plain text for text documents, sidecar for everything else.
#[derive(Debug, Clone)]
pub struct ChainExtractor {
    plain: PlainTextExtractor,
    sidecar: SidecarExtractor,
}

impl ChainExtractor {
    pub fn new(sidecar_suffix: impl Into<String>) -> Self {
        Self {
            plain: PlainTextExtractor,
            sidecar: SidecarExtractor::new(sidecar_suffix),
        }
    }
}

impl TextExtractor for ChainExtractor {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn extract(&self, path: &Path, bytes: &[u8], format: FileFormat) -> Result<String> {
        match format {
            FileFormat::Text => self.plain.extract(path, bytes, format),
            FileFormat::Pdf | FileFormat::Image => self.sidecar.extract(path, bytes, format),
        }
    }
}
