//! Document ingestion: format detection, text acquisition and cleanup.
//!
//! This crate turns a file on disk (or inline text) into an immutable
//! [`Document`] ready for classification. OCR itself is an external
//! collaborator reached through [`TextExtractor`].

mod detect;
mod extract;
mod normalize;

use std::path::Path;

use tracing::{debug, instrument};

use triage_shared::{Document, FileFormat, IngestConfig, Result, TriageError};

pub use detect::detect_format;
pub use extract::{ChainExtractor, PlainTextExtractor, SidecarExtractor, TextExtractor};
pub use normalize::normalize_text;

/// Load a document from `path`: size check, format detection, text
/// extraction and normalization.
#[instrument(skip_all, fields(path = %path.display(), extractor = extractor.name()))]
pub fn load_document(
    path: &Path,
    config: &IngestConfig,
    extractor: &dyn TextExtractor,
) -> Result<Document> {
    let size = std::fs::metadata(path)
        .map_err(|e| TriageError::io(path, e))?
        .len();
    if size > config.max_bytes {
        return Err(TriageError::TooLarge {
            size,
            limit: config.max_bytes,
        });
    }

    let bytes = std::fs::read(path).map_err(|e| TriageError::io(path, e))?;
    let format = detect_format(&bytes, Some(path))?;
    let raw_text = extractor.extract(path, &bytes, format)?;
    let text = normalize_text(&raw_text);

    let source = path.display().to_string();
    if text.is_empty() {
        return Err(TriageError::empty(source));
    }

    debug!(%format, bytes = bytes.len(), chars = text.len(), "document loaded");
    Ok(Document::new(bytes, format, text, Some(source)))
}

/// Build a document from inline text with a declared format.
pub fn document_from_text(text: &str, format: FileFormat) -> Result<Document> {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return Err(TriageError::empty("<inline>"));
    }
    Ok(Document::new(
        text.as_bytes().to_vec(),
        format,
        normalized,
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("triage_ingest_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_and_normalizes_text_file() {
        let dir = temp_dir();
        let path = dir.join("ticket.txt");
        std::fs::write(&path, "I can't   log in\r\n\r\n\r\n\r\nplease help").unwrap();

        let doc = load_document(&path, &IngestConfig::default(), &ChainExtractor::new(".txt"))
            .unwrap();
        assert_eq!(doc.format(), FileFormat::Text);
        assert_eq!(doc.text(), "I can't log in\n\nplease help");
        assert_eq!(doc.source(), Some(path.display().to_string().as_str()));
        assert_eq!(doc.raw().len(), 35);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn pdf_uses_sidecar_text() {
        let dir = temp_dir();
        let path = dir.join("invoice.pdf");
        std::fs::write(&path, b"%PDF-1.4 binary").unwrap();
        std::fs::write(dir.join("invoice.pdf.txt"), "Invoice #1023, Total Due: $450.00").unwrap();

        let doc = load_document(&path, &IngestConfig::default(), &ChainExtractor::new(".txt"))
            .unwrap();
        assert_eq!(doc.format(), FileFormat::Pdf);
        assert!(doc.text().starts_with("Invoice #1023"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn oversized_input_rejected() {
        let dir = temp_dir();
        let path = dir.join("big.txt");
        std::fs::write(&path, "x".repeat(64)).unwrap();
        let config = IngestConfig {
            max_bytes: 16,
            ..IngestConfig::default()
        };

        let err = load_document(&path, &config, &PlainTextExtractor).unwrap_err();
        assert!(matches!(err, TriageError::TooLarge { size: 64, limit: 16 }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn blank_text_file_is_empty_document() {
        let dir = temp_dir();
        let path = dir.join("blank.txt");
        std::fs::write(&path, "   \n\n\t ").unwrap();

        let err = load_document(&path, &IngestConfig::default(), &PlainTextExtractor).unwrap_err();
        assert!(matches!(err, TriageError::EmptyDocument { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_document(
            Path::new("/nonexistent/triage/doc.txt"),
            &IngestConfig::default(),
            &PlainTextExtractor,
        )
        .unwrap_err();
        assert!(matches!(err, TriageError::Io { .. }));
    }

    #[test]
    fn inline_text_keeps_declared_format() {
        let doc = document_from_text("Invoice #1023, Total Due: $450.00", FileFormat::Pdf).unwrap();
        assert_eq!(doc.format(), FileFormat::Pdf);
        assert!(document_from_text("  \n ", FileFormat::Text).is_err());
    }
}
