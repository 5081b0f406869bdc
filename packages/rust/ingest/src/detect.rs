//! File format detection: magic bytes first, then extension, then a UTF-8
//! sniff for extensionless text.

use std::path::Path;

use triage_shared::{FileFormat, Result, TriageError};

/// Extensions accepted as plain text.
const TEXT_EXTS: &[&str] = &["txt", "text", "md", "csv", "json", "eml", "log"];

/// Extensions accepted as images (what the OCR service can read).
const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

/// How many leading bytes the UTF-8 sniff inspects.
const SNIFF_LEN: usize = 8 * 1024;

/// Detect the format of `bytes`, optionally using the file name as a hint.
pub fn detect_format(bytes: &[u8], path: Option<&Path>) -> Result<FileFormat> {
    if let Some(format) = sniff_magic(bytes) {
        return Ok(format);
    }

    if let Some(ext) = path
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
    {
        if ext == "pdf" {
            return Ok(FileFormat::Pdf);
        }
        if IMAGE_EXTS.contains(&ext.as_str()) {
            return Ok(FileFormat::Image);
        }
        if TEXT_EXTS.contains(&ext.as_str()) {
            return Ok(FileFormat::Text);
        }
    }

    if looks_like_text(bytes) {
        return Ok(FileFormat::Text);
    }

    let name = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<inline>".to_string());
    Err(TriageError::unsupported(format!(
        "{name} is not text, PDF or a supported image"
    )))
}

/// Recognize PDF and image signatures.
fn sniff_magic(bytes: &[u8]) -> Option<FileFormat> {
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
    const TIFF_LE: &[u8] = &[b'I', b'I', 0x2A, 0x00];
    const TIFF_BE: &[u8] = &[b'M', b'M', 0x00, 0x2A];

    if bytes.starts_with(b"%PDF-") {
        return Some(FileFormat::Pdf);
    }
    if bytes.starts_with(PNG)
        || bytes.starts_with(JPEG)
        || bytes.starts_with(TIFF_LE)
        || bytes.starts_with(TIFF_BE)
        || is_bmp(bytes)
    {
        return Some(FileFormat::Image);
    }
    None
}

/// `BM`, file size, zeroed reserved words, pixel offset, and a known
/// info-header size. Two letters alone would match text such as "BMW ...".
fn is_bmp(bytes: &[u8]) -> bool {
    const DIB_HEADER_SIZES: &[u32] = &[12, 40, 52, 56, 64, 108, 124];

    if bytes.len() < 26 || !bytes.starts_with(b"BM") || bytes[6..10] != [0; 4] {
        return false;
    }
    let le_u32 = |at: usize| {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    };
    let pixel_offset = le_u32(10);
    let dib_size = le_u32(14);
    DIB_HEADER_SIZES.contains(&dib_size) && pixel_offset >= 14 + dib_size
}

/// Non-empty, NUL-free, valid UTF-8 in the leading window.
fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    let window = &bytes[..bytes.len().min(SNIFF_LEN)];
    if window.contains(&0) {
        return false;
    }
    match std::str::from_utf8(window) {
        Ok(_) => true,
        // A multi-byte char cut at the window edge is still text.
        Err(e) => e.error_len().is_none() && window.len() == SNIFF_LEN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_magic_wins_over_extension() {
        let bytes = b"%PDF-1.7\n...";
        let format = detect_format(bytes, Some(Path::new("note.txt"))).unwrap();
        assert_eq!(format, FileFormat::Pdf);
    }

    #[test]
    fn image_signatures() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(detect_format(&png, None).unwrap(), FileFormat::Image);
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00];
        assert_eq!(detect_format(&jpeg, None).unwrap(), FileFormat::Image);
        let tiff = [b'I', b'I', 0x2A, 0x00, 0x08];
        assert_eq!(detect_format(&tiff, None).unwrap(), FileFormat::Image);
    }

    #[test]
    fn bmp_needs_a_real_header() {
        let mut bmp = Vec::from(*b"BM");
        bmp.extend_from_slice(&58u32.to_le_bytes());
        bmp.extend_from_slice(&[0; 4]);
        bmp.extend_from_slice(&54u32.to_le_bytes());
        bmp.extend_from_slice(&40u32.to_le_bytes());
        bmp.extend_from_slice(&[0; 40]);
        assert_eq!(detect_format(&bmp, None).unwrap(), FileFormat::Image);

        let ticket = b"BMW service invoice #4471, amount due $420.00";
        assert_eq!(
            detect_format(ticket, Some(Path::new("note.txt"))).unwrap(),
            FileFormat::Text
        );
        assert_eq!(detect_format(ticket, None).unwrap(), FileFormat::Text);
    }

    #[test]
    fn extension_fallback() {
        let garbage = [0x00, 0x01, 0x02];
        assert_eq!(
            detect_format(&garbage, Some(Path::new("SCAN.TIFF"))).unwrap(),
            FileFormat::Image
        );
        assert_eq!(
            detect_format(&garbage, Some(Path::new("bill.pdf"))).unwrap(),
            FileFormat::Pdf
        );
    }

    #[test]
    fn extensionless_utf8_is_text() {
        let text = "Can we add dark mode?".as_bytes();
        assert_eq!(
            detect_format(text, Some(Path::new("ticket"))).unwrap(),
            FileFormat::Text
        );
    }

    #[test]
    fn binary_without_hint_is_unsupported() {
        let zip = [b'P', b'K', 0x03, 0x04, 0x00, 0x00];
        let err = detect_format(&zip, Some(Path::new("archive.zip"))).unwrap_err();
        assert!(matches!(err, TriageError::UnsupportedFormat { .. }));
    }

    #[test]
    fn empty_input_is_unsupported() {
        assert!(detect_format(&[], None).is_err());
    }
}
