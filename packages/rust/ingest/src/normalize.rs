//! Text cleanup pipeline applied to extracted document text.
//!
//! Each pass is a function `&str -> String` applied in sequence. OCR output
//! and forwarded e-mails arrive with CRLF endings, stray control characters,
//! leftover markup and ragged spacing; the classifier only wants words.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on raw extracted text.
pub fn normalize_text(raw: &str) -> String {
    let mut result = normalize_line_endings(raw);

    result = strip_control_chars(&result);
    result = strip_markup(&result);
    result = collapse_spaces(&result);
    result = clean_blank_lines(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings
// ---------------------------------------------------------------------------

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Control characters
// ---------------------------------------------------------------------------

/// Drop control characters except newline and tab; form feeds (page breaks
/// in PDF text) become newlines.
fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\n' | '\t' => Some(c),
            '\u{000C}' => Some('\n'),
            c if c.is_control() => None,
            '\u{FEFF}' | '\u{200B}' => None,
            c => Some(c),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 3: Leftover markup
// ---------------------------------------------------------------------------

/// Remove HTML tags from e-mail bodies, keeping inner text.
fn strip_markup(text: &str) -> String {
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?[a-zA-Z][a-zA-Z0-9]*(?:\s[^<>]*)?/?>").expect("valid regex")
    });
    static ENTITY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"&(nbsp|amp|lt|gt|quot|#39);").expect("valid regex"));

    let without_tags = TAG_RE.replace_all(text, " ");
    ENTITY_RE
        .replace_all(&without_tags, |caps: &regex::Captures| {
            match &caps[1] {
                "nbsp" => " ",
                "amp" => "&",
                "lt" => "<",
                "gt" => ">",
                "quot" => "\"",
                _ => "'",
            }
            .to_string()
        })
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Horizontal whitespace
// ---------------------------------------------------------------------------

/// Collapse runs of spaces/tabs into a single space and trim each line.
fn collapse_spaces(text: &str) -> String {
    static SPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").expect("valid regex"));

    text.lines()
        .map(|line| SPACE_RE.replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 5: Blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ newlines into a single blank line.
fn clean_blank_lines(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(text, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings_become_lf() {
        assert_eq!(normalize_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn control_chars_removed_form_feed_kept_as_break() {
        let input = "Page 1\u{000C}Page 2\u{0007}\u{FEFF}";
        assert_eq!(strip_control_chars(input), "Page 1\nPage 2");
    }

    #[test]
    fn markup_stripped_entities_decoded() {
        let input = "<p>Total&nbsp;Due: <b>$450</b> &amp; tax</p>";
        let result = collapse_spaces(&strip_markup(input));
        assert_eq!(result, "Total Due: $450 & tax");
    }

    #[test]
    fn comparison_operators_are_not_tags() {
        let input = "latency < 5 ms and > 2 ms";
        assert_eq!(strip_markup(input), input);
    }

    #[test]
    fn clean_blank_lines_collapses_excess() {
        assert_eq!(clean_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(clean_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn full_pipeline_cleans_ocr_text() {
        let input = "  Invoice   #1023\r\n\r\n\r\n\r\nTotal\tDue:   $450.00  \u{0000}";
        assert_eq!(normalize_text(input), "Invoice #1023\n\nTotal Due: $450.00");
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        assert_eq!(normalize_text(" \t\r\n \u{000C} "), "");
    }
}
