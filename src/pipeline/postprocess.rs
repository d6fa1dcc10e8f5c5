//! Post-processing: deterministic cleanup of OCR output and model responses.
//!
//! Two independent jobs live here:
//!
//! * [`clean_ocr_text`]: tidy tesseract output before it is concatenated.
//! * [`extract_json_payload`]: recover the JSON candidate from a free-text
//!   model response. The result is untrusted; the store decides whether it
//!   parses.

use once_cell::sync::Lazy;
use regex::Regex;

// ── OCR text ─────────────────────────────────────────────────────────────────

/// Apply the OCR cleanup rules in order:
/// 1. Normalise line endings (CRLF → LF)
/// 2. Drop the form feed tesseract appends after each page
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line and at the end
pub fn clean_ocr_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = s.replace('\u{000C}', "\n");
    let s = remove_invisible_chars(&s);
    trim_trailing_whitespace(&s)
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'))
        .collect()
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

// ── Model response ───────────────────────────────────────────────────────────

static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").unwrap());

/// Recover the JSON candidate from a model response.
///
/// Uses the contents of the first fenced code block when there is one
/// (with or without a language tag), otherwise the trimmed response.
pub fn extract_json_payload(response: &str) -> String {
    match RE_FENCED_BLOCK.captures(response) {
        Some(caps) => caps[1].trim().to_string(),
        None => response.trim().to_string(),
    }
}
