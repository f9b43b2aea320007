//! Post-processing: deterministic cleanup of recognised text.
//!
//! Both OCR engines leave artefacts that do not belong in a spreadsheet
//! cell: vision models sometimes wrap the transcript in code fences despite
//! the prompt, tesseract emits form feeds and trailing blanks, and either may
//! produce `\r\n` line endings or zero-width characters.
//!
//! Rules (applied in order):
//! 1. Strip outer code fences
//! 2. Normalise line endings (CRLF / CR / form feed → LF)
//! 3. Trim trailing whitespace per line
//! 4. Collapse 3+ consecutive blank lines down to 1
//! 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 6. Trim leading/trailing blank lines

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to raw OCR output.
pub fn clean_ocr_text(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1 ───────────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-z]*\n(.*)\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2 ───────────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace(['\r', '\u{000C}'], "\n")
}

// ── Rule 3 ───────────────────────────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4 ───────────────────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5 ───────────────────────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences_with_and_without_language() {
        assert_eq!(clean_ocr_text("```text\nInvoice 42\n```"), "Invoice 42");
        assert_eq!(clean_ocr_text("```\nInvoice 42\n```\n"), "Invoice 42");
    }

    #[test]
    fn inner_fences_are_kept() {
        let input = "before\n```\ncode\n```\nafter";
        assert_eq!(clean_ocr_text(input), input);
    }

    #[test]
    fn tesseract_form_feed_and_crlf() {
        assert_eq!(clean_ocr_text("line one\r\nline two  \n\u{000C}"), "line one\nline two");
    }

    #[test]
    fn blank_runs_collapse() {
        assert_eq!(clean_ocr_text("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(clean_ocr_text("\u{FEFF}To\u{200B}tal"), "Total");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(clean_ocr_text("\n \n"), "");
    }
}
