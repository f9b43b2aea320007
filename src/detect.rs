//! Format detection and filename sanitisation for uploaded files.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Extensions accepted for staging. Anything else is skipped before dispatch.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "xls", "xlsx", "jpg", "jpeg", "png", "ppt", "pptx",
];

/// Recognised document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Spreadsheet,
    Image,
    Presentation,
}

impl FileKind {
    /// Map a lowercase extension to its kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(FileKind::Pdf),
            "xls" | "xlsx" => Some(FileKind::Spreadsheet),
            "jpg" | "jpeg" | "png" => Some(FileKind::Image),
            "ppt" | "pptx" => Some(FileKind::Presentation),
            _ => None,
        }
    }

    /// Returns a human-readable name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            FileKind::Pdf => "PDF Document",
            FileKind::Spreadsheet => "Excel Workbook",
            FileKind::Image => "Image",
            FileKind::Presentation => "PowerPoint Presentation",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Lowercase suffix after the last `.` of `filename`.
///
/// Returns `None` when there is no dot or nothing follows it.
pub fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

/// True if `filename` carries one of [`ALLOWED_EXTENSIONS`].
pub fn is_allowed(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap());

/// Reduce an uploaded filename to a safe, flat ASCII name.
///
/// Path separators become spaces, accents are folded (NFKD, non-ASCII
/// dropped), whitespace runs become `_`, and anything outside
/// `[A-Za-z0-9_.-]` is removed. Leading/trailing `.` and `_` are stripped so
/// the result can never be `..` or a hidden file. `None` if nothing is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let flat = ascii.replace(['/', '\\'], " ");
    let joined = flat.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = UNSAFE_CHARS.replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
