//! Error types for the edgequake-convert library.
//!
//! Three layers of failure, from widest to narrowest:
//!
//! * [`ConvertError`] — **Fatal** for a request: nothing was uploaded,
//!   nothing converted, or the scratch area could not be written. Returned as
//!   `Err(ConvertError)` from [`crate::orchestrator::run_batch`].
//!
//! * [`FileError`] — **Non-fatal**: one file of the batch could not be
//!   converted (tool/extension mismatch, routine failure, timeout). Stored in
//!   [`crate::orchestrator::FileReport`] so the rest of the batch continues.
//!
//! * [`RoutineError`] — raised inside a conversion routine by one of its
//!   collaborators (pdfium, OCR, spreadsheet codec, …). The dispatcher folds
//!   it into [`FileError::ConversionFailed`] after the routine's own fallback
//!   has already been attempted.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the orchestrator and configuration layer.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Batch errors ──────────────────────────────────────────────────────
    /// No files were uploaded, or none of them produced an output.
    #[error("{reason}")]
    EmptyBatch { reason: String },

    /// Writing an uploaded file into the scratch area failed.
    #[error("Failed to stage '{path}': {source}")]
    StagingFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scratch area itself could not be allocated.
    #[error("Failed to allocate scratch area under '{root}': {source}")]
    ScratchUnavailable {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading outputs back or building the zip bundle failed.
    #[error("Failed to package outputs: {0}")]
    PackagingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Short message suitable for a user-facing notice.
    pub fn notice(&self) -> String {
        match self {
            ConvertError::EmptyBatch { reason } => reason.clone(),
            ConvertError::StagingFailed { .. } | ConvertError::ScratchUnavailable { .. } => {
                "Upload could not be stored, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// A non-fatal error for a single file of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileError {
    /// The tool is unknown, or does not accept this file's extension.
    #[error("tool '{tool}' does not accept '{extension}' files")]
    UnsupportedCombination { tool: String, extension: String },

    /// The routine (including its fallback) did not produce an output.
    #[error("{routine} failed: {detail}")]
    ConversionFailed { routine: String, detail: String },

    /// The file (or the remaining batch budget) ran out of time.
    #[error("conversion timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Errors raised by collaborators inside a conversion routine.
#[derive(Debug, Error)]
pub enum RoutineError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// pdfium could not be loaded at all.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// pdfium could open the library but not the document or a page.
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Table extraction failed: {0}")]
    TableExtraction(String),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Presentation error: {0}")]
    Presentation(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTML renderer error: {0}")]
    Renderer(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoutineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RoutineError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for RoutineError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        RoutineError::Spreadsheet(e.to_string())
    }
}

impl From<calamine::Error> for RoutineError {
    fn from(e: calamine::Error) -> Self {
        RoutineError::Spreadsheet(e.to_string())
    }
}

impl From<zip::result::ZipError> for RoutineError {
    fn from(e: zip::result::ZipError) -> Self {
        RoutineError::Presentation(e.to_string())
    }
}

impl From<quick_xml::Error> for RoutineError {
    fn from(e: quick_xml::Error) -> Self {
        RoutineError::Presentation(e.to_string())
    }
}

/// OCR engine failures.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// The configured vision provider is not initialised (missing API key etc.).
    #[error("OCR provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The vision call failed after every retry.
    #[error("OCR call failed after {retries} retries: {detail}")]
    LlmFailed { retries: u32, detail: String },

    /// The vision call timed out.
    #[error("OCR call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The tesseract binary could not be run or exited non-zero.
    #[error("tesseract failed: {0}")]
    Tesseract(String),

    /// The page image could not be encoded for the engine.
    #[error("image encoding failed: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_combination_display() {
        let e = FileError::UnsupportedCombination {
            tool: "pdf_to_excel".into(),
            extension: "png".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pdf_to_excel"), "got: {msg}");
        assert!(msg.contains("png"), "got: {msg}");
    }

    #[test]
    fn file_error_serialises_with_kind_tag() {
        let e = FileError::Timeout { secs: 30 };
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"kind":"timeout","secs":30}"#);
    }

    #[test]
    fn empty_batch_notice_is_reason() {
        let e = ConvertError::EmptyBatch {
            reason: "No files uploaded".into(),
        };
        assert_eq!(e.notice(), "No files uploaded");
    }

    #[test]
    fn staging_notice_hides_paths() {
        let e = ConvertError::StagingFailed {
            path: "/tmp/secret/a.pdf".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(!e.notice().contains("/tmp/secret"));
    }

    #[test]
    fn ocr_error_wraps_into_routine_error() {
        let e: RoutineError = OcrError::Timeout { secs: 5 }.into();
        assert!(e.to_string().contains("5s"));
    }
}
