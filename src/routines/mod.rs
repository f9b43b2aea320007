//! The six conversion routines.
//!
//! Each routine reads one staged input and writes one output into the
//! output directory, named after the input's stem. A routine that has a
//! fallback (PDF tables → OCR, HTML engine → text page) tries it before
//! reporting an error.

pub mod image_convert;
pub mod image_to_spreadsheet;
pub mod pdf_to_spreadsheet;
pub mod presentation_to_spreadsheet;
pub mod spreadsheet_to_pdf;
pub mod spreadsheet_to_presentation;

use crate::convert::ConversionContext;
use crate::error::RoutineError;
use crate::registry::Routine;
use std::path::{Path, PathBuf};

/// Run `routine` on `input`, writing into `out_dir`.
pub async fn run(
    routine: Routine,
    input: &Path,
    out_dir: &Path,
    ctx: &ConversionContext,
) -> Result<PathBuf, RoutineError> {
    match routine {
        Routine::PdfToSpreadsheet => pdf_to_spreadsheet::run(input, out_dir, ctx).await,
        Routine::SpreadsheetToPdf => spreadsheet_to_pdf::run(input, out_dir, ctx).await,
        Routine::ImageToSpreadsheet => image_to_spreadsheet::run(input, out_dir, ctx).await,
        Routine::ImageFormatConvert => image_convert::run(input, out_dir).await,
        Routine::PresentationToSpreadsheet => {
            presentation_to_spreadsheet::run(input, out_dir).await
        }
        Routine::SpreadsheetToPresentation => {
            spreadsheet_to_presentation::run(input, out_dir).await
        }
    }
}

/// `<out_dir>/<stem><suffix>.<ext>`, numbered `_2`, `_3`, … if taken.
pub(crate) fn output_path(
    out_dir: &Path,
    input: &Path,
    suffix: &str,
    ext: &str,
) -> Result<PathBuf, RoutineError> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RoutineError::Internal(format!("no file stem: {}", input.display())))?;

    let mut candidate = out_dir.join(format!("{stem}{suffix}.{ext}"));
    let mut n = 2;
    while candidate.exists() {
        candidate = out_dir.join(format!("{stem}{suffix}_{n}.{ext}"));
        n += 1;
    }
    Ok(candidate)
}

/// Run CPU-bound codec work on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, RoutineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RoutineError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RoutineError::Internal(format!("worker task failed: {e}")))?
}
