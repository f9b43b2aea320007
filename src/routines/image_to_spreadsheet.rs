//! Image → xlsx via OCR.

use super::{blocking, output_path};
use crate::convert::ConversionContext;
use crate::error::RoutineError;
use crate::pipeline::workbook::{write_workbook, OutputSheet};
use image::{DynamicImage, ImageReader};
use std::path::{Path, PathBuf};
use tracing::info;

/// One `text` column holding everything OCR found, in `<stem>.xlsx`.
pub async fn run(
    input: &Path,
    out_dir: &Path,
    ctx: &ConversionContext,
) -> Result<PathBuf, RoutineError> {
    let path = input.to_path_buf();
    let image = blocking(move || decode(&path)).await?;
    let text = ctx.ocr.recognize(&image).await?;
    info!(
        "{}: {} chars recognised by {}",
        input.display(),
        text.len(),
        ctx.ocr.name()
    );

    let mut sheet = OutputSheet::new("Sheet1");
    sheet.push_row(["text"]);
    sheet.push_row([text]);

    let out = output_path(out_dir, input, "", "xlsx")?;
    let target = out.clone();
    blocking(move || write_workbook(&target, &[sheet])).await?;
    Ok(out)
}

/// Decode by content rather than trusting the extension.
pub(crate) fn decode(path: &Path) -> Result<DynamicImage, RoutineError> {
    let reader = ImageReader::open(path)
        .map_err(|e| RoutineError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| RoutineError::io(path, e))?;
    Ok(reader.decode()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::workbook::read_sheets;
    use crate::routines::testing::{context_with, write_png, StubOcr, StubPdf};
    use tempfile::tempdir;

    #[tokio::test]
    async fn text_lands_under_header() {
        let dir = tempdir().unwrap();
        let input = write_png(dir.path(), "receipt.png");
        let ctx = context_with(StubOcr("TOTAL 9.99".into()), StubPdf::default());

        let out = run(&input, dir.path(), &ctx).await.unwrap();
        assert_eq!(out.file_name().unwrap(), "receipt.xlsx");

        let sheets = read_sheets(&out).unwrap();
        assert_eq!(sheets[0].rows, vec![vec!["text"], vec!["TOTAL 9.99"]]);
    }

    #[tokio::test]
    async fn ocr_failure_propagates() {
        let dir = tempdir().unwrap();
        let input = write_png(dir.path(), "a.png");
        let ctx = context_with(
            crate::pipeline::ocr::UnavailableOcr::new(crate::error::OcrError::Tesseract(
                "missing".into(),
            )),
            StubPdf::default(),
        );
        let err = run(&input, dir.path(), &ctx).await.unwrap_err();
        assert!(matches!(err, RoutineError::Ocr(_)));
    }
}
