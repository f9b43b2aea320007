//! PDF → xlsx: extracted tables, or OCR text when there are none.

use super::{blocking, output_path};
use crate::convert::ConversionContext;
use crate::error::RoutineError;
use crate::pipeline::tables::Table;
use crate::pipeline::workbook::{write_workbook, OutputSheet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One sheet per extracted table (`sheet1..N`, in extraction order) written
/// to `<stem>.xlsx`.
///
/// With no tables, or if extraction fails, every page is rasterised and
/// OCR'd instead: one `page_text` column, one row per page, written to
/// `<stem>_ocr.xlsx`.
pub async fn run(
    input: &Path,
    out_dir: &Path,
    ctx: &ConversionContext,
) -> Result<PathBuf, RoutineError> {
    match ctx.pdf.extract_tables(input).await {
        Ok(tables) if !tables.is_empty() => {
            info!("{}: {} tables found", input.display(), tables.len());
            return write_tables(input, out_dir, tables).await;
        }
        Ok(_) => info!("{}: no tables, falling back to OCR", input.display()),
        Err(e) => warn!(
            "{}: table extraction failed, falling back to OCR: {}",
            input.display(),
            e
        ),
    }
    ocr_pages(input, out_dir, ctx).await
}

async fn write_tables(
    input: &Path,
    out_dir: &Path,
    tables: Vec<Table>,
) -> Result<PathBuf, RoutineError> {
    let sheets: Vec<OutputSheet> = tables
        .into_iter()
        .enumerate()
        .map(|(i, table)| {
            let mut sheet = OutputSheet::new(format!("sheet{}", i + 1));
            for row in table {
                sheet.push_row(row);
            }
            sheet
        })
        .collect();

    let out = output_path(out_dir, input, "", "xlsx")?;
    let target = out.clone();
    blocking(move || write_workbook(&target, &sheets)).await?;
    Ok(out)
}

async fn ocr_pages(
    input: &Path,
    out_dir: &Path,
    ctx: &ConversionContext,
) -> Result<PathBuf, RoutineError> {
    let pages = ctx.pdf.render_pages(input).await?;
    let total = pages.len();

    let mut sheet = OutputSheet::new("Sheet1");
    sheet.push_row(["page_text"]);
    for (idx, page) in pages.iter().enumerate() {
        let text = ctx.ocr.recognize(page).await?;
        info!(
            "{}: OCR page {}/{} ({} chars, {})",
            input.display(),
            idx + 1,
            total,
            text.len(),
            ctx.ocr.name()
        );
        sheet.push_row([text]);
    }

    let out = output_path(out_dir, input, "_ocr", "xlsx")?;
    let target = out.clone();
    blocking(move || write_workbook(&target, &[sheet])).await?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::workbook::read_sheets;
    use crate::routines::testing::{context_with, StubOcr, StubPdf};
    use tempfile::tempdir;

    fn table(rows: &[&[&str]]) -> Table {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[tokio::test]
    async fn one_sheet_per_table_in_order() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("report.pdf");
        let pdf = StubPdf {
            tables: vec![
                table(&[&["a", "b"], &["1", "2"]]),
                table(&[&["x", "y", "z"], &["7", "8", "9"]]),
                table(&[&["k", "v"], &["p", "q"]]),
            ],
            ..Default::default()
        };
        let ctx = context_with(StubOcr("unused".into()), pdf);

        let out = run(&input, dir.path(), &ctx).await.unwrap();
        assert_eq!(out.file_name().unwrap(), "report.xlsx");

        let sheets = read_sheets(&out).unwrap();
        let names: Vec<_> = sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["sheet1", "sheet2", "sheet3"]);
        assert_eq!(sheets[1].rows, table(&[&["x", "y", "z"], &["7", "8", "9"]]));
    }

    #[tokio::test]
    async fn no_tables_falls_back_to_page_ocr() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("scan.pdf");
        let pdf = StubPdf {
            pages: 3,
            ..Default::default()
        };
        let ctx = context_with(StubOcr("page words".into()), pdf);

        let out = run(&input, dir.path(), &ctx).await.unwrap();
        assert_eq!(out.file_name().unwrap(), "scan_ocr.xlsx");

        let sheets = read_sheets(&out).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].rows.len(), 4);
        assert_eq!(sheets[0].rows[0], vec!["page_text"]);
        assert!(sheets[0].rows[1..].iter().all(|r| r == &vec!["page words"]));
    }

    #[tokio::test]
    async fn extraction_error_falls_back_to_page_ocr() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("odd.pdf");
        let pdf = StubPdf {
            fail_tables: true,
            pages: 1,
            ..Default::default()
        };
        let ctx = context_with(StubOcr("text".into()), pdf);

        let out = run(&input, dir.path(), &ctx).await.unwrap();
        assert_eq!(out.file_name().unwrap(), "odd_ocr.xlsx");
    }
}
