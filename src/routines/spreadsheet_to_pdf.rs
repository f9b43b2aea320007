//! xls/xlsx → PDF through HTML, with a plain-text page as fallback.

use super::{blocking, output_path};
use crate::convert::ConversionContext;
use crate::error::RoutineError;
use crate::pipeline::html;
use crate::pipeline::workbook::{clip_chars, read_sheets, render_sheets_text};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Characters of sheet text drawn on the fallback page.
pub const FALLBACK_TEXT_CHARS: usize = 8000;

pub async fn run(
    input: &Path,
    out_dir: &Path,
    ctx: &ConversionContext,
) -> Result<PathBuf, RoutineError> {
    let path = input.to_path_buf();
    let sheets = blocking(move || read_sheets(&path)).await?;
    let out = output_path(out_dir, input, "", "pdf")?;

    if let Some(renderer) = ctx.config.html_renderer.as_deref() {
        let markup = html::sheets_to_html(&sheets);
        match html::render_pdf(renderer, &markup, &out).await {
            Ok(()) => {
                info!("{}: rendered {} sheets via HTML", input.display(), sheets.len());
                return Ok(out);
            }
            Err(e) => {
                warn!("{}: HTML rendering failed, using text page: {}", input.display(), e);
                // A failed engine may leave a partial file behind.
                let _ = tokio::fs::remove_file(&out).await;
            }
        }
    }

    let text = render_sheets_text(&sheets);
    ctx.pdf
        .write_text_page(clip_chars(&text, FALLBACK_TEXT_CHARS), &out)
        .await?;
    info!("{}: wrote text-page PDF", input.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::workbook::{write_workbook, OutputSheet};
    use crate::routines::testing::context;
    use tempfile::tempdir;

    fn workbook(dir: &Path, name: &str, sheets: &[OutputSheet]) -> PathBuf {
        let path = dir.join(name);
        write_workbook(&path, sheets).unwrap();
        path
    }

    #[tokio::test]
    async fn fallback_page_holds_every_sheet_as_text() {
        let dir = tempdir().unwrap();
        let mut first = OutputSheet::new("Q1");
        first.push_row(["region", "total"]);
        first.push_row(["north", "12"]);
        let mut second = OutputSheet::new("Q2");
        second.push_row(["south", "7"]);
        let input = workbook(dir.path(), "sales.xlsx", &[first, second]);

        let out = run(&input, dir.path(), &context()).await.unwrap();
        assert_eq!(out.file_name().unwrap(), "sales.pdf");

        // The stub engine writes the page text verbatim.
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("Q1\n"));
        assert!(text.contains("north     12"));
        assert!(text.contains("Q2\n"));
        assert!(!text.contains('<'), "fallback must not contain markup");
    }

    #[tokio::test]
    async fn fallback_text_is_clipped() {
        let dir = tempdir().unwrap();
        let mut sheet = OutputSheet::new("Big");
        for i in 0..2000 {
            sheet.push_row([format!("row-{i:05}"), "x".repeat(20)]);
        }
        let input = workbook(dir.path(), "big.xlsx", &[sheet]);

        let out = run(&input, dir.path(), &context()).await.unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text.chars().count(), FALLBACK_TEXT_CHARS);
    }

    #[tokio::test]
    async fn unreadable_workbook_fails() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("broken.xlsx");
        std::fs::write(&input, b"garbage").unwrap();
        assert!(run(&input, dir.path(), &context()).await.is_err());
    }
}
