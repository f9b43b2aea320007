//! Library-level conversion tests.
//!
//! Office-format tools run everywhere. Tests that need pdfium skip when the
//! library cannot be bound (set `PDFIUM_LIB_PATH` to run them).

use edgequake_convert::pipeline::ocr::UnavailableOcr;
use edgequake_convert::pipeline::pdf::{PdfEngine, PdfiumEngine};
use edgequake_convert::pipeline::render::bind_pdfium;
use edgequake_convert::pipeline::workbook::{read_sheets, write_workbook, OutputSheet};
use edgequake_convert::{
    convert_files, dispatch, ConversionConfig, ConversionContext, FileError, NoopProgressCallback,
    OcrError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn context() -> ConversionContext {
    let mut builder = ConversionConfig::builder().html_renderer(None);
    if let Ok(lib) = std::env::var("PDFIUM_LIB_PATH") {
        builder = builder.pdfium_lib_path(lib);
    }
    let config = builder.build().unwrap();
    let pdf = Arc::new(PdfiumEngine::new(&config));
    let ocr = Arc::new(UnavailableOcr::new(OcrError::Tesseract("not in tests".into())));
    ConversionContext::with_engines(config, ocr, pdf)
}

/// Skip the calling test when pdfium is not available on this machine.
macro_rules! skip_without_pdfium {
    () => {{
        let lib = std::env::var("PDFIUM_LIB_PATH").ok().map(PathBuf::from);
        if bind_pdfium(lib.as_deref()).is_err() {
            println!("SKIP — pdfium not bindable, set PDFIUM_LIB_PATH");
            return;
        }
    }};
}

fn budget_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("budget.xlsx");
    let mut q1 = OutputSheet::new("Q1");
    q1.push_row(["item", "cost"]);
    q1.push_row(["rent", "1200"]);
    q1.push_row(["power", "85"]);
    let mut q2 = OutputSheet::new("Q2");
    q2.push_row(["item", "cost"]);
    q2.push_row(["rent", "1250"]);
    write_workbook(&path, &[q1, q2]).unwrap();
    path
}

// ── Office formats ───────────────────────────────────────────────────────────

#[tokio::test]
async fn workbook_to_presentation_and_back() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    let ctx = context();

    let input = budget_workbook(dir.path());
    let deck = dispatch(&input, "xlsx_to_pptx", &out, &ctx).await.unwrap();
    assert_eq!(deck.file_name().unwrap(), "budget.pptx");

    let sheet = dispatch(&deck, "pptx_to_xlsx", &out, &ctx).await.unwrap();
    assert_eq!(sheet.file_name().unwrap(), "budget.xlsx");

    let rows = &read_sheets(&sheet).unwrap()[0].rows;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec!["slide", "text"]);
    assert_eq!(rows[1][0], "1");
    assert!(rows[1][1].starts_with("Q1\n"));
    assert!(rows[1][1].contains("rent  1200"));
    assert!(rows[2][1].starts_with("Q2\n"));
}

#[tokio::test]
async fn batch_keeps_upload_order_and_isolates_failures() {
    let dir = TempDir::new().unwrap();
    let ctx = context();
    let good = budget_workbook(dir.path());
    let broken = dir.path().join("broken.xlsx");
    std::fs::write(&broken, b"not a workbook").unwrap();
    let wrong = dir.path().join("deck.pptx");
    std::fs::write(&wrong, b"PK").unwrap();

    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    let inputs = vec![broken.clone(), good.clone(), wrong.clone()];
    let results = convert_files(&inputs, "xlsx_to_pptx", &out, &ctx, &NoopProgressCallback).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].input, broken);
    match &results[0].result {
        Err(FileError::ConversionFailed { routine, .. }) => {
            assert_eq!(routine, "spreadsheet_to_presentation")
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(results[1].result.is_ok());
    assert_eq!(
        results[2].result,
        Err(FileError::UnsupportedCombination {
            tool: "xlsx_to_pptx".into(),
            extension: "pptx".into(),
        })
    );
}

// ── pdfium-backed tools ──────────────────────────────────────────────────────

#[tokio::test]
async fn workbook_to_pdf_falls_back_to_text_page() {
    skip_without_pdfium!();
    let dir = TempDir::new().unwrap();
    let ctx = context();
    let input = budget_workbook(dir.path());

    let out = dispatch(&input, "excel_to_pdf", dir.path(), &ctx).await.unwrap();
    assert_eq!(out.file_name().unwrap(), "budget.pdf");
    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn text_pdf_without_tables_needs_ocr() {
    skip_without_pdfium!();
    let dir = TempDir::new().unwrap();
    let ctx = context();
    let input = budget_workbook(dir.path());
    let pdf = dispatch(&input, "excel_to_pdf", dir.path(), &ctx).await.unwrap();

    // The fallback page is one fixed-width column per line, so any table
    // found is real; with OCR unavailable the only other outcome is failure.
    match dispatch(&pdf, "pdf_to_excel", dir.path(), &ctx).await {
        Ok(xlsx) => assert_eq!(xlsx.extension().unwrap(), "xlsx"),
        Err(FileError::ConversionFailed { routine, .. }) => {
            assert_eq!(routine, "pdf_to_spreadsheet")
        }
        Err(other) => panic!("unexpected {other}"),
    }
}

#[tokio::test]
async fn text_page_draws_every_line_of_the_clip() {
    skip_without_pdfium!();
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("page.pdf");
    // 80 lines of 100 characters, the fallback's full budget.
    let text: String = (0..80)
        .map(|i| format!("line-{i:03} {}\n", "x".repeat(90)))
        .collect();
    assert_eq!(text.chars().count(), 8000);

    let ctx = context();
    ctx.pdf.write_text_page(&text, &out).await.unwrap();

    let lib = std::env::var("PDFIUM_LIB_PATH").ok().map(PathBuf::from);
    let pdfium = bind_pdfium(lib.as_deref()).unwrap();
    let document = pdfium.load_pdf_from_file(&out, None).unwrap();
    assert_eq!(document.pages().len(), 1);
    let drawn = document.pages().get(0).unwrap().text().unwrap().all();
    assert!(drawn.contains("line-000"));
    assert!(drawn.contains("line-079"), "last line missing");
}
