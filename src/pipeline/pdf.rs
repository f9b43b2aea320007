//! The PDF collaborator used by the conversion routines.
//!
//! [`PdfEngine`] groups the three things the routines ask of a PDF library:
//! find tables, rasterise pages for OCR, and draw a plain-text page.
//! [`PdfiumEngine`] is the production implementation; tests substitute
//! their own.

use crate::config::ConversionConfig;
use crate::error::RoutineError;
use crate::pipeline::render::{bind_pdfium, render_all_pages_blocking};
use crate::pipeline::tables::{extract_tables_blocking, Table};
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Margin on every side of the plain-text page, in points (half an inch).
const TEXT_PAGE_MARGIN: f32 = 36.0;
/// A4 in points.
const A4_WIDTH: f32 = 595.0;
const A4_HEIGHT: f32 = 842.0;
/// Font sizes tried for the text page, largest first, in points.
const MAX_FONT_SIZE: f32 = 8.0;
const MIN_FONT_SIZE: f32 = 1.0;
const FONT_SIZE_STEP: f32 = 0.5;
/// Courier advances every glyph by 0.6 em.
const COURIER_ADVANCE: f32 = 0.6;
const LINE_SPACING: f32 = 1.25;

#[async_trait]
pub trait PdfEngine: Send + Sync {
    /// Every table of every page, in extraction order.
    async fn extract_tables(&self, pdf: &Path) -> Result<Vec<Table>, RoutineError>;

    /// One raster image per page, in page order.
    async fn render_pages(&self, pdf: &Path) -> Result<Vec<DynamicImage>, RoutineError>;

    /// Write a single A4 page with `text` drawn in a monospace font,
    /// wrapped and scaled down until it fits.
    async fn write_text_page(&self, text: &str, out: &Path) -> Result<(), RoutineError>;
}

/// [`PdfEngine`] backed by pdfium. Binds the library per call.
#[derive(Debug, Clone)]
pub struct PdfiumEngine {
    lib_path: Option<PathBuf>,
    dpi: u32,
    max_pixels: u32,
}

impl PdfiumEngine {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            lib_path: config.pdfium_lib_path.clone(),
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
        }
    }

    /// Run `f` with a bound pdfium on the blocking pool.
    async fn with_pdfium<T, F>(&self, f: F) -> Result<T, RoutineError>
    where
        T: Send + 'static,
        F: FnOnce(&Pdfium) -> Result<T, RoutineError> + Send + 'static,
    {
        let lib_path = self.lib_path.clone();
        tokio::task::spawn_blocking(move || {
            let pdfium = bind_pdfium(lib_path.as_deref())?;
            f(&pdfium)
        })
        .await
        .map_err(|e| RoutineError::Internal(format!("pdfium task panicked: {}", e)))?
    }
}

#[async_trait]
impl PdfEngine for PdfiumEngine {
    async fn extract_tables(&self, pdf: &Path) -> Result<Vec<Table>, RoutineError> {
        let path = pdf.to_path_buf();
        self.with_pdfium(move |pdfium| extract_tables_blocking(pdfium, &path))
            .await
    }

    async fn render_pages(&self, pdf: &Path) -> Result<Vec<DynamicImage>, RoutineError> {
        let path = pdf.to_path_buf();
        let (dpi, max_pixels) = (self.dpi, self.max_pixels);
        self.with_pdfium(move |pdfium| render_all_pages_blocking(pdfium, &path, dpi, max_pixels))
            .await
    }

    async fn write_text_page(&self, text: &str, out: &Path) -> Result<(), RoutineError> {
        let text = text.to_string();
        let out = out.to_path_buf();
        self.with_pdfium(move |pdfium| write_text_page_blocking(pdfium, &text, &out))
            .await
    }
}

fn pdf_err(what: &str) -> impl Fn(PdfiumError) -> RoutineError + '_ {
    move |e| RoutineError::Pdf(format!("{what}: {e:?}"))
}

/// Where each row of a text page goes, and at what size.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPageLayout {
    pub font_size: f32,
    pub line_height: f32,
    /// Wrapped rows, top to bottom. Blank rows keep their space.
    pub rows: Vec<String>,
    /// Rows that did not fit even at the smallest font size.
    pub dropped: usize,
}

/// Lay `text` out on a `width` × `height` point page with a half-inch
/// margin on every side.
///
/// Lines are wrapped at the column count the font size allows; the largest
/// size from 8pt down to 1pt (in half points) whose rows all fit wins.
pub fn layout_text_page(text: &str, width: f32, height: f32) -> TextPageLayout {
    let usable_width = width - 2.0 * TEXT_PAGE_MARGIN;
    let usable_height = height - 2.0 * TEXT_PAGE_MARGIN;

    let mut size = MAX_FONT_SIZE;
    loop {
        let columns = ((usable_width / (COURIER_ADVANCE * size)).floor() as usize).max(1);
        let line_height = size * LINE_SPACING;
        let fit = ((usable_height - size) / line_height).floor() as usize + 1;
        let mut rows = wrap_lines(text, columns);

        if rows.len() <= fit || size - FONT_SIZE_STEP < MIN_FONT_SIZE {
            let dropped = rows.len().saturating_sub(fit);
            rows.truncate(fit);
            return TextPageLayout {
                font_size: size,
                line_height,
                rows,
                dropped,
            };
        }
        size -= FONT_SIZE_STEP;
    }
}

fn wrap_lines(text: &str, columns: usize) -> Vec<String> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let chars: Vec<char> = line.trim_end().chars().collect();
        if chars.is_empty() {
            rows.push(String::new());
            continue;
        }
        rows.extend(chars.chunks(columns).map(|c| c.iter().collect::<String>()));
    }
    rows
}

/// Draw `text` from the top of one A4 page using [`layout_text_page`].
fn write_text_page_blocking(pdfium: &Pdfium, text: &str, out: &Path) -> Result<(), RoutineError> {
    let layout = layout_text_page(text, A4_WIDTH, A4_HEIGHT);
    if layout.dropped > 0 {
        warn!(
            "Text page: {} rows do not fit at {}pt and were left out",
            layout.dropped, layout.font_size
        );
    }

    let mut document = pdfium.create_new_pdf().map_err(pdf_err("create"))?;
    let font = document.fonts_mut().courier();
    {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(pdf_err("add page"))?;

        let top = page.height().value - TEXT_PAGE_MARGIN - layout.font_size;
        for (i, row) in layout.rows.iter().enumerate() {
            if row.trim().is_empty() {
                continue;
            }
            let y = top - i as f32 * layout.line_height;
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(TEXT_PAGE_MARGIN),
                    PdfPoints::new(y),
                    row,
                    font,
                    PdfPoints::new(layout.font_size),
                )
                .map_err(pdf_err("draw text"))?;
        }
    }
    debug!("Text page: {} rows at {}pt", layout.rows.len(), layout.font_size);

    document.save_to_file(out).map_err(pdf_err("save"))
}
