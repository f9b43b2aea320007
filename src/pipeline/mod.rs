//! Collaborators for the conversion routines.
//!
//! Each submodule wraps one external library or engine, so the routines in
//! [`crate::routines`] read as plain steps.
//!
//! ```text
//! pdf ─────▶ tables ─┬─▶ workbook (calamine / rust_xlsxwriter)
//!      └───▶ render ─┴─▶ encode ──▶ ocr ──▶ postprocess
//! workbook ─▶ html ──▶ wkhtmltopdf │ pdf::write_text_page
//! pptx (zip + quick-xml) ◀──▶ workbook
//! ```
//!
//! 1. [`render`] / [`tables`] — pdfium binding, page rasterisation and
//!    table grouping; blocking, driven through [`pdf::PdfiumEngine`]
//! 2. [`encode`] — PNG encoding and the base64 vision attachment
//! 3. [`ocr`]    — the [`ocr::OcrEngine`] trait and its two engines
//! 4. [`postprocess`] — cleanup of recognised text
//! 5. [`workbook`], [`html`], [`pptx`] — spreadsheet, HTML and presentation
//!    codecs

pub mod encode;
pub mod html;
pub mod ocr;
pub mod pdf;
pub mod postprocess;
pub mod pptx;
pub mod render;
pub mod tables;
pub mod workbook;
