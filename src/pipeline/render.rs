//! pdfium binding and page rasterisation.
//!
//! Everything here is blocking; callers go through
//! [`crate::pipeline::pdf::PdfiumEngine`], which runs it inside
//! `tokio::task::spawn_blocking`.

use crate::error::RoutineError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Bind to a pdfium library.
///
/// An explicit `lib_path` wins; otherwise the working directory and then
/// the system library search path are tried.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, RoutineError> {
    let bindings = match lib_path {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    };
    bindings
        .map(Pdfium::new)
        .map_err(|e| RoutineError::PdfiumBindingFailed(format!("{:?}", e)))
}

/// Open a PDF, mapping pdfium's load error.
pub(crate) fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
) -> Result<PdfDocument<'a>, RoutineError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| RoutineError::Pdf(format!("{}: {:?}", pdf_path.display(), e)))
}

/// Rasterise every page of a PDF, in page order.
///
/// Each page is scaled to `dpi` and then capped so neither side exceeds
/// `max_pixels`.
pub fn render_all_pages_blocking(
    pdfium: &Pdfium,
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, RoutineError> {
    let document = load_document(pdfium, pdf_path)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded for rasterisation: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RoutineError::Pdf(format!("page {}: {:?}", idx + 1, e)))?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}
