//! xlsx → pptx: one slide per sheet.

use super::{blocking, output_path};
use crate::error::RoutineError;
use crate::pipeline::pptx::{write_presentation, SlideContent, TextBox};
use crate::pipeline::workbook::{clip_chars, read_sheets, render_text_table};
use std::path::{Path, PathBuf};
use tracing::info;

/// Characters of sheet text placed on a slide.
pub const SLIDE_TEXT_CHARS: usize = 10_000;

/// Each slide uses the title-only layout, titled with the sheet name, plus
/// a 8in × 5in text box at (1in, 1in) holding the sheet as fixed-width text.
pub async fn run(input: &Path, out_dir: &Path) -> Result<PathBuf, RoutineError> {
    let out = output_path(out_dir, input, "", "pptx")?;
    let source = input.to_path_buf();
    let target = out.clone();

    let count = blocking(move || {
        let slides: Vec<SlideContent> = read_sheets(&source)?
            .into_iter()
            .map(|sheet| {
                let text = render_text_table(&sheet.rows);
                SlideContent {
                    title: sheet.name,
                    body: clip_chars(&text, SLIDE_TEXT_CHARS).to_string(),
                    text_box: TextBox::inches(1.0, 1.0, 8.0, 5.0),
                }
            })
            .collect();
        write_presentation(&target, &slides)?;
        Ok(slides.len())
    })
    .await?;

    info!("{}: {} slides", input.display(), count);
    Ok(out)
}
