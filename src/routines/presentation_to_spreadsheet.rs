//! pptx → xlsx: one row of text per slide.

use super::{blocking, output_path};
use crate::error::RoutineError;
use crate::pipeline::pptx::read_slide_texts;
use crate::pipeline::workbook::{write_workbook, CellValue, OutputSheet};
use std::path::{Path, PathBuf};
use tracing::info;

/// Columns `slide` (1-based) and `text`, in presentation order.
pub async fn run(input: &Path, out_dir: &Path) -> Result<PathBuf, RoutineError> {
    let out = output_path(out_dir, input, "", "xlsx")?;
    let source = input.to_path_buf();
    let target = out.clone();

    let slides = blocking(move || {
        let texts = read_slide_texts(&source)?;
        let mut sheet = OutputSheet::new("Sheet1");
        sheet.push_row(["slide", "text"]);
        for (i, text) in texts.iter().enumerate() {
            sheet
                .rows
                .push(vec![CellValue::Number((i + 1) as f64), text.as_str().into()]);
        }
        write_workbook(&target, &[sheet])?;
        Ok(texts.len())
    })
    .await?;

    info!("{}: {} slides", input.display(), slides);
    Ok(out)
}
