//! PNG → JPEG, anything else → PNG.

use super::image_to_spreadsheet::decode;
use super::{blocking, output_path};
use crate::detect;
use crate::error::RoutineError;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

pub async fn run(input: &Path, out_dir: &Path) -> Result<PathBuf, RoutineError> {
    let is_png = input
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(detect::extension)
        .is_some_and(|ext| ext == "png");
    let (ext, format) = if is_png {
        ("jpg", ImageFormat::Jpeg)
    } else {
        ("png", ImageFormat::Png)
    };

    let out = output_path(out_dir, input, "", ext)?;
    let source = input.to_path_buf();
    let target = out.clone();
    blocking(move || {
        let image = decode(&source)?;
        debug!(
            "{} ({}x{}) → {:?}",
            source.display(),
            image.width(),
            image.height(),
            format
        );
        // JPEG has no alpha channel.
        let image = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
            _ => image,
        };
        image.save_with_format(&target, format)?;
        Ok(())
    })
    .await?;

    Ok(out)
}
