//! Upload orchestration: stage → convert → package → clean up.
//!
//! ```text
//! UploadBatch ──▶ ScratchArea::stage (sanitised, de-duplicated names)
//!             ──▶ convert::convert_files (upload order, time budgets)
//!             ──▶ Package::Single | Package::Zip ("results.zip")
//!             ──▶ ScratchArea dropped (removed on every path)
//! ```
//!
//! Every file of the batch ends up with exactly one [`FileOutcome`]. The
//! batch only fails as a whole when nothing was uploaded, nothing
//! converted, or the scratch area could not be written.

use crate::convert::{convert_files, ConversionContext};
use crate::detect;
use crate::error::{ConvertError, FileError};
use crate::progress::BatchProgressCallback;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Name of the bundle returned for more than one output.
pub const ZIP_NAME: &str = "results.zip";

/// One uploaded file, as received.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Files of one request plus the tool selector.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    pub tool: String,
    pub files: Vec<UploadedFile>,
}

impl UploadBatch {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            files: Vec::new(),
        }
    }

    pub fn push(&mut self, filename: impl Into<String>, bytes: Vec<u8>) {
        self.files.push(UploadedFile {
            filename: filename.into(),
            bytes,
        });
    }
}

/// Why a file was not staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Extension not in [`detect::ALLOWED_EXTENSIONS`].
    DisallowedExtension,
    /// Nothing usable left after sanitising the name.
    InvalidFilename,
}

/// What happened to one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Converted { output: String },
    Skipped { reason: SkipReason },
    Failed { error: FileError },
}

/// Outcome of one uploaded file, keyed by its original name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub filename: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Per-outcome counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn of(reports: &[FileReport]) -> Self {
        reports.iter().fold(Self::default(), |mut s, r| {
            match r.outcome {
                FileOutcome::Converted { .. } => s.converted += 1,
                FileOutcome::Skipped { .. } => s.skipped += 1,
                FileOutcome::Failed { .. } => s.failed += 1,
            }
            s
        })
    }
}

/// The response body, fully in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Package {
    Single { filename: String, bytes: Vec<u8> },
    Zip { filename: String, bytes: Vec<u8> },
}

impl Package {
    pub fn filename(&self) -> &str {
        match self {
            Package::Single { filename, .. } | Package::Zip { filename, .. } => filename,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Package::Single { bytes, .. } | Package::Zip { bytes, .. } => bytes,
        }
    }

    pub fn into_parts(self) -> (String, Vec<u8>) {
        match self {
            Package::Single { filename, bytes } | Package::Zip { filename, bytes } => {
                (filename, bytes)
            }
        }
    }
}

/// A successful batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub reports: Vec<FileReport>,
    pub package: Package,
}

impl BatchOutcome {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::of(&self.reports)
    }
}

// ── Scratch area ─────────────────────────────────────────────────────────────

/// Request-scoped directory for staged inputs and produced outputs.
///
/// Removed when dropped; a removal failure is logged, never returned.
#[derive(Debug)]
pub struct ScratchArea {
    dir: Option<TempDir>,
    root: PathBuf,
    inputs: PathBuf,
    outputs: PathBuf,
}

impl ScratchArea {
    /// Create a fresh, uniquely named directory under `root`.
    pub fn allocate(root: &Path) -> Result<Self, ConvertError> {
        let unavailable = |source: std::io::Error| ConvertError::ScratchUnavailable {
            root: root.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(root).map_err(unavailable)?;
        let dir = tempfile::Builder::new()
            .prefix("convert-")
            .tempdir_in(root)
            .map_err(unavailable)?;

        let inputs = dir.path().join("in");
        let outputs = dir.path().join("out");
        std::fs::create_dir(&inputs).map_err(unavailable)?;
        std::fs::create_dir(&outputs).map_err(unavailable)?;
        debug!("Scratch area {}", dir.path().display());

        Ok(Self {
            root: dir.path().to_path_buf(),
            dir: Some(dir),
            inputs,
            outputs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn output_dir(&self) -> &Path {
        &self.outputs
    }

    /// Write `bytes` under `name`, numbering it `_2`, `_3`, … if taken.
    pub async fn stage(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ConvertError> {
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (name, None),
        };
        let mut path = self.inputs.join(name);
        let mut n = 2;
        while tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let numbered = match ext {
                Some(ext) => format!("{stem}_{n}.{ext}"),
                None => format!("{stem}_{n}"),
            };
            path = self.inputs.join(numbered);
            n += 1;
        }

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ConvertError::StagingFailed {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

impl Drop for ScratchArea {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Removed scratch area {}", path.display()),
                Err(e) => warn!("Failed to remove scratch area {}: {}", path.display(), e),
            }
        }
    }
}

// ── Batch ────────────────────────────────────────────────────────────────────

/// Run one upload batch end to end.
///
/// # Errors
/// * [`ConvertError::EmptyBatch`] — no files, or no file produced an output
/// * [`ConvertError::ScratchUnavailable`] / [`ConvertError::StagingFailed`]
/// * [`ConvertError::PackagingFailed`] — outputs could not be read or zipped
pub async fn run_batch(
    batch: UploadBatch,
    scratch_root: &Path,
    ctx: &ConversionContext,
    progress: &dyn BatchProgressCallback,
) -> Result<BatchOutcome, ConvertError> {
    if batch.files.is_empty() {
        return Err(ConvertError::EmptyBatch {
            reason: "No files uploaded".to_string(),
        });
    }

    let scratch = ScratchArea::allocate(scratch_root)?;
    info!(
        "Batch: {} files, tool '{}'",
        batch.files.len(),
        batch.tool
    );

    // Staging: one slot per upload, filled now for skips, later for conversions.
    let mut outcomes: Vec<Option<FileOutcome>> = Vec::with_capacity(batch.files.len());
    let mut staged: Vec<(usize, PathBuf)> = Vec::new();
    for (idx, file) in batch.files.iter().enumerate() {
        if !detect::is_allowed(&file.filename) {
            debug!("Skipping '{}': extension not allowed", file.filename);
            outcomes.push(Some(FileOutcome::Skipped {
                reason: SkipReason::DisallowedExtension,
            }));
            continue;
        }
        let Some(name) = detect::sanitize_filename(&file.filename) else {
            debug!("Skipping '{}': unusable name", file.filename);
            outcomes.push(Some(FileOutcome::Skipped {
                reason: SkipReason::InvalidFilename,
            }));
            continue;
        };
        let path = scratch.stage(&name, &file.bytes).await?;
        staged.push((idx, path));
        outcomes.push(None);
    }

    // Converting
    let inputs: Vec<PathBuf> = staged.iter().map(|(_, p)| p.clone()).collect();
    let results = convert_files(&inputs, &batch.tool, scratch.output_dir(), ctx, progress).await;

    let mut outputs = Vec::new();
    for ((idx, _), conversion) in staged.iter().zip(results) {
        outcomes[*idx] = Some(match conversion.result {
            Ok(output) => {
                let name = file_name(&output);
                outputs.push(output);
                FileOutcome::Converted { output: name }
            }
            Err(error) => FileOutcome::Failed { error },
        });
    }

    let reports: Vec<FileReport> = batch
        .files
        .iter()
        .zip(outcomes)
        .map(|(file, outcome)| FileReport {
            filename: file.filename.clone(),
            outcome: outcome.unwrap_or(FileOutcome::Failed {
                error: FileError::ConversionFailed {
                    routine: "dispatch".into(),
                    detail: "file was not processed".into(),
                },
            }),
        })
        .collect();

    for report in &reports {
        match &report.outcome {
            FileOutcome::Converted { output } => info!("  {} → {}", report.filename, output),
            FileOutcome::Skipped { reason } => {
                info!("  {} skipped ({:?})", report.filename, reason)
            }
            FileOutcome::Failed { error } => warn!("  {} failed: {}", report.filename, error),
        }
    }

    // Packaging
    if outputs.is_empty() {
        let summary = BatchSummary::of(&reports);
        return Err(ConvertError::EmptyBatch {
            reason: format!(
                "Conversion produced no outputs ({} skipped, {} failed)",
                summary.skipped, summary.failed
            ),
        });
    }
    let package = package(&outputs).await?;
    info!(
        "Packaged {} output(s) as '{}' ({} bytes)",
        outputs.len(),
        package.filename(),
        package.bytes().len()
    );

    // `scratch` drops here, after everything was read into memory.
    Ok(BatchOutcome { reports, package })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// One output is returned as is; more are zipped under their base names.
pub async fn package(outputs: &[PathBuf]) -> Result<Package, ConvertError> {
    let mut files = Vec::with_capacity(outputs.len());
    for path in outputs {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ConvertError::PackagingFailed(format!("{}: {}", path.display(), e)))?;
        files.push((file_name(path), bytes));
    }

    if files.len() == 1 {
        let (filename, bytes) = files.remove(0);
        return Ok(Package::Single { filename, bytes });
    }

    let bytes = tokio::task::spawn_blocking(move || zip_entries(&files))
        .await
        .map_err(|e| ConvertError::Internal(format!("zip task failed: {e}")))??;
    Ok(Package::Zip {
        filename: ZIP_NAME.to_string(),
        bytes,
    })
}

fn zip_entries(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>, ConvertError> {
    let packaging = |e: &dyn std::fmt::Display| ConvertError::PackagingFailed(e.to_string());
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for (name, bytes) in files {
        zip.start_file(name.as_str(), options)
            .map_err(|e| packaging(&e))?;
        zip.write_all(bytes).map_err(|e| packaging(&e))?;
    }
    let cursor = zip.finish().map_err(|e| packaging(&e))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;
    use crate::routines::testing::context;
    use std::io::Read;
    use tempfile::tempdir;

    fn png_bytes() -> Vec<u8> {
        let dir = tempdir().unwrap();
        let path = crate::routines::testing::write_png(dir.path(), "x.png");
        std::fs::read(path).unwrap()
    }

    fn scratch_entries(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_before_allocating() {
        let root = tempdir().unwrap();
        let err = run_batch(
            UploadBatch::new("img_convert"),
            root.path(),
            &context(),
            &NoopProgressCallback,
        )
        .await
        .unwrap_err();
        assert_eq!(err.notice(), "No files uploaded");
        assert_eq!(scratch_entries(root.path()), 0);
    }

    #[tokio::test]
    async fn single_output_is_returned_directly() {
        let root = tempdir().unwrap();
        let mut batch = UploadBatch::new("img_convert");
        batch.push("holiday photo.png", png_bytes());

        let outcome = run_batch(batch, root.path(), &context(), &NoopProgressCallback)
            .await
            .unwrap();
        match &outcome.package {
            Package::Single { filename, bytes } => {
                assert_eq!(filename, "holiday_photo.jpg");
                assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
            }
            other => panic!("expected single file, got {other:?}"),
        }
        assert_eq!(scratch_entries(root.path()), 0, "scratch area must be removed");
    }

    #[tokio::test]
    async fn several_outputs_are_zipped_without_collisions() {
        let root = tempdir().unwrap();
        let mut batch = UploadBatch::new("img_convert");
        batch.push("a.png", png_bytes());
        batch.push("a.png", png_bytes());
        batch.push("b.png", png_bytes());

        let outcome = run_batch(batch, root.path(), &context(), &NoopProgressCallback)
            .await
            .unwrap();
        assert_eq!(outcome.package.filename(), ZIP_NAME);

        let mut archive =
            zip::ZipArchive::new(Cursor::new(outcome.package.bytes().to_vec())).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(names, ["a.jpg", "a_2.jpg", "b.jpg"]);

        let mut entry = archive.by_name("b.jpg").unwrap();
        let mut head = [0u8; 2];
        entry.read_exact(&mut head).unwrap();
        assert_eq!(head, [0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn disallowed_files_are_skipped_not_fatal() {
        let root = tempdir().unwrap();
        let mut batch = UploadBatch::new("img_convert");
        batch.push("notes.txt", b"hello".to_vec());
        batch.push("c.png", png_bytes());

        let outcome = run_batch(batch, root.path(), &context(), &NoopProgressCallback)
            .await
            .unwrap();
        assert_eq!(
            outcome.reports[0].outcome,
            FileOutcome::Skipped {
                reason: SkipReason::DisallowedExtension
            }
        );
        assert_eq!(
            outcome.summary(),
            BatchSummary {
                converted: 1,
                skipped: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn nothing_converted_is_an_empty_batch() {
        let root = tempdir().unwrap();
        let mut batch = UploadBatch::new("pdf_to_excel");
        batch.push("notes.txt", b"hello".to_vec());
        batch.push("c.png", png_bytes());

        let err = run_batch(batch, root.path(), &context(), &NoopProgressCallback)
            .await
            .unwrap_err();
        let notice = err.notice();
        assert!(notice.starts_with("Conversion produced no outputs"), "{notice}");
        assert!(notice.contains("1 skipped, 1 failed"), "{notice}");
        assert_eq!(scratch_entries(root.path()), 0);
    }

    #[tokio::test]
    async fn staged_names_are_sanitised() {
        let root = tempdir().unwrap();
        let scratch = ScratchArea::allocate(root.path()).unwrap();
        let name = detect::sanitize_filename("../../etc/passwd.png").unwrap();
        let path = scratch.stage(&name, b"x").await.unwrap();
        assert!(path.starts_with(scratch.path()));
        assert!(!path.file_name().unwrap().to_string_lossy().contains('/'));
    }

    #[test]
    fn report_serialises_flat() {
        let report = FileReport {
            filename: "a.pdf".into(),
            outcome: FileOutcome::Failed {
                error: FileError::Timeout { secs: 3 },
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["kind"], "timeout");
    }
}
