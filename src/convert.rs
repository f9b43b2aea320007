//! Dispatch and batch conversion entry points.
//!
//! [`dispatch`] runs the routine for one file. [`convert_files`] runs a
//! sequence of files under the per-file and per-batch time budgets; the
//! upload orchestrator and the `run` CLI subcommand both go through it.

use crate::config::ConversionConfig;
use crate::detect;
use crate::error::FileError;
use crate::pipeline::ocr::{build_engine, OcrEngine, UnavailableOcr};
use crate::pipeline::pdf::{PdfEngine, PdfiumEngine};
use crate::progress::BatchProgressCallback;
use crate::registry;
use crate::routines;
use std::fmt;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, info, warn};

/// Everything a routine needs: configuration plus its engines.
///
/// Cheap to clone; shared by every request.
#[derive(Clone)]
pub struct ConversionContext {
    pub config: Arc<ConversionConfig>,
    pub ocr: Arc<dyn OcrEngine>,
    pub pdf: Arc<dyn PdfEngine>,
}

impl ConversionContext {
    /// Build the production engines from `config`.
    ///
    /// An OCR engine that cannot be built (no vision provider configured)
    /// is replaced by one that fails each call, so non-OCR tools keep
    /// working.
    pub fn new(config: ConversionConfig) -> Self {
        let ocr: Arc<dyn OcrEngine> = match build_engine(&config) {
            Ok(engine) => engine,
            Err(e) => {
                warn!("OCR engine unavailable, OCR tools will fail: {}", e);
                Arc::new(UnavailableOcr::new(e))
            }
        };
        let pdf: Arc<dyn PdfEngine> = Arc::new(PdfiumEngine::new(&config));
        Self::with_engines(config, ocr, pdf)
    }

    /// Use caller-supplied engines.
    pub fn with_engines(
        config: ConversionConfig,
        ocr: Arc<dyn OcrEngine>,
        pdf: Arc<dyn PdfEngine>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            ocr,
            pdf,
        }
    }
}

impl fmt::Debug for ConversionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionContext")
            .field("config", &self.config)
            .field("ocr", &self.ocr.name())
            .finish_non_exhaustive()
    }
}

/// Convert one file with the routine `tool` selects for its extension.
///
/// The output is moved into `out_dir` once the routine has finished and
/// its path returned; nothing is left behind in `out_dir` on failure.
///
/// # Errors
/// * [`FileError::UnsupportedCombination`] — unknown tool, or the tool does
///   not accept this extension
/// * [`FileError::ConversionFailed`] — the routine and its fallback failed
pub async fn dispatch(
    input: &Path,
    tool: &str,
    out_dir: &Path,
    ctx: &ConversionContext,
) -> Result<PathBuf, FileError> {
    let extension = input
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(detect::extension)
        .unwrap_or_default();

    let routine = registry::lookup(tool, &extension).ok_or_else(|| {
        FileError::UnsupportedCombination {
            tool: tool.to_string(),
            extension: extension.clone(),
        }
    })?;

    debug!("{} → {}", input.display(), routine);
    let failed = |detail: String| FileError::ConversionFailed {
        routine: routine.name().to_string(),
        detail,
    };

    // The routine writes into a private directory owned by this future.
    // Blocking work left running after a timeout can only touch that
    // directory, which is removed when the future is dropped.
    let work = tempfile::Builder::new()
        .prefix(".work-")
        .tempdir_in(out_dir)
        .map_err(|e| failed(format!("cannot create work directory: {e}")))?;
    let produced = routines::run(routine, input, work.path(), ctx)
        .await
        .map_err(|e| failed(e.to_string()))?;
    claim_output(&produced, out_dir).map_err(|e| failed(format!("cannot place output: {e}")))
}

/// Move `produced` into `out_dir` under its own name, numbered `_2`, `_3`,
/// … past names already taken. Each name is reserved with `create_new`
/// before the rename, so an existing output is never replaced.
fn claim_output(produced: &Path, out_dir: &Path) -> std::io::Result<PathBuf> {
    let stem = produced
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = produced
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1u32;
    loop {
        let name = match n {
            1 => format!("{stem}{ext}"),
            _ => format!("{stem}_{n}{ext}"),
        };
        let candidate = out_dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => {
                if let Err(e) = std::fs::rename(produced, &candidate) {
                    let _ = std::fs::remove_file(&candidate);
                    return Err(e);
                }
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Result of one input of [`convert_files`].
#[derive(Debug, Clone, PartialEq)]
pub struct FileConversion {
    pub input: PathBuf,
    pub result: Result<PathBuf, FileError>,
}

/// Convert `inputs` one after another, in order.
///
/// Each file gets at most `file_timeout_secs`; once `request_timeout_secs`
/// has elapsed for the whole call, remaining files are reported as
/// [`FileError::Timeout`] without being started. Never fails as a whole.
pub async fn convert_files(
    inputs: &[PathBuf],
    tool: &str,
    out_dir: &Path,
    ctx: &ConversionContext,
    progress: &dyn BatchProgressCallback,
) -> Vec<FileConversion> {
    let total = inputs.len();
    let per_file = Duration::from_secs(ctx.config.file_timeout_secs);
    let deadline = Instant::now() + Duration::from_secs(ctx.config.request_timeout_secs);

    progress.on_batch_start(total);
    let mut results = Vec::with_capacity(total);
    let mut converted = 0usize;

    for (i, input) in inputs.iter().enumerate() {
        let index = i + 1;
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        progress.on_file_start(index, total, &name);

        let remaining = deadline.saturating_duration_since(Instant::now());
        let result = if remaining.is_zero() {
            Err(FileError::Timeout {
                secs: ctx.config.request_timeout_secs,
            })
        } else {
            let (budget, secs) = if remaining < per_file {
                (remaining, ctx.config.request_timeout_secs)
            } else {
                (per_file, ctx.config.file_timeout_secs)
            };
            match timeout(budget, dispatch(input, tool, out_dir, ctx)).await {
                Ok(result) => result,
                Err(_) => Err(FileError::Timeout { secs }),
            }
        };

        match &result {
            Ok(output) => {
                converted += 1;
                let out_name = output
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                progress.on_file_complete(index, total, &out_name);
            }
            Err(e) => progress.on_file_error(index, total, &e.to_string()),
        }

        results.push(FileConversion {
            input: input.clone(),
            result,
        });
    }

    info!("Converted {}/{} files with '{}'", converted, total, tool);
    progress.on_batch_complete(total, converted);
    results
}
