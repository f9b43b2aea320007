//! # edgequake-convert
//!
//! A small document conversion service: upload PDF, Excel, image and
//! PowerPoint files, pick a tool, get the converted file back (or a
//! `results.zip` when there is more than one).
//!
//! ## Tools
//!
//! | Tool id        | Accepts            | Produces                          |
//! |----------------|--------------------|-----------------------------------|
//! | `pdf_to_excel` | pdf                | xlsx of detected tables, OCR fallback |
//! | `excel_to_pdf` | xls, xlsx          | pdf via wkhtmltopdf, text fallback |
//! | `jpg_to_excel` | jpg, jpeg, png     | xlsx with the recognised text     |
//! | `img_convert`  | jpg, jpeg, png     | png → jpg, anything else → png    |
//! | `pptx_to_xlsx` | pptx               | xlsx, one row per slide           |
//! | `xlsx_to_pptx` | xlsx               | pptx, one slide per sheet         |
//!
//! ## Request flow
//!
//! ```text
//! POST /convert (multipart: files…, tool)
//!  │
//!  ├─ 1. Stage    sanitise names, skip disallowed extensions
//!  ├─ 2. Convert  registry lookup → routine, per-file and batch deadlines
//!  ├─ 3. Package  one output as is, several as results.zip
//!  └─ 4. Cleanup  scratch area removed on every path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_convert::{convert_files, ConversionConfig, ConversionContext, NoopProgressCallback};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = ConversionContext::new(ConversionConfig::default());
//!     let inputs = vec![PathBuf::from("deck.pptx")];
//!     for file in convert_files(&inputs, "pptx_to_xlsx", "out".as_ref(), &ctx, &NoopProgressCallback).await {
//!         println!("{} → {:?}", file.input.display(), file.result);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `convert-server` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod detect;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod registry;
pub mod routines;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, OcrBackend, ServerConfig, ServerConfigBuilder,
};
pub use convert::{convert_files, dispatch, ConversionContext, FileConversion};
pub use error::{ConvertError, FileError, OcrError, RoutineError};
pub use orchestrator::{
    run_batch, BatchOutcome, BatchSummary, FileOutcome, FileReport, Package, UploadBatch,
};
pub use progress::{BatchProgressCallback, NoopProgressCallback, TracingProgressCallback};
pub use registry::{Routine, Tool};
pub use server::{router, AppState};
