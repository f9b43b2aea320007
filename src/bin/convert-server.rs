//! CLI binary for edgequake-convert.
//!
//! `serve` runs the upload service; `run` converts local files with the same
//! routines, without HTTP.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_convert::{
    convert_files, router, AppState, BatchProgressCallback, ConversionConfig, ConversionContext,
    OcrBackend, ServerConfig, Tool,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the batch, one log line per file.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Self {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:36.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self {
            bar,
            started: Mutex::new(None),
        }
    }

    fn elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_file_start(&self, _index: usize, _total: usize, filename: &str) {
        if let Ok(mut t) = self.started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(filename.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, output: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {}  {}",
            green("✓"),
            index,
            total,
            output,
            self.elapsed()
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            self.elapsed()
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, converted: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}/{} files converted",
            if converted == total { green("✔") } else { red("✘") },
            bold(&converted.to_string()),
            total
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the upload form on port 5000
  convert-server serve

  # Convert local files without the web form
  convert-server run --tool pptx_to_xlsx deck.pptx -o out/
  convert-server run --tool img_convert a.png b.jpg

TOOLS:
  pdf_to_excel   pdf              → xlsx (tables, OCR fallback)
  excel_to_pdf   xls, xlsx        → pdf
  jpg_to_excel   jpg, jpeg, png   → xlsx (OCR)
  img_convert    jpg, jpeg, png   → png ⇄ jpg
  pptx_to_xlsx   pptx             → xlsx
  xlsx_to_pptx   xlsx             → pptx

ENVIRONMENT VARIABLES:
  CONVERT_SECRET_KEY      Flash-cookie secret, at least 32 bytes
  OPENAI_API_KEY          Vision OCR provider key (or ANTHROPIC_API_KEY, …)
  EDGEQUAKE_PROVIDER      Override OCR provider
  EDGEQUAKE_MODEL         Override OCR model
  PDFIUM_LIB_PATH         Path to libpdfium
"#;

/// Convert PDF, Excel, image and PowerPoint files.
#[derive(Parser, Debug)]
#[command(
    name = "convert-server",
    version,
    about = "Convert PDF, Excel, image and PowerPoint files",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CONVERT_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the upload service.
    Serve(ServeArgs),
    /// Convert local files and write the outputs to a directory.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Host address to bind to.
    #[arg(long, env = "CONVERT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Flash-cookie signing secret (≥ 32 bytes). Random per process if unset.
    #[arg(long, env = "CONVERT_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Directory for per-request scratch areas. Default: system temp dir.
    #[arg(long, env = "CONVERT_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Maximum request body in MiB.
    #[arg(long, env = "CONVERT_MAX_UPLOAD_MB", default_value_t = 64)]
    max_upload_mb: usize,

    /// Whole-request time budget in seconds.
    #[arg(long, env = "CONVERT_REQUEST_TIMEOUT", default_value_t = 600)]
    request_timeout: u64,

    #[command(flatten)]
    conversion: ConversionArgs,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Tool id, e.g. pdf_to_excel.
    #[arg(short, long)]
    tool: Tool,

    /// Input files, converted in order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory (created if missing).
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    #[command(flatten)]
    conversion: ConversionArgs,
}

/// Options shared by `serve` and `run`.
#[derive(Args, Debug)]
struct ConversionArgs {
    /// OCR engine: vision or tesseract.
    #[arg(long, env = "CONVERT_OCR_BACKEND", default_value = "vision")]
    ocr_backend: OcrBackend,

    /// Tesseract language code(s).
    #[arg(long, env = "CONVERT_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Tesseract executable.
    #[arg(long, env = "CONVERT_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Vision LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Vision LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Rendering DPI for OCR of PDF pages (72–400).
    #[arg(long, env = "CONVERT_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// HTML-to-PDF engine used by excel_to_pdf.
    #[arg(long, env = "CONVERT_WKHTMLTOPDF", default_value = "wkhtmltopdf")]
    wkhtmltopdf: PathBuf,

    /// Always use the plain-text PDF for excel_to_pdf.
    #[arg(long)]
    no_html_renderer: bool,

    /// Explicit libpdfium path.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Per-file time budget in seconds.
    #[arg(long, env = "CONVERT_FILE_TIMEOUT", default_value_t = 120)]
    file_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Run(args) => run(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let conversion = build_conversion(&args.conversion, Some(args.request_timeout))?;
    let mut builder = ServerConfig::builder()
        .host(args.host)
        .port(args.port)
        .max_upload_bytes(args.max_upload_mb.saturating_mul(1024 * 1024))
        .conversion(conversion.clone());
    if let Some(secret) = args.secret_key {
        builder = builder.secret_key(secret);
    }
    if let Some(dir) = args.scratch_dir {
        builder = builder.scratch_root(dir);
    }
    let config = builder.build().context("Invalid server configuration")?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, ConversionContext::new(conversion))
        .context("Invalid server configuration")?;
    let app = router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let conversion = build_conversion(&args.conversion, None)?;
    let ctx = ConversionContext::new(conversion);

    for file in &args.files {
        if !file.is_file() {
            anyhow::bail!("Input not found: {}", file.display());
        }
    }
    tokio::fs::create_dir_all(&args.output)
        .await
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let results = if args.no_progress {
        convert_files(
            &args.files,
            args.tool.id(),
            &args.output,
            &ctx,
            &edgequake_convert::TracingProgressCallback,
        )
        .await
    } else {
        convert_files(
            &args.files,
            args.tool.id(),
            &args.output,
            &ctx,
            &CliProgressCallback::new(),
        )
        .await
    };

    let mut converted = 0;
    for file in &results {
        match &file.result {
            Ok(output) => {
                converted += 1;
                println!("{}", output.display());
            }
            Err(e) => eprintln!("{}: {}", file.input.display(), red(&e.to_string())),
        }
    }
    if converted == 0 {
        anyhow::bail!("Conversion produced no outputs");
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_conversion(
    args: &ConversionArgs,
    request_timeout: Option<u64>,
) -> Result<ConversionConfig> {
    let renderer = (!args.no_html_renderer).then(|| args.wkhtmltopdf.clone());
    let mut builder = ConversionConfig::builder()
        .dpi(args.dpi)
        .ocr_backend(args.ocr_backend)
        .ocr_language(args.ocr_lang.clone())
        .tesseract_bin(args.tesseract.clone())
        .html_renderer(renderer)
        .file_timeout_secs(args.file_timeout);
    if let Some(secs) = request_timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref lib) = args.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    builder.build().context("Invalid conversion configuration")
}
