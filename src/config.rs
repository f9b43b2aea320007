//! Configuration types for the conversion service.
//!
//! Two structs, two lifetimes:
//!
//! * [`ConversionConfig`] — everything a conversion routine needs (OCR engine,
//!   rendering DPI, external binaries, per-file time budget). Shared by the
//!   HTTP server and the `run` CLI subcommand.
//! * [`ServerConfig`] — the HTTP surface (bind address, flash-cookie secret,
//!   scratch root, upload limit) wrapping a [`ConversionConfig`].
//!
//! Both are built through validating builders and passed explicitly into the
//! orchestrator; nothing is read from ambient globals after start-up.

use crate::error::ConvertError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Minimum secret length accepted for signing flash cookies.
pub const MIN_SECRET_LEN: usize = 32;

/// Which OCR engine backs the `pdf_to_excel` fallback and `jpg_to_excel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    /// Vision LLM via edgequake-llm. (default)
    #[default]
    Vision,
    /// Local `tesseract` binary.
    Tesseract,
}

impl FromStr for OcrBackend {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vision" | "llm" => Ok(OcrBackend::Vision),
            "tesseract" => Ok(OcrBackend::Tesseract),
            other => Err(ConvertError::InvalidConfig(format!(
                "unknown OCR backend '{other}' (expected 'vision' or 'tesseract')"
            ))),
        }
    }
}

/// Configuration for the conversion routines and their collaborators.
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rasterisation DPI for OCR of PDF pages. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Cap on either rendered dimension in pixels. Default: 2000.
    ///
    /// Applied on top of `dpi` so an oversized page cannot exhaust memory.
    pub max_rendered_pixels: u32,

    /// OCR engine selection. Default: [`OcrBackend::Vision`].
    pub ocr_backend: OcrBackend,

    /// Tesseract language code(s), e.g. `eng` or `eng+deu`. Default: `eng`.
    pub ocr_language: String,

    /// Tesseract executable. Default: `tesseract` (looked up on `PATH`).
    pub tesseract_bin: PathBuf,

    /// Vision model identifier. If None, the provider default is used.
    pub model: Option<String>,

    /// Vision provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for transcription. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the vision model may generate per image. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a failed vision call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per vision call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom OCR system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Explicit pdfium shared library. If None, the working directory and then
    /// the system library path are tried.
    pub pdfium_lib_path: Option<PathBuf>,

    /// HTML-to-PDF engine executable. `None` disables the engine and forces
    /// the plain-text fallback PDF. Default: `wkhtmltopdf`.
    pub html_renderer: Option<PathBuf>,

    /// Time budget for a single file in seconds. Default: 120.
    pub file_timeout_secs: u64,

    /// Time budget for a whole batch in seconds. Default: 600.
    pub request_timeout_secs: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 2000,
            ocr_backend: OcrBackend::default(),
            ocr_language: "eng".to_string(),
            tesseract_bin: PathBuf::from("tesseract"),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            system_prompt: None,
            pdfium_lib_path: None,
            html_renderer: Some(PathBuf::from("wkhtmltopdf")),
            file_timeout_secs: 120,
            request_timeout_secs: 600,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("ocr_backend", &self.ocr_backend)
            .field("ocr_language", &self.ocr_language)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_retries", &self.max_retries)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("html_renderer", &self.html_renderer)
            .field("file_timeout_secs", &self.file_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn ocr_backend(mut self, backend: OcrBackend) -> Self {
        self.config.ocr_backend = backend;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_bin = path.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn html_renderer(mut self, path: Option<PathBuf>) -> Self {
        self.config.html_renderer = path;
        self
    }

    pub fn file_timeout_secs(mut self, secs: u64) -> Self {
        self.config.file_timeout_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ConvertError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.file_timeout_secs == 0 || c.request_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Configuration for the HTTP server.
#[derive(Clone)]
pub struct ServerConfig {
    /// Bind address. Default: `0.0.0.0`.
    pub host: String,

    /// Listen port. Default: 5000.
    pub port: u16,

    /// Flash-cookie signing secret. `None` means a random per-process key.
    pub secret_key: Option<String>,

    /// Directory under which per-request scratch areas are created.
    /// Default: the system temp directory.
    pub scratch_root: PathBuf,

    /// Maximum accepted request body in bytes. Default: 64 MiB.
    pub max_upload_bytes: usize,

    /// Routine configuration.
    pub conversion: ConversionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            secret_key: None,
            scratch_root: std::env::temp_dir(),
            max_upload_bytes: 64 * 1024 * 1024,
            conversion: ConversionConfig::default(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("scratch_root", &self.scratch_root)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("conversion", &self.conversion)
            .finish()
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn secret_key(mut self, secret: impl Into<String>) -> Self {
        self.config.secret_key = Some(secret.into());
        self
    }

    pub fn scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = root.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn conversion(mut self, conversion: ConversionConfig) -> Self {
        self.config.conversion = conversion;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, ConvertError> {
        let c = &self.config;
        if let Some(secret) = &c.secret_key {
            if secret.len() < MIN_SECRET_LEN {
                return Err(ConvertError::InvalidConfig(format!(
                    "secret key must be at least {MIN_SECRET_LEN} bytes, got {}",
                    secret.len()
                )));
            }
        }
        if c.max_upload_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.dpi, 200);
        assert_eq!(c.ocr_backend, OcrBackend::Vision);
        assert_eq!(c.html_renderer.as_deref(), Some(std::path::Path::new("wkhtmltopdf")));
    }

    #[test]
    fn dpi_is_clamped_by_builder() {
        let c = ConversionConfig::builder().dpi(9000).build().unwrap();
        assert_eq!(c.dpi, 400);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = ConversionConfig::builder().file_timeout_secs(0).build();
        assert!(matches!(err, Err(ConvertError::InvalidConfig(_))));
    }

    #[test]
    fn short_secret_rejected() {
        let err = ServerConfig::builder().secret_key("supersecret").build();
        assert!(matches!(err, Err(ConvertError::InvalidConfig(_))));
    }

    #[test]
    fn long_secret_accepted() {
        let c = ServerConfig::builder()
            .secret_key("x".repeat(MIN_SECRET_LEN))
            .port(8080)
            .build()
            .unwrap();
        assert_eq!(c.port, 8080);
        assert!(!format!("{c:?}").contains("xxxx"));
    }

    #[test]
    fn ocr_backend_parses() {
        assert_eq!("Tesseract".parse::<OcrBackend>().unwrap(), OcrBackend::Tesseract);
        assert_eq!("llm".parse::<OcrBackend>().unwrap(), OcrBackend::Vision);
        assert!("paddle".parse::<OcrBackend>().is_err());
    }
}
