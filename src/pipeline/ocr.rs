//! OCR engines: turn a raster image into plain text.
//!
//! The routines only see the [`OcrEngine`] trait. Two implementations ship:
//!
//! * [`VisionOcr`] — a vision LLM through edgequake-llm, with retry and
//!   exponential backoff (`retry_backoff_ms * 2^attempt`) and a per-call
//!   timeout. Handles skewed photos and mixed layouts well.
//! * [`TesseractOcr`] — the local `tesseract` binary. No network, no key.
//!
//! [`build_engine`] picks one from [`ConversionConfig::ocr_backend`].

use crate::config::{ConversionConfig, OcrBackend};
use crate::error::OcrError;
use crate::pipeline::{encode, postprocess};
use crate::prompts::DEFAULT_OCR_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Recognises the text in an image.
///
/// Implementations must be `Send + Sync`; a single engine is shared by every
/// request through the application state.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Return the cleaned text found in `image` (possibly empty).
    async fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// Build the engine selected by `config`.
pub fn build_engine(config: &ConversionConfig) -> Result<Arc<dyn OcrEngine>, OcrError> {
    match config.ocr_backend {
        OcrBackend::Vision => {
            let provider = resolve_provider(config)?;
            info!("OCR engine: vision ({})", provider.name());
            Ok(Arc::new(VisionOcr::new(provider, config)))
        }
        OcrBackend::Tesseract => {
            info!(
                "OCR engine: tesseract ({}, lang={})",
                config.tesseract_bin.display(),
                config.ocr_language
            );
            Ok(Arc::new(TesseractOcr::new(
                config.tesseract_bin.clone(),
                config.ocr_language.clone(),
            )))
        }
    }
}

// ── Vision LLM ───────────────────────────────────────────────────────────────

/// OCR through a vision-capable LLM provider.
pub struct VisionOcr {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl VisionOcr {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_OCR_PROMPT.to_string()),
            options: CompletionOptions {
                temperature: Some(config.temperature),
                max_tokens: Some(config.max_tokens),
                ..Default::default()
            },
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    fn name(&self) -> &str {
        "vision"
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let start = Instant::now();
        let attachment =
            encode::vision_attachment(image).map_err(|e| OcrError::Encode(e.to_string()))?;

        // Empty user text: the image carries the content.
        let messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user_with_images("", vec![attachment]),
        ];

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "OCR retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(&messages, Some(&self.options));
            match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "OCR: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(postprocess::clean_ocr_text(&response.content));
                }
                Ok(Err(e)) => {
                    let msg = e.to_string();
                    warn!("OCR attempt {} failed — {}", attempt + 1, msg);
                    last_err = Some(msg);
                }
                Err(_) => {
                    warn!(
                        "OCR attempt {} timed out after {}s",
                        attempt + 1,
                        self.api_timeout_secs
                    );
                    last_err = Some(
                        OcrError::Timeout {
                            secs: self.api_timeout_secs,
                        }
                        .to_string(),
                    );
                }
            }
        }

        Err(OcrError::LlmFailed {
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, OcrError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        OcrError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision provider, from most-specific to least-specific:
///
/// 1. pre-built `config.provider`
/// 2. `config.provider_name` + `config.model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is present
/// 5. `ProviderFactory::from_env` auto-detection
fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, OcrError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| OcrError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY or ANTHROPIC_API_KEY, or use --ocr-backend tesseract.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

// ── Unavailable ──────────────────────────────────────────────────────────────

/// Stands in when the configured engine could not be built, so routines
/// that never OCR keep working. Every call returns the build error.
pub struct UnavailableOcr {
    error: OcrError,
}

impl UnavailableOcr {
    pub fn new(error: OcrError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl OcrEngine for UnavailableOcr {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
        Err(self.error.clone())
    }
}

// ── Tesseract ────────────────────────────────────────────────────────────────

/// OCR through the `tesseract` command-line tool.
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
}

impl TesseractOcr {
    pub fn new(binary: PathBuf, language: String) -> Self {
        Self { binary, language }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let png = encode::png_bytes(image).map_err(|e| OcrError::Encode(e.to_string()))?;

        // Removed when `input` drops, on every path.
        let mut input = tempfile::Builder::new()
            .prefix("ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Tesseract(format!("tempfile: {e}")))?;
        input
            .write_all(&png)
            .map_err(|e| OcrError::Tesseract(format!("tempfile write: {e}")))?;

        let output = tokio::process::Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| OcrError::Tesseract(format!("{}: {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Tesseract(format!(
                "exit {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(postprocess::clean_ocr_text(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[tokio::test]
    async fn missing_tesseract_binary_is_an_error() {
        let engine = TesseractOcr::new(
            PathBuf::from("/definitely/not/tesseract"),
            "eng".to_string(),
        );
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])));
        let err = engine.recognize(&img).await.unwrap_err();
        assert!(matches!(err, OcrError::Tesseract(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn unavailable_engine_repeats_build_error() {
        let engine = UnavailableOcr::new(OcrError::ProviderNotConfigured {
            provider: "auto".into(),
            hint: "set OPENAI_API_KEY".into(),
        });
        let img = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        for _ in 0..2 {
            let err = engine.recognize(&img).await.unwrap_err();
            assert!(err.to_string().contains("OPENAI_API_KEY"));
        }
    }

    #[test]
    fn tesseract_backend_builds_without_network() {
        let config = ConversionConfig::builder()
            .ocr_backend(OcrBackend::Tesseract)
            .build()
            .unwrap();
        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.name(), "tesseract");
    }
}
