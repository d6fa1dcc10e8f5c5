//! Configuration for a batch run.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The API key is not stored here: the
//! provider reads it from the environment when it is resolved.

use crate::error::AtasError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Default model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default OCR language (tesseract code for Portuguese).
pub const DEFAULT_OCR_LANGUAGE: &str = "por";

/// Configuration for a batch of session minutes.
///
/// # Example
/// ```rust
/// use atas2json::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .listing_url("https://camara.example.gov.br/atas?ano=2025")
///     .output_dir("public/atas")
///     .dpi(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr_language, "por");
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Listing page holding the links to the minutes. Required unless local
    /// PDFs are supplied directly.
    pub listing_url: Option<String>,

    /// Where downloaded PDFs land. Default: `./data`.
    pub download_dir: PathBuf,

    /// Root of the per-document directories. Default: `./atas`.
    pub output_dir: PathBuf,

    /// Scratch directory for page images. Cleared at the start of every
    /// document's extraction. Default: `./temp_images`.
    pub scratch_dir: PathBuf,

    /// Which rasterizer turns pages into PNGs. Default: [`RasterizerBackend::Pdftoppm`].
    pub rasterizer: RasterizerBackend,

    /// Rendering resolution for page images. Range: 72–600. Default: 300.
    ///
    /// Tesseract is tuned for roughly 300 DPI; scanned minutes read worse
    /// below 200.
    pub dpi: u32,

    /// Tesseract language code. Default: `por`.
    pub ocr_language: String,

    /// LLM model identifier. If None, [`DEFAULT_MODEL`] is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the model call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per document. Default: 8192.
    ///
    /// A long session can hold dozens of votes with a dozen members each;
    /// a low cap truncates the JSON and sends it to the diagnostic file.
    pub max_tokens: usize,

    /// Retries after a failed model call. Default: 0 (single request).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Connect + read timeout for the listing page and PDF downloads. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for one model call in seconds. Default: 180.
    pub api_timeout_secs: u64,

    /// Receives stage markers as documents move through the pipeline.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            listing_url: None,
            download_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("atas"),
            scratch_dir: PathBuf::from("temp_images"),
            rasterizer: RasterizerBackend::default(),
            dpi: 300,
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            max_retries: 0,
            retry_backoff_ms: 500,
            download_timeout_secs: 120,
            api_timeout_secs: 180,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("listing_url", &self.listing_url)
            .field("download_dir", &self.download_dir)
            .field("output_dir", &self.output_dir)
            .field("scratch_dir", &self.scratch_dir)
            .field("rasterizer", &self.rasterizer)
            .field("dpi", &self.dpi)
            .field("ocr_language", &self.ocr_language)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model name to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn listing_url(mut self, url: impl Into<String>) -> Self {
        self.config.listing_url = Some(url.into());
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.download_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn rasterizer(mut self, backend: RasterizerBackend) -> Self {
        self.config.rasterizer = backend;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
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

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, AtasError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(AtasError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(AtasError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(AtasError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.download_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(AtasError::InvalidConfig(
                "Timeouts must be at least one second".into(),
            ));
        }
        let scratch = absolute_lexical(&c.scratch_dir)?;
        for (role, dir) in [("output", &c.output_dir), ("download", &c.download_dir)] {
            if absolute_lexical(dir)?.starts_with(&scratch) {
                return Err(AtasError::InvalidConfig(format!(
                    "Scratch directory '{}' is cleared before every document and must not \
                     be or contain the {} directory '{}'",
                    c.scratch_dir.display(),
                    role,
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}

/// Absolute form of `path` with `.` and `..` folded away, without touching
/// the filesystem (the directories may not exist yet).
fn absolute_lexical(path: &Path) -> Result<PathBuf, AtasError> {
    let abs = std::path::absolute(path).map_err(|e| AtasError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut out = PathBuf::new();
    for component in abs.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which tool turns PDF pages into PNG images for OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RasterizerBackend {
    /// Spawn `pdftoppm` from poppler-utils. (default)
    #[default]
    Pdftoppm,
    /// Render in-process through libpdfium. Requires the `pdfium` feature.
    Pdfium,
}
