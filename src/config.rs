//! Configuration types for exam extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Setters clamp out-of-range values;
//! [`ExtractionConfigBuilder::build`] rejects combinations that cannot work.

use crate::error::ExamError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables searched for the API key, in order.
pub const DEFAULT_API_KEY_ENV: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Configuration for one exam extraction.
///
/// # Example
/// ```rust
/// use edgequake_exam::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gemini-2.5-pro")
///     .render_scale(3.0)
///     .request_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.render_scale, 3.0);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Gemini model identifier. Default: `gemini-2.5-flash`.
    pub model: String,

    /// REST base URL, without a trailing slash.
    pub base_url: String,

    /// Explicit API key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,

    /// Environment variables searched for the API key, first non-empty wins.
    pub api_key_env: Vec<String>,

    /// Page scale used when rasterising a PDF for extraction. Range 0.5–6.0.
    /// Default: 2.0.
    pub render_scale: f32,

    /// Page scale for the page-1 preview. Range 0.5–6.0. Default: 1.5.
    pub preview_scale: f32,

    /// Cap on the longest rendered edge in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// JPEG quality (1–100) for rasterised pages. Default: 92.
    pub jpeg_quality: u8,

    /// Render a preview alongside the extraction. Default: true.
    pub generate_preview: bool,

    /// Whole-request timeout in seconds. Default: 300.
    pub request_timeout_secs: u64,

    /// Sampling temperature. `None` leaves the service default.
    pub temperature: Option<f32>,

    /// Custom system instruction. If None, uses [`crate::prompts::SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Custom final text part. If None, uses [`crate::prompts::EXTRACTION_PROMPT`].
    pub extraction_prompt: Option<String>,

    /// Run the semantic exam checks after decoding. Default: true.
    pub validate_schema: bool,

    /// Optional per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.iter().map(|s| s.to_string()).collect(),
            render_scale: 2.0,
            preview_scale: 1.5,
            max_rendered_pixels: 4000,
            jpeg_quality: 92,
            generate_preview: true,
            request_timeout_secs: 300,
            temperature: None,
            system_prompt: None,
            extraction_prompt: None,
            validate_schema: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("render_scale", &self.render_scale)
            .field("preview_scale", &self.preview_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("generate_preview", &self.generate_preview)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("temperature", &self.temperature)
            .field("validate_schema", &self.validate_schema)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Look up the API key: explicit value first, then each env var in order.
    ///
    /// Empty strings count as absent. Fails with
    /// [`ExamError::MissingCredential`] without touching the network.
    pub fn resolve_api_key(&self) -> Result<String, ExamError> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }
        self.api_key_env
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| ExamError::MissingCredential {
                env_vars: self.api_key_env.clone(),
            })
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Replace the list of env vars searched for the key.
    pub fn api_key_env<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.api_key_env = vars.into_iter().map(Into::into).collect();
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.5, 6.0);
        self
    }

    pub fn preview_scale(mut self, scale: f32) -> Self {
        self.config.preview_scale = scale.clamp(0.5, 6.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn generate_preview(mut self, v: bool) -> Self {
        self.config.generate_preview = v;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn validate_schema(mut self, v: bool) -> Self {
        self.config.validate_schema = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExamError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ExamError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(ExamError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if c.request_timeout_secs == 0 {
            return Err(ExamError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.api_key.is_none() && c.api_key_env.is_empty() {
            return Err(ExamError::InvalidConfig(
                "no API key and no env var to read it from".into(),
            ));
        }
        Ok(self.config)
    }
}
