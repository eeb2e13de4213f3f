//! Exam fetching: one request to the AI service, raw text back.
//!
//! The service is reached through the narrow [`ExamService`] trait. The
//! production implementation is [`crate::gemini::GeminiClient`]; tests plug
//! in doubles. The API key is resolved before the service is touched, so a
//! missing credential never turns into a half-sent request.

use crate::config::ExtractionConfig;
use crate::error::ExamError;
use crate::pipeline::assemble::Part;
use crate::prompts::{RESPONSE_MIME_TYPE, SYSTEM_PROMPT};
use async_trait::async_trait;
use tracing::{debug, info};

/// Everything the service needs for one extraction call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    /// Ordered payload: images then instruction text.
    pub parts: Vec<Part>,
    pub system_instruction: String,
    /// Structured-output mode, always `application/json` for extraction.
    pub response_mime_type: String,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(config: &ExtractionConfig, parts: Vec<Part>) -> Self {
        Self {
            model: config.model.clone(),
            parts,
            system_instruction: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
            response_mime_type: RESPONSE_MIME_TYPE.to_string(),
            temperature: config.temperature,
        }
    }
}

/// What came back from the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    /// Concatenated text of the first candidate, if any.
    pub text: Option<String>,
    /// Why the prompt was blocked, when the service says so.
    pub block_reason: Option<String>,
    pub prompt_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

/// The capability the pipeline needs from an AI backend.
#[async_trait]
pub trait ExamService: Send + Sync {
    /// Issue exactly one request. Network and HTTP failures come back as
    /// [`ExamError::TransportError`].
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ExamError>;
}

/// Raw model text plus usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedText {
    pub text: String,
    pub prompt_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

/// Resolve the credential, send the payload once, and return the raw text.
///
/// # Errors
/// - [`ExamError::MissingCredential`] before any call if no key is configured
/// - [`ExamError::TransportError`] from the service, unchanged
/// - [`ExamError::EmptyResponse`] if the reply carries no text
pub async fn fetch_exam(
    service: &dyn ExamService,
    config: &ExtractionConfig,
    parts: Vec<Part>,
) -> Result<FetchedText, ExamError> {
    let api_key = config.resolve_api_key()?;
    let request = GenerateRequest::new(config, parts);

    let payload_bytes: usize = request.parts.iter().map(Part::payload_len).sum();
    info!(
        "Sending {} parts ({} images, {} bytes) to {}",
        request.parts.len(),
        request.parts.iter().filter(|p| p.is_image()).count(),
        payload_bytes,
        request.model
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_request_sent(request.parts.len(), payload_bytes);
    }

    let response = service.generate(&api_key, &request).await?;

    let text = response
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or(ExamError::EmptyResponse {
            reason: response.block_reason,
        })?;

    debug!(
        "Response: {} chars, tokens {:?} in / {:?} out",
        text.len(),
        response.prompt_tokens,
        response.output_tokens
    );

    Ok(FetchedText {
        text,
        prompt_tokens: response.prompt_tokens,
        output_tokens: response.output_tokens,
    })
}
