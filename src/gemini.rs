//! Gemini `generateContent` client.
//!
//! One POST per extraction to `{base_url}/models/{model}:generateContent`,
//! authenticated with the `x-goog-api-key` header. Images travel as
//! `inlineData` parts (base64), the instruction as a trailing `text` part, and
//! the system prompt in `systemInstruction`. `responseMimeType` is always set
//! so the model answers with bare JSON.
//!
//! Wire structs are private; the rest of the crate only sees
//! [`GenerateRequest`] / [`GenerateResponse`].

use crate::config::ExtractionConfig;
use crate::error::ExamError;
use crate::pipeline::assemble::Part;
use crate::pipeline::fetch::{ExamService, GenerateRequest, GenerateResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Longest slice of an error body kept in a [`ExamError::TransportError`].
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Client for `base_url` with a whole-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ExamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExamError::Internal(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Client using the endpoint and timeout from `config`.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExamError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn transport_error(&self, e: reqwest::Error) -> ExamError {
        let detail = if e.is_timeout() {
            format!("request timed out after {}s", self.timeout.as_secs())
        } else if e.is_connect() {
            format!("could not connect to {}: {e}", self.base_url)
        } else {
            e.to_string()
        };
        ExamError::TransportError {
            status: e.status().map(|s| s.as_u16()),
            detail,
        }
    }
}

#[async_trait]
impl ExamService for GeminiClient {
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ExamError> {
        let url = self.endpoint(&request.model);
        let body = WireRequest::from(request);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            warn!("Gemini returned HTTP {}", status.as_u16());
            return Err(ExamError::TransportError {
                status: Some(status.as_u16()),
                detail: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let envelope: WireResponse =
            serde_json::from_str(&text).map_err(|e| ExamError::TransportError {
                status: Some(status.as_u16()),
                detail: format!("unreadable response envelope: {e}"),
            })?;

        Ok(envelope.into())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    system_instruction: WireContent,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
enum WirePart {
    #[serde(rename = "inlineData")]
    InlineData(WireBlob),
    #[serde(rename = "text")]
    Text(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    response_mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        match part {
            Part::InlineData(img) => WirePart::InlineData(WireBlob {
                mime_type: img.mime_type.clone(),
                data: img.to_base64(),
            }),
            Part::Text(t) => WirePart::Text(t.clone()),
        }
    }
}

impl From<&GenerateRequest> for WireRequest {
    fn from(request: &GenerateRequest) -> Self {
        WireRequest {
            contents: vec![WireContent {
                role: Some("user"),
                parts: request.parts.iter().map(WirePart::from).collect(),
            }],
            system_instruction: WireContent {
                role: None,
                parts: vec![WirePart::Text(request.system_instruction.clone())],
            },
            generation_config: WireGenerationConfig {
                response_mime_type: request.response_mime_type.clone(),
                temperature: request.temperature,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    prompt_feedback: Option<WirePromptFeedback>,
    usage_metadata: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseContent {
    #[serde(default)]
    parts: Vec<WireResponsePart>,
}

#[derive(Debug, Deserialize)]
struct WireResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

impl From<WireResponse> for GenerateResponse {
    fn from(wire: WireResponse) -> Self {
        let first = wire.candidates.into_iter().next();

        let finish_reason = first.as_ref().and_then(|c| c.finish_reason.clone());
        let text: Option<String> = first
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty());

        let block_reason = wire
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .or_else(|| {
                // A candidate that stopped for SAFETY etc. without text.
                finish_reason.filter(|r| text.is_none() && r != "STOP")
            });

        let (prompt_tokens, output_tokens) = wire
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((None, None));

        GenerateResponse {
            text,
            block_reason,
            prompt_tokens,
            output_tokens,
        }
    }
}
