//! Error types for the edgequake-exam library.
//!
//! Every failure is terminal for the current extraction attempt: nothing is
//! retried and no partial [`crate::Exam`] is ever returned. The variants map
//! one-to-one onto the stages of the pipeline so callers can tell an input
//! problem (wrong file type) from a configuration problem (no API key) from a
//! service problem (timeout, bad JSON).
//!
//! [`ExamError::user_message`] collapses any variant into a single line that
//! is safe to show an end user. Raw model output is never part of it.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-exam library.
#[derive(Debug, Error)]
pub enum ExamError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Exam file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The document is neither a PNG/JPEG/WEBP image nor a PDF.
    #[error("Unsupported file type '{mime}'. Please upload a PNG, JPEG or WEBP image or a PDF.")]
    UnsupportedFileType { mime: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF opened fine but reports zero pages.
    #[error("PDF has no pages.")]
    EmptyDocument,

    /// pdfium could not parse the document.
    #[error("PDF is corrupt or unreadable: {detail}")]
    CorruptPdf { detail: String },

    /// The PDF is encrypted; passwords are not supported.
    #[error("PDF is encrypted and requires a password.")]
    PasswordRequired,

    /// The rendering engine or a page bitmap could not be acquired.
    #[error("Could not acquire a drawing surface{}: {detail}", page_suffix(.page))]
    RenderSurfaceUnavailable { page: Option<usize>, detail: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// No API key was found in the config or the environment.
    #[error("No API credential configured.\nSet one of: {}", join_vars(.env_vars))]
    MissingCredential { env_vars: Vec<String> },

    /// Network failure, non-success HTTP status, or timeout.
    #[error("AI service request failed{}: {detail}", status_suffix(.status))]
    TransportError { status: Option<u16>, detail: String },

    /// The service answered but the answer carried no text.
    #[error("AI service returned an empty response{}", reason_suffix(.reason))]
    EmptyResponse { reason: Option<String> },

    /// The (fence-stripped) response text is not valid JSON.
    #[error("Failed to parse the response from the AI. The format might be incorrect: {detail}")]
    MalformedResponse { detail: String },

    /// The response is valid JSON but does not describe a well-formed exam.
    #[error("AI response does not match the exam schema: {detail}")]
    SchemaViolation { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExamError {
    /// One line suitable for an end user. Details useful only for diagnosis
    /// (HTTP bodies, serde paths) stay in the `Display` output and the logs.
    pub fn user_message(&self) -> String {
        match self {
            ExamError::UnsupportedFileType { .. } => {
                "Unsupported file type. Please upload an image or a PDF.".to_string()
            }
            ExamError::FileNotFound { .. } | ExamError::PermissionDenied { .. } => {
                "The selected file could not be read.".to_string()
            }
            ExamError::EmptyDocument => "The PDF has no pages.".to_string(),
            ExamError::CorruptPdf { .. } | ExamError::PasswordRequired => {
                "The PDF could not be opened.".to_string()
            }
            ExamError::RenderSurfaceUnavailable { .. } => {
                "The PDF could not be rendered on this machine.".to_string()
            }
            ExamError::MissingCredential { .. } => {
                "No API key is configured for the AI service.".to_string()
            }
            ExamError::TransportError { .. } => {
                "An error occurred while communicating with the AI service.".to_string()
            }
            ExamError::EmptyResponse { .. } => "The AI service returned no content.".to_string(),
            ExamError::MalformedResponse { .. } => {
                "Failed to parse the response from the AI. The format might be incorrect."
                    .to_string()
            }
            ExamError::SchemaViolation { .. } => {
                "The AI response was incomplete or did not describe a valid exam.".to_string()
            }
            ExamError::OutputWriteFailed { .. } => "Could not write the output file.".to_string(),
            ExamError::InvalidConfig(msg) => format!("Invalid configuration: {msg}"),
            ExamError::Internal(_) => "An unknown error occurred.".to_string(),
        }
    }
}

fn page_suffix(page: &Option<usize>) -> String {
    page.map(|p| format!(" for page {p}")).unwrap_or_default()
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" (blocked: {r})"))
        .unwrap_or_default()
}

fn join_vars(vars: &[String]) -> String {
    vars.join(", ")
}
