//! Output types returned by the extraction entry points.

use crate::error::ExamError;
use crate::exam::Exam;
use crate::pipeline::render::Preview;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Result of one successful extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    pub exam: Exam,

    /// Page 1 (or the uploaded image) for display. `None` when preview
    /// generation is off or failed; a failed preview never fails the run.
    #[serde(serialize_with = "preview_as_data_uri")]
    pub preview: Option<Preview>,

    pub stats: ExtractionStats,
}

/// Timing and size figures for one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Detected MIME type of the input.
    pub source_mime: String,
    /// Pages in the PDF; 1 for an image.
    pub page_count: usize,
    /// Image parts sent to the service.
    pub image_parts: usize,
    pub prompt_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub render_duration_ms: u64,
    pub request_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// What [`crate::inspect`] reports about a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub mime_type: String,
    pub size_bytes: u64,
    /// `None` for images.
    pub page_count: Option<usize>,
}

/// File format for [`crate::extract_to_file`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// The bare exam tree as pretty-printed JSON.
    #[default]
    Json,
    /// [`Exam::to_markdown`].
    Markdown,
}

impl OutputFormat {
    pub fn render(&self, exam: &Exam) -> Result<String, ExamError> {
        match self {
            OutputFormat::Json => serde_json::to_string_pretty(exam)
                .map_err(|e| ExamError::Internal(format!("JSON serialisation failed: {e}"))),
            OutputFormat::Markdown => Ok(exam.to_markdown()),
        }
    }

    /// Conventional file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }

    /// `path` with [`extension`](Self::extension) added when it has none.
    pub fn with_default_extension(&self, path: &Path) -> PathBuf {
        if path.extension().is_some() {
            path.to_path_buf()
        } else {
            path.with_extension(self.extension())
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown format '{other}' (expected json or markdown)")),
        }
    }
}

fn preview_as_data_uri<S: Serializer>(preview: &Option<Preview>, s: S) -> Result<S::Ok, S::Error> {
    match preview {
        Some(p) => s.serialize_some(&p.to_data_uri()),
        None => s.serialize_none(),
    }
}
