//! Progress-callback trait for extraction stage events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to be told
//! when each stage of the pipeline starts and how it ended. The CLI uses this
//! to drive its spinner; library users can forward the events anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_exam::{ExtractionConfig, ExtractionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl ExtractionProgressCallback for PrintStages {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(PrintStages))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadingInput,
    Preview,
    Rasterizing,
    Requesting,
    Parsing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::ReadingInput => "reading input",
            Stage::Preview => "rendering preview",
            Stage::Rasterizing => "rasterising pages",
            Stage::Requesting => "waiting for the AI service",
            Stage::Parsing => "parsing response",
        })
    }
}

/// Called by the extraction pipeline as it moves through its stages.
///
/// The pipeline is sequential, so events never arrive concurrently, but the
/// trait is `Send + Sync` so implementations can be shared with other tasks.
/// All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// A stage is about to run.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Every PDF page has been rendered and encoded.
    ///
    /// # Arguments
    /// * `page_count`: number of image parts produced
    fn on_pages_rasterized(&self, page_count: usize) {
        let _ = page_count;
    }

    /// The request is on the wire.
    ///
    /// # Arguments
    /// * `part_count`: parts in the payload, text included
    /// * `payload_bytes`: raw (pre-base64) bytes of all image parts
    fn on_request_sent(&self, part_count: usize, payload_bytes: usize) {
        let _ = (part_count, payload_bytes);
    }

    /// The preview failed; extraction continues without it.
    fn on_preview_failed(&self, error: &str) {
        let _ = error;
    }

    /// Extraction produced an exam.
    ///
    /// # Arguments
    /// * `section_count`: sections in the decoded exam
    /// * `question_count`: questions across all sections
    fn on_complete(&self, section_count: usize, question_count: usize) {
        let _ = (section_count, question_count);
    }

    /// Extraction failed; no exam will be produced.
    fn on_failed(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
