//! # edgequake-exam
//!
//! Turn a photographed or scanned exam paper into structured JSON using
//! Gemini's vision models.
//!
//! ## Why this crate?
//!
//! Exam papers mix numbered questions, lettered options, mark allocations and
//! hand-drawn diagrams across many pages. OCR loses that structure. Instead
//! this crate sends every page as an image in **one** request and asks the
//! model, in JSON mode, for a typed tree of sections and questions that can
//! be rendered, searched or fed into a quiz app.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image / PDF
//!  │
//!  ├─ 1. Input     read file, sniff PNG / JPEG / WEBP / PDF from magic bytes
//!  ├─ 2. Preview   page 1 (or the image itself) for display, failure tolerated
//!  ├─ 3. Render    PDF pages → JPEG via pdfium (spawn_blocking, sequential)
//!  ├─ 4. Assemble  [image₁ … imageₙ, instruction]
//!  ├─ 5. Fetch     credential check, one Gemini generateContent call
//!  └─ 6. Parse     strip ```json fence, decode, validate → Exam
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_exam::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from GEMINI_API_KEY or API_KEY
//!     let config = ExtractionConfig::default();
//!     let output = extract("final-exam.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.exam)?);
//!     eprintln!("{} questions from {} pages",
//!         output.exam.question_count(),
//!         output.stats.page_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `exam2json` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-exam = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! PDF input needs the pdfium shared library at runtime. It is looked up via
//! `PDFIUM_LIB_PATH`, then next to the executable, then on the system library
//! path. Image input never touches pdfium.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod display;
pub mod error;
pub mod exam;
pub mod extract;
pub mod gemini;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::ExamError;
pub use exam::{Exam, ExamMetadata, ExamOption, Question, QuestionType, Section};
pub use extract::{
    extract, extract_from_bytes, extract_sync, extract_to_file, extract_with, inspect,
};
pub use gemini::GeminiClient;
pub use output::{DocumentInfo, ExtractionOutput, ExtractionStats, OutputFormat};
pub use pipeline::assemble::Part;
pub use pipeline::encode::ImagePart;
pub use pipeline::fetch::{ExamService, GenerateRequest, GenerateResponse};
pub use pipeline::input::{DocumentKind, InputDocument};
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer, Preview, RenderOptions};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
