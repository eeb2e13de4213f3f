//! Extraction entry points.
//!
//! Every entry point runs the same strictly sequential chain:
//!
//! ```text
//! resolve input → preview (isolated) → rasterise → assemble
//!   → credential check → one request → parse
//! ```
//!
//! Only the preview is allowed to fail without failing the run. Everything
//! else stops the attempt at the first error.

use crate::config::ExtractionConfig;
use crate::error::ExamError;
use crate::gemini::GeminiClient;
use crate::output::{DocumentInfo, ExtractionOutput, ExtractionStats, OutputFormat};
use crate::pipeline::assemble::assemble_parts;
use crate::pipeline::encode::ImagePart;
use crate::pipeline::fetch::{fetch_exam, ExamService};
use crate::pipeline::input::{self, InputDocument};
use crate::pipeline::parse::parse_exam;
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer, Preview, RenderOptions};
use crate::progress::Stage;
use crate::prompts::EXTRACTION_PROMPT;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract an exam from an image or PDF on disk.
///
/// This is the primary entry point for the library. It renders PDFs with
/// pdfium and talks to Gemini over HTTPS.
///
/// # Errors
/// Any [`ExamError`] except a preview failure, which is logged and reported
/// as `preview: None`.
pub async fn extract(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExamError> {
    let path = path.as_ref();
    info!("Starting extraction: {}", path.display());

    let result: Result<ExtractionOutput, ExamError> = async {
        stage(config, Stage::ReadingInput);
        let document = input::resolve_input(path).await?;
        let service = GeminiClient::from_config(config)?;
        run_pipeline(&PdfiumRasterizer, &service, document, config).await
    }
    .await;

    report(config, result)
}

/// Extract an exam from in-memory bytes with a known MIME type.
///
/// # Example
/// ```rust,no_run
/// use edgequake_exam::{extract_from_bytes, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("paper.jpg")?;
/// let output = extract_from_bytes(bytes, "image/jpeg", &ExtractionConfig::default()).await?;
/// println!("{}", output.exam.to_markdown());
/// # Ok(())
/// # }
/// ```
pub async fn extract_from_bytes(
    bytes: impl Into<Vec<u8>>,
    mime: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExamError> {
    let result: Result<ExtractionOutput, ExamError> = async {
        stage(config, Stage::ReadingInput);
        let document = InputDocument::from_bytes(bytes.into(), mime)?;
        let service = GeminiClient::from_config(config)?;
        run_pipeline(&PdfiumRasterizer, &service, document, config).await
    }
    .await;

    report(config, result)
}

/// Run the pipeline with caller-supplied rendering and service backends.
///
/// [`extract`] is this function with [`PdfiumRasterizer`] and
/// [`GeminiClient`] plugged in.
pub async fn extract_with(
    rasterizer: &dyn PageRasterizer,
    service: &dyn ExamService,
    document: InputDocument,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExamError> {
    let result = run_pipeline(rasterizer, service, document, config).await;
    report(config, result)
}

/// Extract and write the exam to `output_path` in `format`.
///
/// Uses atomic write (temp file + rename) so a failed run never leaves a
/// half-written file behind.
pub async fn extract_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    format: OutputFormat,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExamError> {
    let output = extract(path, config).await?;
    let rendered = format.render(&output.exam)?;
    write_atomic(output_path.as_ref(), rendered.as_bytes()).await?;
    Ok(output)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExamError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExamError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(path, config))
}

/// Report type, size and page count without contacting the AI service.
///
/// Does not require an API key.
pub async fn inspect(path: impl AsRef<Path>) -> Result<DocumentInfo, ExamError> {
    let document = input::resolve_input(path).await?;
    let page_count = if document.kind.is_image() {
        None
    } else {
        Some(PdfiumRasterizer.page_count(&document.bytes).await?)
    };
    Ok(DocumentInfo {
        mime_type: document.mime_type().to_string(),
        size_bytes: document.bytes.len() as u64,
        page_count,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_pipeline(
    rasterizer: &dyn PageRasterizer,
    service: &dyn ExamService,
    document: InputDocument,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExamError> {
    let total_start = Instant::now();
    let source_mime = document.mime_type();

    // ── Step 1: Preview ──────────────────────────────────────────────────
    let preview = if config.generate_preview {
        stage(config, Stage::Preview);
        match build_preview(rasterizer, &document, config).await {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("Preview failed, continuing without it: {}", e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_preview_failed(&e.to_string());
                }
                None
            }
        }
    } else {
        None
    };

    // ── Step 2: Image parts ──────────────────────────────────────────────
    let render_start = Instant::now();
    let images = if document.kind.is_image() {
        vec![ImagePart::new(source_mime, document.bytes)]
    } else {
        stage(config, Stage::Rasterizing);
        let options = RenderOptions {
            scale: config.render_scale,
            max_pixels: config.max_rendered_pixels,
            jpeg_quality: config.jpeg_quality,
        };
        let pages = rasterizer.rasterize(&document.bytes, options).await?;
        if pages.is_empty() {
            return Err(ExamError::EmptyDocument);
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_pages_rasterized(pages.len());
        }
        pages
    };
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    let image_parts = images.len();
    info!("Prepared {} image part(s) in {}ms", image_parts, render_duration_ms);

    // ── Step 3: Assemble + fetch ─────────────────────────────────────────
    let instruction = config
        .extraction_prompt
        .as_deref()
        .unwrap_or(EXTRACTION_PROMPT);
    let parts = assemble_parts(images, instruction);

    stage(config, Stage::Requesting);
    let request_start = Instant::now();
    let fetched = fetch_exam(service, config, parts).await?;
    let request_duration_ms = request_start.elapsed().as_millis() as u64;

    // ── Step 4: Parse ────────────────────────────────────────────────────
    stage(config, Stage::Parsing);
    let exam = parse_exam(&fetched.text, config.validate_schema)?;

    let stats = ExtractionStats {
        source_mime: source_mime.to_string(),
        page_count: image_parts,
        image_parts,
        prompt_tokens: fetched.prompt_tokens,
        output_tokens: fetched.output_tokens,
        render_duration_ms,
        request_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {} sections, {} questions, {}ms total",
        exam.sections.len(),
        exam.question_count(),
        stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        exam,
        preview,
        stats,
    })
}

/// Images are their own preview; PDFs get page 1 at the preview scale.
async fn build_preview(
    rasterizer: &dyn PageRasterizer,
    document: &InputDocument,
    config: &ExtractionConfig,
) -> Result<Preview, ExamError> {
    if document.kind.is_image() {
        return Ok(Preview {
            mime_type: document.mime_type().to_string(),
            data: document.bytes.clone(),
        });
    }
    let options = RenderOptions {
        scale: config.preview_scale,
        max_pixels: config.max_rendered_pixels,
        jpeg_quality: config.jpeg_quality,
    };
    rasterizer.render_preview(&document.bytes, options).await
}

fn stage(config: &ExtractionConfig, stage: Stage) {
    debug!("Stage: {}", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

fn report(
    config: &ExtractionConfig,
    result: Result<ExtractionOutput, ExamError>,
) -> Result<ExtractionOutput, ExamError> {
    if let Some(ref cb) = config.progress_callback {
        match &result {
            Ok(output) => cb.on_complete(output.exam.sections.len(), output.exam.question_count()),
            Err(e) => cb.on_failed(&e.to_string()),
        }
    }
    result
}

/// Write `contents` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ExamError> {
    let write_err = |e| ExamError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}
