//! PDF rasterisation via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. All pdfium work runs on one `spawn_blocking` thread. Pages are
//! rendered one after another on that thread: each page gets its own bitmap,
//! which is encoded to JPEG and dropped before the next page is touched, so
//! at most one page's pixels are alive at a time.
//!
//! ## Engine setup
//!
//! The pdfium library location is resolved once per process and cached in a
//! `OnceLock`. Binding itself is cheap and happens per call, so no pdfium
//! handle outlives the call that created it.

use crate::error::ExamError;
use crate::pipeline::encode::{encode_jpeg, ImagePart};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Knobs for one rasterisation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Multiplier on the page's natural size (1.0 = 72 DPI).
    pub scale: f32,
    /// Cap on the longest edge, in pixels.
    pub max_pixels: u32,
    /// JPEG quality, 1–100.
    pub jpeg_quality: u8,
}

/// A displayable page-1 image for the user, not sent to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Preview {
    /// `data:` URI suitable for an `<img src>` or a terminal image protocol.
    pub fn to_data_uri(&self) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

impl From<ImagePart> for Preview {
    fn from(part: ImagePart) -> Self {
        Self {
            mime_type: part.mime_type,
            data: part.data,
        }
    }
}

/// Turns PDF bytes into page images.
///
/// The pipeline only talks to this trait, so rendering can be replaced in
/// tests or by another backend.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Number of pages in the document.
    async fn page_count(&self, pdf: &[u8]) -> Result<usize, ExamError>;

    /// Render every page, page 1 first. Fails with
    /// [`ExamError::EmptyDocument`] if there are no pages.
    async fn rasterize(
        &self,
        pdf: &[u8],
        options: RenderOptions,
    ) -> Result<Vec<ImagePart>, ExamError>;

    /// Render page 1 only, as a preview image.
    async fn render_preview(&self, pdf: &[u8], options: RenderOptions)
        -> Result<Preview, ExamError>;
}

/// The default [`PageRasterizer`], backed by pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumRasterizer;

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn page_count(&self, pdf: &[u8]) -> Result<usize, ExamError> {
        let bytes = pdf.to_vec();
        tokio::task::spawn_blocking(move || {
            let pdfium = bind_pdfium()?;
            let document = open_document(&pdfium, bytes)?;
            let count = document.pages().len() as usize;
            Ok(count)
        })
        .await
        .map_err(|e| ExamError::Internal(format!("Page-count task panicked: {}", e)))?
    }

    async fn rasterize(
        &self,
        pdf: &[u8],
        options: RenderOptions,
    ) -> Result<Vec<ImagePart>, ExamError> {
        let bytes = pdf.to_vec();
        tokio::task::spawn_blocking(move || render_pages_blocking(bytes, options, None))
            .await
            .map_err(|e| ExamError::Internal(format!("Render task panicked: {}", e)))?
    }

    async fn render_preview(
        &self,
        pdf: &[u8],
        options: RenderOptions,
    ) -> Result<Preview, ExamError> {
        let bytes = pdf.to_vec();
        let mut pages =
            tokio::task::spawn_blocking(move || render_pages_blocking(bytes, options, Some(1)))
                .await
                .map_err(|e| ExamError::Internal(format!("Preview task panicked: {}", e)))??;
        pages
            .pop()
            .map(Preview::from)
            .ok_or(ExamError::EmptyDocument)
    }
}

/// Blocking implementation of page rendering.
///
/// `limit` stops after that many pages (the preview path passes 1).
fn render_pages_blocking(
    bytes: Vec<u8>,
    options: RenderOptions,
    limit: Option<usize>,
) -> Result<Vec<ImagePart>, ExamError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, bytes)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(ExamError::EmptyDocument);
    }
    info!("PDF loaded: {} pages", total_pages);

    let max_px = options.max_pixels as i32;
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(options.scale)
        .set_maximum_width(max_px)
        .set_maximum_height(max_px);

    let wanted = limit.unwrap_or(total_pages).min(total_pages);
    let mut parts = Vec::with_capacity(wanted);

    for (idx, page) in pages.iter().take(wanted).enumerate() {
        let page_num = idx + 1;
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ExamError::RenderSurfaceUnavailable {
                page: Some(page_num),
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        let part = encode_jpeg(&image, options.jpeg_quality).map_err(|e| {
            ExamError::RenderSurfaceUnavailable {
                page: Some(page_num),
                detail: format!("JPEG encoding failed: {}", e),
            }
        })?;
        parts.push(part);
        // `bitmap` and `image` drop here, before the next page renders.
    }

    Ok(parts)
}

fn open_document(pdfium: &Pdfium, bytes: Vec<u8>) -> Result<PdfDocument<'_>, ExamError> {
    pdfium.load_pdf_from_byte_vec(bytes, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            ExamError::PasswordRequired
        } else {
            ExamError::CorruptPdf { detail: err_str }
        }
    })
}

// ── Engine binding ───────────────────────────────────────────────────────

static LIBRARY_PATH: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Bind to the pdfium shared library.
///
/// Lookup order, resolved once per process:
/// 1. `PDFIUM_LIB_PATH` (a library file or the directory containing it)
/// 2. the platform library next to the running executable
/// 3. the system library search path
pub fn bind_pdfium() -> Result<Pdfium, ExamError> {
    let bindings = match library_path() {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExamError::RenderSurfaceUnavailable {
        page: None,
        detail: format!(
            "failed to bind pdfium ({}): {:?}\nSet PDFIUM_LIB_PATH=/path/to/libpdfium.",
            library_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "system library".to_string()),
            e
        ),
    })?;
    Ok(Pdfium::new(bindings))
}

/// The resolved library location, or `None` for the system search path.
pub fn library_path() -> Option<&'static Path> {
    LIBRARY_PATH.get_or_init(resolve_library_path).as_deref()
}

fn resolve_library_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        if !p.trim().is_empty() {
            let path = PathBuf::from(p);
            let resolved = if path.is_dir() {
                platform_library_in(&path)
            } else {
                path
            };
            debug!("pdfium from PDFIUM_LIB_PATH: {}", resolved.display());
            return Some(resolved);
        }
    }

    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(platform_library_in))
        .filter(|p| p.exists());
    if let Some(ref p) = beside_exe {
        debug!("pdfium next to executable: {}", p.display());
    }
    beside_exe
}

/// Platform-specific library file name (`libpdfium.so`, …) inside `dir`.
fn platform_library_in(dir: &Path) -> PathBuf {
    PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(
        &*dir.to_string_lossy(),
    ))
}
