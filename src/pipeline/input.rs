//! Input resolution: read the uploaded file and decide what it is.
//!
//! The type is sniffed from magic bytes rather than trusted from the file
//! name. The extension is only consulted to name the offending type when the
//! bytes match nothing we accept. Unsupported input is rejected here, before
//! any rendering or network work starts.

use crate::error::ExamError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The four document types the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
    Webp,
}

impl DocumentKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Png => "image/png",
            DocumentKind::Jpeg => "image/jpeg",
            DocumentKind::Webp => "image/webp",
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, DocumentKind::Pdf)
    }

    /// Map an explicit MIME type onto an accepted kind.
    pub fn from_mime(mime: &str) -> Result<Self, ExamError> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Ok(DocumentKind::Pdf),
            "image/png" => Ok(DocumentKind::Png),
            "image/jpeg" | "image/jpg" => Ok(DocumentKind::Jpeg),
            "image/webp" => Ok(DocumentKind::Webp),
            _ => Err(ExamError::UnsupportedFileType {
                mime: mime.to_string(),
            }),
        }
    }

    /// Detect the kind from the leading bytes of the file.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            Some(DocumentKind::Pdf)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(DocumentKind::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(DocumentKind::Jpeg)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(DocumentKind::Webp)
        } else {
            None
        }
    }
}

/// One uploaded document, fully read into memory.
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub bytes: Vec<u8>,
    pub kind: DocumentKind,
    /// Where the bytes came from, when they came from disk.
    pub source: Option<PathBuf>,
}

impl InputDocument {
    /// Wrap in-memory bytes with a caller-supplied MIME type.
    ///
    /// The MIME type must be on the allow-list; it is not cross-checked
    /// against the bytes.
    pub fn from_bytes(bytes: Vec<u8>, mime: &str) -> Result<Self, ExamError> {
        let kind = DocumentKind::from_mime(mime)?;
        Ok(Self {
            bytes,
            kind,
            source: None,
        })
    }

    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }
}

/// Read a local file and sniff its type.
pub async fn resolve_input(path: impl AsRef<Path>) -> Result<InputDocument, ExamError> {
    let path = path.as_ref().to_path_buf();

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExamError::PermissionDenied { path });
        }
        Err(_) => return Err(ExamError::FileNotFound { path }),
    };

    let kind = DocumentKind::sniff(&bytes).ok_or_else(|| ExamError::UnsupportedFileType {
        mime: guess_mime_from_extension(&path).to_string(),
    })?;

    debug!(
        "Resolved {} ({}, {} bytes)",
        path.display(),
        kind.mime_type(),
        bytes.len()
    );

    Ok(InputDocument {
        bytes,
        kind,
        source: Some(path),
    })
}

/// Best-effort MIME name for error messages only.
fn guess_mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "txt" => "text/plain",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
