//! Image encoding: `DynamicImage` → JPEG bytes wrapped in an [`ImagePart`].
//!
//! Pages go out as JPEG, the same lossy format a browser canvas produces with
//! `toDataURL('image/jpeg')`. A whole exam is sent in one request, so payload
//! size matters more here than in per-page conversion. Base64 is applied
//! later, at the wire boundary, so parts stay raw bytes in memory.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// One image in the request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImagePart {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Base64 of the raw bytes, as the service expects in `inlineData.data`.
    pub fn to_base64(&self) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        STANDARD.encode(&self.data)
    }
}

/// Encode a rasterised page as JPEG at the given quality (1–100).
///
/// JPEG has no alpha channel, so the image is flattened to RGB8 first.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<ImagePart, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))?;

    debug!(
        "Encoded {}x{} image → {} bytes JPEG (q={})",
        rgb.width(),
        rgb.height(),
        buf.len(),
        quality
    );

    Ok(ImagePart::new("image/jpeg", buf))
}
