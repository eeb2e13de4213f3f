//! Request assembly: image parts + instruction text → one ordered payload.
//!
//! Images keep their original order and the instruction goes **last**. No
//! validation happens here; an empty image list passes through and the
//! service decides what to do with a text-only request.

use crate::pipeline::encode::ImagePart;

/// One unit of a multi-part request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Raw image bytes with their MIME type.
    InlineData(ImagePart),
    /// Plain instruction text.
    Text(String),
}

impl Part {
    pub fn is_image(&self) -> bool {
        matches!(self, Part::InlineData(_))
    }

    /// Raw (pre-base64) byte length of an image part, 0 for text.
    pub fn payload_len(&self) -> usize {
        match self {
            Part::InlineData(img) => img.data.len(),
            Part::Text(_) => 0,
        }
    }
}

/// Build `[image₁, …, imageₙ, text]`.
pub fn assemble_parts(images: Vec<ImagePart>, instruction: &str) -> Vec<Part> {
    let mut parts: Vec<Part> = Vec::with_capacity(images.len() + 1);
    parts.extend(images.into_iter().map(Part::InlineData));
    parts.push(Part::Text(instruction.to_string()));
    parts
}
