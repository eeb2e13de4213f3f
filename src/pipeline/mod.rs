//! Pipeline stages for exam extraction.
//!
//! Each submodule implements exactly one transformation step and is tested on
//! its own. The two stages with external effects (rendering and the service
//! call) sit behind traits so the orchestrator can be driven by doubles.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ assemble ──▶ fetch ──▶ parse
//! (sniff)   (pdfium)   (JPEG)     (parts)      (Gemini)  (Exam)
//! ```
//!
//! 1. [`input`]: read the file and decide image vs PDF from its bytes
//! 2. [`render`]: rasterise every page in `spawn_blocking`; images skip this
//! 3. [`encode`]: JPEG-encode each page into an [`encode::ImagePart`]
//! 4. [`assemble`]: images in page order, instruction text last
//! 5. [`fetch`]: credential check, then exactly one request
//! 6. [`parse`]: strip a JSON fence, decode, validate

pub mod assemble;
pub mod encode;
pub mod fetch;
pub mod input;
pub mod parse;
pub mod render;
