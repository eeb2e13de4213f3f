//! Input resolution through the public entry points.
//!
//! Every case here fails (or finishes) before any rendering or network work,
//! so no pdfium and no API key are needed.

use edgequake_exam::pipeline::input::resolve_input;
use edgequake_exam::{
    extract, extract_from_bytes, inspect, DocumentKind, ExamError, ExtractionConfig,
    ExtractionProgressCallback, Stage,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Events {
    stages: Mutex<Vec<Stage>>,
    failed: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for Events {
    fn on_stage_start(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }
    fn on_failed(&self, error: &str) {
        self.failed.lock().unwrap().push(error.to_string());
    }
}

fn write_temp(name: &str, bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    (dir, path)
}

#[tokio::test]
async fn detects_kind_from_content_not_extension() {
    let (_dir, path) = write_temp("scan.pdf", &[0xFF, 0xD8, 0xFF, 0xE1, 0, 0]);
    let doc = resolve_input(&path).await.unwrap();
    assert_eq!(doc.kind, DocumentKind::Jpeg);
    assert_eq!(doc.source.as_deref(), Some(path.as_path()));
}

#[tokio::test]
async fn missing_file_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = resolve_input(dir.path().join("nope.pdf")).await.unwrap_err();
    assert!(matches!(err, ExamError::FileNotFound { .. }));
}

#[tokio::test]
async fn gif_is_rejected_before_anything_else() {
    let (_dir, path) = write_temp("diagram.gif", b"GIF89a\x01\x00\x01\x00");
    let events = Arc::new(Events::default());
    let config = ExtractionConfig::builder()
        .api_key_env(["EDGEQUAKE_EXAM_INPUT_TEST_UNSET"])
        .progress_callback(events.clone())
        .build()
        .unwrap();

    let err = extract(&path, &config).await.unwrap_err();

    match err {
        ExamError::UnsupportedFileType { ref mime } => assert_eq!(mime, "image/gif"),
        ref other => panic!("expected UnsupportedFileType, got {other:?}"),
    }
    assert_eq!(*events.stages.lock().unwrap(), vec![Stage::ReadingInput]);
    assert_eq!(events.failed.lock().unwrap().len(), 1);
    assert_eq!(
        err.user_message(),
        "Unsupported file type. Please upload an image or a PDF."
    );
}

#[tokio::test]
async fn unsupported_mime_from_bytes() {
    let config = ExtractionConfig::builder().api_key("k").build().unwrap();
    let err = extract_from_bytes(b"hello".to_vec(), "text/plain", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ExamError::UnsupportedFileType { .. }));
}

#[tokio::test]
async fn inspect_webp_without_key() {
    let mut webp = b"RIFF\x1a\0\0\0WEBPVP8L".to_vec();
    webp.extend_from_slice(&[0; 14]);
    let (_dir, path) = write_temp("q.webp", &webp);

    let info = inspect(&path).await.unwrap();
    assert_eq!(info.mime_type, "image/webp");
    assert_eq!(info.size_bytes, webp.len() as u64);
    assert_eq!(info.page_count, None);
}
