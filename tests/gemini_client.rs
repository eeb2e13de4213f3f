//! `GeminiClient` against a loopback HTTP stub.
//!
//! Each test binds `127.0.0.1:0`, serves exactly one canned HTTP/1.1
//! response, and hands back the raw request for inspection.

use edgequake_exam::prompts::SYSTEM_PROMPT;
use edgequake_exam::{
    extract_to_file, extract_with, ExamError, ExamService, ExtractionConfig, GeminiClient, GenerateRequest,
    ImagePart, InputDocument, OutputFormat, Part, PdfiumRasterizer,
};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

// ── Stub server ──────────────────────────────────────────────────────────────

/// Serve one response; the handle resolves to the raw request text.
async fn serve_once(status_line: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let request = read_request(&mut sock).await;
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(response.as_bytes()).await.unwrap();
        let _ = sock.shutdown().await;
        request
    });
    (format!("http://{addr}/v1beta"), handle)
}

async fn read_request(sock: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = sock.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn split_request(raw: &str) -> (&str, Value) {
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    (head, serde_json::from_str(body).unwrap())
}

fn request() -> GenerateRequest {
    GenerateRequest {
        model: "gemini-2.5-flash".into(),
        parts: vec![
            Part::InlineData(ImagePart::new("image/png", b"png-bytes".to_vec())),
            Part::Text("extract".into()),
        ],
        system_instruction: SYSTEM_PROMPT.into(),
        response_mime_type: "application/json".into(),
        temperature: Some(0.2),
    }
}

fn client(base_url: &str, secs: u64) -> GeminiClient {
    GeminiClient::new(base_url, Duration::from_secs(secs)).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn posts_generate_content_with_key_header() {
    let reply = json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"ok\":true}"}]},
                        "finishReason": "STOP"}],
        "usageMetadata": {"promptTokenCount": 321, "candidatesTokenCount": 12}
    });
    let (base_url, server) = serve_once("200 OK", reply.to_string()).await;

    let response = client(&base_url, 10)
        .generate("secret-key", &request())
        .await
        .unwrap();

    assert_eq!(response.text.as_deref(), Some("{\"ok\":true}"));
    assert_eq!(response.prompt_tokens, Some(321));
    assert_eq!(response.output_tokens, Some(12));

    let raw = server.await.unwrap();
    let (head, body) = split_request(&raw);
    assert!(
        head.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent HTTP/1.1"),
        "got: {head}"
    );
    assert!(head.to_ascii_lowercase().contains("x-goog-api-key: secret-key"));

    let parts = &body["contents"][0]["parts"];
    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[0]["inlineData"]["data"], "cG5nLWJ5dGVz");
    assert_eq!(parts[1]["text"], "extract");
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], SYSTEM_PROMPT);
    assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let body = json!({"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}});
    let (base_url, server) = serve_once("400 Bad Request", body.to_string()).await;

    let err = client(&base_url, 10)
        .generate("bad", &request())
        .await
        .unwrap_err();
    server.await.unwrap();

    match err {
        ExamError::TransportError { status, detail } => {
            assert_eq!(status, Some(400));
            assert!(detail.contains("API key not valid"), "got: {detail}");
        }
        other => panic!("expected TransportError, got {other:?}"),
    }
}

#[tokio::test]
async fn unreadable_envelope_is_transport_error() {
    let (base_url, server) = serve_once("200 OK", "<html>gateway</html>".into()).await;

    let err = client(&base_url, 10)
        .generate("k", &request())
        .await
        .unwrap_err();
    server.await.unwrap();

    assert!(matches!(
        err,
        ExamError::TransportError {
            status: Some(200),
            ..
        }
    ));
}

#[tokio::test]
async fn slow_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let _ = read_request(&mut sock).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let err = client(&format!("http://{addr}/v1beta"), 1)
        .generate("k", &request())
        .await
        .unwrap_err();
    server.abort();

    match err {
        ExamError::TransportError { status, detail } => {
            assert_eq!(status, None);
            assert!(detail.contains("timed out"), "got: {detail}");
        }
        other => panic!("expected TransportError, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}/v1beta"), 5)
        .generate("k", &request())
        .await
        .unwrap_err();

    assert!(matches!(err, ExamError::TransportError { status: None, .. }));
}

#[tokio::test]
async fn blocked_prompt_surfaces_as_empty_response() {
    let reply = json!({"promptFeedback": {"blockReason": "SAFETY"}});
    let (base_url, server) = serve_once("200 OK", reply.to_string()).await;

    let config = ExtractionConfig::builder()
        .base_url(base_url)
        .api_key("k")
        .build()
        .unwrap();
    let service = GeminiClient::from_config(&config).unwrap();
    let document = InputDocument::from_bytes(vec![0x89, b'P', b'N', b'G'], "image/png").unwrap();

    let err = extract_with(&PdfiumRasterizer, &service, document, &config)
        .await
        .unwrap_err();
    server.await.unwrap();

    match err {
        ExamError::EmptyResponse { reason } => assert_eq!(reason.as_deref(), Some("SAFETY")),
        other => panic!("expected EmptyResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn image_extraction_end_to_end_over_http() {
    let exam = json!({
        "exam_metadata": {"course_code": "ANAT1521", "course_name": "Anatomy", "institution": "UNSW",
                          "year": 2022, "semester": "T1", "exam_duration_minutes": 45},
        "sections": [{"section_id": "1", "section_name": "Short answer", "total_questions": 1,
                      "questions": [{"question_number": 1, "question_text": "Name the rotator cuff muscles.",
                                     "marks": 4, "type": "short_answer",
                                     "model_answer": "Supraspinatus, infraspinatus, teres minor, subscapularis"}]}]
    });
    let fenced = format!("```json\n{}\n```", serde_json::to_string_pretty(&exam).unwrap());
    let reply = json!({"candidates": [{"content": {"parts": [{"text": fenced}]}}]});
    let (base_url, server) = serve_once("200 OK", reply.to_string()).await;

    let config = ExtractionConfig::builder()
        .base_url(base_url)
        .api_key("k")
        .build()
        .unwrap();
    let service = GeminiClient::from_config(&config).unwrap();
    let document = InputDocument::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xDB], "image/jpeg").unwrap();

    let output = extract_with(&PdfiumRasterizer, &service, document, &config)
        .await
        .unwrap();
    let raw = server.await.unwrap();

    let (_, body) = split_request(&raw);
    assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 2);
    assert_eq!(output.exam.exam_metadata.course_code, "ANAT1521");
    assert_eq!(output.exam.exam_metadata.total_marks, None);
    assert_eq!(output.exam.question_count(), 1);
    assert_eq!(output.stats.prompt_tokens, None);
}

#[tokio::test]
async fn extract_to_file_writes_rendered_markdown() {
    let exam = json!({
        "exam_metadata": {"course_code": "PATH2201", "course_name": "Pathology", "institution": "UNSW",
                          "year": 2023, "semester": "T3", "exam_duration_minutes": 60},
        "sections": [{"section_id": "A", "section_name": "MCQ", "total_questions": 1,
                      "questions": [{"question_number": 1, "question_text": "Hallmark of necrosis?",
                                     "marks": 1, "type": "multiple_choice",
                                     "options": [{"option_id": "A", "text": "Karyolysis"},
                                                 {"option_id": "B", "text": "Blebbing"}],
                                     "correct_answer": "A"}]}]
    });
    let reply = json!({"candidates": [{"content": {"parts": [{"text": exam.to_string()}]}}]});
    let (base_url, server) = serve_once("200 OK", reply.to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("page.png");
    std::fs::write(&input, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap();
    let target = dir.path().join("out/exam.md");

    let config = ExtractionConfig::builder()
        .base_url(base_url)
        .api_key("k")
        .build()
        .unwrap();
    let output = extract_to_file(&input, &target, OutputFormat::Markdown, &config)
        .await
        .unwrap();
    server.await.unwrap();

    let written = std::fs::read_to_string(&target).unwrap();
    assert_eq!(written, output.exam.to_markdown());
    assert!(written.starts_with("# PATH2201: Pathology"));
    assert!(written.contains("✅"));
    assert!(!dir.path().join("out/exam.md.tmp").exists());
}
