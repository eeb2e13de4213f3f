//! Response parsing: raw model text → validated [`Exam`].
//!
//! Three steps, each with its own failure kind:
//!
//! 1. strip a leading ```` ```json ```` and a trailing ```` ``` ```` if the
//!    model added them despite being in JSON mode,
//! 2. decode JSON ([`ExamError::MalformedResponse`] on failure),
//! 3. decode into the exam tree and check its invariants
//!    ([`ExamError::SchemaViolation`] on failure).
//!
//! The raw text goes to the `debug` log on failure and never into the error
//! returned to the caller beyond serde's short location message.

use crate::error::ExamError;
use crate::exam::Exam;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_LEADING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```json\n?").unwrap());
static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n?```$").unwrap());

/// Remove a leading ```` ```json ```` fence and a trailing ```` ``` ````.
///
/// Surrounding whitespace is trimmed first. Each fence is stripped at most
/// once and independently of the other, so a response cut off before its
/// closing fence still loses the opening one.
pub fn strip_json_fences(raw: &str) -> &str {
    let mut body = raw.trim();
    if let Some(m) = RE_LEADING_FENCE.find(body) {
        body = &body[m.end()..];
    }
    if let Some(m) = RE_TRAILING_FENCE.find(body) {
        body = &body[..m.start()];
    }
    body
}

/// Parse raw response text into an [`Exam`].
///
/// `validate` additionally runs [`Exam::validate`] (option ids, answers,
/// question numbers). Field presence and types are always enforced by the
/// decode itself.
pub fn parse_exam(raw: &str, validate: bool) -> Result<Exam, ExamError> {
    let body = strip_json_fences(raw);

    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        debug!("Undecodable response ({} chars):\n{}", raw.len(), raw);
        ExamError::MalformedResponse {
            detail: e.to_string(),
        }
    })?;

    if !value.is_object() {
        return Err(ExamError::SchemaViolation {
            detail: format!("expected a JSON object at the top level, got {}", kind_of(&value)),
        });
    }

    let exam: Exam = serde_json::from_value(value).map_err(|e| {
        debug!("Response does not fit the exam schema:\n{}", raw);
        ExamError::SchemaViolation {
            detail: e.to_string(),
        }
    })?;

    if validate {
        exam.validate()
            .map_err(|detail| ExamError::SchemaViolation { detail })?;
    }

    Ok(exam)
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exam::QuestionType;

    const MINIMAL: &str = r#"{"exam_metadata":{"course_code":"BIOM1010","course_name":"Foundations","institution":"UNSW","year":2024,"semester":"T1","exam_duration_minutes":90,"total_marks":null},"sections":[]}"#;

    const FULL: &str = r#"{
      "exam_metadata": {
        "course_code": "PHSL2101", "course_name": "Physiology 1A",
        "institution": "UNSW Sydney", "year": 2022, "semester": "Term 2",
        "exam_duration_minutes": 120, "total_marks": 100
      },
      "sections": [{
        "section_id": "A", "section_name": "MCQ",
        "recommended_time_minutes": 30, "total_questions": 40,
        "questions": [
          {"question_number": 1, "question_text": "Resting membrane potential is closest to",
           "marks": 1, "type": "multiple_choice",
           "options": [{"option_id": "A", "text": "-70 mV"}, {"option_id": "B", "text": "+30 mV"}],
           "correct_answer": "A", "explanation": "K+ leak dominates.",
           "topic_tags": ["neurophysiology"]},
          {"question_number": 2, "question_text": "Describe the baroreceptor reflex.",
           "marks": 5, "type": "short_answer",
           "model_answer": "Stretch receptors signal the medulla...",
           "sub_parts": [{"part": "a", "text": "afferent"}]}
        ]
      }]
    }"#;

    #[test]
    fn fence_stripped_once() {
        assert_eq!(strip_json_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_json_fences("  {\"a\":1}  "), "{\"a\":1}");
        // Only the outer wrapper goes.
        assert_eq!(
            strip_json_fences("```json\n```json\n{}\n```\n```"),
            "```json\n{}\n```"
        );
    }

    #[test]
    fn fences_stripped_independently() {
        assert_eq!(strip_json_fences("```json\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_json_fences("{\"a\":1}\n```"), "{\"a\":1}");
        let opened = format!("```json\n{MINIMAL}");
        let closed = format!("{MINIMAL}\n```");
        assert_eq!(parse_exam(&opened, true).unwrap(), parse_exam(MINIMAL, true).unwrap());
        assert_eq!(parse_exam(&closed, true).unwrap(), parse_exam(MINIMAL, true).unwrap());
    }

    #[test]
    fn untagged_opening_fence_is_kept() {
        assert_eq!(strip_json_fences("```\n{}\n```"), "```\n{}");
        assert!(matches!(
            parse_exam("```\n{}\n```", true),
            Err(ExamError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn whole_valued_floats_accepted_for_integer_fields() {
        let raw = FULL
            .replace("\"year\": 2022", "\"year\": 2022.0")
            .replace("\"exam_duration_minutes\": 120", "\"exam_duration_minutes\": 120.0")
            .replace("\"recommended_time_minutes\": 30", "\"recommended_time_minutes\": 30.0")
            .replace("\"total_questions\": 40", "\"total_questions\": 40.0")
            .replace("\"question_number\": 2", "\"question_number\": 2.0");
        let exam = parse_exam(&raw, true).unwrap();
        assert_eq!(exam, parse_exam(FULL, true).unwrap());
        assert_eq!(exam.exam_metadata.exam_duration_minutes, 120);
        assert_eq!(exam.sections[0].recommended_time_minutes, Some(30));
        assert_eq!(exam.sections[0].questions[1].question_number, 2);
    }

    #[test]
    fn fractional_or_negative_integer_fields_rejected() {
        for (from, to) in [
            ("\"exam_duration_minutes\": 120", "\"exam_duration_minutes\": 90.5"),
            ("\"total_questions\": 40", "\"total_questions\": -1"),
            ("\"question_number\": 1,", "\"question_number\": \"1\","),
        ] {
            let raw = FULL.replace(from, to);
            assert!(
                matches!(parse_exam(&raw, true), Err(ExamError::SchemaViolation { .. })),
                "input {to}"
            );
        }
    }

    #[test]
    fn null_recommended_time_is_none() {
        let raw = FULL.replace("\"recommended_time_minutes\": 30", "\"recommended_time_minutes\": null");
        let exam = parse_exam(&raw, true).unwrap();
        assert_eq!(exam.sections[0].recommended_time_minutes, None);
    }

    #[test]
    fn fenced_and_bare_decode_identically() {
        let fenced = format!("```json\n{FULL}\n```");
        assert_eq!(parse_exam(&fenced, true).unwrap(), parse_exam(FULL, true).unwrap());
    }

    #[test]
    fn minimal_exam_with_no_sections() {
        let exam = parse_exam(MINIMAL, true).unwrap();
        assert!(exam.sections.is_empty());
        assert_eq!(exam.exam_metadata.course_code, "BIOM1010");
        assert_eq!(exam.exam_metadata.total_marks, None);
    }

    #[test]
    fn full_exam_fields() {
        let exam = parse_exam(FULL, true).unwrap();
        let q = &exam.sections[0].questions;
        assert_eq!(q[0].question_type, QuestionType::MultipleChoice);
        assert_eq!(q[0].correct_option().unwrap().text, "-70 mV");
        assert_eq!(q[1].options, None);
        assert!(q[1].sub_parts.is_some());
        assert_eq!(exam.exam_metadata.total_marks, Some(100.0));
    }

    #[test]
    fn invalid_json_is_malformed() {
        for raw in ["", "not json", "{\"exam_metadata\": ", "```json\n{,}\n```"] {
            assert!(
                matches!(parse_exam(raw, true), Err(ExamError::MalformedResponse { .. })),
                "input {raw:?}"
            );
        }
    }

    #[test]
    fn missing_field_is_schema_violation() {
        let raw = MINIMAL.replace("\"course_code\":\"BIOM1010\",", "");
        match parse_exam(&raw, true) {
            Err(ExamError::SchemaViolation { detail }) => {
                assert!(detail.contains("course_code"), "got: {detail}")
            }
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn non_object_is_schema_violation() {
        assert!(matches!(
            parse_exam("[1,2,3]", true),
            Err(ExamError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn unknown_question_type_is_schema_violation() {
        let raw = FULL.replace("\"short_answer\"", "\"essay\"");
        assert!(matches!(
            parse_exam(&raw, true),
            Err(ExamError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn semantic_checks_can_be_disabled() {
        let raw = FULL.replace("\"correct_answer\": \"A\"", "\"correct_answer\": \"Z\"");
        assert!(matches!(
            parse_exam(&raw, true),
            Err(ExamError::SchemaViolation { .. })
        ));
        let exam = parse_exam(&raw, false).unwrap();
        assert_eq!(exam.sections[0].questions[0].correct_answer.as_deref(), Some("Z"));
    }

    #[test]
    fn parsing_is_idempotent() {
        let a = parse_exam(FULL, true).unwrap();
        let b = parse_exam(FULL, true).unwrap();
        assert_eq!(a, b);
    }
}
