//! The decoded exam tree.
//!
//! Field names follow the JSON schema that the system prompt asks the model
//! to produce, so the types deserialize straight from the response. The tree
//! is built in one shot by [`crate::pipeline::parse::parse_exam`] and never
//! mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One parsed exam document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub exam_metadata: ExamMetadata,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamMetadata {
    pub course_code: String,
    pub course_name: String,
    pub institution: String,
    #[serde(deserialize_with = "whole_number::required")]
    pub year: i32,
    pub semester: String,
    #[serde(deserialize_with = "whole_number::required")]
    pub exam_duration_minutes: u32,
    /// Kept as a float: models sometimes write `100.0`.
    #[serde(default)]
    pub total_marks: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub section_id: String,
    pub section_name: String,
    #[serde(default, deserialize_with = "whole_number::optional")]
    pub recommended_time_minutes: Option<u32>,
    /// Advisory count as printed on the paper. Not checked against
    /// `questions.len()`.
    #[serde(deserialize_with = "whole_number::required")]
    pub total_questions: u32,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique within the enclosing section only.
    #[serde(deserialize_with = "whole_number::required")]
    pub question_number: u32,
    pub question_text: String,
    #[serde(default)]
    pub marks: Option<f64>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ExamOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_tags: Option<Vec<String>>,
    /// Free-form nested parts (a), (b), … passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_parts: Option<serde_json::Value>,
}

/// One answer choice of a multiple-choice question.
///
/// Named `ExamOption` to stay clear of [`std::option::Option`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamOption {
    pub option_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    ShortAnswer,
    ExtendedResponse,
    Diagram,
    Calculation,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::ExtendedResponse => "extended_response",
            QuestionType::Diagram => "diagram",
            QuestionType::Calculation => "calculation",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Exam {
    /// Total number of questions across all sections.
    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    /// Check the invariants serde cannot express.
    ///
    /// Returns a human-readable description of the first violation, with a
    /// JSON-ish path so the offending node can be found in the raw response.
    pub fn validate(&self) -> Result<(), String> {
        for (s_idx, section) in self.sections.iter().enumerate() {
            let mut numbers = HashSet::new();
            for question in &section.questions {
                let path = format!(
                    "sections[{s_idx}] ('{}') question {}",
                    section.section_id, question.question_number
                );
                if !numbers.insert(question.question_number) {
                    return Err(format!("{path}: duplicate question_number"));
                }
                question.validate().map_err(|e| format!("{path}: {e}"))?;
            }
        }
        Ok(())
    }
}

impl Question {
    fn validate(&self) -> Result<(), String> {
        let Some(options) = self.options.as_deref() else {
            return Ok(());
        };

        let mut ids = HashSet::new();
        for option in options {
            if !ids.insert(option.option_id.as_str()) {
                return Err(format!("duplicate option_id '{}'", option.option_id));
            }
        }

        if self.question_type == QuestionType::MultipleChoice && !options.is_empty() {
            if let Some(answer) = self.correct_answer.as_deref() {
                if !ids.contains(answer) {
                    return Err(format!(
                        "correct_answer '{answer}' does not match any option_id"
                    ));
                }
            }
        }
        Ok(())
    }

    /// The option marked as correct, if any.
    pub fn correct_option(&self) -> Option<&ExamOption> {
        let answer = self.correct_answer.as_deref()?;
        self.options
            .as_deref()?
            .iter()
            .find(|o| o.option_id == answer)
    }
}

/// Integer fields that also accept whole-valued floats (`90.0`).
///
/// A fractional value or one outside the target type's range is rejected.
mod whole_number {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Number;

    pub fn required<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64>,
    {
        let number = Number::deserialize(deserializer)?;
        convert(&number).map_err(D::Error::custom)
    }

    pub fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64>,
    {
        match Option::<Number>::deserialize(deserializer)? {
            Some(number) => convert(&number).map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }

    fn convert<T: TryFrom<i64>>(number: &Number) -> Result<T, String> {
        let whole = match number.as_i64() {
            Some(i) => i,
            None => match number.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
                _ => return Err(format!("expected a whole number, got {number}")),
            },
        };
        T::try_from(whole).map_err(|_| format!("{whole} is out of range"))
    }
}
