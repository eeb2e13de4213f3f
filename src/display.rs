//! Markdown rendering of a decoded [`Exam`].
//!
//! Layout mirrors a card view: a metadata header, then one block per section
//! and per question. Correct options are marked with ✅.

use crate::exam::{Exam, ExamMetadata, Question, Section};
use std::fmt::Write;

impl Exam {
    /// Render the whole exam as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        write_header(&mut out, &self.exam_metadata);
        for section in &self.sections {
            write_section(&mut out, section);
        }
        out
    }
}

fn write_header(out: &mut String, meta: &ExamMetadata) {
    let _ = writeln!(out, "# {}: {}\n", meta.course_code, meta.course_name);
    let _ = writeln!(out, "| | |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Institution | {} |", meta.institution);
    let _ = writeln!(out, "| Year | {} |", meta.year);
    let _ = writeln!(out, "| Semester | {} |", meta.semester);
    let _ = writeln!(out, "| Duration | {} min |", meta.exam_duration_minutes);
    if let Some(total) = meta.total_marks {
        let _ = writeln!(out, "| Total marks | {} |", fmt_marks(total));
    }
    out.push('\n');
}

fn write_section(out: &mut String, section: &Section) {
    let _ = writeln!(
        out,
        "## Section {}: {}\n",
        section.section_id, section.section_name
    );

    let mut facts = vec![format!("{} questions", section.total_questions)];
    if let Some(mins) = section.recommended_time_minutes {
        facts.push(format!("recommended time {mins} min"));
    }
    let _ = writeln!(out, "_{}_\n", facts.join(" · "));

    for question in &section.questions {
        write_question(out, question);
    }
}

fn write_question(out: &mut String, q: &Question) {
    let marks = q
        .marks
        .map(|m| {
            let unit = if m == 1.0 { "mark" } else { "marks" };
            format!(" · {} {unit}", fmt_marks(m))
        })
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "### Question {} `{}`{}\n",
        q.question_number, q.question_type, marks
    );
    let _ = writeln!(out, "{}\n", q.question_text.trim());

    if let Some(options) = q.options.as_deref().filter(|o| !o.is_empty()) {
        let correct = q.correct_answer.as_deref();
        for option in options {
            let tick = if Some(option.option_id.as_str()) == correct {
                " ✅"
            } else {
                ""
            };
            let _ = writeln!(out, "- **{}.** {}{}", option.option_id, option.text, tick);
        }
        out.push('\n');
    } else if let Some(answer) = q.correct_answer.as_deref() {
        let _ = writeln!(out, "**Answer:** {answer}\n");
    }

    if let Some(explanation) = q.explanation.as_deref() {
        let _ = writeln!(out, "> **Explanation:** {}\n", explanation.trim());
    }
    if let Some(model_answer) = q.model_answer.as_deref() {
        let _ = writeln!(out, "**Model answer:**\n\n{}\n", model_answer.trim());
    }
    if let Some(tags) = q.topic_tags.as_deref().filter(|t| !t.is_empty()) {
        let joined: Vec<String> = tags.iter().map(|t| format!("`{t}`")).collect();
        let _ = writeln!(out, "Tags: {}\n", joined.join(" "));
    }
}

/// `2.0` → `2`, `1.5` → `1.5`.
fn fmt_marks(m: f64) -> String {
    if m.fract() == 0.0 {
        format!("{}", m as i64)
    } else {
        format!("{m}")
    }
}
