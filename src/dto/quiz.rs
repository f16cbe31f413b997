//! Wire types for the competition quiz REST API.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::{
    dto::validation::AnswerFormat,
    state::attempt::{Attempt, QuestionSlot},
};

/// Payload returned by `GET /quiz/competition/{id}/slots/`: the ordered
/// question slots for one competition together with the caller's attempt.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CompetitionSlots {
    /// Question slots in presentation order.
    #[validate(nested)]
    pub data: Vec<SlotData>,
    /// Identifier of the quiz attempt opened for the caller.
    pub quiz_attempt: i64,
    /// Identifier of the student taking the attempt.
    pub student: i64,
    /// Wall-clock instant at which the attempt closes, if the quiz is timed.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
}

/// One question placed at a position within a quiz.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SlotData {
    /// Primary key of the slot row.
    pub id: i64,
    /// The question occupying this slot.
    #[validate(nested)]
    pub question: QuestionData,
    /// Zero-based position of the slot within the quiz.
    pub slot_index: u32,
    /// Quiz the slot belongs to.
    pub quiz: i64,
}

/// Question payload as served by the backend.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionData {
    /// Primary key of the question.
    pub id: i64,
    /// Short administrative name, e.g. `Question01_2024`.
    #[serde(default)]
    pub name: String,
    /// Prompt text shown to the student.
    #[validate(length(min = 1, message = "question text must not be empty"))]
    pub question_text: String,
    /// Marks awarded for a correct answer.
    #[serde(default = "default_mark")]
    pub mark: u32,
    /// Optional illustrations attached to the question.
    #[serde(default)]
    pub images: Vec<QuestionImage>,
    /// Whether the question accepts comma-separated multiple answers.
    #[serde(default)]
    pub multiple_answers: bool,
}

fn default_mark() -> u32 {
    1
}

/// Reference to an image served by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionImage {
    /// Path of the image relative to the backend root.
    pub url: String,
}

/// Paged list envelope used by the quiz API collections.
#[derive(Debug, Clone, Deserialize)]
pub struct PagedResponse<T> {
    /// Rows on this page.
    pub results: Vec<T>,
    /// Total row count across all pages.
    pub count: u64,
    /// Absolute URL of the next page, if any.
    pub next: Option<String>,
    /// Absolute URL of the previous page, if any.
    pub previous: Option<String>,
}

/// A previously persisted answer, as returned by
/// `GET /quiz/question-attempts/`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionAttempt {
    /// Primary key of the attempt row.
    pub id: i64,
    /// Student the answer belongs to.
    pub student: i64,
    /// Question the answer is for.
    pub question: i64,
    /// The answer string as last saved.
    pub answer_student: String,
    /// Quiz attempt the answer belongs to.
    pub quiz_attempt: i64,
}

/// Body of `POST /quiz/question-attempts/`, persisting one answer.
///
/// `is_correct` is always sent as `false`; grading happens server-side after
/// submission, but the column is non-nullable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewQuestionAttempt {
    /// Student the answer belongs to.
    pub student: i64,
    /// Question being answered.
    pub question: i64,
    /// Canonical answer string.
    pub answer_student: String,
    /// Quiz attempt the answer belongs to.
    pub quiz_attempt: i64,
    /// Placeholder for the server-side grading flag.
    pub is_correct: bool,
}

impl SlotData {
    fn into_slot(self) -> QuestionSlot {
        let format = if self.question.multiple_answers {
            AnswerFormat::Multiple
        } else {
            AnswerFormat::Single
        };

        QuestionSlot {
            question_id: self.question.id,
            name: self.question.name,
            prompt: self.question.question_text,
            mark: self.question.mark,
            image_url: self.question.images.into_iter().next().map(|img| img.url),
            format,
        }
    }
}

impl CompetitionSlots {
    /// Convert the wire payload into the runtime [`Attempt`], restoring the
    /// backend's slot order.
    pub fn into_attempt(self, quiz_id: i64) -> Attempt {
        let mut data = self.data;
        data.sort_by_key(|slot| slot.slot_index);

        Attempt {
            attempt_id: self.quiz_attempt,
            quiz_id,
            student_id: self.student,
            deadline: self.end_time,
            slots: data.into_iter().map(SlotData::into_slot).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: i64, index: u32) -> SlotData {
        SlotData {
            id,
            question: QuestionData {
                id: id * 10,
                name: format!("question-{id}"),
                question_text: "How many?".into(),
                mark: 2,
                images: Vec::new(),
                multiple_answers: false,
            },
            slot_index: index,
            quiz: 1,
        }
    }

    #[test]
    fn into_attempt_orders_by_slot_index() {
        let payload = CompetitionSlots {
            data: vec![slot(2, 1), slot(1, 0), slot(3, 2)],
            quiz_attempt: 77,
            student: 5,
            end_time: None,
        };

        let attempt = payload.into_attempt(1);
        assert_eq!(attempt.attempt_id, 77);
        let ids: Vec<i64> = attempt.slots.iter().map(|s| s.question_id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn question_defaults_apply() {
        let parsed: QuestionData = serde_json::from_value(serde_json::json!({
            "id": 9,
            "question_text": "2 + 2?"
        }))
        .unwrap();

        assert_eq!(parsed.mark, 1);
        assert!(parsed.images.is_empty());
        assert!(!parsed.multiple_answers);
    }

    #[test]
    fn empty_question_text_fails_validation() {
        let payload = CompetitionSlots {
            data: vec![SlotData {
                id: 1,
                question: QuestionData {
                    id: 2,
                    name: String::new(),
                    question_text: String::new(),
                    mark: 1,
                    images: Vec::new(),
                    multiple_answers: false,
                },
                slot_index: 0,
                quiz: 1,
            }],
            quiz_attempt: 1,
            student: 1,
            end_time: None,
        };

        assert!(payload.validate().is_err());
    }
}
