use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::dto::validation::{AnswerError, AnswerFormat, CheckedAnswer, check_answer};

/// Identifier of a question as assigned by the backend.
pub type QuestionId = i64;

/// One question placed at a position within the attempt.
#[derive(Debug, Clone)]
pub struct QuestionSlot {
    /// Backend identifier of the question.
    pub question_id: QuestionId,
    /// Short administrative name of the question.
    pub name: String,
    /// Prompt text shown to the student.
    pub prompt: String,
    /// Marks awarded for a correct answer.
    pub mark: u32,
    /// Optional illustration path relative to the backend root.
    pub image_url: Option<String>,
    /// Accepted answer shape for this slot.
    pub format: AnswerFormat,
}

/// One student's run through one timed quiz.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// Backend identifier of the quiz attempt.
    pub attempt_id: i64,
    /// Quiz/competition the attempt belongs to.
    pub quiz_id: i64,
    /// Student taking the attempt.
    pub student_id: i64,
    /// Instant the attempt closes; `None` for untimed quizzes.
    pub deadline: Option<OffsetDateTime>,
    /// Ordered question slots. Immutable once fetched.
    pub slots: Vec<QuestionSlot>,
}

impl Attempt {
    /// Number of question slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the attempt has no slots. Loaders reject this shape, so it is
    /// only ever observed transiently in tests.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot at `index`, if it exists.
    pub fn slot(&self, index: usize) -> Option<&QuestionSlot> {
        self.slots.get(index)
    }
}

/// Whether the last-known answer for a slot has reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// The backend acknowledged the current answer (or there is nothing to save).
    Saved,
    /// The current answer has not been acknowledged yet.
    Pending,
}

/// Per-slot answer state: the raw record, its validation result, and the
/// save indicator.
#[derive(Debug, Clone)]
pub struct AnswerEntry {
    /// Current answer string, canonical form when valid.
    pub answer: String,
    /// Validation error for the current answer, if any.
    pub error: Option<AnswerError>,
    /// Persistence state of the current answer.
    pub save: SaveStatus,
}

impl Default for AnswerEntry {
    fn default() -> Self {
        Self {
            answer: String::new(),
            error: None,
            save: SaveStatus::Saved,
        }
    }
}

impl AnswerEntry {
    /// Whether the entry holds a valid, non-empty answer: the gate for
    /// forward navigation.
    pub fn is_answered(&self) -> bool {
        !self.answer.is_empty() && self.error.is_none()
    }
}

/// Outcome of recording an answer edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// The entry holds a valid answer ready to persist.
    Persistable {
        /// Question the answer belongs to.
        question_id: QuestionId,
        /// Canonical answer string.
        answer: String,
    },
    /// The entry was cleared; nothing to persist.
    Unanswered,
    /// The entry holds an invalid answer; nothing is persisted.
    Invalid(AnswerError),
}

/// In-memory record of every slot's answer, validation error, and save
/// status, in slot order.
///
/// The sheet always holds exactly one entry per question slot; entries are
/// rebuilt, never merged, when a new slot list is loaded.
#[derive(Debug, Clone)]
pub struct AnswerSheet {
    entries: IndexMap<QuestionId, AnswerEntry>,
    formats: Vec<AnswerFormat>,
}

impl AnswerSheet {
    /// Build a sheet with one blank entry per slot, preserving slot order.
    pub fn new(slots: &[QuestionSlot]) -> Self {
        let entries = slots
            .iter()
            .map(|slot| (slot.question_id, AnswerEntry::default()))
            .collect();
        let formats = slots.iter().map(|slot| slot.format).collect();

        Self { entries, formats }
    }

    /// Number of entries; always equals the slot count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sheet has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a slot index.
    pub fn entry(&self, index: usize) -> Option<&AnswerEntry> {
        self.entries.get_index(index).map(|(_, entry)| entry)
    }

    /// Entry for a question id.
    pub fn entry_by_question(&self, question_id: QuestionId) -> Option<&AnswerEntry> {
        self.entries.get(&question_id)
    }

    /// Record an answer edit for the slot at `index`: validates, stores the
    /// (normalized) record and its error, and reports whether the answer is
    /// ready to persist. Edits to unknown indices are ignored.
    pub fn set_answer(&mut self, index: usize, raw: &str) -> SetOutcome {
        let Some(format) = self.formats.get(index).copied() else {
            return SetOutcome::Unanswered;
        };
        let Some((&question_id, entry)) = self.entries.get_index_mut(index) else {
            return SetOutcome::Unanswered;
        };

        match check_answer(raw, format) {
            Ok(CheckedAnswer::Unanswered) => {
                entry.answer.clear();
                entry.error = None;
                entry.save = SaveStatus::Saved;
                SetOutcome::Unanswered
            }
            Ok(CheckedAnswer::Answered(normalized)) => {
                entry.answer = normalized.clone();
                entry.error = None;
                entry.save = SaveStatus::Pending;
                SetOutcome::Persistable {
                    question_id,
                    answer: normalized,
                }
            }
            Err(err) => {
                entry.answer = raw.trim().to_string();
                entry.error = Some(err.clone());
                entry.save = SaveStatus::Pending;
                SetOutcome::Invalid(err)
            }
        }
    }

    /// Mark a question's answer as acknowledged by the backend.
    ///
    /// The flip only happens if the acknowledged answer still matches the
    /// current record: an acknowledgment for a stale payload must not hide
    /// a newer unsaved edit.
    pub fn mark_saved(&mut self, question_id: QuestionId, acknowledged: &str) -> bool {
        match self.entries.get_mut(&question_id) {
            Some(entry) if entry.answer == acknowledged => {
                entry.save = SaveStatus::Saved;
                true
            }
            _ => false,
        }
    }

    /// Pre-fill an answer fetched from the backend, matched by question id.
    ///
    /// The value is validated against the slot's format; invalid or empty
    /// values are ignored (the caller logs them). Backend answers arrive
    /// already persisted, so the entry is marked [`SaveStatus::Saved`].
    pub fn prefill_saved(&mut self, question_id: QuestionId, raw: &str) -> bool {
        self.prefill(question_id, raw, SaveStatus::Saved)
    }

    /// Pre-fill an answer recovered from the local draft store. Drafts have
    /// not been acknowledged by the backend, so the entry stays
    /// [`SaveStatus::Pending`] until the next successful save.
    pub fn prefill_draft(&mut self, question_id: QuestionId, raw: &str) -> bool {
        if self
            .entry_by_question(question_id)
            .is_none_or(|entry| !entry.answer.is_empty())
        {
            return false;
        }
        self.prefill(question_id, raw, SaveStatus::Pending)
    }

    fn prefill(&mut self, question_id: QuestionId, raw: &str, save: SaveStatus) -> bool {
        let Some(index) = self.entries.get_index_of(&question_id) else {
            return false;
        };
        let format = self.formats[index];

        match check_answer(raw, format) {
            Ok(CheckedAnswer::Answered(normalized)) => {
                let entry = &mut self.entries[index];
                entry.answer = normalized;
                entry.error = None;
                entry.save = save;
                true
            }
            _ => false,
        }
    }

    /// Count of slots holding a valid, non-empty answer. Drives the
    /// `Answered: k/N` progress display.
    pub fn answered_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.is_answered())
            .count()
    }
}
