//! Orchestration of one attempt from load to submission.

use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    dao::{
        backend::QuizBackend,
        drafts::{DraftEntry, DraftStore, draft_key},
    },
    dto::quiz::NewQuestionAttempt,
    error::ServiceError,
    services::{autosave::Autosaver, confirm::Confirm},
    state::{
        AttemptState, EngineEvent, SharedAttempt,
        attempt::{AnswerSheet, SaveStatus, SetOutcome},
        state_machine::{AttemptEvent, AttemptPhase, SubmitReason},
    },
};

/// Prompt shown before finalizing the attempt.
const SUBMIT_PROMPT: &str = "Submit your answers and finish the attempt?";

/// Drives one student's attempt: answer edits, navigation, and submission,
/// tying the state machine to the backend, the draft store, and the
/// confirmation capability.
pub struct AttemptFlow {
    state: SharedAttempt,
    backend: Arc<dyn QuizBackend>,
    drafts: Arc<dyn DraftStore>,
    confirm: Arc<dyn Confirm>,
    autosaver: Autosaver,
}

impl AttemptFlow {
    /// Load the competition's slots and the student's saved answers, then
    /// assemble the running flow.
    ///
    /// Saved answers are matched to slots by question id: the slot list and
    /// the attempt history are fetched separately and their orders differ.
    /// Local drafts fill any slot the backend has no answer for.
    pub async fn start(
        backend: Arc<dyn QuizBackend>,
        drafts: Arc<dyn DraftStore>,
        confirm: Arc<dyn Confirm>,
        quiz_id: i64,
        autosave_window: Duration,
    ) -> Result<Self, ServiceError> {
        let payload = backend.fetch_slots(quiz_id).await?;
        payload
            .validate()
            .map_err(|err| ServiceError::InvalidInput(format!("unusable slots payload: {err}")))?;
        if payload.data.is_empty() {
            return Err(ServiceError::InvalidState(
                "competition has no question slots".into(),
            ));
        }

        let attempt = payload.into_attempt(quiz_id);
        let mut sheet = AnswerSheet::new(&attempt.slots);

        let saved = backend.fetch_question_attempts().await?;
        for answer in saved
            .iter()
            .filter(|answer| answer.quiz_attempt == attempt.attempt_id)
        {
            if answer.answer_student.trim().is_empty() {
                continue;
            }
            if !sheet.prefill_saved(answer.question, &answer.answer_student) {
                warn!(
                    question = answer.question,
                    "ignoring unusable saved answer during resume"
                );
            }
        }

        for slot in &attempt.slots {
            if let Some(draft) = drafts.get(&draft_key(quiz_id, slot.question_id))
                && sheet.prefill_draft(slot.question_id, &draft.answer)
            {
                debug!(question = slot.question_id, "restored draft answer");
            }
        }

        info!(
            quiz_id,
            attempt = attempt.attempt_id,
            slots = attempt.len(),
            answered = sheet.answered_count(),
            "attempt loaded"
        );

        let state = AttemptState::with_sheet(attempt, sheet);
        let autosaver = Autosaver::spawn(state.clone(), backend.clone(), autosave_window);

        Ok(Self {
            state,
            backend,
            drafts,
            confirm,
            autosaver,
        })
    }

    /// Shared state handle, for rendering and for spawning the countdown.
    pub fn state(&self) -> &SharedAttempt {
        &self.state
    }

    /// Record an answer edit for the current slot.
    ///
    /// The edit is validated and recorded synchronously; a valid non-empty
    /// answer is mirrored into the draft store and handed to the throttled
    /// autosaver. Invalid input is recorded with its inline error and never
    /// persisted.
    pub async fn set_answer(&self, raw: &str) -> Result<(), ServiceError> {
        let Some(slot_index) = self.state.current_slot().await else {
            return Err(ServiceError::InvalidState(
                "attempt already submitted".into(),
            ));
        };

        let outcome = {
            let mut sheet = self.state.sheet().write().await;
            sheet.set_answer(slot_index, raw)
        };

        let error = match &outcome {
            SetOutcome::Invalid(err) => Some(err.clone()),
            _ => None,
        };
        self.state.events().broadcast(EngineEvent::AnswerChecked {
            slot: slot_index,
            error,
        });

        let attempt = self.state.attempt();
        match outcome {
            SetOutcome::Persistable {
                question_id,
                answer,
            } => {
                self.drafts.set(
                    &draft_key(attempt.quiz_id, question_id),
                    DraftEntry {
                        answer: answer.clone(),
                        saved_at: OffsetDateTime::now_utc(),
                    },
                );
                self.state.events().broadcast(EngineEvent::SaveState {
                    question: question_id,
                    status: SaveStatus::Pending,
                });
                self.autosaver.schedule(NewQuestionAttempt {
                    student: attempt.student_id,
                    question: question_id,
                    answer_student: answer,
                    quiz_attempt: attempt.attempt_id,
                    is_correct: false,
                });
            }
            SetOutcome::Unanswered => {
                if let Some(slot) = attempt.slot(slot_index) {
                    self.drafts
                        .remove(&draft_key(attempt.quiz_id, slot.question_id));
                }
            }
            SetOutcome::Invalid(_) => {}
        }

        Ok(())
    }

    /// Move to the next slot, or into submission from the last one.
    ///
    /// Blocked while the current slot's answer is invalid or empty; the
    /// offending condition is returned as [`ServiceError::InvalidInput`].
    pub async fn next(&self) -> Result<AttemptPhase, ServiceError> {
        let slot_index = self.current_slot_or_submitted().await?;

        let blocked = {
            let sheet = self.state.sheet().read().await;
            match sheet.entry(slot_index) {
                Some(entry) if entry.is_answered() => None,
                Some(entry) => Some(match &entry.error {
                    Some(err) => err.to_string(),
                    None => "an answer is required before moving on".into(),
                }),
                None => Some("no such slot".into()),
            }
        };
        if let Some(message) = blocked {
            return Err(ServiceError::InvalidInput(message));
        }

        // Navigation persists whatever is outstanding; intermediate edits may
        // have been coalesced away, the final answer must not be.
        self.autosaver.flush();

        if slot_index + 1 == self.state.attempt().len() {
            self.submit().await
        } else {
            self.state.apply_event(AttemptEvent::Advance).await
        }
    }

    /// Move back one slot. A no-op on the first slot.
    pub async fn previous(&self) -> Result<AttemptPhase, ServiceError> {
        let slot_index = self.current_slot_or_submitted().await?;
        if slot_index == 0 {
            return Ok(AttemptPhase::Answering { slot: 0 });
        }

        self.autosaver.flush();
        self.state.apply_event(AttemptEvent::Retreat).await
    }

    /// Jump straight to a slot from the question picker strip. Permitted
    /// regardless of the current slot's validity; out-of-range targets clamp
    /// to the last slot.
    pub async fn jump_to(&self, target: usize) -> Result<AttemptPhase, ServiceError> {
        self.current_slot_or_submitted().await?;

        self.autosaver.flush();
        self.state.apply_event(AttemptEvent::Jump { target }).await
    }

    /// Ask for confirmation and finalize the attempt.
    ///
    /// Pending saves are flushed first so the final answers reach the
    /// backend. The phase only moves to submitted once the submission call
    /// is acknowledged; on failure the transition is aborted and
    /// [`ServiceError::SubmissionFailed`] tells the student to retry.
    pub async fn submit(&self) -> Result<AttemptPhase, ServiceError> {
        let slot = self.current_slot_or_submitted().await?;

        self.autosaver.flush_and_wait().await;

        if !self.confirm.confirm(SUBMIT_PROMPT).await {
            debug!("submission cancelled by the student");
            return Ok(AttemptPhase::Answering { slot });
        }

        let backend = self.backend.clone();
        let quiz_id = self.state.attempt().quiz_id;
        let ((), next) = self
            .state
            .run_transition(
                AttemptEvent::Submit {
                    reason: SubmitReason::Confirmed,
                },
                || async move {
                    backend
                        .submit(quiz_id)
                        .await
                        .map_err(ServiceError::SubmissionFailed)
                },
            )
            .await?;

        info!(quiz_id, "attempt submitted");
        self.clear_drafts();
        Ok(next)
    }

    /// React to countdown expiry: force the terminal transition without
    /// confirmation, then deliver the submission best-effort.
    ///
    /// The transition goes first so expiry terminates the attempt exactly
    /// once even when it races an explicit submission or the network is
    /// down; a failed delivery is reported as a notice, never an error.
    pub async fn handle_expiry(&self) {
        let applied = self
            .state
            .apply_event(AttemptEvent::Submit {
                reason: SubmitReason::TimeExpired,
            })
            .await;

        if let Err(err) = applied {
            debug!(error = %err, "expiry ignored; attempt already finalized");
            return;
        }

        self.autosaver.flush_and_wait().await;

        let quiz_id = self.state.attempt().quiz_id;
        match self.backend.submit(quiz_id).await {
            Ok(()) => {
                info!(quiz_id, "expired attempt submitted");
                self.clear_drafts();
            }
            Err(err) => {
                warn!(quiz_id, error = %err, "failed to deliver expired submission");
                self.state.events().broadcast(EngineEvent::Notice {
                    message: "Time expired; submission could not be delivered".into(),
                });
            }
        }
    }

    async fn current_slot_or_submitted(&self) -> Result<usize, ServiceError> {
        self.state.current_slot().await.ok_or_else(|| {
            ServiceError::InvalidState("attempt already submitted".into())
        })
    }

    fn clear_drafts(&self) {
        let attempt = self.state.attempt();
        for slot in &attempt.slots {
            self.drafts
                .remove(&draft_key(attempt.quiz_id, slot.question_id));
        }
    }
}
