//! Throttled answer persistence.
//!
//! Keystroke-driven edits arrive far faster than the backend should see
//! them. The autosaver coalesces bursts with a trailing-edge window: each
//! `schedule` replaces the pending payload and restarts the timer, so only
//! the last payload of a burst is sent.

use std::{sync::Arc, time::Duration};

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::{
    dao::backend::QuizBackend,
    dto::quiz::NewQuestionAttempt,
    state::{EngineEvent, SharedAttempt, attempt::SaveStatus},
};

/// Throttle window observed by the original autosave flow.
pub const DEFAULT_AUTOSAVE_WINDOW: Duration = Duration::from_millis(1_000);

enum Command {
    Schedule(NewQuestionAttempt),
    Flush(Option<oneshot::Sender<()>>),
    Cancel,
}

/// Handle to the background save worker. Dropping the handle stops the
/// worker and discards any pending timer, so an abandoned attempt view
/// never fires late saves.
pub struct Autosaver {
    tx: mpsc::UnboundedSender<Command>,
}

impl Autosaver {
    /// Spawn the save worker for one attempt.
    pub fn spawn(state: SharedAttempt, backend: Arc<dyn QuizBackend>, window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, state, backend, window));
        Self { tx }
    }

    /// Replace the pending payload and restart the throttle window.
    pub fn schedule(&self, payload: NewQuestionAttempt) {
        let _ = self.tx.send(Command::Schedule(payload));
    }

    /// Fire the pending payload immediately, without waiting for the window.
    pub fn flush(&self) {
        let _ = self.tx.send(Command::Flush(None));
    }

    /// Fire the pending payload immediately and wait until the save request
    /// has completed (used before final submission).
    pub async fn flush_and_wait(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(Some(ack_tx))).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    /// Drop pending work and stop the worker.
    pub fn cancel(&self) {
        let _ = self.tx.send(Command::Cancel);
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Command>,
    state: SharedAttempt,
    backend: Arc<dyn QuizBackend>,
    window: Duration,
) {
    let mut pending: Option<NewQuestionAttempt> = None;
    let mut fire_at: Option<Instant> = None;

    loop {
        let timer = async move {
            match fire_at {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Schedule(payload)) => {
                    pending = Some(payload);
                    fire_at = Some(Instant::now() + window);
                }
                Some(Command::Flush(ack)) => {
                    fire_at = None;
                    if let Some(payload) = pending.take() {
                        send_save(&state, backend.as_ref(), payload).await;
                    }
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                Some(Command::Cancel) | None => break,
            },
            _ = timer => {
                fire_at = None;
                if let Some(payload) = pending.take() {
                    send_save(&state, backend.as_ref(), payload).await;
                }
            }
        }
    }

    debug!("autosave worker stopped");
}

/// Send one answer to the backend and reflect the outcome in the sheet.
/// Failures are non-fatal: the save indicator stays pending and a notice is
/// broadcast so the UI can toast it.
async fn send_save(state: &SharedAttempt, backend: &dyn QuizBackend, payload: NewQuestionAttempt) {
    let question = payload.question;
    let answer = payload.answer_student.clone();

    match backend.save_answer(payload).await {
        Ok(_) => {
            let acknowledged = {
                let mut sheet = state.sheet().write().await;
                sheet.mark_saved(question, &answer)
            };
            if acknowledged {
                state.events().broadcast(EngineEvent::SaveState {
                    question,
                    status: SaveStatus::Saved,
                });
            }
        }
        Err(err) => {
            warn!(question, error = %err, "failed to save answer");
            state.events().broadcast(EngineEvent::Notice {
                message: "Failed to save answer".into(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::future::BoxFuture;
    use tokio::time::advance;

    use super::*;
    use crate::{
        dao::backend::{BackendError, BackendResult},
        dto::quiz::{CompetitionSlots, QuestionAttempt},
        dto::validation::AnswerFormat,
        state::AttemptState,
        state::attempt::{Attempt, QuestionSlot},
    };

    struct RecordingBackend {
        saves: Mutex<Vec<NewQuestionAttempt>>,
        fail_saves: bool,
    }

    impl RecordingBackend {
        fn new(fail_saves: bool) -> Arc<Self> {
            Arc::new(Self {
                saves: Mutex::new(Vec::new()),
                fail_saves,
            })
        }

        fn saved(&self) -> Vec<NewQuestionAttempt> {
            self.saves.lock().unwrap().clone()
        }
    }

    impl QuizBackend for RecordingBackend {
        fn fetch_slots(
            &self,
            _quiz_id: i64,
        ) -> BoxFuture<'static, BackendResult<CompetitionSlots>> {
            unimplemented!("not exercised by autosave tests")
        }

        fn fetch_question_attempts(
            &self,
        ) -> BoxFuture<'static, BackendResult<Vec<QuestionAttempt>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn save_answer(
            &self,
            attempt: NewQuestionAttempt,
        ) -> BoxFuture<'static, BackendResult<QuestionAttempt>> {
            if self.fail_saves {
                return Box::pin(async {
                    Err(BackendError::unavailable(
                        "save rejected".into(),
                        std::io::Error::other("boom"),
                    ))
                });
            }

            self.saves.lock().unwrap().push(attempt.clone());
            Box::pin(async move {
                Ok(QuestionAttempt {
                    id: 1,
                    student: attempt.student,
                    question: attempt.question,
                    answer_student: attempt.answer_student,
                    quiz_attempt: attempt.quiz_attempt,
                })
            })
        }

        fn submit(&self, _quiz_id: i64) -> BoxFuture<'static, BackendResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn test_state() -> SharedAttempt {
        AttemptState::new(Attempt {
            attempt_id: 9,
            quiz_id: 1,
            student_id: 5,
            deadline: None,
            slots: vec![QuestionSlot {
                question_id: 42,
                name: "q42".into(),
                prompt: "How many?".into(),
                mark: 1,
                image_url: None,
                format: AnswerFormat::Single,
            }],
        })
    }

    fn payload(answer: &str) -> NewQuestionAttempt {
        NewQuestionAttempt {
            student: 5,
            question: 42,
            answer_student: answer.into(),
            quiz_attempt: 9,
            is_correct: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_coalesces_to_one_save_with_last_payload() {
        let state = test_state();
        let backend = RecordingBackend::new(false);
        let saver = Autosaver::spawn(state.clone(), backend.clone(), DEFAULT_AUTOSAVE_WINDOW);

        saver.schedule(payload("1"));
        tokio::task::yield_now().await;
        advance(Duration::from_millis(300)).await;
        saver.schedule(payload("12"));
        tokio::task::yield_now().await;
        advance(Duration::from_millis(300)).await;
        saver.schedule(payload("123"));
        tokio::task::yield_now().await;

        // Window restarts on every schedule; nothing has fired yet.
        assert!(backend.saved().is_empty());

        advance(Duration::from_millis(1_100)).await;
        tokio::task::yield_now().await;

        let saved = backend.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].answer_student, "123");
    }

    #[tokio::test(start_paused = true)]
    async fn successful_save_marks_sheet_saved() {
        let state = test_state();
        {
            let mut sheet = state.sheet().write().await;
            sheet.set_answer(0, "7");
        }
        let backend = RecordingBackend::new(false);
        let saver = Autosaver::spawn(state.clone(), backend.clone(), DEFAULT_AUTOSAVE_WINDOW);

        saver.schedule(payload("7"));
        saver.flush_and_wait().await;

        assert_eq!(backend.saved().len(), 1);
        let sheet = state.sheet().read().await;
        assert_eq!(sheet.entry(0).unwrap().save, SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_leaves_status_pending_and_notifies() {
        let state = test_state();
        {
            let mut sheet = state.sheet().write().await;
            sheet.set_answer(0, "7");
        }
        let backend = RecordingBackend::new(true);
        let saver = Autosaver::spawn(state.clone(), backend, DEFAULT_AUTOSAVE_WINDOW);
        let mut events = state.events().subscribe();

        saver.schedule(payload("7"));
        saver.flush_and_wait().await;

        let sheet = state.sheet().read().await;
        assert_eq!(sheet.entry(0).unwrap().save, SaveStatus::Pending);
        drop(sheet);

        let event = events.try_recv().expect("a notice should be broadcast");
        assert!(matches!(event, EngineEvent::Notice { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_payload() {
        let state = test_state();
        let backend = RecordingBackend::new(false);
        let saver = Autosaver::spawn(state, backend.clone(), DEFAULT_AUTOSAVE_WINDOW);

        saver.schedule(payload("7"));
        saver.cancel();

        advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert!(backend.saved().is_empty());
    }
}
