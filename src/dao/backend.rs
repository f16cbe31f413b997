use std::error::Error;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::dto::quiz::{CompetitionSlots, NewQuestionAttempt, QuestionAttempt};

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Error raised by the quiz backend regardless of the underlying transport.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached or rejected the request.
    #[error("backend unavailable: {message}")]
    Unavailable {
        /// Human-readable summary of the failure.
        message: String,
        /// Transport-level cause.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl BackendError {
    /// Construct an unavailable error from any transport failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        BackendError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Abstraction over the competition REST API consumed by the attempt flow.
///
/// Implemented by the reqwest client for production and by in-memory fakes
/// in tests.
pub trait QuizBackend: Send + Sync {
    /// `GET /quiz/competition/{id}/slots/`: ordered question slots plus the
    /// caller's attempt id and end time.
    fn fetch_slots(&self, quiz_id: i64) -> BoxFuture<'static, BackendResult<CompetitionSlots>>;

    /// `GET /quiz/question-attempts/`: previously saved answers, all pages.
    fn fetch_question_attempts(&self) -> BoxFuture<'static, BackendResult<Vec<QuestionAttempt>>>;

    /// `POST /quiz/question-attempts/`: persist one answer.
    fn save_answer(
        &self,
        attempt: NewQuestionAttempt,
    ) -> BoxFuture<'static, BackendResult<QuestionAttempt>>;

    /// `GET /quiz/competition/{id}/submit/`: finalize the attempt.
    fn submit(&self, quiz_id: i64) -> BoxFuture<'static, BackendResult<()>>;
}
