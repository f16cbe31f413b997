use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    dto::validation::AnswerError,
    state::{
        attempt::{QuestionId, SaveStatus},
        state_machine::AttemptPhase,
    },
};

/// State-change notifications fanned out to whoever renders the attempt
/// (the terminal runner, tests). Delivery is best-effort: a consumer that
/// lags simply misses ticks.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The state machine moved to a new phase.
    PhaseChanged {
        /// Phase after the transition.
        phase: AttemptPhase,
    },
    /// An answer edit was validated.
    AnswerChecked {
        /// Slot the edit applied to.
        slot: usize,
        /// Validation error, if the new answer is invalid.
        error: Option<AnswerError>,
    },
    /// A slot's save indicator changed.
    SaveState {
        /// Question whose answer the indicator refers to.
        question: QuestionId,
        /// New persistence state.
        status: SaveStatus,
    },
    /// Countdown heartbeat, once per second while a deadline is set.
    Tick {
        /// Whole seconds until the deadline, never negative.
        remaining_secs: u64,
    },
    /// The countdown reached zero. Emitted exactly once per attempt.
    Expired,
    /// Non-fatal notification, e.g. a failed background save.
    Notice {
        /// Human-readable message.
        message: String,
    },
}

/// Broadcast hub distributing [`EngineEvent`]s to subscribers.
pub struct EventHub {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Subscribe and wrap the receiver as a stream.
    pub fn stream(&self) -> BroadcastStream<EngineEvent> {
        BroadcastStream::new(self.subscribe())
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }
}
