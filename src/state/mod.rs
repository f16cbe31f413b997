pub mod attempt;
mod events;
pub mod state_machine;

use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::warn;

use crate::error::ServiceError;
use crate::state::attempt::{AnswerSheet, Attempt};

pub use self::events::{EngineEvent, EventHub};
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
use self::state_machine::{AttemptEvent, AttemptPhase, AttemptStateMachine};

/// Shared handle to the live attempt state.
pub type SharedAttempt = Arc<AttemptState>;

/// Ceiling on how long a transition's side effect (typically the submission
/// request) may run before the plan is aborted.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the event hub's broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Central state for one attempt: the immutable attempt data, the navigation
/// state machine, the answer sheet, and the event hub.
pub struct AttemptState {
    attempt: Attempt,
    machine: RwLock<AttemptStateMachine>,
    sheet: RwLock<AnswerSheet>,
    events: EventHub,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AttemptState {
    /// Construct a new [`AttemptState`] wrapped in an [`Arc`] so it can be
    /// cloned cheaply into background tasks.
    pub fn new(attempt: Attempt) -> SharedAttempt {
        let sheet = AnswerSheet::new(&attempt.slots);
        Self::with_sheet(attempt, sheet)
    }

    /// Construct with a pre-filled answer sheet (resume path).
    pub fn with_sheet(attempt: Attempt, sheet: AnswerSheet) -> SharedAttempt {
        let machine = AttemptStateMachine::new(attempt.len());
        Arc::new(Self {
            attempt,
            machine: RwLock::new(machine),
            sheet: RwLock::new(sheet),
            events: EventHub::new(EVENT_CAPACITY),
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// The immutable attempt data.
    pub fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    /// The answer sheet guarded by its lock.
    pub fn sheet(&self) -> &RwLock<AnswerSheet> {
        &self.sheet
    }

    /// Hub used to fan out state-change events.
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Snapshot the current phase of the state machine.
    pub async fn phase(&self) -> AttemptPhase {
        self.machine.read().await.phase()
    }

    /// Index of the slot currently shown, unless the attempt is submitted.
    pub async fn current_slot(&self) -> Option<usize> {
        self.machine.read().await.current_slot()
    }

    /// Create a snapshot of the current state machine state.
    pub async fn snapshot(&self) -> Snapshot {
        self.machine.read().await.snapshot()
    }

    /// Plan a transition on the shared state machine, returning the plan.
    async fn plan_transition(&self, event: AttemptEvent) -> Result<Plan, PlanError> {
        let mut machine = self.machine.write().await;
        machine.plan(event)
    }

    /// Apply a planned transition, returning the next phase.
    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<AttemptPhase, ApplyError> {
        let mut machine = self.machine.write().await;
        machine.apply(plan_id)
    }

    /// Abort a planned transition on the shared state machine.
    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut machine = self.machine.write().await;
        machine.abort(plan_id)
    }

    /// Run `work` inside a planned transition: the event is validated first,
    /// the effect runs, and the phase only advances if the effect succeeds.
    /// On failure or timeout the plan is aborted and the phase is unchanged.
    ///
    /// The resulting phase change is broadcast to event subscribers.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: AttemptEvent,
        work: F,
    ) -> Result<(T, AttemptPhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let Plan { id: plan_id, .. } = self.plan_transition(event).await?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                self.events
                    .broadcast(EngineEvent::PhaseChanged { phase: next });
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }

    /// Apply a pure navigation event with no side effect.
    pub async fn apply_event(&self, event: AttemptEvent) -> Result<AttemptPhase, ServiceError> {
        let ((), next) = self.run_transition(event, || async { Ok(()) }).await?;
        Ok(next)
    }
}
