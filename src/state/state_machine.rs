use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// High-level phases an attempt can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    /// The student is viewing and answering one question slot.
    Answering {
        /// Zero-based index of the slot currently shown.
        slot: usize,
    },
    /// Terminal phase: the attempt has been finalized.
    Submitted {
        /// What drove the finalization.
        reason: SubmitReason,
    },
}

/// Why an attempt reached the submitted phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitReason {
    /// The student confirmed submission explicitly.
    Confirmed,
    /// The countdown reached zero and forced submission.
    TimeExpired,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptEvent {
    /// Move to the next slot. Only valid when a next slot exists; answer
    /// validity is enforced by the orchestrator before the event is planned.
    Advance,
    /// Move back to the previous slot.
    Retreat,
    /// Jump straight to a slot picked from the question strip. Out-of-range
    /// targets clamp to the last slot.
    Jump {
        /// Requested zero-based slot index.
        target: usize,
    },
    /// Finalize the attempt.
    Submit {
        /// What drove the finalization.
        reason: SubmitReason,
    },
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: AttemptPhase,
    /// The event that cannot be applied from this phase.
    pub event: AttemptEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: AttemptPhase,
        /// Current phase.
        actual: AttemptPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: AttemptPhase,
    /// Phase the state machine will transition to.
    pub to: AttemptPhase,
    /// Event that triggered this transition.
    pub event: AttemptEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: AttemptPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<AttemptPhase>,
}

/// State machine sequencing one attempt from the first slot to submission.
///
/// The submitted phase is terminal: no event is valid from it, which is what
/// makes countdown expiry and explicit submission race-safe: whichever
/// reaches the machine first wins, and the loser gets an invalid transition.
#[derive(Debug, Clone)]
pub struct AttemptStateMachine {
    slot_count: usize,
    phase: AttemptPhase,
    version: usize,
    pending: Option<Plan>,
}

impl AttemptStateMachine {
    /// Create a state machine over `slot_count` slots, starting at slot 0.
    ///
    /// `slot_count` must be at least 1; loaders reject empty slot lists
    /// before a machine is built.
    pub fn new(slot_count: usize) -> Self {
        Self {
            slot_count,
            phase: AttemptPhase::Answering { slot: 0 },
            version: 0,
            pending: None,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    /// Number of slots the machine navigates over.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Index of the slot currently shown, unless the attempt is submitted.
    pub fn current_slot(&self) -> Option<usize> {
        match self.phase {
            AttemptPhase::Answering { slot } => Some(slot),
            AttemptPhase::Submitted { .. } => None,
        }
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: AttemptEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<AttemptPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;
        self.pending = None;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: AttemptEvent) -> Result<AttemptPhase, InvalidTransition> {
        let last = self.slot_count.saturating_sub(1);

        let next = match (self.phase, event) {
            (AttemptPhase::Answering { slot }, AttemptEvent::Advance) if slot < last => {
                AttemptPhase::Answering { slot: slot + 1 }
            }
            (AttemptPhase::Answering { slot }, AttemptEvent::Retreat) if slot > 0 => {
                AttemptPhase::Answering { slot: slot - 1 }
            }
            (AttemptPhase::Answering { .. }, AttemptEvent::Jump { target }) => {
                AttemptPhase::Answering {
                    slot: target.min(last),
                }
            }
            (AttemptPhase::Answering { .. }, AttemptEvent::Submit { reason }) => {
                AttemptPhase::Submitted { reason }
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut AttemptStateMachine, event: AttemptEvent) -> AttemptPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_first_slot() {
        let sm = AttemptStateMachine::new(3);
        assert_eq!(sm.phase(), AttemptPhase::Answering { slot: 0 });
        assert_eq!(sm.current_slot(), Some(0));
    }

    #[test]
    fn full_happy_path_through_attempt() {
        let mut sm = AttemptStateMachine::new(3);

        assert_eq!(
            apply(&mut sm, AttemptEvent::Advance),
            AttemptPhase::Answering { slot: 1 }
        );
        assert_eq!(
            apply(&mut sm, AttemptEvent::Advance),
            AttemptPhase::Answering { slot: 2 }
        );
        assert_eq!(
            apply(&mut sm, AttemptEvent::Retreat),
            AttemptPhase::Answering { slot: 1 }
        );
        assert_eq!(
            apply(&mut sm, AttemptEvent::Jump { target: 2 }),
            AttemptPhase::Answering { slot: 2 }
        );
        assert_eq!(
            apply(
                &mut sm,
                AttemptEvent::Submit {
                    reason: SubmitReason::Confirmed
                }
            ),
            AttemptPhase::Submitted {
                reason: SubmitReason::Confirmed
            }
        );
    }

    #[test]
    fn advance_past_last_slot_is_invalid() {
        let mut sm = AttemptStateMachine::new(2);
        apply(&mut sm, AttemptEvent::Advance);

        let err = sm.plan(AttemptEvent::Advance).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, AttemptPhase::Answering { slot: 1 });
                assert_eq!(invalid.event, AttemptEvent::Advance);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn retreat_from_first_slot_is_invalid() {
        let mut sm = AttemptStateMachine::new(2);
        assert!(matches!(
            sm.plan(AttemptEvent::Retreat),
            Err(PlanError::InvalidTransition(_))
        ));
    }

    #[test]
    fn jump_clamps_out_of_range_targets() {
        let mut sm = AttemptStateMachine::new(3);
        assert_eq!(
            apply(&mut sm, AttemptEvent::Jump { target: 99 }),
            AttemptPhase::Answering { slot: 2 }
        );
        assert_eq!(
            apply(&mut sm, AttemptEvent::Jump { target: 0 }),
            AttemptPhase::Answering { slot: 0 }
        );
    }

    #[test]
    fn submitted_is_terminal() {
        let mut sm = AttemptStateMachine::new(1);
        apply(
            &mut sm,
            AttemptEvent::Submit {
                reason: SubmitReason::TimeExpired,
            },
        );

        for event in [
            AttemptEvent::Advance,
            AttemptEvent::Retreat,
            AttemptEvent::Jump { target: 0 },
            AttemptEvent::Submit {
                reason: SubmitReason::Confirmed,
            },
        ] {
            assert!(matches!(
                sm.plan(event),
                Err(PlanError::InvalidTransition(_))
            ));
        }
    }

    #[test]
    fn plan_while_pending_is_rejected() {
        let mut sm = AttemptStateMachine::new(2);
        let _plan = sm.plan(AttemptEvent::Advance).unwrap();
        assert!(matches!(
            sm.plan(AttemptEvent::Advance),
            Err(PlanError::AlreadyPending)
        ));
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = AttemptStateMachine::new(2);
        let plan = sm.plan(AttemptEvent::Advance).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), AttemptPhase::Answering { slot: 0 });
    }

    #[test]
    fn apply_with_wrong_id_keeps_plan_pending() {
        let mut sm = AttemptStateMachine::new(2);
        let plan = sm.plan(AttemptEvent::Advance).unwrap();

        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));

        // The original plan is still applicable.
        assert_eq!(
            sm.apply(plan.id).unwrap(),
            AttemptPhase::Answering { slot: 1 }
        );
    }
}
