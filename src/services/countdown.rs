//! Deadline countdown for timed attempts.
//!
//! Remaining time is recomputed from the deadline on every tick rather than
//! decremented, so a suspended or delayed task resumes with the correct
//! value instead of drifting. Expiry is signalled exactly once, after which
//! the ticker stops.

use time::OffsetDateTime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};
use tracing::debug;

use crate::state::{EngineEvent, SharedAttempt};

/// Handle to the ticking countdown task. Dropping or cancelling the handle
/// stops the ticker so an abandoned attempt view never auto-submits.
pub struct Countdown {
    task: JoinHandle<()>,
}

impl Countdown {
    /// Spawn the countdown for the attempt's deadline.
    ///
    /// Returns `None` when the attempt has no deadline: no countdown is
    /// displayed and nothing ever auto-submits. Otherwise returns the handle
    /// plus a receiver that resolves exactly once when the deadline passes.
    pub fn spawn(state: SharedAttempt) -> Option<(Self, oneshot::Receiver<()>)> {
        let deadline = state.attempt().deadline?;
        let (expired_tx, expired_rx) = oneshot::channel();

        let task = tokio::spawn(run(state, deadline, expired_tx));

        Some((Self { task }, expired_rx))
    }

    /// Stop ticking without waiting for expiry.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(state: SharedAttempt, deadline: OffsetDateTime, expired_tx: oneshot::Sender<()>) {
    // Anchor the wall-clock deadline to the monotonic clock once; every tick
    // derives remaining time from this anchor instead of counting down.
    let now_wall = OffsetDateTime::now_utc();
    let remaining = if deadline > now_wall {
        let span = deadline - now_wall;
        Duration::try_from(span).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    };
    let end = Instant::now() + remaining;

    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let remaining_secs = remaining_whole_secs(end);
        state.events().broadcast(EngineEvent::Tick { remaining_secs });

        if remaining_secs == 0 {
            debug!("countdown reached zero");
            state.events().broadcast(EngineEvent::Expired);
            let _ = expired_tx.send(());
            break;
        }
    }
}

/// Whole seconds until `end`, rounded up so a deadline a fraction of a
/// second away still reads as 1, and never negative.
fn remaining_whole_secs(end: Instant) -> u64 {
    let remaining = end.saturating_duration_since(Instant::now());
    remaining.as_millis().div_ceil(1_000) as u64
}
