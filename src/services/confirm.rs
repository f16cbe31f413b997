//! Submission confirmation capability.
//!
//! Finalizing an attempt is irreversible, so the orchestrator asks before
//! submitting. The ask is injected so hosts decide how to present it (the
//! terminal runner prompts on stdin) and tests can answer deterministically.

use futures::future::BoxFuture;

/// Asks the student to approve an irreversible action.
pub trait Confirm: Send + Sync {
    /// Present `prompt` and resolve to `true` if the student approves.
    fn confirm(&self, prompt: &str) -> BoxFuture<'static, bool>;
}

/// Confirmation that always approves. Used by tests; countdown expiry
/// bypasses confirmation entirely rather than using this.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> BoxFuture<'static, bool> {
        Box::pin(async { true })
    }
}

/// Confirmation that always declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverConfirm;

impl Confirm for NeverConfirm {
    fn confirm(&self, _prompt: &str) -> BoxFuture<'static, bool> {
        Box::pin(async { false })
    }
}
