/// Orchestration of one attempt from load to submission.
pub mod attempt_service;
/// Throttled background answer persistence.
pub mod autosave;
/// Submission confirmation capability.
pub mod confirm;
/// Deadline countdown for timed attempts.
pub mod countdown;
