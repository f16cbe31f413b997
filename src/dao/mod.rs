/// Abstraction over the quiz REST backend.
pub mod backend;
/// Local draft persistence for offline-resilient answer recovery.
pub mod drafts;
/// HTTP implementation of the quiz backend.
pub mod http;
