/// Wire types for the competition quiz REST API.
pub mod quiz;
/// Validation and normalization of student answers.
pub mod validation;
