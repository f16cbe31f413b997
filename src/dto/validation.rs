//! Validation and normalization of student answers.

use serde::Deserialize;
use thiserror::Error;

/// Largest value a single answer component may take.
pub const MAX_ANSWER_VALUE: u32 = 999;

/// Accepted shape for a slot's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFormat {
    /// A single integer in `[0, MAX_ANSWER_VALUE]`.
    #[default]
    Single,
    /// One or more comma-separated integers, each in `[0, MAX_ANSWER_VALUE]`.
    Multiple,
}

/// Reason an answer string was rejected. Messages are user-facing and
/// correctable; they never leave the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    /// The answer (or one of its comma-separated parts) is not a base-10 integer.
    #[error("answer must be a whole number")]
    NotAnInteger,
    /// The answer (or one of its parts) falls outside the accepted range.
    #[error("answer must be between 0 and {MAX_ANSWER_VALUE}")]
    OutOfRange,
    /// A multi-answer string contains an empty component, e.g. `1,,2`.
    #[error("separate answers with single commas")]
    EmptyComponent,
}

/// Outcome of checking an answer string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckedAnswer {
    /// Nothing typed yet. Not an error, but blocks forward navigation.
    Unanswered,
    /// The canonical form of a valid answer, leading zeros stripped.
    Answered(String),
}

/// Check a raw answer string against the slot's format.
///
/// Empty (or whitespace-only) input is provisionally valid and maps to
/// [`CheckedAnswer::Unanswered`]. Valid non-empty input is normalized, so
/// `"007"` becomes `"7"` and `"01, 2"` becomes `"1,2"`.
pub fn check_answer(raw: &str, format: AnswerFormat) -> Result<CheckedAnswer, AnswerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(CheckedAnswer::Unanswered);
    }

    let normalized = match format {
        AnswerFormat::Single => check_component(trimmed)?,
        AnswerFormat::Multiple => {
            let components = trimmed
                .split(',')
                .map(|part| {
                    let part = part.trim();
                    if part.is_empty() {
                        return Err(AnswerError::EmptyComponent);
                    }
                    check_component(part)
                })
                .collect::<Result<Vec<_>, _>>()?;
            components.join(",")
        }
    };

    Ok(CheckedAnswer::Answered(normalized))
}

/// Validate one integer component and return its canonical form.
fn check_component(part: &str) -> Result<String, AnswerError> {
    if !part.chars().all(|c| c.is_ascii_digit()) {
        return Err(AnswerError::NotAnInteger);
    }

    let value = part.parse::<u32>().map_err(|_| AnswerError::OutOfRange)?;
    if value > MAX_ANSWER_VALUE {
        return Err(AnswerError::OutOfRange);
    }

    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_unanswered() {
        assert_eq!(
            check_answer("", AnswerFormat::Single),
            Ok(CheckedAnswer::Unanswered)
        );
        assert_eq!(
            check_answer("   ", AnswerFormat::Multiple),
            Ok(CheckedAnswer::Unanswered)
        );
    }

    #[test]
    fn leading_zeros_are_normalized() {
        assert_eq!(
            check_answer("007", AnswerFormat::Single),
            Ok(CheckedAnswer::Answered("7".into()))
        );
        assert_eq!(
            check_answer("000", AnswerFormat::Single),
            Ok(CheckedAnswer::Answered("0".into()))
        );
    }

    #[test]
    fn range_is_inclusive() {
        assert_eq!(
            check_answer("0", AnswerFormat::Single),
            Ok(CheckedAnswer::Answered("0".into()))
        );
        assert_eq!(
            check_answer("999", AnswerFormat::Single),
            Ok(CheckedAnswer::Answered("999".into()))
        );
        assert_eq!(
            check_answer("1000", AnswerFormat::Single),
            Err(AnswerError::OutOfRange)
        );
    }

    #[test]
    fn non_digits_are_rejected() {
        assert_eq!(
            check_answer("12a", AnswerFormat::Single),
            Err(AnswerError::NotAnInteger)
        );
        assert_eq!(
            check_answer("-1", AnswerFormat::Single),
            Err(AnswerError::NotAnInteger)
        );
        assert_eq!(
            check_answer("1.5", AnswerFormat::Single),
            Err(AnswerError::NotAnInteger)
        );
    }

    #[test]
    fn commas_are_rejected_in_single_mode() {
        assert_eq!(
            check_answer("1,2", AnswerFormat::Single),
            Err(AnswerError::NotAnInteger)
        );
    }

    #[test]
    fn multi_answers_are_normalized_per_component() {
        assert_eq!(
            check_answer("01, 2,003", AnswerFormat::Multiple),
            Ok(CheckedAnswer::Answered("1,2,3".into()))
        );
    }

    #[test]
    fn multi_answers_reject_bad_components() {
        assert_eq!(
            check_answer("1,,2", AnswerFormat::Multiple),
            Err(AnswerError::EmptyComponent)
        );
        assert_eq!(
            check_answer("1,2,", AnswerFormat::Multiple),
            Err(AnswerError::EmptyComponent)
        );
        assert_eq!(
            check_answer("1,abc", AnswerFormat::Multiple),
            Err(AnswerError::NotAnInteger)
        );
        assert_eq!(
            check_answer("1,1000", AnswerFormat::Multiple),
            Err(AnswerError::OutOfRange)
        );
    }
}
