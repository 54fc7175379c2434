use thiserror::Error;

/// Errors that cross a public API boundary.
///
/// Domain outcomes (a blocked decision) are not represented here: they
/// are carried inside `crate::decision::DecisionRecord` since a blocked
/// ramp is an ordinary outcome, not a failure. Only malformed input and
/// missing optional dependencies reach callers as `Err`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridShiftError {
    #[error("invalid input: {message}")]
    InputInvalid { message: String },

    #[error("dependency unavailable: {what}")]
    DependencyMissing { what: String },
}

impl GridShiftError {
    pub fn input(message: impl Into<String>) -> Self {
        GridShiftError::InputInvalid {
            message: message.into(),
        }
    }

    pub fn dependency_missing(what: impl Into<String>) -> Self {
        GridShiftError::DependencyMissing { what: what.into() }
    }
}
