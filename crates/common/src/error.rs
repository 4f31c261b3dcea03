//! Common error types

use thiserror::Error;

/// Failure kinds surfaced by the bridge.
///
/// Every fallible operation reports exactly which invariant was violated;
/// nothing is retried and nothing is swallowed.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input: null required handle, negative count, unknown
    /// transfer type.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Allocation failed while constructing a managed object.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Operation applied to an object the bridge does not recognize, or to a
    /// handle whose table entry is gone.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidArgument("null transfer handle".to_string());
        assert_eq!(format!("{}", err), "Invalid argument: null transfer handle");

        let err = Error::InvalidState("stale transfer handle".to_string());
        assert!(format!("{}", err).contains("Invalid state"));
    }

    #[test]
    fn test_error_kinds_are_distinct() {
        let invalid = Error::InvalidArgument("x".to_string());
        let exhausted = Error::ResourceExhausted("x".to_string());
        let state = Error::InvalidState("x".to_string());

        assert!(matches!(invalid, Error::InvalidArgument(_)));
        assert!(matches!(exhausted, Error::ResourceExhausted(_)));
        assert!(matches!(state, Error::InvalidState(_)));
    }
}
