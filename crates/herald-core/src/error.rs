//! Mediator error types.

use thiserror::Error;

/// Boxed error raised by handler code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type used across the dispatch core.
pub type MediatorResult<T> = Result<T, MediatorError>;

/// Failure signal of the dispatch core.
///
/// Validation and business-rule failures are not errors: they travel as a
/// failed [`CommandOutcome`](crate::CommandOutcome). Everything here
/// propagates to the caller.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// No implementation is registered for a required contract.
    #[error("no handler registered for {contract}")]
    HandlerNotRegistered {
        /// Type name of the missing contract.
        contract: &'static str,
    },

    /// The resolver returned an instance that does not implement the contract.
    #[error("resolver returned an instance of the wrong type for {contract}")]
    ContractMismatch {
        /// Type name of the requested contract.
        contract: &'static str,
    },

    /// The caller's cancellation signal fired.
    #[error("operation was cancelled")]
    Cancelled,

    /// A handler or behavior failed unexpectedly.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),
}

impl MediatorError {
    /// Wraps an arbitrary handler failure.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// Returns `true` for the cancellation signal.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` for configuration errors (missing or mistyped
    /// registrations).
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::HandlerNotRegistered { .. } | Self::ContractMismatch { .. }
        )
    }

    /// Returns the wrapped handler error if it is of type `E`.
    #[must_use]
    pub fn handler_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Handler(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("stock exhausted")]
    struct StockExhausted;

    #[test]
    fn test_handler_error_is_recoverable_by_downcast() {
        let err = MediatorError::handler(StockExhausted);

        assert!(err.handler_error::<StockExhausted>().is_some());
        assert!(!err.is_cancelled());
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_handler_error_from_string_message() {
        let err = MediatorError::handler("boom");

        assert_eq!(err.to_string(), "handler failed: boom");
        assert!(err.handler_error::<StockExhausted>().is_none());
    }

    #[test]
    fn test_configuration_errors_are_classified() {
        let missing = MediatorError::HandlerNotRegistered { contract: "X" };
        let mismatch = MediatorError::ContractMismatch { contract: "X" };

        assert!(missing.is_configuration());
        assert!(mismatch.is_configuration());
        assert!(!MediatorError::Cancelled.is_configuration());
    }

    #[test]
    fn test_cancelled_is_distinct() {
        assert!(MediatorError::Cancelled.is_cancelled());
        assert_eq!(MediatorError::Cancelled.to_string(), "operation was cancelled");
    }
}
