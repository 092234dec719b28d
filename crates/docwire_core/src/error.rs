//! Error types for the transaction engine.

use docwire_codec::CodecError;
use docwire_protocol::{Code, Status};
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message for a read issued after a write in the same attempt.
pub const READ_AFTER_WRITE_MESSAGE: &str =
    "Firestore transactions require all reads to be executed before all writes.";

/// Message for a write issued inside a read-only transaction.
pub const READ_ONLY_WRITE_MESSAGE: &str = "Firestore read-only transactions cannot execute writes.";

/// Errors raised by the engine itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A caller-supplied argument failed local validation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A call was made in a state that does not allow it.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of the problem.
        message: String,
    },

    /// A value could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The backend call failed.
    #[error("rpc failed: {0}")]
    Rpc(#[from] Status),

    /// The transaction handle was used after its attempt ended.
    #[error("transaction attempt has already completed")]
    AttemptClosed,
}

impl Error {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// True when the failure came from local argument validation.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument { .. } | Error::Codec(_))
    }

    /// True when a transaction attempt that failed with this error may run
    /// again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Rpc(status) => status.is_retryable_for_transaction(),
            _ => false,
        }
    }

    /// The backend status code, for RPC failures.
    pub fn code(&self) -> Option<Code> {
        match self {
            Error::Rpc(status) => Some(status.code),
            _ => None,
        }
    }
}

/// Outcome failure of a transaction run.
///
/// The callback's own failure is kept separate so that it reaches the caller
/// unchanged, whatever its type.
#[derive(Error, Debug)]
pub enum TransactionError<E> {
    /// The callback failed; never retried.
    #[error("transaction callback failed: {0}")]
    Callback(E),

    /// Validation, begin, commit or rollback failed.
    #[error(transparent)]
    Engine(#[from] Error),
}

impl<E> TransactionError<E> {
    /// The callback's failure, if that is what ended the run.
    pub fn into_callback(self) -> Option<E> {
        match self {
            TransactionError::Callback(e) => Some(e),
            TransactionError::Engine(_) => None,
        }
    }

    /// The engine failure, if that is what ended the run.
    pub fn engine(&self) -> Option<&Error> {
        match self {
            TransactionError::Callback(_) => None,
            TransactionError::Engine(e) => Some(e),
        }
    }
}
