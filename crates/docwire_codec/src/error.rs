//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while building, encoding or decoding values.
///
/// Every variant is a local validation failure; none of them involve I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An argument failed validation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A value of a type that cannot be sent to the backend.
    #[error("cannot use {type_name} as a Firestore value{}", field_suffix(.field))]
    UnsupportedValue {
        /// Name of the offending type.
        type_name: String,
        /// Field path where the value was found, if nested.
        field: Option<String>,
    },

    /// Timestamp components out of range or not integral.
    #[error("invalid timestamp: {message}")]
    InvalidTimestamp {
        /// Description of the problem.
        message: String,
    },

    /// Malformed field or resource path.
    #[error("invalid path: {message}")]
    InvalidPath {
        /// Description of the problem.
        message: String,
    },

    /// A wire value could not be turned back into a native value.
    #[error("decoding failed: {message}")]
    Decoding {
        /// Description of the problem.
        message: String,
    },
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(path) => format!(" (found in field \"{path}\")"),
        None => String::new(),
    }
}

impl CodecError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an unsupported value error.
    pub fn unsupported_value(type_name: impl Into<String>, field: Option<String>) -> Self {
        Self::UnsupportedValue {
            type_name: type_name.into(),
            field,
        }
    }

    /// Create an invalid timestamp error.
    pub fn invalid_timestamp(message: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            message: message.into(),
        }
    }

    /// Create an invalid path error.
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath {
            message: message.into(),
        }
    }

    /// Create a decoding error.
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }
}
