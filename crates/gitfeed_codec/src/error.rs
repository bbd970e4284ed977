//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a record.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode bytes.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// The decoded value was valid but not a map.
    #[error("expected a record (map) at top level, found {found}")]
    NotARecord {
        /// Kind of value found instead.
        found: &'static str,
    },

    /// Unknown record format name.
    #[error("unknown record format: {name}")]
    UnknownFormat {
        /// The rejected name.
        name: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CodecError::NotARecord { found: "array" };
        assert_eq!(
            err.to_string(),
            "expected a record (map) at top level, found array"
        );

        let err = CodecError::decoding_failed("EOF while parsing");
        assert!(err.to_string().contains("EOF"));
    }
}
