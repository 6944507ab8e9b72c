//! Error types for XStream CDC operations
//!
//! Leaf codecs keep their own error enums ([`NumberError`], [`ScnParseError`],
//! [`TextDecodeError`]) and convert into [`CdcError`] at the protocol layer.
//! Nothing in this crate retries on error; the caller decides whether to
//! continue, reconnect or abort.

use crate::oracle::{NumberError, ScnParseError, TextDecodeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error categories for metrics and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Native XStream call failures (receive, header, chunk, watermark)
    Protocol,
    /// Malformed numeric or SCN payloads
    Codec,
    /// Configuration errors (invalid settings, unregistered code page)
    Configuration,
    /// Column/text decoding failures inside a record
    Decode,
    /// Other/unknown errors
    Other,
}

/// CDC-specific errors
#[derive(Error, Debug)]
pub enum CdcError {
    /// Malformed or out-of-range packed-decimal value
    #[error("Number error: {0}")]
    Number(#[from] NumberError),

    /// Malformed SCN text
    #[error("SCN error: {0}")]
    Scn(#[from] ScnParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A native XStream call failed
    #[error("{call} failed, code:{code}, {message}")]
    Native {
        /// Name of the native call that failed
        call: &'static str,
        /// Native error code
        code: i32,
        /// Native error text
        message: String,
    },

    /// Column value could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl CdcError {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new native call error
    pub fn native(call: &'static str, code: i32, message: impl Into<String>) -> Self {
        Self::Native {
            call,
            code,
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Native error code, if this error came from a native call.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Self::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Get the error category for metrics and alerting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Native { .. } => ErrorCategory::Protocol,
            Self::Number(_) => ErrorCategory::Codec,
            Self::Scn(_) => ErrorCategory::Codec,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Decode(_) => ErrorCategory::Decode,
            Self::InvalidState(_) => ErrorCategory::Other,
        }
    }

    /// Get a metric-safe error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Native { .. } => "native_error",
            Self::Number(_) => "number_error",
            Self::Scn(_) => "scn_error",
            Self::Config(_) => "config_error",
            Self::Decode(_) => "decode_error",
            Self::InvalidState(_) => "invalid_state",
        }
    }
}

impl From<TextDecodeError> for CdcError {
    fn from(err: TextDecodeError) -> Self {
        CdcError::Decode(err.to_string())
    }
}

/// Result type for CDC operations
pub type Result<T> = std::result::Result<T, CdcError>;
