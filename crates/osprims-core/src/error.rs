//! Canonical error type for osprims API misuse and wrapped OS failures.
//!
//! Classified OS failures live in [`crate::domain`] and the per-operation
//! unions; this module covers what sits around them:
//! - [`OsprimsError`] - argument validation, unsupported features, and OS
//!   failures tagged with the operation that produced them
//!
//! ## Design Principles
//!
//! - **Structured**: Errors carry typed context (operation, domain error)
//! - **Stable codes**: [`OsprimsError::error_code`] numbering does not change
//! - **Secure**: No paths or file contents in messages

use thiserror::Error;

use crate::cascade::OsError;

/// Canonical error type for osprims operations.
///
/// ## Error Code Mapping
///
/// | Variant | Code |
/// |---------|------|
/// | `InvalidArgument` | 1 |
/// | `NotSupported` | 6 |
/// | `Os` | 8 |
/// | `Internal` | 99 |
#[derive(Debug, Error)]
pub enum OsprimsError {
    /// Invalid argument provided.
    ///
    /// Returned when input validation fails (e.g., zero-length lock range,
    /// alignment that is not a power of two).
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of what was invalid.
        message: String,
    },

    /// Operation not supported on the current platform.
    #[error("Operation '{feature}' not supported on {platform}")]
    NotSupported {
        /// The feature that is not supported.
        feature: String,
        /// The platform where it's not supported.
        platform: String,
    },

    /// A syscall failed; the code has already been classified.
    #[error("{operation} failed: {source}")]
    Os {
        /// The syscall family (e.g., "open", "fcntl").
        operation: &'static str,
        /// The classified failure.
        #[source]
        source: OsError,
    },

    /// Internal error (should not happen in normal operation).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl OsprimsError {
    /// Stable numeric code for this error.
    pub fn error_code(&self) -> i32 {
        match self {
            OsprimsError::InvalidArgument { .. } => 1,
            OsprimsError::NotSupported { .. } => 6,
            OsprimsError::Os { .. } => 8,
            OsprimsError::Internal { .. } => 99,
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl OsprimsError {
    /// Create an `InvalidArgument` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        OsprimsError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a `NotSupported` error.
    pub fn not_supported(feature: impl Into<String>, platform: impl Into<String>) -> Self {
        OsprimsError::NotSupported {
            feature: feature.into(),
            platform: platform.into(),
        }
    }

    /// Create an `Os` error from any classified failure.
    pub fn os(operation: &'static str, source: impl Into<OsError>) -> Self {
        OsprimsError::Os {
            operation,
            source: source.into(),
        }
    }

    /// Create an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        OsprimsError::Internal {
            message: message.into(),
        }
    }

    /// The classified OS failure, if this error wraps one.
    pub fn os_error(&self) -> Option<&OsError> {
        match self {
            OsprimsError::Os { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for osprims operations.
pub type OsprimsResult<T> = Result<T, OsprimsError>;

// ============================================================================
// Tests
// ============================================================================
