//! osprims-core: Platform codes, error domains, and cascade resolution
//!
//! This crate provides the error-normalization layer shared by every osprims
//! module:
//! - Capture of the raw platform failure code ([`PlatformCode`])
//! - Closed semantic error domains ([`domain`])
//! - Ordered, per-call-site resolution of a code into one domain ([`cascade`])
//! - Per-operation error unions with fixed cascade orders ([`operation`])
//! - The canonical [`OsprimsError`] for API misuse
//! - Re-exports from rsfulmen for exit code constants
//!
//! ## Resolution
//!
//! A raw code is resolved into exactly one domain: the first domain in the
//! caller's list that claims it. When no listed domain does, the result is
//! [`Unmapped`], which always carries and prints the raw code.
//!
//! ```
//! use osprims_core::{resolve, DomainId, OsError, PlatformCode};
//!
//! let err = resolve(PlatformCode::native(1_000_000), &[DomainId::Path]);
//! assert!(matches!(err, OsError::Unmapped(_)));
//! assert!(err.to_string().contains("1000000"));
//! ```
//!
//! ## Schema Integration
//!
//! JSON outputs include `schema_id` fields referencing schemas hosted at
//! `schemas.3leaps.dev/osprims/`. See the [`schema`] module for constants.

use std::env::consts::OS;

pub mod cascade;
pub mod code;
pub mod domain;
pub mod error;
pub mod operation;
pub mod schema;
mod unmapped;

pub use cascade::{resolve, resolve_current, OsError};
pub use code::{Capture, NativeCapture, Platform, PlatformCode};
pub use domain::{
    BlockingError, DescriptorError, Domain, DomainId, LimitScope, LockError, MemoryError, PathError,
    PermissionError, StorageError, ThreadError, UnknownDomain,
};
pub use error::{OsprimsError, OsprimsResult};
pub use unmapped::Unmapped;

// Re-export rsfulmen foundry exit codes for ecosystem alignment
pub use rsfulmen::foundry::exit_codes;

// ============================================================================
// Platform Detection
// ============================================================================

/// Get the current platform identifier.
///
/// Returns one of: "linux", "macos", "windows", "freebsd", etc.
#[inline]
pub fn get_platform() -> &'static str {
    OS
}
