//! Domain cascade resolution.
//!
//! The same raw code means different things to different operations, so
//! there is no global code → meaning table. Each call site supplies its own
//! ordered list of candidate domains; the first domain that claims the code
//! decides the result and later domains are never consulted. When nothing
//! claims the code the result is [`Unmapped`], carrying the raw value.
//!
//! [`resolve`] takes the list at runtime and returns the erased [`OsError`].
//! The per-operation unions in [`crate::operation`] fix their order at
//! compile time and narrow the result type to the domains that operation can
//! actually produce.

use std::io;

use thiserror::Error;

use crate::code::PlatformCode;
use crate::domain::{
    BlockingError, DescriptorError, Domain, DomainId, LockError, MemoryError, PathError,
    PermissionError, StorageError, ThreadError,
};
use crate::unmapped::Unmapped;

/// Any classified failure, or the unmapped fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OsError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Blocking(#[from] BlockingError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Thread(#[from] ThreadError),

    #[error(transparent)]
    Unmapped(#[from] Unmapped),
}

impl OsError {
    /// Domain that claimed the code, or `None` for [`OsError::Unmapped`].
    pub fn domain(&self) -> Option<DomainId> {
        match self {
            OsError::Path(_) => Some(DomainId::Path),
            OsError::Permission(_) => Some(DomainId::Permission),
            OsError::Descriptor(_) => Some(DomainId::Descriptor),
            OsError::Storage(_) => Some(DomainId::Storage),
            OsError::Blocking(_) => Some(DomainId::Blocking),
            OsError::Memory(_) => Some(DomainId::Memory),
            OsError::Lock(_) => Some(DomainId::Lock),
            OsError::Thread(_) => Some(DomainId::Thread),
            OsError::Unmapped(_) => None,
        }
    }

    pub fn is_unmapped(&self) -> bool {
        matches!(self, OsError::Unmapped(_))
    }

    /// Closest [`io::ErrorKind`], for callers bridging into `std::io`.
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            OsError::Path(PathError::NotFound) => io::ErrorKind::NotFound,
            OsError::Path(PathError::Exists) => io::ErrorKind::AlreadyExists,
            OsError::Path(_) => io::ErrorKind::InvalidInput,
            OsError::Permission(_) => io::ErrorKind::PermissionDenied,
            OsError::Descriptor(_) => io::ErrorKind::InvalidInput,
            OsError::Storage(_) => io::ErrorKind::Other,
            OsError::Blocking(BlockingError::WouldBlock) => io::ErrorKind::WouldBlock,
            OsError::Blocking(BlockingError::Interrupted) => io::ErrorKind::Interrupted,
            OsError::Blocking(BlockingError::TimedOut) => io::ErrorKind::TimedOut,
            OsError::Blocking(BlockingError::Hardware) => io::ErrorKind::Other,
            OsError::Memory(MemoryError::Exhausted) => io::ErrorKind::OutOfMemory,
            OsError::Memory(_) => io::ErrorKind::InvalidInput,
            OsError::Lock(LockError::Contention) => io::ErrorKind::WouldBlock,
            OsError::Lock(_) => io::ErrorKind::Other,
            OsError::Thread(_) => io::ErrorKind::Other,
            OsError::Unmapped(_) => io::ErrorKind::Other,
        }
    }
}

impl From<OsError> for io::Error {
    fn from(err: OsError) -> Self {
        match err {
            // Keep the OS code so std's own Display and raw_os_error() still work.
            OsError::Unmapped(unmapped) if unmapped.code().is_native() => {
                io::Error::from_raw_os_error(unmapped.code().raw())
            }
            other => io::Error::new(other.io_kind(), other),
        }
    }
}

impl DomainId {
    /// Ask this domain to claim `code`, erasing the result into [`OsError`].
    pub fn classify(self, code: PlatformCode) -> Option<OsError> {
        match self {
            DomainId::Path => PathError::classify(code).map(OsError::Path),
            DomainId::Permission => PermissionError::classify(code).map(OsError::Permission),
            DomainId::Descriptor => DescriptorError::classify(code).map(OsError::Descriptor),
            DomainId::Storage => StorageError::classify(code).map(OsError::Storage),
            DomainId::Blocking => BlockingError::classify(code).map(OsError::Blocking),
            DomainId::Memory => MemoryError::classify(code).map(OsError::Memory),
            DomainId::Lock => LockError::classify(code).map(OsError::Lock),
            DomainId::Thread => ThreadError::classify(code).map(OsError::Thread),
        }
    }
}

/// Resolve `code` against `domains`, in order.
///
/// The first domain that claims the code wins. If none does, the result is
/// [`OsError::Unmapped`] carrying `code`. Never panics; an empty list always
/// yields `Unmapped`.
pub fn resolve(code: PlatformCode, domains: &[DomainId]) -> OsError {
    domains
        .iter()
        .find_map(|id| id.classify(code))
        .unwrap_or_else(|| OsError::Unmapped(Unmapped::unclaimed(code, domains)))
}

/// Capture the current platform code and resolve it against `domains`.
///
/// Same capture rules as [`PlatformCode::current`]: call immediately after
/// the failing syscall.
#[inline]
pub fn resolve_current(domains: &[DomainId]) -> OsError {
    resolve(PlatformCode::current(), domains)
}
