//! Memory and mapping failures.

use thiserror::Error;

use super::{Domain, DomainId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum MemoryError {
    /// Out of memory, address space, or commit charge.
    #[error("cannot allocate memory")]
    Exhausted,

    /// A pointer argument lies outside the accessible address space.
    #[error("bad address")]
    BadAddress,

    /// The object does not support mapping (`ENODEV` from `mmap`).
    #[error("mapping not supported by this object")]
    Unsupported,

    /// A size or offset does not fit the kernel's types.
    #[error("value too large for defined data type")]
    Overflow,
}

impl Domain for MemoryError {
    const ID: DomainId = DomainId::Memory;

    #[cfg(unix)]
    fn classify_posix(errno: i32) -> Option<Self> {
        match errno {
            libc::ENOMEM => Some(MemoryError::Exhausted),
            libc::EFAULT => Some(MemoryError::BadAddress),
            libc::ENODEV => Some(MemoryError::Unsupported),
            libc::EOVERFLOW => Some(MemoryError::Overflow),
            _ => None,
        }
    }

    #[cfg(windows)]
    fn classify_windows(code: u32) -> Option<Self> {
        use windows_sys::Win32::Foundation::{
            ERROR_ARITHMETIC_OVERFLOW, ERROR_COMMITMENT_LIMIT, ERROR_INVALID_ADDRESS,
            ERROR_NOACCESS, ERROR_NOT_ENOUGH_MEMORY, ERROR_NOT_SUPPORTED, ERROR_OUTOFMEMORY,
        };

        match code {
            ERROR_NOT_ENOUGH_MEMORY | ERROR_OUTOFMEMORY | ERROR_COMMITMENT_LIMIT => {
                Some(MemoryError::Exhausted)
            }
            ERROR_INVALID_ADDRESS | ERROR_NOACCESS => Some(MemoryError::BadAddress),
            ERROR_NOT_SUPPORTED => Some(MemoryError::Unsupported),
            ERROR_ARITHMETIC_OVERFLOW => Some(MemoryError::Overflow),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::PlatformCode;

    #[test]
    #[cfg(unix)]
    fn claims_allocation_errnos() {
        assert_eq!(
            MemoryError::classify(PlatformCode::posix(libc::ENOMEM)),
            Some(MemoryError::Exhausted)
        );
        assert_eq!(
            MemoryError::classify(PlatformCode::posix(libc::EFAULT)),
            Some(MemoryError::BadAddress)
        );
        assert_eq!(MemoryError::classify(PlatformCode::posix(libc::ENOSPC)), None);
    }
}
