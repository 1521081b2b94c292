//! Thread and synchronization primitive failures.

use thiserror::Error;

use super::{Domain, DomainId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ThreadError {
    /// The caller already holds the primitive, or the wait would cycle.
    #[error("thread deadlock detected")]
    Deadlock,

    #[error("resource busy")]
    Busy,

    /// Thread, key, or primitive count limit reached.
    #[error("thread resource limit reached")]
    ResourceLimit,

    /// Release by a thread that does not own the primitive.
    #[error("calling thread does not own the primitive")]
    NotOwner,
}

impl Domain for ThreadError {
    const ID: DomainId = DomainId::Thread;

    #[cfg(unix)]
    fn classify_posix(errno: i32) -> Option<Self> {
        match errno {
            libc::EDEADLK => Some(ThreadError::Deadlock),
            libc::EBUSY => Some(ThreadError::Busy),
            libc::EAGAIN => Some(ThreadError::ResourceLimit),
            libc::EPERM => Some(ThreadError::NotOwner),
            _ => None,
        }
    }

    #[cfg(windows)]
    fn classify_windows(code: u32) -> Option<Self> {
        use windows_sys::Win32::Foundation::{
            ERROR_BUSY, ERROR_MAX_THRDS_REACHED, ERROR_NOT_OWNER, ERROR_POSSIBLE_DEADLOCK,
        };

        match code {
            ERROR_POSSIBLE_DEADLOCK => Some(ThreadError::Deadlock),
            ERROR_BUSY => Some(ThreadError::Busy),
            ERROR_MAX_THRDS_REACHED => Some(ThreadError::ResourceLimit),
            ERROR_NOT_OWNER => Some(ThreadError::NotOwner),
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
    fn eperm_reads_as_not_owner() {
        assert_eq!(
            ThreadError::classify(PlatformCode::posix(libc::EPERM)),
            Some(ThreadError::NotOwner)
        );
    }
}
