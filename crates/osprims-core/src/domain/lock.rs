//! File lock failures.

use thiserror::Error;

use super::{Domain, DomainId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LockError {
    /// A conflicting lock is held by another owner.
    #[error("lock held by another owner")]
    Contention,

    /// Granting the request would deadlock.
    #[error("resource deadlock would occur")]
    Deadlock,

    /// The system lock table is full. Retrying cannot help.
    #[error("no locks available")]
    Exhausted,

    /// Unlock of a range that was not locked.
    #[error("range not locked")]
    NotLocked,
}

impl Domain for LockError {
    const ID: DomainId = DomainId::Lock;

    #[cfg(unix)]
    fn classify_posix(errno: i32) -> Option<Self> {
        match errno {
            // fcntl(F_SETLK) may report contention as either.
            libc::EAGAIN | libc::EACCES => Some(LockError::Contention),
            #[allow(unreachable_patterns)]
            libc::EWOULDBLOCK => Some(LockError::Contention),
            libc::EDEADLK => Some(LockError::Deadlock),
            libc::ENOLCK => Some(LockError::Exhausted),
            _ => None,
        }
    }

    #[cfg(windows)]
    fn classify_windows(code: u32) -> Option<Self> {
        use windows_sys::Win32::Foundation::{
            ERROR_LOCK_VIOLATION, ERROR_NOT_LOCKED, ERROR_POSSIBLE_DEADLOCK,
            ERROR_SHARING_BUFFER_EXCEEDED,
        };

        match code {
            ERROR_LOCK_VIOLATION => Some(LockError::Contention),
            ERROR_POSSIBLE_DEADLOCK => Some(LockError::Deadlock),
            ERROR_SHARING_BUFFER_EXCEEDED => Some(LockError::Exhausted),
            ERROR_NOT_LOCKED => Some(LockError::NotLocked),
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
    fn eacces_reads_as_contention() {
        assert_eq!(
            LockError::classify(PlatformCode::posix(libc::EACCES)),
            Some(LockError::Contention)
        );
        assert_eq!(
            LockError::classify(PlatformCode::posix(libc::EAGAIN)),
            Some(LockError::Contention)
        );
    }

    #[test]
    #[cfg(unix)]
    fn exhaustion_and_deadlock_are_distinct() {
        assert_eq!(
            LockError::classify(PlatformCode::posix(libc::ENOLCK)),
            Some(LockError::Exhausted)
        );
        assert_eq!(
            LockError::classify(PlatformCode::posix(libc::EDEADLK)),
            Some(LockError::Deadlock)
        );
    }

    #[test]
    #[cfg(windows)]
    fn lock_violation_reads_as_contention() {
        use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;

        assert_eq!(
            LockError::classify(PlatformCode::windows(ERROR_LOCK_VIOLATION)),
            Some(LockError::Contention)
        );
    }
}
