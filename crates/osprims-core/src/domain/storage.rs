//! Storage capacity failures.

use thiserror::Error;

use super::{Domain, DomainId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum StorageError {
    /// The device has no free blocks or inodes.
    #[error("no space left on device")]
    Exhausted,

    /// The caller's quota is used up; other users may still write.
    #[error("disk quota exceeded")]
    Quota,
}

impl Domain for StorageError {
    const ID: DomainId = DomainId::Storage;

    #[cfg(unix)]
    fn classify_posix(errno: i32) -> Option<Self> {
        match errno {
            libc::ENOSPC => Some(StorageError::Exhausted),
            libc::EDQUOT => Some(StorageError::Quota),
            _ => None,
        }
    }

    #[cfg(windows)]
    fn classify_windows(code: u32) -> Option<Self> {
        use windows_sys::Win32::Foundation::{
            ERROR_DISK_FULL, ERROR_DISK_QUOTA_EXCEEDED, ERROR_HANDLE_DISK_FULL,
        };

        match code {
            ERROR_DISK_FULL | ERROR_HANDLE_DISK_FULL => Some(StorageError::Exhausted),
            ERROR_DISK_QUOTA_EXCEEDED => Some(StorageError::Quota),
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
    fn quota_is_distinct_from_exhaustion() {
        assert_eq!(
            StorageError::classify(PlatformCode::posix(libc::ENOSPC)),
            Some(StorageError::Exhausted)
        );
        assert_eq!(
            StorageError::classify(PlatformCode::posix(libc::EDQUOT)),
            Some(StorageError::Quota)
        );
    }
}
