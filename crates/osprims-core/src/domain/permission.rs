//! Permission failures.

use thiserror::Error;

use super::{Domain, DomainId};

/// The caller lacks the rights for the requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum PermissionError {
    /// Access bits or ACL deny the request.
    #[error("permission denied")]
    Denied,

    /// The operation requires privileges the caller does not hold.
    #[error("operation not permitted")]
    NotPermitted,

    #[error("read-only file system")]
    ReadOnlyFilesystem,
}

impl Domain for PermissionError {
    const ID: DomainId = DomainId::Permission;

    #[cfg(unix)]
    fn classify_posix(errno: i32) -> Option<Self> {
        match errno {
            libc::EACCES => Some(PermissionError::Denied),
            libc::EPERM => Some(PermissionError::NotPermitted),
            libc::EROFS => Some(PermissionError::ReadOnlyFilesystem),
            _ => None,
        }
    }

    #[cfg(windows)]
    fn classify_windows(code: u32) -> Option<Self> {
        use windows_sys::Win32::Foundation::{
            ERROR_ACCESS_DENIED, ERROR_PRIVILEGE_NOT_HELD, ERROR_WRITE_PROTECT,
        };

        match code {
            ERROR_ACCESS_DENIED => Some(PermissionError::Denied),
            ERROR_PRIVILEGE_NOT_HELD => Some(PermissionError::NotPermitted),
            ERROR_WRITE_PROTECT => Some(PermissionError::ReadOnlyFilesystem),
            _ => None,
        }
    }
}
