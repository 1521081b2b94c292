//! Path resolution failures.

use thiserror::Error;

use super::{Domain, DomainId};

/// Failures resolving or mutating a name in the filesystem namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum PathError {
    #[error("no such file or directory")]
    NotFound,

    #[error("file exists")]
    Exists,

    #[error("is a directory")]
    IsDirectory,

    #[error("not a directory")]
    NotDirectory,

    #[error("directory not empty")]
    NotEmpty,

    /// Too many symbolic links while resolving.
    #[error("too many levels of symbolic links")]
    Loop,

    /// Rename or link across filesystems.
    #[error("cross-device link")]
    CrossDevice,

    #[error("file name too long")]
    NameTooLong,
}

impl Domain for PathError {
    const ID: DomainId = DomainId::Path;

    #[cfg(unix)]
    fn classify_posix(errno: i32) -> Option<Self> {
        match errno {
            libc::ENOENT => Some(PathError::NotFound),
            libc::EEXIST => Some(PathError::Exists),
            libc::EISDIR => Some(PathError::IsDirectory),
            libc::ENOTDIR => Some(PathError::NotDirectory),
            libc::ENOTEMPTY => Some(PathError::NotEmpty),
            libc::ELOOP => Some(PathError::Loop),
            libc::EXDEV => Some(PathError::CrossDevice),
            libc::ENAMETOOLONG => Some(PathError::NameTooLong),
            _ => None,
        }
    }

    #[cfg(windows)]
    fn classify_windows(code: u32) -> Option<Self> {
        use windows_sys::Win32::Foundation::{
            ERROR_ALREADY_EXISTS, ERROR_CANT_RESOLVE_FILENAME, ERROR_DIRECTORY, ERROR_DIR_NOT_EMPTY,
            ERROR_FILENAME_EXCED_RANGE, ERROR_FILE_EXISTS, ERROR_FILE_NOT_FOUND,
            ERROR_INVALID_DRIVE, ERROR_NOT_SAME_DEVICE, ERROR_PATH_NOT_FOUND,
        };

        match code {
            ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND | ERROR_INVALID_DRIVE => {
                Some(PathError::NotFound)
            }
            ERROR_FILE_EXISTS | ERROR_ALREADY_EXISTS => Some(PathError::Exists),
            ERROR_DIRECTORY => Some(PathError::NotDirectory),
            ERROR_DIR_NOT_EMPTY => Some(PathError::NotEmpty),
            ERROR_CANT_RESOLVE_FILENAME => Some(PathError::Loop),
            ERROR_NOT_SAME_DEVICE => Some(PathError::CrossDevice),
            ERROR_FILENAME_EXCED_RANGE => Some(PathError::NameTooLong),
            _ => None,
        }
    }
}
