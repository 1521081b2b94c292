//! Descriptor and handle validity failures.

use std::fmt;

use thiserror::Error;

use super::{Domain, DomainId};

/// Which descriptor table ran out of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitScope {
    /// The per-process table (`EMFILE`).
    Process,
    /// The system-wide table (`ENFILE`).
    System,
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitScope::Process => f.write_str("process"),
            LimitScope::System => f.write_str("system"),
        }
    }
}

/// The descriptor or handle argument is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DescriptorError {
    /// Closed, never opened, or opened without the needed access mode.
    #[error("bad file descriptor")]
    Invalid,

    #[error("too many open files ({0} limit)")]
    Limit(LimitScope),
}

impl Domain for DescriptorError {
    const ID: DomainId = DomainId::Descriptor;

    #[cfg(unix)]
    fn classify_posix(errno: i32) -> Option<Self> {
        match errno {
            libc::EBADF => Some(DescriptorError::Invalid),
            libc::EMFILE => Some(DescriptorError::Limit(LimitScope::Process)),
            libc::ENFILE => Some(DescriptorError::Limit(LimitScope::System)),
            _ => None,
        }
    }

    #[cfg(windows)]
    fn classify_windows(code: u32) -> Option<Self> {
        use windows_sys::Win32::Foundation::{ERROR_INVALID_HANDLE, ERROR_TOO_MANY_OPEN_FILES};

        match code {
            ERROR_INVALID_HANDLE => Some(DescriptorError::Invalid),
            ERROR_TOO_MANY_OPEN_FILES => Some(DescriptorError::Limit(LimitScope::Process)),
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
    fn distinguishes_process_and_system_limits() {
        assert_eq!(
            DescriptorError::classify(PlatformCode::posix(libc::EMFILE)),
            Some(DescriptorError::Limit(LimitScope::Process))
        );
        assert_eq!(
            DescriptorError::classify(PlatformCode::posix(libc::ENFILE)),
            Some(DescriptorError::Limit(LimitScope::System))
        );
    }

    #[test]
    fn limit_description_names_scope() {
        assert_eq!(
            DescriptorError::Limit(LimitScope::System).to_string(),
            "too many open files (system limit)"
        );
    }
}
