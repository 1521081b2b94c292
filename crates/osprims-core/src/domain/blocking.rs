//! Blocking I/O failures.

use thiserror::Error;

use super::{Domain, DomainId};

/// The call could not complete synchronously, or the device failed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum BlockingError {
    /// Non-blocking call with nothing to do yet (`EAGAIN`).
    #[error("operation would block")]
    WouldBlock,

    /// A signal or cancellation arrived before completion.
    #[error("interrupted")]
    Interrupted,

    #[error("timed out")]
    TimedOut,

    /// Low-level I/O error reported by the device.
    #[error("input/output error")]
    Hardware,
}

impl Domain for BlockingError {
    const ID: DomainId = DomainId::Blocking;

    #[cfg(unix)]
    fn classify_posix(errno: i32) -> Option<Self> {
        match errno {
            libc::EAGAIN => Some(BlockingError::WouldBlock),
            #[allow(unreachable_patterns)]
            libc::EWOULDBLOCK => Some(BlockingError::WouldBlock),
            libc::EINTR => Some(BlockingError::Interrupted),
            libc::ETIMEDOUT => Some(BlockingError::TimedOut),
            libc::EIO => Some(BlockingError::Hardware),
            _ => None,
        }
    }

    #[cfg(windows)]
    fn classify_windows(code: u32) -> Option<Self> {
        use windows_sys::Win32::Foundation::{
            ERROR_CRC, ERROR_IO_DEVICE, ERROR_IO_PENDING, ERROR_OPERATION_ABORTED,
            ERROR_SEM_TIMEOUT, ERROR_TIMEOUT,
        };

        match code {
            ERROR_IO_PENDING => Some(BlockingError::WouldBlock),
            ERROR_OPERATION_ABORTED => Some(BlockingError::Interrupted),
            ERROR_TIMEOUT | ERROR_SEM_TIMEOUT => Some(BlockingError::TimedOut),
            ERROR_IO_DEVICE | ERROR_CRC => Some(BlockingError::Hardware),
            _ => None,
        }
    }
}
