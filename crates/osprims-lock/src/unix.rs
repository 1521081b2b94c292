use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};

use osprims_core::operation::FileLockError;
use osprims_core::PlatformCode;

use crate::{LockKind, LockPrimitive, LockRange};

/// Retries allowed for `EINTR` before it is reported.
const MAX_RETRIES: usize = 10;

/// Run a lock syscall, retrying on `EINTR`.
fn retry_eintr(mut call: impl FnMut() -> libc::c_int) -> Result<(), FileLockError> {
    let mut retries = 0;
    loop {
        if call() == 0 {
            return Ok(());
        }

        // Capture before anything else can clobber errno.
        let code = PlatformCode::current();
        if code.raw() == libc::EINTR && retries < MAX_RETRIES {
            retries += 1;
            continue;
        }
        return Err(FileLockError::resolve(code));
    }
}

fn record(kind: Option<LockKind>, range: LockRange) -> libc::flock {
    // SAFETY: flock is a plain C struct; all-zero is a valid value.
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = match kind {
        Some(LockKind::Shared) => libc::F_RDLCK as libc::c_short,
        Some(LockKind::Exclusive) => libc::F_WRLCK as libc::c_short,
        None => libc::F_UNLCK as libc::c_short,
    };
    fl.l_whence = libc::SEEK_SET as libc::c_short;
    // l_len == 0 extends to end of file, including future growth.
    if let LockRange::Bytes { start, len } = range {
        // LockRange::bytes keeps start + len within off_t.
        fl.l_start = start as libc::off_t;
        fl.l_len = len as libc::off_t;
    }
    fl
}

fn fcntl_lock(fd: RawFd, cmd: libc::c_int, fl: &libc::flock) -> Result<(), FileLockError> {
    // SAFETY: fd is borrowed from a live File and fl outlives the call.
    retry_eintr(|| unsafe { libc::fcntl(fd, cmd, fl as *const libc::flock) })
}

// ----------------------------------------------------------------------------
// Linux: open file description locks
// ----------------------------------------------------------------------------

#[cfg(any(target_os = "linux", target_os = "android"))]
mod imp {
    use super::*;

    // OFD locks are owned by the open file description, so two handles in one
    // process conflict exactly as two processes would. l_pid must be zero.

    pub fn try_lock(fd: RawFd, kind: LockKind, range: LockRange) -> Result<(), FileLockError> {
        fcntl_lock(fd, libc::F_OFD_SETLK, &record(Some(kind), range))
    }

    pub fn lock_blocking(fd: RawFd, kind: LockKind, range: LockRange) -> Result<(), FileLockError> {
        fcntl_lock(fd, libc::F_OFD_SETLKW, &record(Some(kind), range))
    }

    pub fn unlock(fd: RawFd, range: LockRange) -> Result<(), FileLockError> {
        fcntl_lock(fd, libc::F_OFD_SETLK, &record(None, range))
    }
}

// ----------------------------------------------------------------------------
// macOS / BSD: flock for whole files, process-scoped fcntl for ranges
// ----------------------------------------------------------------------------

#[cfg(not(any(target_os = "linux", target_os = "android")))]
mod imp {
    use super::*;

    fn flock_op(kind: LockKind) -> libc::c_int {
        match kind {
            LockKind::Shared => libc::LOCK_SH,
            LockKind::Exclusive => libc::LOCK_EX,
        }
    }

    fn flock(fd: RawFd, op: libc::c_int) -> Result<(), FileLockError> {
        // SAFETY: fd is borrowed from a live File.
        retry_eintr(|| unsafe { libc::flock(fd, op) })
    }

    pub fn try_lock(fd: RawFd, kind: LockKind, range: LockRange) -> Result<(), FileLockError> {
        match range {
            LockRange::Whole => flock(fd, flock_op(kind) | libc::LOCK_NB),
            LockRange::Bytes { .. } => fcntl_lock(fd, libc::F_SETLK, &record(Some(kind), range)),
        }
    }

    pub fn lock_blocking(fd: RawFd, kind: LockKind, range: LockRange) -> Result<(), FileLockError> {
        match range {
            LockRange::Whole => flock(fd, flock_op(kind)),
            LockRange::Bytes { .. } => fcntl_lock(fd, libc::F_SETLKW, &record(Some(kind), range)),
        }
    }

    pub fn unlock(fd: RawFd, range: LockRange) -> Result<(), FileLockError> {
        match range {
            LockRange::Whole => flock(fd, libc::LOCK_UN),
            LockRange::Bytes { .. } => fcntl_lock(fd, libc::F_SETLK, &record(None, range)),
        }
    }
}

impl LockPrimitive for File {
    fn try_lock(&self, kind: LockKind, range: LockRange) -> Result<(), FileLockError> {
        imp::try_lock(self.as_raw_fd(), kind, range)
    }

    fn lock_blocking(&self, kind: LockKind, range: LockRange) -> Result<(), FileLockError> {
        imp::lock_blocking(self.as_raw_fd(), kind, range)
    }

    fn unlock(&self, range: LockRange) -> Result<(), FileLockError> {
        imp::unlock(self.as_raw_fd(), range)
    }
}
