//! macOS implementation.
//!
//! macOS has no `O_DIRECT`; `F_NOCACHE` turns off the unified buffer cache
//! for one open file description. The filesystem block size from `fstatfs()`
//! stands in for the sector size.

use std::ffi::CStr;
use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use osprims_core::operation::{FsStatsError, OpenError};
use osprims_core::{DescriptorError, PlatformCode};

use crate::{AlignmentRequirements, Reason};

pub fn determine_impl(file: &File) -> Result<AlignmentRequirements, Reason> {
    probe_fd(file.as_raw_fd())
}

pub fn enable_impl(file: &File) -> Result<(), Reason> {
    set_nocache(file.as_raw_fd(), true)
}

pub fn disable_impl(file: &File) -> Result<(), Reason> {
    set_nocache(file.as_raw_fd(), false)
}

fn probe_fd(fd: RawFd) -> Result<AlignmentRequirements, Reason> {
    // SAFETY: statfs is a plain C struct; all-zero is a valid value.
    let mut st: libc::statfs = unsafe { std::mem::zeroed() };
    // SAFETY: st is a valid out-pointer for the duration of the call.
    if unsafe { libc::fstatfs(fd, &mut st) } != 0 {
        return Err(match FsStatsError::current() {
            FsStatsError::Descriptor(DescriptorError::Invalid) => Reason::InvalidHandle,
            other => {
                tracing::debug!(error = %other, "fstatfs failed during direct I/O probe");
                Reason::SectorSizeUndetermined
            }
        });
    }

    let req = AlignmentRequirements::from_sector_size(st.f_bsize as usize)
        .map_err(|_| Reason::SectorSizeUndetermined)?;

    // F_NOCACHE cannot be read back and is shared by dup'd descriptors, so
    // toggle it on a separate open of the same file. The caller's mode is
    // left as it was.
    match reopen(fd) {
        Some(probe) => set_nocache(probe.as_raw_fd(), true)?,
        None => tracing::debug!("file cannot be reopened; trusting fstatfs"),
    }
    Ok(req)
}

/// A new open file description for the file behind `fd`.
///
/// `None` when the file has no path (unlinked), cannot be opened for reading,
/// or the path now names a different file.
fn reopen(fd: RawFd) -> Option<OwnedFd> {
    let mut buf = [0 as libc::c_char; libc::PATH_MAX as usize];
    // SAFETY: F_GETPATH writes at most PATH_MAX bytes, NUL-terminated.
    if unsafe { libc::fcntl(fd, libc::F_GETPATH, buf.as_mut_ptr()) } == -1 {
        return None;
    }
    // SAFETY: F_GETPATH succeeded, so buf holds a NUL-terminated path.
    let path = unsafe { CStr::from_ptr(buf.as_ptr()) };

    // SAFETY: path is NUL-terminated.
    let raw = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC) };
    if raw == -1 {
        tracing::trace!(error = %OpenError::current(), "reopen for F_NOCACHE probe failed");
        return None;
    }
    // SAFETY: open returned a fresh descriptor that nothing else owns.
    let reopened = unsafe { OwnedFd::from_raw_fd(raw) };

    (file_id(fd)? == file_id(reopened.as_raw_fd())?).then_some(reopened)
}

fn file_id(fd: RawFd) -> Option<(libc::dev_t, libc::ino_t)> {
    // SAFETY: stat is a plain C struct; all-zero is a valid value.
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    // SAFETY: st is a valid out-pointer for the duration of the call.
    if unsafe { libc::fstat(fd, &mut st) } != 0 {
        return None;
    }
    Some((st.st_dev, st.st_ino))
}

fn set_nocache(fd: RawFd, on: bool) -> Result<(), Reason> {
    // SAFETY: F_NOCACHE takes an int argument.
    if unsafe { libc::fcntl(fd, libc::F_NOCACHE, libc::c_int::from(on)) } == -1 {
        let code = PlatformCode::current();
        if code.raw() == libc::EBADF {
            return Err(Reason::InvalidHandle);
        }
        tracing::debug!(%code, "filesystem rejected F_NOCACHE");
        return Err(Reason::FilesystemUnsupported);
    }
    Ok(())
}
