//! Linux implementation.
//!
//! - `fstat()` - handle validity, backing device number, block size
//! - `fcntl(F_SETFL, O_DIRECT)` - filesystem support, probed then restored
//! - `statx(STATX_DIOALIGN)` - exact alignment on Linux 6.1+
//! - `/sys/dev/block/MAJ:MIN/queue/logical_block_size` - sector size of the
//!   backing disk; for a partition the queue lives on the parent disk
//! - `st_blksize` - last resort for filesystems on anonymous devices (tmpfs,
//!   btrfs, overlay, NFS) that accept `O_DIRECT` but expose neither of the above

use std::fs::{self, File};
use std::os::fd::{AsRawFd, RawFd};
use std::path::PathBuf;

use osprims_core::operation::StatError;
use osprims_core::{DescriptorError, PlatformCode};

use crate::{AlignmentRequirements, Reason};

pub fn determine_impl(file: &File) -> Result<AlignmentRequirements, Reason> {
    probe_fd(file.as_raw_fd())
}

pub fn enable_impl(file: &File) -> Result<(), Reason> {
    set_direct(file.as_raw_fd(), true)
}

pub fn disable_impl(file: &File) -> Result<(), Reason> {
    set_direct(file.as_raw_fd(), false)
}

fn probe_fd(fd: RawFd) -> Result<AlignmentRequirements, Reason> {
    let st = fstat_fd(fd)?;
    probe_o_direct(fd)?;

    if let Some(dio) = dio_alignment(fd) {
        return dio;
    }

    sector_size(backing_device(&st))
        .or_else(|| usize::try_from(st.st_blksize).ok())
        .and_then(|size| AlignmentRequirements::from_sector_size(size).ok())
        .ok_or(Reason::SectorSizeUndetermined)
}

fn fstat_fd(fd: RawFd) -> Result<libc::stat, Reason> {
    // SAFETY: stat is a plain C struct; all-zero is a valid value.
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    // SAFETY: st is a valid out-pointer for the duration of the call.
    if unsafe { libc::fstat(fd, &mut st) } != 0 {
        return Err(stat_failure(StatError::current()));
    }
    Ok(st)
}

fn stat_failure(err: StatError) -> Reason {
    match err {
        StatError::Descriptor(DescriptorError::Invalid) => Reason::InvalidHandle,
        other => {
            tracing::debug!(error = %other, "fstat failed during direct I/O probe");
            Reason::SectorSizeUndetermined
        }
    }
}

/// Alignment reported by the filesystem itself.
///
/// `None` when the kernel or libc predates `STATX_DIOALIGN` or the filesystem
/// does not fill it in.
#[cfg(any(target_env = "gnu", target_env = "musl"))]
fn dio_alignment(fd: RawFd) -> Option<Result<AlignmentRequirements, Reason>> {
    // SAFETY: statx is a plain C struct; all-zero is a valid value.
    let mut stx: libc::statx = unsafe { std::mem::zeroed() };
    // SAFETY: the empty path is NUL-terminated and stx is a valid out-pointer.
    let rc = unsafe {
        libc::statx(
            fd,
            c"".as_ptr(),
            libc::AT_EMPTY_PATH,
            libc::STATX_DIOALIGN,
            &mut stx,
        )
    };
    if rc != 0 {
        tracing::trace!(code = %PlatformCode::current(), "statx unavailable");
        return None;
    }
    if stx.stx_mask & libc::STATX_DIOALIGN == 0 {
        return None;
    }

    // Zero alignments mean the file cannot do direct I/O at all.
    if stx.stx_dio_mem_align == 0 || stx.stx_dio_offset_align == 0 {
        return Some(Err(Reason::FilesystemUnsupported));
    }
    let req = AlignmentRequirements::new(
        stx.stx_dio_mem_align as usize,
        stx.stx_dio_offset_align as usize,
    )
    .map_err(|_| Reason::SectorSizeUndetermined);
    Some(req)
}

#[cfg(not(any(target_env = "gnu", target_env = "musl")))]
fn dio_alignment(_fd: RawFd) -> Option<Result<AlignmentRequirements, Reason>> {
    None
}

/// Device number of the block device holding the file's data.
fn backing_device(st: &libc::stat) -> libc::dev_t {
    // A block device node describes its own device.
    if st.st_mode & libc::S_IFMT == libc::S_IFBLK {
        st.st_rdev
    } else {
        st.st_dev
    }
}

fn sector_size(dev: libc::dev_t) -> Option<usize> {
    let (major, minor) = (libc::major(dev), libc::minor(dev));
    // Anonymous devices have no queue.
    if major == 0 {
        return None;
    }
    let base = PathBuf::from(format!("/sys/dev/block/{major}:{minor}"));

    [
        base.join("queue/logical_block_size"),
        base.join("../queue/logical_block_size"),
    ]
    .iter()
    .find_map(|path| {
        let raw = fs::read_to_string(path).ok()?;
        raw.trim().parse::<usize>().ok()
    })
}

fn get_flags(fd: RawFd) -> Result<libc::c_int, Reason> {
    // SAFETY: F_GETFL takes no argument.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(fcntl_failure(PlatformCode::current()));
    }
    Ok(flags)
}

fn set_flags(fd: RawFd, flags: libc::c_int) -> Result<(), Reason> {
    // SAFETY: F_SETFL takes an int argument.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } == -1 {
        return Err(fcntl_failure(PlatformCode::current()));
    }
    Ok(())
}

fn fcntl_failure(code: PlatformCode) -> Reason {
    if code.raw() == libc::EBADF {
        Reason::InvalidHandle
    } else {
        tracing::debug!(%code, "filesystem rejected O_DIRECT");
        Reason::FilesystemUnsupported
    }
}

/// Set `O_DIRECT` and put the original flags back.
fn probe_o_direct(fd: RawFd) -> Result<(), Reason> {
    let original = get_flags(fd)?;
    if original & libc::O_DIRECT != 0 {
        return Ok(());
    }
    set_flags(fd, original | libc::O_DIRECT)?;
    set_flags(fd, original)
}

fn set_direct(fd: RawFd, on: bool) -> Result<(), Reason> {
    let flags = get_flags(fd)?;
    let wanted = if on {
        flags | libc::O_DIRECT
    } else {
        flags & !libc::O_DIRECT
    };
    if wanted == flags {
        return Ok(());
    }
    set_flags(fd, wanted)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn closed_descriptor_is_invalid_handle() {
        assert_eq!(probe_fd(-1), Err(Reason::InvalidHandle));
    }

    #[test]
    fn anonymous_device_has_no_sector_size() {
        assert_eq!(sector_size(libc::makedev(0, 42)), None);
    }

    #[test]
    fn o_direct_probe_restores_flags() {
        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();
        let before = get_flags(fd).unwrap();

        let _ = probe_o_direct(fd);

        assert_eq!(get_flags(fd).unwrap(), before);
    }

    /// tmpfs lives on an anonymous device with no sysfs queue. When it accepts
    /// `O_DIRECT` the probe still has to produce requirements.
    #[test]
    fn shm_file_accepting_o_direct_gets_requirements() {
        let shm = Path::new("/dev/shm");
        if !shm.is_dir() {
            return;
        }
        let file = match tempfile::tempfile_in(shm) {
            Ok(file) => file,
            Err(_) => return,
        };
        let fd = file.as_raw_fd();

        let accepts_direct = probe_o_direct(fd).is_ok();
        let result = probe_fd(fd);

        match result {
            Ok(req) => {
                assert!(accepts_direct);
                assert!(req.buffer_alignment().is_power_of_two());
                assert!(req.length_multiple().is_power_of_two());
            }
            Err(reason) => assert_eq!(reason, Reason::FilesystemUnsupported),
        }
    }
}
