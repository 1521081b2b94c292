use std::fs::File;
use std::os::windows::io::AsRawHandle;

use osprims_core::operation::FileLockError;
use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::Storage::FileSystem::{
    LockFileEx, UnlockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
};
use windows_sys::Win32::System::IO::OVERLAPPED;

use crate::{LockKind, LockPrimitive, LockRange};

/// Offset and length halves for `LockFileEx`.
///
/// A whole-file lock covers every representable offset, so bytes appended
/// later are covered too.
fn region(range: LockRange) -> (OVERLAPPED, u32, u32) {
    let (start, len) = match range {
        LockRange::Whole => (0u64, u64::MAX),
        LockRange::Bytes { start, len } => (start, len),
    };

    // SAFETY: OVERLAPPED is a plain C struct; all-zero is a valid value.
    let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };
    overlapped.Anonymous.Anonymous.Offset = start as u32;
    overlapped.Anonymous.Anonymous.OffsetHigh = (start >> 32) as u32;

    (overlapped, len as u32, (len >> 32) as u32)
}

fn lock_file(file: &File, flags: u32, range: LockRange) -> Result<(), FileLockError> {
    let (mut overlapped, len_low, len_high) = region(range);
    let handle = file.as_raw_handle() as HANDLE;

    // SAFETY: handle is borrowed from a live File; overlapped outlives the
    // call, which completes synchronously on a non-overlapped handle.
    let ok = unsafe { LockFileEx(handle, flags, 0, len_low, len_high, &mut overlapped) };
    if ok != 0 {
        return Ok(());
    }
    Err(FileLockError::current())
}

fn kind_flags(kind: LockKind) -> u32 {
    match kind {
        LockKind::Shared => 0,
        LockKind::Exclusive => LOCKFILE_EXCLUSIVE_LOCK,
    }
}

impl LockPrimitive for File {
    fn try_lock(&self, kind: LockKind, range: LockRange) -> Result<(), FileLockError> {
        lock_file(self, kind_flags(kind) | LOCKFILE_FAIL_IMMEDIATELY, range)
    }

    fn lock_blocking(&self, kind: LockKind, range: LockRange) -> Result<(), FileLockError> {
        lock_file(self, kind_flags(kind), range)
    }

    fn unlock(&self, range: LockRange) -> Result<(), FileLockError> {
        let (mut overlapped, len_low, len_high) = region(range);
        let handle = self.as_raw_handle() as HANDLE;

        // SAFETY: as in lock_file.
        let ok = unsafe { UnlockFileEx(handle, 0, len_low, len_high, &mut overlapped) };
        if ok != 0 {
            return Ok(());
        }
        Err(FileLockError::current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_file_region_spans_all_offsets() {
        let (overlapped, low, high) = region(LockRange::Whole);
        // SAFETY: reading the offset arm written by region().
        let offset = unsafe { overlapped.Anonymous.Anonymous.Offset };
        assert_eq!(offset, 0);
        assert_eq!((low, high), (u32::MAX, u32::MAX));
    }

    #[test]
    fn byte_region_splits_high_and_low() {
        let range = LockRange::bytes(0x1_0000_0010, 0x2_0000_0000).unwrap();
        let (overlapped, low, high) = region(range);
        // SAFETY: reading the offset arm written by region().
        let (offset, offset_high) = unsafe {
            (
                overlapped.Anonymous.Anonymous.Offset,
                overlapped.Anonymous.Anonymous.OffsetHigh,
            )
        };
        assert_eq!((offset, offset_high), (0x10, 1));
        assert_eq!((low, high), (0, 2));
    }
}
