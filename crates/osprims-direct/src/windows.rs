//! Windows implementation.
//!
//! Unbuffered I/O is chosen when the handle is opened
//! (`FILE_FLAG_NO_BUFFERING`); it cannot be toggled later. Buffers must be
//! aligned to the physical sector size and transfers sized in logical
//! sectors.

use std::fs::{File, OpenOptions};
use std::mem;
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::io::AsRawHandle;

use osprims_core::operation::StatError;
use osprims_core::DescriptorError;
use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::Storage::FileSystem::{
    FileStorageInfo, GetFileInformationByHandleEx, FILE_FLAG_NO_BUFFERING, FILE_STORAGE_INFO,
};

use crate::{AlignmentRequirements, Reason};

/// Add `FILE_FLAG_NO_BUFFERING` to `options`.
///
/// ```no_run
/// use std::fs::OpenOptions;
///
/// let mut options = OpenOptions::new();
/// options.read(true).write(true);
/// let file = osprims_direct::open_options(&mut options).open("data.db")?;
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn open_options(options: &mut OpenOptions) -> &mut OpenOptions {
    options.custom_flags(FILE_FLAG_NO_BUFFERING)
}

pub fn determine_impl(file: &File) -> Result<AlignmentRequirements, Reason> {
    probe_handle(file.as_raw_handle() as HANDLE)
}

pub fn enable_impl(_file: &File) -> Result<(), Reason> {
    Ok(())
}

pub fn disable_impl(_file: &File) -> Result<(), Reason> {
    Ok(())
}

fn probe_handle(handle: HANDLE) -> Result<AlignmentRequirements, Reason> {
    // SAFETY: FILE_STORAGE_INFO is a plain C struct; all-zero is a valid value.
    let mut info: FILE_STORAGE_INFO = unsafe { mem::zeroed() };

    // SAFETY: info is a valid out-buffer of the size passed.
    let ok = unsafe {
        GetFileInformationByHandleEx(
            handle,
            FileStorageInfo,
            &mut info as *mut FILE_STORAGE_INFO as *mut _,
            mem::size_of::<FILE_STORAGE_INFO>() as u32,
        )
    };
    if ok == 0 {
        return Err(match StatError::current() {
            StatError::Descriptor(DescriptorError::Invalid) => Reason::InvalidHandle,
            other => {
                tracing::debug!(error = %other, "FileStorageInfo query failed");
                Reason::SectorSizeUndetermined
            }
        });
    }

    let logical = info.LogicalBytesPerSector as usize;
    let physical = (info.PhysicalBytesPerSectorForAtomicity as usize).max(logical);
    AlignmentRequirements::new(physical, logical).map_err(|_| Reason::SectorSizeUndetermined)
}
