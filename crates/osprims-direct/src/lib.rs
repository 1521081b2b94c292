//! osprims-direct: Direct I/O requirements model.
//!
//! This crate answers one question per open file: can it be read and written
//! without the OS page cache, and if so, under which alignment constraints?
//!
//! - [`determine`] probes a handle and returns [`AlignmentRequirements`], or
//!   the [`Reason`] the probe could not succeed
//! - [`AlignmentRequirements`] exposes bitmask validators for buffer
//!   addresses, lengths, and file offsets
//! - [`Policy`] turns a failed probe into either buffered I/O or a hard error
//! - [`AlignedBuffer`] allocates memory that satisfies a set of requirements
//!
//! # Platform Support
//!
//! | Platform | Sector size | Uncached mode |
//! |----------|-------------|---------------|
//! | Linux | `/sys/dev/block/<dev>/queue/logical_block_size` | `O_DIRECT` |
//! | macOS | `fstatfs` block size | `F_NOCACHE` |
//! | Windows | `FileStorageInfo` | `FILE_FLAG_NO_BUFFERING` (open time) |
//! | Others | - | [`Reason::PlatformUnsupported`] |
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use osprims_direct::{determine, IoMode, Policy};
//!
//! let file = File::open("data.db")?;
//! match Policy::FallbackToBuffered.decide(determine(&file))? {
//!     IoMode::Direct(req) => println!("direct, {} byte sectors", req.length_multiple()),
//!     IoMode::Buffered { reason } => println!("buffered: {reason}"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::File;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use osprims_core::operation::OpenError;
use osprims_core::{OsprimsError, OsprimsResult, PlatformCode};

mod buffer;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
mod unsupported;
#[cfg(windows)]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform;
#[cfg(target_os = "macos")]
use macos as platform;
#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
use unsupported as platform;
#[cfg(windows)]
use windows as platform;

pub use buffer::AlignedBuffer;

#[cfg(windows)]
pub use windows::open_options;

// ============================================================================
// Requirements
// ============================================================================

/// Alignment constraints for direct I/O on one handle.
///
/// Both values are powers of two, so every validator is a bitmask test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AlignmentRequirements {
    buffer_alignment: usize,
    length_multiple: usize,
}

impl AlignmentRequirements {
    /// Requirements with explicit values. Both must be non-zero powers of two.
    pub fn new(buffer_alignment: usize, length_multiple: usize) -> OsprimsResult<Self> {
        if !buffer_alignment.is_power_of_two() {
            return Err(OsprimsError::invalid_argument(format!(
                "buffer alignment must be a power of two, got {buffer_alignment}"
            )));
        }
        if !length_multiple.is_power_of_two() {
            return Err(OsprimsError::invalid_argument(format!(
                "length multiple must be a power of two, got {length_multiple}"
            )));
        }
        Ok(Self {
            buffer_alignment,
            length_multiple,
        })
    }

    /// Requirements where both constraints equal the sector size.
    pub fn from_sector_size(sector_size: usize) -> OsprimsResult<Self> {
        Self::new(sector_size, sector_size)
    }

    pub fn buffer_alignment(&self) -> usize {
        self.buffer_alignment
    }

    pub fn length_multiple(&self) -> usize {
        self.length_multiple
    }

    #[inline]
    pub fn buffer_is_aligned(&self, address: usize) -> bool {
        address & (self.buffer_alignment - 1) == 0
    }

    /// Whether `len` is a whole number of sectors. Zero is valid.
    #[inline]
    pub fn length_is_valid(&self, len: usize) -> bool {
        len & (self.length_multiple - 1) == 0
    }

    /// Whether a file offset starts on a sector boundary.
    #[inline]
    pub fn offset_is_valid(&self, offset: u64) -> bool {
        offset & (self.length_multiple as u64 - 1) == 0
    }

    /// Validate a buffer and file offset for one direct transfer.
    ///
    /// Checks address, then length, then offset, reporting the first failure.
    pub fn check(&self, buf: &[u8], offset: u64) -> Result<(), Violation> {
        let address = buf.as_ptr() as usize;
        if !self.buffer_is_aligned(address) {
            return Err(Violation::BufferMisaligned {
                address,
                alignment: self.buffer_alignment,
            });
        }
        if !self.length_is_valid(buf.len()) {
            return Err(Violation::LengthInvalid {
                len: buf.len(),
                multiple: self.length_multiple,
            });
        }
        if !self.offset_is_valid(offset) {
            return Err(Violation::OffsetInvalid {
                offset,
                multiple: self.length_multiple,
            });
        }
        Ok(())
    }

    /// Round `len` up to the next valid length.
    pub fn round_up(&self, len: usize) -> Option<usize> {
        let mask = self.length_multiple - 1;
        len.checked_add(mask).map(|n| n & !mask)
    }
}

/// Why direct I/O requirements could not be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    #[error("direct I/O is not supported on this platform")]
    PlatformUnsupported,

    #[error("sector size of the backing store could not be determined")]
    SectorSizeUndetermined,

    #[error("filesystem does not support unbuffered I/O")]
    FilesystemUnsupported,

    #[error("file handle is closed or invalid")]
    InvalidHandle,
}

/// A transfer that would violate the requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("buffer address {address:#x} is not aligned to {alignment} bytes")]
    BufferMisaligned { address: usize, alignment: usize },

    #[error("length {len} is not a multiple of {multiple}")]
    LengthInvalid { len: usize, multiple: usize },

    #[error("offset {offset} is not a multiple of {multiple}")]
    OffsetInvalid { offset: u64, multiple: usize },
}

// ============================================================================
// Policy
// ============================================================================

/// What to do when direct I/O is unavailable for a handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Use buffered I/O and record why.
    #[default]
    FallbackToBuffered,
    /// Propagate the [`Reason`].
    ErrorOnViolation,
}

/// The I/O mode a handle should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum IoMode {
    Direct(AlignmentRequirements),
    Buffered { reason: Reason },
}

impl IoMode {
    pub fn is_direct(&self) -> bool {
        matches!(self, IoMode::Direct(_))
    }

    pub fn requirements(&self) -> Option<&AlignmentRequirements> {
        match self {
            IoMode::Direct(req) => Some(req),
            IoMode::Buffered { .. } => None,
        }
    }
}

impl Policy {
    /// Apply the policy to a probe result.
    pub fn decide(self, probe: Result<AlignmentRequirements, Reason>) -> Result<IoMode, Reason> {
        match (probe, self) {
            (Ok(req), _) => Ok(IoMode::Direct(req)),
            (Err(reason), Policy::FallbackToBuffered) => {
                tracing::debug!(%reason, "direct I/O unavailable, falling back to buffered");
                Ok(IoMode::Buffered { reason })
            }
            (Err(reason), Policy::ErrorOnViolation) => Err(reason),
        }
    }
}

// ============================================================================
// Probing
// ============================================================================

/// Probe an open file for direct I/O requirements.
///
/// Probes platform capability, sector size, and filesystem support for the
/// unbuffered flag, in that order. Any uncached-mode flag toggled during the
/// probe is restored before returning.
pub fn determine(file: &File) -> Result<AlignmentRequirements, Reason> {
    let result = platform::determine_impl(file);
    match &result {
        Ok(req) => tracing::debug!(
            buffer_alignment = req.buffer_alignment,
            length_multiple = req.length_multiple,
            "direct I/O requirements determined"
        ),
        Err(reason) => tracing::debug!(%reason, "direct I/O probe failed"),
    }
    result
}

/// Failure of [`determine_path`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("open failed: {0}")]
    Open(#[from] OpenError),

    /// The path cannot be passed to the OS (e.g. it contains a NUL byte).
    #[error("path is not representable on this platform")]
    InvalidPath,

    #[error(transparent)]
    Unavailable(#[from] Reason),
}

/// Open `path` read-only and probe it.
pub fn determine_path(path: impl AsRef<Path>) -> Result<AlignmentRequirements, ProbeError> {
    let file = File::open(path.as_ref()).map_err(|err| match PlatformCode::from_io(&err) {
        Some(code) => ProbeError::Open(OpenError::resolve(code)),
        None => ProbeError::InvalidPath,
    })?;
    Ok(determine(&file)?)
}

/// Probe `file` and, when possible, switch it to uncached mode.
///
/// On Linux and macOS the mode is changed on the open handle. Windows only
/// supports choosing unbuffered mode at open time (see `open_options`), so
/// there the result reports the requirements without changing the handle.
pub fn enable(file: &File, policy: Policy) -> Result<IoMode, Reason> {
    let probe = determine(file).and_then(|req| {
        platform::enable_impl(file)?;
        Ok(req)
    });
    policy.decide(probe)
}

/// Switch `file` back to cached I/O. A no-op where the mode is fixed at open.
pub fn disable(file: &File) -> Result<(), Reason> {
    platform::disable_impl(file)
}
