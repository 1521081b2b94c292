//! Aligned buffer for direct I/O.
//!
//! Direct transfers need a buffer whose address is aligned to the device's
//! requirement and whose length is a whole number of sectors. `Vec<u8>` only
//! guarantees byte alignment, so `AlignedBuffer` allocates with an explicit
//! [`Layout`].

use std::alloc::{self, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use osprims_core::{OsprimsError, OsprimsResult};

use crate::AlignmentRequirements;

/// A zero-initialized heap buffer satisfying an [`AlignmentRequirements`].
///
/// The length is rounded up to the requirement's length multiple; callers
/// that need the unpadded length track it themselves.
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: AlignedBuffer uniquely owns its allocation, like Vec<u8>.
unsafe impl Send for AlignedBuffer {}
// SAFETY: shared access only hands out &[u8].
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocate at least `len` zeroed bytes.
    ///
    /// Fails for `len == 0` and for sizes that overflow once padded.
    pub fn new(req: AlignmentRequirements, len: usize) -> OsprimsResult<Self> {
        if len == 0 {
            return Err(OsprimsError::invalid_argument(
                "aligned buffer length must be > 0",
            ));
        }
        let padded = req.round_up(len).ok_or_else(|| {
            OsprimsError::invalid_argument(format!("aligned buffer length {len} overflows"))
        })?;
        let layout = Layout::from_size_align(padded, req.buffer_alignment())
            .map_err(|err| OsprimsError::invalid_argument(err.to_string()))?;

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };

        Ok(Self { ptr, layout })
    }

    /// Copy `data` into a new buffer, zero-padding to the length multiple.
    pub fn from_data(req: AlignmentRequirements, data: &[u8]) -> OsprimsResult<Self> {
        let mut buf = Self::new(req, data.len())?;
        buf[..data.len()].copy_from_slice(data);
        Ok(buf)
    }

    /// Padded length in bytes.
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    /// Always `false`; empty buffers cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for layout.size() initialized bytes.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in new() with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl Deref for AlignedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for AlignedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl AsRef<[u8]> for AlignedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for AlignedBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len())
            .field("alignment", &self.alignment())
            .finish_non_exhaustive()
    }
}
