//! Raw platform failure codes and their capture.
//!
//! A [`PlatformCode`] is the errno value (POSIX) or last-error value (Windows)
//! reported by a failing call. It must be captured immediately after the
//! failure is detected: any intervening libc or OS call on the same thread may
//! overwrite it.
//!
//! Capture is a compile-time capability. [`Errno`] and [`LastError`] both
//! implement [`Capture`]; [`NativeCapture`] names the one for the build target.

use std::fmt;
use std::io;

/// Platform family a [`PlatformCode`] was reported by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// `errno` values (Linux, macOS, BSD).
    Posix,
    /// `GetLastError` values.
    Windows,
}

impl Platform {
    /// The platform family of the build target.
    #[inline]
    pub const fn native() -> Self {
        #[cfg(windows)]
        {
            Platform::Windows
        }
        #[cfg(not(windows))]
        {
            Platform::Posix
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Platform::Posix => "posix",
            Platform::Windows => "windows",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque, platform-tagged failure code.
///
/// Codes from a platform other than the build target are carried faithfully
/// but never claimed by an error domain, since POSIX errno numbering is only
/// meaningful against the host's libc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformCode {
    raw: i32,
    platform: Platform,
}

impl PlatformCode {
    /// A POSIX `errno` value.
    #[inline]
    pub const fn posix(errno: i32) -> Self {
        Self {
            raw: errno,
            platform: Platform::Posix,
        }
    }

    /// A Windows last-error value.
    #[inline]
    pub const fn windows(code: u32) -> Self {
        Self {
            raw: code as i32,
            platform: Platform::Windows,
        }
    }

    /// A code reported by the build target's own platform.
    #[inline]
    pub const fn native(raw: i32) -> Self {
        Self {
            raw,
            platform: Platform::native(),
        }
    }

    /// Capture the calling thread's current failure code.
    ///
    /// Call this only after a syscall has reported failure, and before any
    /// other call that could touch errno / last-error.
    #[inline]
    pub fn current() -> Self {
        NativeCapture::capture()
    }

    /// Extract the OS code carried by an [`io::Error`], if it has one.
    ///
    /// Errors constructed by std itself (`io::Error::other`, custom kinds)
    /// carry no OS code and yield `None`.
    pub fn from_io(err: &io::Error) -> Option<Self> {
        err.raw_os_error().map(Self::native)
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.raw
    }

    #[inline]
    pub const fn platform(self) -> Platform {
        self.platform
    }

    /// Whether this code was reported by the build target's platform.
    #[inline]
    pub fn is_native(self) -> bool {
        self.platform == Platform::native()
    }

    /// Human-readable description from the OS message table.
    ///
    /// Foreign-platform codes have no local message table, so the description
    /// falls back to the tagged raw value.
    pub fn description(self) -> String {
        if self.is_native() {
            io::Error::from_raw_os_error(self.raw).to_string()
        } else {
            format!("{} code {}", self.platform, self.raw)
        }
    }
}

impl fmt::Display for PlatformCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.platform {
            Platform::Posix => write!(f, "errno {}", self.raw),
            Platform::Windows => write!(f, "win32 error {}", self.raw as u32),
        }
    }
}

// ============================================================================
// Capture
// ============================================================================

/// Reads the thread-local failure signal of one platform family.
pub trait Capture {
    /// Read the failure code left by the most recent failing call.
    fn capture() -> PlatformCode;
}

/// POSIX `errno` capture.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct Errno;

#[cfg(unix)]
impl Capture for Errno {
    #[inline]
    fn capture() -> PlatformCode {
        // last_os_error() reads errno without making another call first.
        PlatformCode::posix(io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }
}

/// Windows `GetLastError` capture.
#[cfg(windows)]
#[derive(Debug, Clone, Copy)]
pub struct LastError;

#[cfg(windows)]
impl Capture for LastError {
    #[inline]
    fn capture() -> PlatformCode {
        // SAFETY: GetLastError only reads thread-local state.
        let code = unsafe { windows_sys::Win32::Foundation::GetLastError() };
        PlatformCode::windows(code)
    }
}

/// The capture implementation for the build target.
#[cfg(unix)]
pub type NativeCapture = Errno;

/// The capture implementation for the build target.
#[cfg(windows)]
pub type NativeCapture = LastError;
