//! osprims-lock: Advisory file lock acquisition.
//!
//! This crate provides:
//! - Shared/exclusive advisory locks over whole files or byte ranges
//! - Three acquisition strategies ([`AcquireStrategy`]): try once, wait, or
//!   retry with capped exponential backoff until a deadline
//! - A [`FileLock`] guard that releases on drop
//!
//! Errors from the platform lock call are classified through
//! [`osprims_core::operation::FileLockError`], which reads `EACCES`/`EAGAIN`
//! as contention before anything else.
//!
//! # Compatibility
//!
//! Whether a request can be granted is decided by the platform, not here:
//!
//! | Held \ Requested | Shared | Exclusive |
//! |------------------|--------|-----------|
//! | none             | grant  | grant     |
//! | shared           | grant  | conflict  |
//! | exclusive        | conflict | conflict |
//!
//! # Platform Support
//!
//! | Platform | Primitive | Owner |
//! |----------|-----------|-------|
//! | Linux | `fcntl(F_OFD_SETLK[W])` | open file description |
//! | macOS/BSD, whole file | `flock(2)` | open file description |
//! | macOS/BSD, byte range | `fcntl(F_SETLK[W])` | process |
//! | Windows | `LockFileEx` | handle |
//!
//! POSIX record locks need the descriptor opened for reading (shared) or
//! writing (exclusive); otherwise the call fails with a descriptor error.
//!
//! # Example
//!
//! ```no_run
//! use std::fs::OpenOptions;
//! use std::time::Duration;
//! use osprims_lock::{acquire, AcquireError, AcquireStrategy, LockKind, LockRange};
//!
//! let file = OpenOptions::new().read(true).write(true).open("data.db")?;
//! match acquire(
//!     &file,
//!     LockKind::Exclusive,
//!     LockRange::Whole,
//!     AcquireStrategy::timeout(Duration::from_secs(2)),
//! ) {
//!     Ok(lock) => {
//!         // ... exclusive access ...
//!         lock.unlock()?;
//!     }
//!     Err(AcquireError::TimedOut { .. }) => eprintln!("still locked"),
//!     Err(err) => return Err(err.into()),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::fs::File;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use osprims_core::operation::FileLockError;
use osprims_core::{OsprimsError, OsprimsResult};

mod engine;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

pub use engine::{acquire_on, LockGuard, LockPrimitive};

/// Guard for a lock held on a [`File`].
pub type FileLock<'f> = LockGuard<'f, File>;

// ============================================================================
// Request Types
// ============================================================================

/// Reader/writer lock kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// Any number of shared holders may coexist.
    Shared,
    /// At most one holder, and no shared holders.
    Exclusive,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKind::Shared => f.write_str("shared"),
            LockKind::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// Region of the file a lock covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockRange {
    /// The whole file, including bytes appended later.
    Whole,
    /// `len` bytes starting at `start`. Build with [`LockRange::bytes`].
    Bytes { start: u64, len: u64 },
}

impl LockRange {
    /// Largest end offset accepted; POSIX `off_t` is signed 64-bit.
    pub const MAX_END: u64 = i64::MAX as u64;

    /// A byte range, rejecting empty ranges and ranges past [`Self::MAX_END`].
    pub fn bytes(start: u64, len: u64) -> OsprimsResult<Self> {
        if len == 0 {
            return Err(OsprimsError::invalid_argument(
                "lock range length must be > 0",
            ));
        }
        match start.checked_add(len) {
            Some(end) if end <= Self::MAX_END => Ok(LockRange::Bytes { start, len }),
            _ => Err(OsprimsError::invalid_argument(format!(
                "lock range {start}+{len} exceeds maximum offset {}",
                Self::MAX_END
            ))),
        }
    }

    /// Whether two ranges share at least one byte.
    pub fn overlaps(&self, other: &LockRange) -> bool {
        match (*self, *other) {
            (LockRange::Whole, _) | (_, LockRange::Whole) => true,
            (LockRange::Bytes { start: a, len: al }, LockRange::Bytes { start: b, len: bl }) => {
                a < b.saturating_add(bl) && b < a.saturating_add(al)
            }
        }
    }
}

/// How hard to try for the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStrategy {
    /// Exactly one non-blocking attempt. Never sleeps.
    Try,
    /// Block in the platform primitive until granted or deadlock is detected.
    Wait,
    /// Non-blocking attempts with backoff until the instant passes.
    Deadline(Instant),
}

impl AcquireStrategy {
    /// Deadline `timeout` from now. Falls back to [`AcquireStrategy::Wait`]
    /// if the instant is unrepresentable.
    pub fn timeout(timeout: Duration) -> Self {
        Instant::now()
            .checked_add(timeout)
            .map_or(AcquireStrategy::Wait, AcquireStrategy::Deadline)
    }
}

/// Backoff schedule for [`AcquireStrategy::Deadline`].
///
/// The delay starts at `initial`, doubles after each contended attempt, and
/// never exceeds `max`. After `max_attempts` busy attempts the engine sleeps
/// until the deadline and makes one final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    max_attempts: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, max_attempts: u32) -> OsprimsResult<Self> {
        if initial.is_zero() {
            return Err(OsprimsError::invalid_argument(
                "backoff initial delay must be > 0",
            ));
        }
        if max < initial {
            return Err(OsprimsError::invalid_argument(
                "backoff max delay must be >= initial delay",
            ));
        }
        if max_attempts == 0 {
            return Err(OsprimsError::invalid_argument(
                "backoff max_attempts must be > 0",
            ));
        }
        Ok(Self {
            initial,
            max,
            max_attempts,
        })
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to use after the current one.
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(50),
            max_attempts: 64,
        }
    }
}

/// Full lock request.
#[derive(Debug, Clone, Copy)]
pub struct LockRequest {
    /// Default: `Exclusive`
    pub kind: LockKind,

    /// Default: `Whole`
    pub range: LockRange,

    /// Default: `Try`
    pub strategy: AcquireStrategy,

    /// Only consulted by `Deadline`.
    pub backoff: Backoff,
}

impl Default for LockRequest {
    fn default() -> Self {
        Self {
            kind: LockKind::Exclusive,
            range: LockRange::Whole,
            strategy: AcquireStrategy::Try,
            backoff: Backoff::default(),
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why a lock was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// A conflicting lock is held.
    Contention,
    /// The platform detected that waiting would deadlock.
    Deadlock,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Contention => f.write_str("contention"),
            DenyReason::Deadlock => f.write_str("deadlock"),
        }
    }
}

/// States of one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum LockState {
    Idle,
    Attempting,
    Acquired,
    Denied(DenyReason),
    /// The system lock table is exhausted.
    Blocked,
    TimedOut,
}

impl LockState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LockState::Idle | LockState::Attempting)
    }
}

/// A lock acquisition that did not end in [`LockState::Acquired`].
///
/// `Denied`, `Exhausted`, and `TimedOut` are expected outcomes callers
/// branch on. `Os` is a failure of the lock call itself (bad descriptor,
/// wrong access mode, unmapped code).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("lock denied: {0}")]
    Denied(DenyReason),

    /// The system lock table is full. Never retried.
    #[error("lock denied: no locks available")]
    Exhausted,

    #[error("lock not acquired after {attempts} attempts in {elapsed:?}")]
    TimedOut { attempts: u32, elapsed: Duration },

    #[error(transparent)]
    Os(#[from] FileLockError),
}

impl AcquireError {
    /// Terminal state this error corresponds to, or `None` for `Os`.
    pub fn state(&self) -> Option<LockState> {
        match self {
            AcquireError::Denied(reason) => Some(LockState::Denied(*reason)),
            AcquireError::Exhausted => Some(LockState::Blocked),
            AcquireError::TimedOut { .. } => Some(LockState::TimedOut),
            AcquireError::Os(_) => None,
        }
    }

    pub fn is_contention(&self) -> bool {
        matches!(self, AcquireError::Denied(DenyReason::Contention))
    }
}

impl From<AcquireError> for std::io::Error {
    fn from(err: AcquireError) -> Self {
        let kind = match &err {
            AcquireError::Denied(DenyReason::Contention) => std::io::ErrorKind::WouldBlock,
            AcquireError::TimedOut { .. } => std::io::ErrorKind::TimedOut,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

// ============================================================================
// File API
// ============================================================================

/// Acquire a lock on `file` with the default backoff schedule.
pub fn acquire(
    file: &File,
    kind: LockKind,
    range: LockRange,
    strategy: AcquireStrategy,
) -> Result<FileLock<'_>, AcquireError> {
    acquire_with(
        file,
        &LockRequest {
            kind,
            range,
            strategy,
            ..Default::default()
        },
    )
}

/// Acquire a lock on `file` as described by `request`.
pub fn acquire_with<'f>(
    file: &'f File,
    request: &LockRequest,
) -> Result<FileLock<'f>, AcquireError> {
    acquire_on(file, request)
}

/// Convenience: one non-blocking attempt.
pub fn try_lock(file: &File, kind: LockKind) -> Result<FileLock<'_>, AcquireError> {
    acquire(file, kind, LockRange::Whole, AcquireStrategy::Try)
}

/// Convenience: block until granted.
pub fn lock(file: &File, kind: LockKind) -> Result<FileLock<'_>, AcquireError> {
    acquire(file, kind, LockRange::Whole, AcquireStrategy::Wait)
}

/// Convenience: retry with backoff for up to `timeout`.
pub fn lock_timeout(
    file: &File,
    kind: LockKind,
    timeout: Duration,
) -> Result<FileLock<'_>, AcquireError> {
    acquire(file, kind, LockRange::Whole, AcquireStrategy::timeout(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_range_rejects_empty() {
        let err = LockRange::bytes(10, 0).unwrap_err();
        assert!(matches!(err, OsprimsError::InvalidArgument { .. }));
    }

    #[test]
    fn byte_range_rejects_overflow() {
        assert!(LockRange::bytes(u64::MAX, 1).is_err());
        assert!(LockRange::bytes(LockRange::MAX_END, 1).is_err());
        assert!(LockRange::bytes(LockRange::MAX_END - 1, 1).is_ok());
    }

    #[test]
    fn overlap_matrix() {
        let a = LockRange::bytes(0, 10).unwrap();
        let b = LockRange::bytes(10, 10).unwrap();
        let c = LockRange::bytes(5, 10).unwrap();

        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
        assert!(LockRange::Whole.overlaps(&b));
    }

    #[test]
    fn backoff_validates_inputs() {
        let ms = Duration::from_millis;
        assert!(Backoff::new(Duration::ZERO, ms(5), 3).is_err());
        assert!(Backoff::new(ms(10), ms(5), 3).is_err());
        assert!(Backoff::new(ms(1), ms(5), 0).is_err());
        assert!(Backoff::new(ms(1), ms(5), 1).is_ok());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let backoff = Backoff::default();
        let mut delay = backoff.initial();
        let mut seen = vec![delay];
        for _ in 0..8 {
            delay = backoff.next_delay(delay);
            seen.push(delay);
        }

        assert_eq!(seen[1], Duration::from_millis(2));
        assert_eq!(seen[5], Duration::from_millis(32));
        assert!(seen.iter().all(|d| *d <= backoff.max()));
        assert_eq!(*seen.last().unwrap(), backoff.max());
    }

    #[test]
    fn default_request_is_exclusive_try_whole() {
        let req = LockRequest::default();
        assert_eq!(req.kind, LockKind::Exclusive);
        assert_eq!(req.range, LockRange::Whole);
        assert_eq!(req.strategy, AcquireStrategy::Try);
    }

    #[test]
    fn terminal_states() {
        assert!(!LockState::Idle.is_terminal());
        assert!(!LockState::Attempting.is_terminal());
        assert!(LockState::Acquired.is_terminal());
        assert!(LockState::Blocked.is_terminal());
        assert_eq!(AcquireError::Exhausted.state(), Some(LockState::Blocked));
        assert_eq!(
            AcquireError::Denied(DenyReason::Deadlock).state(),
            Some(LockState::Denied(DenyReason::Deadlock))
        );
    }

    #[test]
    fn timed_out_is_not_contention() {
        let err = AcquireError::TimedOut {
            attempts: 3,
            elapsed: Duration::from_millis(10),
        };
        assert!(!err.is_contention());
        assert_eq!(
            std::io::Error::from(err).kind(),
            std::io::ErrorKind::TimedOut
        );
    }
}
