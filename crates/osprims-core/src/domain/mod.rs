//! Semantic error domains.
//!
//! Each domain is a closed enum naming one failure theme (path resolution,
//! permission, storage, ...). A domain recognizes a subset of platform codes
//! through [`Domain::classify`] and declines everything else. Domains overlap
//! on purpose: `EACCES` is a permission failure for `open(2)` but lock
//! contention for `fcntl(F_SETLK)`, and `EAGAIN` means something different to
//! a socket, a lock, and a thread. Which reading wins is decided by the
//! calling operation's cascade order (see [`crate::cascade`]), never here.

use std::fmt;
use std::str::FromStr;

use crate::code::{Platform, PlatformCode};

mod blocking;
mod descriptor;
mod lock;
mod memory;
mod path;
mod permission;
mod storage;
mod thread;

pub use blocking::BlockingError;
pub use descriptor::{DescriptorError, LimitScope};
pub use lock::LockError;
pub use memory::MemoryError;
pub use path::PathError;
pub use permission::PermissionError;
pub use storage::StorageError;
pub use thread::ThreadError;

/// A closed set of semantically named error cases.
pub trait Domain: Sized + Copy + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Identifier used in dynamic cascade lists.
    const ID: DomainId;

    /// Claim `code` for this domain, or decline with `None`.
    ///
    /// Codes tagged with a platform other than the build target are always
    /// declined.
    fn classify(code: PlatformCode) -> Option<Self> {
        if code.platform() != Platform::native() {
            return None;
        }

        #[cfg(unix)]
        return Self::classify_posix(code.raw());

        #[cfg(windows)]
        return Self::classify_windows(code.raw() as u32);
    }

    /// Claim a host errno value.
    #[cfg(unix)]
    fn classify_posix(errno: i32) -> Option<Self>;

    /// Claim a host last-error value.
    #[cfg(windows)]
    fn classify_windows(code: u32) -> Option<Self>;
}

/// Names a domain in a caller-supplied cascade list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainId {
    Path,
    Permission,
    Descriptor,
    Storage,
    Blocking,
    Memory,
    Lock,
    Thread,
}

impl DomainId {
    /// Every domain, in declaration order.
    pub const ALL: [DomainId; 8] = [
        DomainId::Path,
        DomainId::Permission,
        DomainId::Descriptor,
        DomainId::Storage,
        DomainId::Blocking,
        DomainId::Memory,
        DomainId::Lock,
        DomainId::Thread,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            DomainId::Path => "path",
            DomainId::Permission => "permission",
            DomainId::Descriptor => "descriptor",
            DomainId::Storage => "storage",
            DomainId::Blocking => "blocking",
            DomainId::Memory => "memory",
            DomainId::Lock => "lock",
            DomainId::Thread => "thread",
        }
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown domain name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown error domain '{0}'")]
pub struct UnknownDomain(pub String);

impl FromStr for DomainId {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        DomainId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownDomain(needle.to_string()))
    }
}
