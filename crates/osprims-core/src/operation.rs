//! Per-operation error unions.
//!
//! Each syscall family gets its own error type listing only the domains its
//! failures can fall into, in the order that disambiguates its codes. Opening
//! a path tries the namespace before permissions; taking a byte-range lock
//! reads `EACCES` as contention before it could be mistaken for an access
//! failure.
//!
//! ```
//! use osprims_core::operation::OpenError;
//! use osprims_core::{DomainId, PlatformCode};
//!
//! assert_eq!(OpenError::DOMAINS[0], DomainId::Path);
//! let err = OpenError::resolve(PlatformCode::native(1_000_000));
//! assert!(err.is_unmapped());
//! ```

use crate::cascade::OsError;
use crate::code::PlatformCode;
use crate::domain::{
    BlockingError, DescriptorError, Domain, DomainId, LockError, MemoryError, PathError,
    PermissionError, StorageError, ThreadError,
};
use crate::unmapped::Unmapped;

/// Declares an operation error union with a fixed cascade order.
///
/// Variants are tried top to bottom; `Unmapped` is appended automatically.
macro_rules! operation_error {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident($domain:ty)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                #[error(transparent)]
                $variant(#[from] $domain),
            )+
            #[error(transparent)]
            Unmapped(#[from] Unmapped),
        }

        impl $name {
            /// Cascade order used by [`Self::resolve`].
            pub const DOMAINS: &'static [DomainId] = &[$(<$domain as Domain>::ID),+];

            /// Classify `code`, trying each domain in [`Self::DOMAINS`] order.
            pub fn resolve(code: PlatformCode) -> Self {
                $(
                    if let Some(err) = <$domain as Domain>::classify(code) {
                        return $name::$variant(err);
                    }
                )+
                $name::Unmapped(Unmapped::unclaimed(code, Self::DOMAINS))
            }

            /// Capture the current platform code and classify it.
            #[inline]
            pub fn current() -> Self {
                Self::resolve(PlatformCode::current())
            }

            pub fn is_unmapped(&self) -> bool {
                matches!(self, $name::Unmapped(_))
            }

            /// The fallback payload, when no domain claimed the code.
            pub fn unmapped(&self) -> Option<&Unmapped> {
                match self {
                    $name::Unmapped(unmapped) => Some(unmapped),
                    _ => None,
                }
            }
        }

        impl From<$name> for OsError {
            fn from(err: $name) -> Self {
                match err {
                    $($name::$variant(inner) => OsError::$variant(inner),)+
                    $name::Unmapped(unmapped) => OsError::Unmapped(unmapped),
                }
            }
        }
    };
}

operation_error! {
    /// Failures of `open(2)` / `CreateFileW`.
    pub enum OpenError {
        Path(PathError),
        Permission(PermissionError),
        Descriptor(DescriptorError),
        Storage(StorageError),
        Blocking(BlockingError),
    }
}

operation_error! {
    /// Failures of `stat(2)` / `fstat(2)` / `GetFileInformationByHandle`.
    pub enum StatError {
        Path(PathError),
        Descriptor(DescriptorError),
        Permission(PermissionError),
        Memory(MemoryError),
        Blocking(BlockingError),
    }
}

operation_error! {
    /// Failures of `statfs(2)` / `statvfs(3)` / `GetDiskFreeSpaceExW`.
    pub enum FsStatsError {
        Path(PathError),
        Descriptor(DescriptorError),
        Permission(PermissionError),
        Memory(MemoryError),
        Blocking(BlockingError),
    }
}

operation_error! {
    /// Failures of `unlink(2)` / `rmdir(2)` / `DeleteFileW`.
    pub enum UnlinkError {
        Path(PathError),
        Permission(PermissionError),
        Blocking(BlockingError),
    }
}

operation_error! {
    /// Failures of `read(2)` / `pread(2)` / `ReadFile`.
    pub enum ReadError {
        Descriptor(DescriptorError),
        Blocking(BlockingError),
        Path(PathError),
    }
}

operation_error! {
    /// Failures of `write(2)` / `pwrite(2)` / `WriteFile`.
    pub enum WriteError {
        Descriptor(DescriptorError),
        Storage(StorageError),
        Blocking(BlockingError),
        Permission(PermissionError),
    }
}

operation_error! {
    /// Failures of `close(2)` / `CloseHandle`.
    pub enum CloseError {
        Descriptor(DescriptorError),
        Blocking(BlockingError),
    }
}

operation_error! {
    /// Failures of `mmap(2)` / `munmap(2)` / `MapViewOfFile`.
    pub enum MapError {
        Memory(MemoryError),
        Descriptor(DescriptorError),
        Permission(PermissionError),
        Storage(StorageError),
    }
}

operation_error! {
    /// Failures of `fcntl(F_SETLK*)` / `flock(2)` / `LockFileEx`.
    pub enum FileLockError {
        Lock(LockError),
        Descriptor(DescriptorError),
        Blocking(BlockingError),
        Permission(PermissionError),
    }
}

operation_error! {
    /// Failures of mutex, condition variable, and thread creation calls.
    pub enum SyncPrimitiveError {
        Thread(ThreadError),
        Memory(MemoryError),
        Permission(PermissionError),
    }
}
