//! Fallback for platform codes no candidate domain claimed.

use std::fmt;
use std::sync::OnceLock;

use crate::code::PlatformCode;
use crate::domain::DomainId;

/// A failure whose platform code is not classified by any domain the
/// operation considered.
///
/// The raw code is always preserved and always printed, so an operator can
/// report it for classification. The OS message is looked up lazily on first
/// display and cached.
pub struct Unmapped {
    code: PlatformCode,
    diagnostic: OnceLock<String>,
}

impl Unmapped {
    pub fn new(code: PlatformCode) -> Self {
        Self {
            code,
            diagnostic: OnceLock::new(),
        }
    }

    /// Build the fallback for a cascade that found no match, recording the
    /// event for later classification work.
    pub(crate) fn unclaimed(code: PlatformCode, candidates: &[DomainId]) -> Self {
        tracing::debug!(
            code = code.raw(),
            platform = %code.platform(),
            candidates = ?candidates,
            "platform code not claimed by any candidate domain"
        );
        Self::new(code)
    }

    #[inline]
    pub fn code(&self) -> PlatformCode {
        self.code
    }

    /// OS message for the code, computed on first use.
    pub fn diagnostic(&self) -> &str {
        self.diagnostic.get_or_init(|| self.code.description())
    }
}

impl Clone for Unmapped {
    fn clone(&self) -> Self {
        // The cached diagnostic is cheap to recompute; don't force it here.
        Self::new(self.code)
    }
}

impl PartialEq for Unmapped {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Unmapped {}

impl fmt::Debug for Unmapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Unmapped").field(&self.code).finish()
    }
}

impl fmt::Display for Unmapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unmapped {} {}: {}",
            self.code.platform(),
            self.code.raw(),
            self.diagnostic()
        )
    }
}

impl std::error::Error for Unmapped {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_always_carries_raw_code() {
        let err = Unmapped::new(PlatformCode::native(9999));
        let text = err.to_string();

        assert!(text.contains("9999"), "got: {text}");
        assert!(!text.to_lowercase().starts_with("unknown error"));
    }

    #[test]
    fn diagnostic_is_cached() {
        let err = Unmapped::new(PlatformCode::native(2));
        let first = err.diagnostic() as *const str;
        let second = err.diagnostic() as *const str;
        assert_eq!(first, second);
    }

    #[test]
    fn equality_ignores_diagnostic_state() {
        let a = Unmapped::new(PlatformCode::posix(2));
        let b = Unmapped::new(PlatformCode::posix(2));
        let _ = a.diagnostic();

        assert_eq!(a, b);
        assert_ne!(a, Unmapped::new(PlatformCode::windows(2)));
    }

    #[test]
    fn unmapped_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Unmapped>();
    }
}
