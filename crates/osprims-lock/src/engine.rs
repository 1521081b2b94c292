//! Lock acquisition state machine.
//!
//! `Idle → Attempting → {Acquired | Denied | Blocked | TimedOut}`. Only the
//! deadline strategy loops; it sleeps between attempts on a capped
//! exponential schedule and never sleeps past the deadline.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use osprims_core::operation::FileLockError;
use osprims_core::LockError;

use crate::{
    AcquireError, AcquireStrategy, Backoff, DenyReason, LockKind, LockRange, LockRequest, LockState,
};

/// A platform lock primitive over some handle type.
///
/// Implementations report failures already classified, and retry `EINTR`
/// internally. The compatibility matrix is theirs to enforce.
pub trait LockPrimitive {
    /// One non-blocking attempt.
    fn try_lock(&self, kind: LockKind, range: LockRange) -> Result<(), FileLockError>;

    /// Block until granted or the platform reports failure.
    fn lock_blocking(&self, kind: LockKind, range: LockRange) -> Result<(), FileLockError>;

    fn unlock(&self, range: LockRange) -> Result<(), FileLockError>;
}

/// A held lock. Released on drop.
///
/// Use [`LockGuard::unlock`] to observe release failures; drop can only log
/// them.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'p, P: LockPrimitive + ?Sized> {
    primitive: &'p P,
    kind: LockKind,
    range: LockRange,
    attempts: u32,
    released: bool,
}

impl<'p, P: LockPrimitive + ?Sized> LockGuard<'p, P> {
    pub fn kind(&self) -> LockKind {
        self.kind
    }

    pub fn range(&self) -> LockRange {
        self.range
    }

    /// Attempts made before the lock was granted.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Release the lock, reporting failure.
    pub fn unlock(mut self) -> Result<(), FileLockError> {
        self.released = true;
        self.primitive.unlock(self.range)
    }
}

impl<P: LockPrimitive + ?Sized> Drop for LockGuard<'_, P> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.primitive.unlock(self.range) {
            tracing::warn!(
                kind = %self.kind,
                range = ?self.range,
                error = %err,
                "lock release failed"
            );
        }
    }
}

impl<P: LockPrimitive + ?Sized> fmt::Debug for LockGuard<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("kind", &self.kind)
            .field("range", &self.range)
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// Result of one attempt, before strategy is applied.
enum Attempt {
    Granted,
    Contended,
}

/// Sort a failed attempt into retryable contention or a terminal error.
fn classify(err: FileLockError) -> Result<Attempt, AcquireError> {
    match err {
        FileLockError::Lock(LockError::Contention) => Ok(Attempt::Contended),
        FileLockError::Lock(LockError::Deadlock) => Err(AcquireError::Denied(DenyReason::Deadlock)),
        FileLockError::Lock(LockError::Exhausted) => Err(AcquireError::Exhausted),
        other => Err(AcquireError::Os(other)),
    }
}

fn attempt<P: LockPrimitive + ?Sized>(
    primitive: &P,
    kind: LockKind,
    range: LockRange,
) -> Result<Attempt, AcquireError> {
    match primitive.try_lock(kind, range) {
        Ok(()) => Ok(Attempt::Granted),
        Err(err) => classify(err),
    }
}

/// One acquisition, tracking its state for diagnostics.
struct Acquisition<'a, P: LockPrimitive + ?Sized> {
    primitive: &'a P,
    request: LockRequest,
    state: LockState,
    attempts: u32,
    started: Instant,
}

impl<'a, P: LockPrimitive + ?Sized> Acquisition<'a, P> {
    fn new(primitive: &'a P, request: LockRequest) -> Self {
        Self {
            primitive,
            request,
            state: LockState::Idle,
            attempts: 0,
            started: Instant::now(),
        }
    }

    fn transition(&mut self, next: LockState) {
        tracing::trace!(from = ?self.state, to = ?next, attempts = self.attempts, "lock state");
        self.state = next;
    }

    fn attempt(&mut self) -> Result<Attempt, AcquireError> {
        self.transition(LockState::Attempting);
        self.attempts += 1;
        attempt(self.primitive, self.request.kind, self.request.range)
    }

    fn run(mut self) -> Result<LockGuard<'a, P>, AcquireError> {
        let result = match self.request.strategy {
            AcquireStrategy::Try => self.run_try(),
            AcquireStrategy::Wait => self.run_wait(),
            AcquireStrategy::Deadline(deadline) => {
                self.run_deadline(deadline, self.request.backoff)
            }
        };

        match &result {
            Ok(()) => self.transition(LockState::Acquired),
            Err(err) => {
                if let Some(state) = err.state() {
                    self.transition(state);
                }
                tracing::debug!(
                    kind = %self.request.kind,
                    attempts = self.attempts,
                    error = %err,
                    "lock not acquired"
                );
            }
        }

        result.map(|()| LockGuard {
            primitive: self.primitive,
            kind: self.request.kind,
            range: self.request.range,
            attempts: self.attempts,
            released: false,
        })
    }

    fn run_try(&mut self) -> Result<(), AcquireError> {
        match self.attempt()? {
            Attempt::Granted => Ok(()),
            Attempt::Contended => Err(AcquireError::Denied(DenyReason::Contention)),
        }
    }

    fn run_wait(&mut self) -> Result<(), AcquireError> {
        self.transition(LockState::Attempting);
        self.attempts += 1;
        match self
            .primitive
            .lock_blocking(self.request.kind, self.request.range)
        {
            Ok(()) => Ok(()),
            Err(err) => match classify(err)? {
                // A blocking call should not report contention; treat it as refused.
                Attempt::Contended => Err(AcquireError::Denied(DenyReason::Contention)),
                Attempt::Granted => Ok(()),
            },
        }
    }

    fn run_deadline(&mut self, deadline: Instant, backoff: Backoff) -> Result<(), AcquireError> {
        let mut delay = backoff.initial();

        loop {
            if let Attempt::Granted = self.attempt()? {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out());
            }
            let remaining = deadline - now;

            if self.attempts >= backoff.max_attempts() {
                // Busy attempts exhausted: one last try once the deadline arrives.
                tracing::trace!(
                    attempts = self.attempts,
                    ?remaining,
                    "backoff attempts exhausted"
                );
                thread::sleep(remaining);
                return match self.attempt()? {
                    Attempt::Granted => Ok(()),
                    Attempt::Contended => Err(self.timed_out()),
                };
            }

            let pause = delay.min(remaining);
            tracing::trace!(attempts = self.attempts, ?pause, "lock contended, backing off");
            thread::sleep(pause);
            delay = backoff.next_delay(delay);
        }
    }

    fn timed_out(&self) -> AcquireError {
        AcquireError::TimedOut {
            attempts: self.attempts,
            elapsed: self.elapsed(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Acquire a lock through any [`LockPrimitive`].
pub fn acquire_on<'p, P: LockPrimitive + ?Sized>(
    primitive: &'p P,
    request: &LockRequest,
) -> Result<LockGuard<'p, P>, AcquireError> {
    Acquisition::new(primitive, *request).run()
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use osprims_core::{BlockingError, DescriptorError};

    use super::*;

    /// Replays scripted results; once the script runs out, repeats the last.
    struct Scripted {
        results: RefCell<VecDeque<Result<(), FileLockError>>>,
        last: Result<(), FileLockError>,
        tries: Cell<u32>,
        blocking_calls: Cell<u32>,
        unlocks: Cell<u32>,
    }

    impl Scripted {
        fn new(script: Vec<Result<(), FileLockError>>) -> Self {
            let last = script.last().cloned().unwrap_or(Ok(()));
            Self {
                results: RefCell::new(script.into()),
                last,
                tries: Cell::new(0),
                blocking_calls: Cell::new(0),
                unlocks: Cell::new(0),
            }
        }

        fn next(&self) -> Result<(), FileLockError> {
            self.results
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| self.last.clone())
        }
    }

    impl LockPrimitive for Scripted {
        fn try_lock(&self, _: LockKind, _: LockRange) -> Result<(), FileLockError> {
            self.tries.set(self.tries.get() + 1);
            self.next()
        }

        fn lock_blocking(&self, _: LockKind, _: LockRange) -> Result<(), FileLockError> {
            self.blocking_calls.set(self.blocking_calls.get() + 1);
            self.next()
        }

        fn unlock(&self, _: LockRange) -> Result<(), FileLockError> {
            self.unlocks.set(self.unlocks.get() + 1);
            Ok(())
        }
    }

    fn contended() -> Result<(), FileLockError> {
        Err(FileLockError::Lock(LockError::Contention))
    }

    fn request(strategy: AcquireStrategy) -> LockRequest {
        LockRequest {
            strategy,
            backoff: Backoff::new(Duration::from_millis(1), Duration::from_millis(4), 16)
                .expect("valid backoff"),
            ..Default::default()
        }
    }

    #[test]
    fn try_contention_is_denied_after_one_attempt() {
        let p = Scripted::new(vec![contended()]);
        let started = Instant::now();

        let err = acquire_on(&p, &request(AcquireStrategy::Try)).unwrap_err();

        assert_eq!(err, AcquireError::Denied(DenyReason::Contention));
        assert_eq!(p.tries.get(), 1);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn try_success_is_acquired_and_released_on_drop() {
        let p = Scripted::new(vec![Ok(())]);
        {
            let guard = acquire_on(&p, &request(AcquireStrategy::Try)).expect("acquired");
            assert_eq!(guard.attempts(), 1);
        }
        assert_eq!(p.unlocks.get(), 1);
    }

    #[test]
    fn guard_outlives_the_request() {
        let p = Scripted::new(vec![Ok(())]);
        let guard = {
            let req = request(AcquireStrategy::Try);
            acquire_on(&p, &req).expect("acquired")
        };
        assert_eq!(guard.kind(), LockKind::Exclusive);
        drop(guard);
        assert_eq!(p.unlocks.get(), 1);
    }

    #[test]
    fn explicit_unlock_releases_once() {
        let p = Scripted::new(vec![Ok(())]);
        let guard = acquire_on(&p, &request(AcquireStrategy::Try)).expect("acquired");
        guard.unlock().expect("unlock");
        assert_eq!(p.unlocks.get(), 1);
    }

    #[test]
    fn wait_uses_blocking_primitive() {
        let p = Scripted::new(vec![Ok(())]);
        acquire_on(&p, &request(AcquireStrategy::Wait)).expect("acquired");
        assert_eq!(p.blocking_calls.get(), 1);
        assert_eq!(p.tries.get(), 0);
    }

    #[test]
    fn wait_deadlock_is_denied() {
        let p = Scripted::new(vec![Err(FileLockError::Lock(LockError::Deadlock))]);
        let err = acquire_on(&p, &request(AcquireStrategy::Wait)).unwrap_err();
        assert_eq!(err, AcquireError::Denied(DenyReason::Deadlock));
    }

    #[test]
    fn deadline_retries_until_granted() {
        let p = Scripted::new(vec![contended(), contended(), contended(), Ok(())]);
        let deadline = Instant::now() + Duration::from_secs(10);

        let guard =
            acquire_on(&p, &request(AcquireStrategy::Deadline(deadline))).expect("acquired");

        assert_eq!(guard.attempts(), 4);
        assert_eq!(p.tries.get(), 4);
    }

    #[test]
    fn deadline_exhaustion_is_not_retried() {
        let p = Scripted::new(vec![Err(FileLockError::Lock(LockError::Exhausted))]);
        let deadline = Instant::now() + Duration::from_secs(10);

        let err = acquire_on(&p, &request(AcquireStrategy::Deadline(deadline))).unwrap_err();

        assert_eq!(err, AcquireError::Exhausted);
        assert_eq!(err.state(), Some(LockState::Blocked));
        assert_eq!(p.tries.get(), 1);
    }

    #[test]
    fn deadline_os_failure_is_not_retried() {
        let p = Scripted::new(vec![Err(FileLockError::Descriptor(DescriptorError::Invalid))]);
        let deadline = Instant::now() + Duration::from_secs(10);

        let err = acquire_on(&p, &request(AcquireStrategy::Deadline(deadline))).unwrap_err();

        assert_eq!(
            err,
            AcquireError::Os(FileLockError::Descriptor(DescriptorError::Invalid))
        );
        assert_eq!(p.tries.get(), 1);
    }

    #[test]
    fn deadline_times_out_no_earlier_than_deadline() {
        let p = Scripted::new(vec![contended()]);
        let deadline = Instant::now() + Duration::from_millis(60);

        let err = acquire_on(&p, &request(AcquireStrategy::Deadline(deadline))).unwrap_err();

        assert!(Instant::now() >= deadline);
        match err {
            AcquireError::TimedOut { attempts, .. } => {
                // max_attempts busy attempts plus the final one at the deadline.
                assert!((2..=17).contains(&attempts), "attempts = {attempts}");
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
    }

    #[test]
    fn deadline_caps_busy_attempts() {
        let p = Scripted::new(vec![contended()]);
        let req = LockRequest {
            strategy: AcquireStrategy::timeout(Duration::from_millis(200)),
            backoff: Backoff::new(Duration::from_millis(1), Duration::from_millis(1), 3)
                .expect("valid backoff"),
            ..Default::default()
        };

        let err = acquire_on(&p, &req).unwrap_err();

        assert!(matches!(err, AcquireError::TimedOut { attempts: 4, .. }), "{err:?}");
        assert_eq!(p.tries.get(), 4);
    }

    #[test]
    fn past_deadline_makes_exactly_one_attempt() {
        let p = Scripted::new(vec![contended()]);
        let deadline = Instant::now();

        let err = acquire_on(&p, &request(AcquireStrategy::Deadline(deadline))).unwrap_err();

        assert!(matches!(err, AcquireError::TimedOut { attempts: 1, .. }));
    }

    #[test]
    fn interrupted_try_surfaces_as_os_error() {
        let p = Scripted::new(vec![Err(FileLockError::Blocking(BlockingError::Interrupted))]);
        let err = acquire_on(&p, &request(AcquireStrategy::Try)).unwrap_err();
        assert_eq!(err.state(), None);
    }
}
