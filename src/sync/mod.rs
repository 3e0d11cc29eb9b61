//! Advisory locks with absolute-deadline acquisition.
//!
//! `Lock` and `RecursiveLock` sit on a `parking_lot` raw mutex plus an owner
//! word, so `unlock` can reject callers that do not hold the lock. Timed
//! acquisition either uses the raw mutex's native timed primitive or the
//! auxiliary gate/condvar emulation, chosen per instance through
//! [`TimedLockStrategy`].

pub mod condition;
pub mod condition_lock;

use core::fmt;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use parking_lot::lock_api::{RawMutex as _, RawMutexTimed as _};
use parking_lot::{Condvar, Mutex, RawMutex};
use std::cell::Cell;
use std::time::Instant;

const NO_OWNER: u64 = 0;

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: Cell<u64> = const { Cell::new(NO_OWNER) };
}

/// Nonzero id of the calling thread, stable for its lifetime.
pub(crate) fn thread_token() -> u64 {
    THREAD_TOKEN.with(|t| {
        let mut id = t.get();
        if id == NO_OWNER {
            id = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
            t.set(id);
        }
        id
    })
}

/// Blocking mutual exclusion.
pub trait Locking {
    fn lock(&self);

    /// Release the lock. The calling thread must hold it.
    fn unlock(&self);

    /// Run `f` while holding the lock. The lock is released even if `f`
    /// panics.
    fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R
    where
        Self: Sized,
    {
        struct Release<'a, L: Locking>(&'a L);
        impl<L: Locking> Drop for Release<'_, L> {
            fn drop(&mut self) {
                self.0.unlock();
            }
        }
        self.lock();
        let _release = Release(self);
        f()
    }
}

/// How `lock_before` waits once the first try fails.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimedLockStrategy {
    /// The raw mutex's own timed acquisition.
    Native,
    /// Wait on an auxiliary condvar that every unlock broadcasts, retrying
    /// after each wake until the deadline.
    Emulated,
}

impl Default for TimedLockStrategy {
    fn default() -> Self {
        if cfg!(feature = "emulated-timed-lock") {
            TimedLockStrategy::Emulated
        } else {
            TimedLockStrategy::Native
        }
    }
}

enum TimedWait {
    Native,
    Emulated { gate: Mutex<()>, cond: Condvar },
}

/// Raw mutex that knows its owner.
struct TimedMutex {
    raw: RawMutex,
    owner: AtomicU64,
    wait: TimedWait,
}

impl TimedMutex {
    fn new(strategy: TimedLockStrategy) -> Self {
        let wait = match strategy {
            TimedLockStrategy::Native => TimedWait::Native,
            TimedLockStrategy::Emulated => TimedWait::Emulated {
                gate: Mutex::new(()),
                cond: Condvar::new(),
            },
        };
        TimedMutex {
            raw: RawMutex::INIT,
            owner: AtomicU64::new(NO_OWNER),
            wait,
        }
    }

    fn strategy(&self) -> TimedLockStrategy {
        match self.wait {
            TimedWait::Native => TimedLockStrategy::Native,
            TimedWait::Emulated { .. } => TimedLockStrategy::Emulated,
        }
    }

    fn owner(&self) -> u64 {
        self.owner.load(Ordering::Acquire)
    }

    fn held_by_caller(&self) -> bool {
        self.owner() == thread_token()
    }

    fn claim(&self) {
        self.owner.store(thread_token(), Ordering::Release);
    }

    fn lock(&self) {
        self.raw.lock();
        self.claim();
    }

    fn try_lock(&self) -> bool {
        let ok = self.raw.try_lock();
        if ok {
            self.claim();
        }
        ok
    }

    fn lock_before(&self, deadline: Instant) -> bool {
        if Instant::now() >= deadline {
            return false;
        }
        if self.try_lock() {
            return true;
        }
        let acquired = match &self.wait {
            TimedWait::Native => self.raw.try_lock_until(deadline),
            TimedWait::Emulated { gate, cond } => {
                let mut g = gate.lock();
                loop {
                    if self.raw.try_lock() {
                        break true;
                    }
                    if cond.wait_until(&mut g, deadline).timed_out() {
                        break self.raw.try_lock();
                    }
                }
            }
        };
        if acquired {
            self.claim();
        }
        acquired
    }

    fn unlock(&self, what: &str, name: Option<&str>) {
        if !self.held_by_caller() {
            crate::contract_violation!(
                "{} {:?} unlocked by a thread that does not hold it",
                what,
                name.unwrap_or("<unnamed>")
            );
        }
        self.owner.store(NO_OWNER, Ordering::Release);
        // SAFETY: the owner check above proves this thread holds `raw`.
        unsafe { self.raw.unlock() };
        if let TimedWait::Emulated { gate, cond } = &self.wait {
            let _g = gate.lock();
            cond.notify_all();
        }
    }
}

/// Non-recursive advisory lock.
pub struct Lock {
    mutex: TimedMutex,
    name: Option<String>,
}

impl Lock {
    pub fn new() -> Self {
        Lock::with_strategy(TimedLockStrategy::default())
    }

    pub fn with_strategy(strategy: TimedLockStrategy) -> Self {
        Lock {
            mutex: TimedMutex::new(strategy),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn strategy(&self) -> TimedLockStrategy {
        self.mutex.strategy()
    }

    pub fn try_lock(&self) -> bool {
        self.mutex.try_lock()
    }

    /// Acquire before `deadline`. A deadline already past fails without
    /// blocking.
    pub fn lock_before(&self, deadline: Instant) -> bool {
        let ok = self.mutex.lock_before(deadline);
        tracing::trace!(lock = ?self.name, acquired = ok, "timed lock");
        ok
    }

    pub fn is_locked(&self) -> bool {
        self.mutex.raw.is_locked()
    }
}

impl Default for Lock {
    fn default() -> Self {
        Lock::new()
    }
}

impl Locking for Lock {
    fn lock(&self) {
        if self.mutex.held_by_caller() {
            crate::contract_violation!(
                "lock {:?} locked twice by the same thread",
                self.name.as_deref().unwrap_or("<unnamed>")
            );
        }
        self.mutex.lock();
    }

    fn unlock(&self) {
        self.mutex.unlock("lock", self.name.as_deref());
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("name", &self.name)
            .field("locked", &self.is_locked())
            .field("strategy", &self.strategy())
            .finish()
    }
}

/// Lock the holding thread may acquire again; each `lock` needs a
/// matching `unlock`.
pub struct RecursiveLock {
    mutex: TimedMutex,
    depth: AtomicUsize,
    name: Option<String>,
}

impl RecursiveLock {
    pub fn new() -> Self {
        RecursiveLock::with_strategy(TimedLockStrategy::default())
    }

    pub fn with_strategy(strategy: TimedLockStrategy) -> Self {
        RecursiveLock {
            mutex: TimedMutex::new(strategy),
            depth: AtomicUsize::new(0),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn strategy(&self) -> TimedLockStrategy {
        self.mutex.strategy()
    }

    /// Number of unmatched `lock` calls by the holder; 0 when free.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    fn reenter(&self) -> bool {
        if self.mutex.held_by_caller() {
            self.depth.fetch_add(1, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    pub fn try_lock(&self) -> bool {
        if self.reenter() {
            return true;
        }
        let ok = self.mutex.try_lock();
        if ok {
            self.depth.store(1, Ordering::Release);
        }
        ok
    }

    pub fn lock_before(&self, deadline: Instant) -> bool {
        if Instant::now() >= deadline {
            return false;
        }
        if self.reenter() {
            return true;
        }
        let ok = self.mutex.lock_before(deadline);
        if ok {
            self.depth.store(1, Ordering::Release);
        }
        tracing::trace!(lock = ?self.name, acquired = ok, "timed recursive lock");
        ok
    }
}

impl Default for RecursiveLock {
    fn default() -> Self {
        RecursiveLock::new()
    }
}

impl Locking for RecursiveLock {
    fn lock(&self) {
        if self.reenter() {
            return;
        }
        self.mutex.lock();
        self.depth.store(1, Ordering::Release);
    }

    fn unlock(&self) {
        if !self.mutex.held_by_caller() {
            crate::contract_violation!(
                "recursive lock {:?} unlocked by a thread that does not hold it",
                self.name.as_deref().unwrap_or("<unnamed>")
            );
        }
        if self.depth.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.mutex.unlock("recursive lock", self.name.as_deref());
        }
    }
}

impl fmt::Debug for RecursiveLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecursiveLock")
            .field("name", &self.name)
            .field("depth", &self.depth())
            .field("strategy", &self.strategy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn both() -> [TimedLockStrategy; 2] {
        [TimedLockStrategy::Native, TimedLockStrategy::Emulated]
    }

    #[test]
    fn thread_tokens_differ() {
        let here = thread_token();
        assert_eq!(here, thread_token());
        let there = thread::spawn(thread_token).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn try_lock_fails_while_held_elsewhere() {
        for s in both() {
            let l = Arc::new(Lock::with_strategy(s));
            l.lock();
            let l2 = l.clone();
            assert!(!thread::spawn(move || l2.try_lock()).join().unwrap());
            l.unlock();
            assert!(l.try_lock());
            l.unlock();
        }
    }

    #[test]
    fn past_deadline_fails_even_when_free() {
        for s in both() {
            let l = Lock::with_strategy(s);
            let past = Instant::now() - Duration::from_millis(1);
            let start = Instant::now();
            assert!(!l.lock_before(past));
            assert!(start.elapsed() < Duration::from_millis(50));
            assert!(!l.is_locked());
        }
    }

    #[test]
    fn future_deadline_on_free_lock_succeeds() {
        for s in both() {
            let l = Lock::with_strategy(s);
            assert!(l.lock_before(Instant::now() + Duration::from_secs(5)));
            l.unlock();
        }
    }

    #[test]
    fn timed_lock_wakes_on_unlock() {
        for s in both() {
            let l = Arc::new(Lock::with_strategy(s));
            l.lock();
            let l2 = l.clone();
            let waiter = thread::spawn(move || {
                let ok = l2.lock_before(Instant::now() + Duration::from_secs(10));
                if ok {
                    l2.unlock();
                }
                ok
            });
            thread::sleep(Duration::from_millis(20));
            l.unlock();
            assert!(waiter.join().unwrap());
        }
    }

    #[test]
    fn timed_lock_times_out() {
        for s in both() {
            let l = Arc::new(Lock::with_strategy(s));
            l.lock();
            let l2 = l.clone();
            let start = Instant::now();
            let ok = thread::spawn(move || l2.lock_before(Instant::now() + Duration::from_millis(30)))
                .join()
                .unwrap();
            assert!(!ok);
            assert!(start.elapsed() >= Duration::from_millis(30));
            l.unlock();
        }
    }

    #[test]
    #[should_panic(expected = "unlocked by a thread that does not hold it")]
    fn unlock_without_holding_aborts() {
        Lock::new().with_name("stray").unlock();
    }

    #[test]
    fn recursive_lock_counts_depth() {
        let l = Arc::new(RecursiveLock::new());
        l.lock();
        assert!(l.try_lock());
        assert!(l.lock_before(Instant::now() + Duration::from_millis(5)));
        assert_eq!(l.depth(), 3);
        let l2 = l.clone();
        assert!(!thread::spawn(move || l2.try_lock()).join().unwrap());
        l.unlock();
        l.unlock();
        assert_eq!(l.depth(), 1);
        l.unlock();
        assert_eq!(l.depth(), 0);
        let l3 = l.clone();
        assert!(thread::spawn(move || {
            let ok = l3.try_lock();
            l3.unlock();
            ok
        })
        .join()
        .unwrap());
    }

    #[test]
    fn with_lock_releases_on_return() {
        let l = Lock::new();
        let v = l.with_lock(|| 5);
        assert_eq!(v, 5);
        assert!(!l.is_locked());
    }
}
