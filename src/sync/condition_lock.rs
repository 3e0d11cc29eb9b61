//! Lock gated on an integer condition value.

use super::{thread_token, Locking, NO_OWNER};
use core::fmt;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

struct State {
    owner: u64,
    condition: isize,
}

/// Lock whose acquisition can additionally wait for the stored condition
/// to equal a target value. Every unlock wakes all waiters, since each may
/// be gated on a different target.
pub struct ConditionLock {
    state: Mutex<State>,
    changed: Condvar,
    name: Option<String>,
}

impl ConditionLock {
    pub fn new(condition: isize) -> Self {
        ConditionLock {
            state: Mutex::new(State {
                owner: NO_OWNER,
                condition,
            }),
            changed: Condvar::new(),
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

    /// Current condition value.
    pub fn condition(&self) -> isize {
        self.state.lock().condition
    }

    fn ready(s: &State, when: Option<isize>) -> bool {
        s.owner == NO_OWNER && when.map_or(true, |c| s.condition == c)
    }

    fn claim(s: &mut MutexGuard<'_, State>) {
        s.owner = thread_token();
    }

    fn acquire(&self, when: Option<isize>) {
        let mut s = self.state.lock();
        if s.owner == thread_token() {
            crate::contract_violation!(
                "condition lock {:?} locked twice by the same thread",
                self.name.as_deref().unwrap_or("<unnamed>")
            );
        }
        while !Self::ready(&s, when) {
            self.changed.wait(&mut s);
        }
        Self::claim(&mut s);
    }

    fn try_acquire(&self, when: Option<isize>) -> bool {
        let mut s = self.state.lock();
        if !Self::ready(&s, when) {
            return false;
        }
        Self::claim(&mut s);
        true
    }

    fn acquire_before(&self, when: Option<isize>, deadline: Instant) -> bool {
        if Instant::now() >= deadline {
            return false;
        }
        let mut s = self.state.lock();
        while !Self::ready(&s, when) {
            if self.changed.wait_until(&mut s, deadline).timed_out() && !Self::ready(&s, when) {
                tracing::trace!(lock = ?self.name, ?when, "condition lock timed out");
                return false;
            }
        }
        Self::claim(&mut s);
        true
    }

    /// Block until the lock is free and the condition equals `condition`.
    pub fn lock_when(&self, condition: isize) {
        self.acquire(Some(condition));
    }

    pub fn try_lock(&self) -> bool {
        self.try_acquire(None)
    }

    pub fn try_lock_when(&self, condition: isize) -> bool {
        self.try_acquire(Some(condition))
    }

    pub fn lock_before(&self, deadline: Instant) -> bool {
        self.acquire_before(None, deadline)
    }

    pub fn lock_when_before(&self, condition: isize, deadline: Instant) -> bool {
        self.acquire_before(Some(condition), deadline)
    }

    /// Store `condition` and release the lock.
    pub fn unlock_with(&self, condition: isize) {
        self.release(Some(condition));
    }

    fn release(&self, condition: Option<isize>) {
        let mut s = self.state.lock();
        if s.owner != thread_token() {
            crate::contract_violation!(
                "condition lock {:?} unlocked by a thread that does not hold it",
                self.name.as_deref().unwrap_or("<unnamed>")
            );
        }
        if let Some(c) = condition {
            s.condition = c;
        }
        s.owner = NO_OWNER;
        self.changed.notify_all();
    }
}

impl Default for ConditionLock {
    fn default() -> Self {
        ConditionLock::new(0)
    }
}

impl Locking for ConditionLock {
    fn lock(&self) {
        self.acquire(None);
    }

    fn unlock(&self) {
        self.release(None);
    }
}

impl fmt::Debug for ConditionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.lock();
        f.debug_struct("ConditionLock")
            .field("name", &self.name)
            .field("condition", &s.condition)
            .field("locked", &(s.owner != NO_OWNER))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn try_lock_when_checks_value() {
        let l = ConditionLock::new(1);
        assert!(!l.try_lock_when(2));
        assert!(l.try_lock_when(1));
        l.unlock_with(2);
        assert_eq!(l.condition(), 2);
        assert!(l.try_lock());
        l.unlock();
        assert_eq!(l.condition(), 2);
    }

    #[test]
    fn unlock_wakes_waiters_on_different_values() {
        let l = Arc::new(ConditionLock::new(0));
        let handles: Vec<_> = [1isize, 2]
            .into_iter()
            .map(|target| {
                let l = l.clone();
                thread::spawn(move || {
                    let ok = l.lock_when_before(target, Instant::now() + Duration::from_secs(10));
                    if ok {
                        l.unlock_with(target + 1);
                    }
                    ok
                })
            })
            .collect();
        thread::sleep(Duration::from_millis(10));
        l.lock();
        l.unlock_with(1);
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(l.condition(), 3);
    }

    #[test]
    fn timed_condition_wait_gives_up() {
        let l = ConditionLock::new(0);
        assert!(!l.lock_when_before(5, Instant::now() + Duration::from_millis(15)));
        assert!(!l.lock_before(Instant::now() - Duration::from_millis(1)));
        assert!(l.lock_before(Instant::now() + Duration::from_millis(15)));
        l.unlock();
    }
}
