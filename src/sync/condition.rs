//! Condition variable bundled with its own lock.

use super::{thread_token, Locking, NO_OWNER};
use core::fmt;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::time::Instant;

struct State {
    owner: u64,
    /// Tickets of parked waiters, oldest first.
    waiting: VecDeque<u64>,
    /// Tickets picked by `signal`/`broadcast` whose waiter has not yet left.
    woken: Vec<u64>,
    next_ticket: u64,
}

impl State {
    fn park(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.waiting.push_back(ticket);
        ticket
    }

    /// Consume the wake for `ticket`, if one was handed out.
    fn take_wake(&mut self, ticket: u64) -> bool {
        match self.woken.iter().position(|t| *t == ticket) {
            Some(i) => {
                self.woken.swap_remove(i);
                true
            }
            None => false,
        }
    }
}

/// A lock plus a condition. Waiting releases the lock for the duration of
/// the wait and holds it again on return.
pub struct Condition {
    state: Mutex<State>,
    free: Condvar,
    signals: Condvar,
    name: Option<String>,
}

impl Condition {
    pub fn new() -> Self {
        Condition {
            state: Mutex::new(State {
                owner: NO_OWNER,
                waiting: VecDeque::new(),
                woken: Vec::new(),
                next_ticket: 0,
            }),
            free: Condvar::new(),
            signals: Condvar::new(),
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

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    fn acquire(&self, s: &mut MutexGuard<'_, State>) {
        while s.owner != NO_OWNER {
            self.free.wait(s);
        }
        s.owner = thread_token();
    }

    fn release(&self, s: &mut MutexGuard<'_, State>) {
        s.owner = NO_OWNER;
        self.free.notify_one();
    }

    fn check_held(&self, s: &State, op: &str) {
        if s.owner != thread_token() {
            crate::contract_violation!(
                "condition {:?}: `{}` called without holding its lock",
                self.label(),
                op
            );
        }
    }

    pub fn try_lock(&self) -> bool {
        let mut s = self.state.lock();
        if s.owner != NO_OWNER {
            return false;
        }
        s.owner = thread_token();
        true
    }

    pub fn lock_before(&self, deadline: Instant) -> bool {
        if Instant::now() >= deadline {
            return false;
        }
        let mut s = self.state.lock();
        while s.owner != NO_OWNER {
            if self.free.wait_until(&mut s, deadline).timed_out() && s.owner != NO_OWNER {
                return false;
            }
        }
        s.owner = thread_token();
        true
    }

    /// Block until signalled. The caller must hold the lock.
    pub fn wait(&self) {
        let mut s = self.state.lock();
        self.check_held(&s, "wait");
        self.release(&mut s);
        let ticket = s.park();
        while !s.take_wake(ticket) {
            self.signals.wait(&mut s);
        }
        self.acquire(&mut s);
    }

    /// Block until signalled or `deadline`. Returns `true` when woken by
    /// `signal`/`broadcast`, `false` on timeout. The lock is held again on
    /// return either way. A deadline already past returns `false` at once
    /// without releasing the lock.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut s = self.state.lock();
        self.check_held(&s, "wait_until");
        if Instant::now() >= deadline {
            return false;
        }
        self.release(&mut s);
        let ticket = s.park();
        let signalled = loop {
            if s.take_wake(ticket) {
                break true;
            }
            if self.signals.wait_until(&mut s, deadline).timed_out() {
                if s.take_wake(ticket) {
                    break true;
                }
                // Still queued, so no wake was spent on this waiter.
                s.waiting.retain(|t| *t != ticket);
                break false;
            }
        };
        self.acquire(&mut s);
        tracing::trace!(condition = ?self.name, signalled, "timed wait finished");
        signalled
    }

    /// Wake the longest-parked waiter, if any. Threads that start waiting
    /// afterwards never receive this wake.
    pub fn signal(&self) {
        let mut s = self.state.lock();
        if let Some(ticket) = s.waiting.pop_front() {
            s.woken.push(ticket);
            // Waiters check their own ticket, so every one must look.
            self.signals.notify_all();
        }
    }

    /// Wake every current waiter.
    pub fn broadcast(&self) {
        let mut s = self.state.lock();
        if s.waiting.is_empty() {
            return;
        }
        let parked: Vec<u64> = s.waiting.drain(..).collect();
        s.woken.extend(parked);
        self.signals.notify_all();
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::new()
    }
}

impl Locking for Condition {
    fn lock(&self) {
        let mut s = self.state.lock();
        if s.owner == thread_token() {
            crate::contract_violation!("condition {:?} locked twice by the same thread", self.label());
        }
        self.acquire(&mut s);
    }

    fn unlock(&self) {
        let mut s = self.state.lock();
        self.check_held(&s, "unlock");
        self.release(&mut s);
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.lock();
        f.debug_struct("Condition")
            .field("name", &self.name)
            .field("locked", &(s.owner != NO_OWNER))
            .field("waiters", &s.waiting.len())
            .finish()
    }
}
