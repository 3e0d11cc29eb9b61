//! Debug-only reentrancy guard for set storage.
//!
//! Element equality and hashing may run arbitrary object code (custom
//! `ObjectProtocol` implementations). If that code reaches back into the
//! same storage while a probe or unlink is half done, the index and the
//! slot arena can disagree. In debug builds a nested entry panics with the
//! storage label; release builds compile the guard away.

use core::cell::Cell;
use core::marker::PhantomData;

/// Per-storage tracker. Public entry points open a section with
/// `let _g = self.reentrancy.enter();`.
#[derive(Debug)]
pub struct DebugReentrancy {
    #[cfg(debug_assertions)]
    depth: Cell<u32>,
    label: &'static str,
    // Storage is single-threaded; keep the guard !Send + !Sync too.
    _nosend: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub const fn new(label: &'static str) -> Self {
        Self {
            #[cfg(debug_assertions)]
            depth: Cell::new(0),
            label,
            _nosend: PhantomData,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Enter a guarded section. Panics in debug builds on nested entry.
    #[inline]
    pub fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let d = self.depth.get();
            if d != 0 {
                crate::contract_violation!(
                    "reentrant access to {} while an element callback is running",
                    self.label
                );
            }
            self.depth.set(d + 1);
            ReentrancyGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            ReentrancyGuard { _z: PhantomData }
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new("storage")
    }
}

/// RAII guard returned by [`DebugReentrancy::enter`].
pub struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let d = self.owner.depth.get();
            debug_assert!(d > 0);
            self.owner.depth.set(d - 1);
        }
    }
}
