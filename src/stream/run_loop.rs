//! Minimal cooperative run loop that drives scheduled streams.
//!
//! The owner calls [`RunLoop::run_once`] (or `run_until_idle`) from its own
//! thread; each pass gives every source scheduled in a matching mode one
//! chance to deliver pending events. Sources are held weakly, so a stream
//! dropped without `close` simply disappears from the loop.

use parking_lot::Mutex;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Weak};

/// Something a run loop polls.
pub(crate) trait RunLoopSource: Send + Sync {
    /// Deliver whatever is pending. Returns whether anything happened.
    fn perform(&self) -> bool;
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RunLoopMode(Cow<'static, str>);

impl RunLoopMode {
    pub const DEFAULT: RunLoopMode = RunLoopMode(Cow::Borrowed("default"));
    /// Sources in the common mode run in every mode.
    pub const COMMON: RunLoopMode = RunLoopMode(Cow::Borrowed("common"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        RunLoopMode(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn admits(&self, running: &RunLoopMode) -> bool {
        self == running || *self == RunLoopMode::COMMON
    }
}

struct Entry {
    owner: u64,
    mode: RunLoopMode,
    source: Weak<dyn RunLoopSource>,
}

#[derive(Default)]
struct Inner {
    sources: Mutex<Vec<Entry>>,
}

/// Handle to a run loop; clones share it.
#[derive(Clone, Default)]
pub struct RunLoop {
    inner: Arc<Inner>,
}

impl RunLoop {
    pub fn new() -> Self {
        RunLoop::default()
    }

    pub fn ptr_eq(&self, other: &RunLoop) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register `source` for `owner` in `mode`. Re-adding the same pair is
    /// ignored.
    pub(crate) fn add_source(&self, owner: u64, mode: RunLoopMode, source: Weak<dyn RunLoopSource>) {
        let mut sources = self.inner.sources.lock();
        if sources.iter().any(|e| e.owner == owner && e.mode == mode) {
            return;
        }
        sources.push(Entry {
            owner,
            mode,
            source,
        });
    }

    pub(crate) fn remove_source(&self, owner: u64, mode: &RunLoopMode) {
        self.inner
            .sources
            .lock()
            .retain(|e| !(e.owner == owner && e.mode == *mode));
    }

    pub(crate) fn remove_owner(&self, owner: u64) {
        self.inner.sources.lock().retain(|e| e.owner != owner);
    }

    /// Entries still in the table, dead or alive.
    #[cfg(test)]
    pub(crate) fn entry_count(&self) -> usize {
        self.inner.sources.lock().len()
    }

    /// Number of live scheduled sources, across all modes.
    pub fn source_count(&self) -> usize {
        self.inner
            .sources
            .lock()
            .iter()
            .filter(|e| e.source.strong_count() > 0)
            .count()
    }

    /// One pass over the sources admitted by `mode`. Returns how many did
    /// work. Sources run with the loop's lock released, so they may
    /// schedule or unschedule themselves.
    pub fn run_once(&self, mode: &RunLoopMode) -> usize {
        let ready: Vec<Arc<dyn RunLoopSource>> = {
            let mut sources = self.inner.sources.lock();
            sources.retain(|e| e.source.strong_count() > 0);
            let mut seen = Vec::new();
            sources
                .iter()
                .filter(|e| e.mode.admits(mode))
                .filter(|e| {
                    // A stream scheduled in both the running and the common
                    // mode is polled once per pass.
                    if seen.contains(&e.owner) {
                        false
                    } else {
                        seen.push(e.owner);
                        true
                    }
                })
                .filter_map(|e| e.source.upgrade())
                .collect()
        };
        ready.iter().filter(|s| s.perform()).count()
    }

    /// Run passes until one does no work. Returns the total work count.
    pub fn run_until_idle(&self, mode: &RunLoopMode) -> usize {
        let mut total = 0;
        loop {
            let n = self.run_once(mode);
            if n == 0 {
                return total;
            }
            total += n;
        }
    }
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoop")
            .field("sources", &self.source_count())
            .finish()
    }
}
