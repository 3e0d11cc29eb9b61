//! Process-wide delegate context registry.
//!
//! A scheduled stream with a delegate owns exactly one context key. Event
//! delivery goes key -> registration -> (weak delegate, weak stream); the
//! table is guarded by its own mutex, separate from every stream's lock,
//! and is never held while a delegate runs.

use super::{AnyStream, StreamDelegate, StreamEvent};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use std::sync::{Arc, Weak};

new_key_type! {
    /// Opaque callback context handed to a native stream.
    pub struct ContextKey;
}

/// Rebuilds a handle to the registered stream if it is still alive.
pub(crate) type StreamResolver = Box<dyn Fn() -> Option<AnyStream> + Send>;

struct Registration {
    delegate: Weak<dyn StreamDelegate>,
    stream: StreamResolver,
}

#[derive(Default)]
struct DelegateRegistry {
    contexts: SlotMap<ContextKey, Registration>,
}

static REGISTRY: Lazy<Mutex<DelegateRegistry>> = Lazy::new(|| Mutex::new(DelegateRegistry::default()));

pub(crate) fn register(delegate: Weak<dyn StreamDelegate>, stream: StreamResolver) -> ContextKey {
    let key = REGISTRY
        .lock()
        .contexts
        .insert(Registration { delegate, stream });
    tracing::debug!(?key, "delegate context registered");
    key
}

/// Point an existing context at a different delegate.
pub(crate) fn update(key: ContextKey, delegate: Weak<dyn StreamDelegate>) {
    if let Some(reg) = REGISTRY.lock().contexts.get_mut(key) {
        reg.delegate = delegate;
    }
}

pub(crate) fn deregister(key: ContextKey) {
    let removed = REGISTRY.lock().contexts.remove(key);
    if removed.is_some() {
        tracing::debug!(?key, "delegate context deregistered");
    }
    // The resolver closure is dropped here, outside the registry lock.
    drop(removed);
}

pub fn is_registered(key: ContextKey) -> bool {
    REGISTRY.lock().contexts.contains_key(key)
}

/// Number of live contexts in the process.
pub fn registered_count() -> usize {
    REGISTRY.lock().contexts.len()
}

/// Forward `event` to the delegate behind `key`. Returns whether a
/// delegate received it.
pub(crate) fn dispatch(key: ContextKey, event: StreamEvent) -> bool {
    // Upgraded handles may be the last ones and must drop after the lock:
    // a dying stream deregisters itself.
    let (delegate, stream): (Option<Arc<dyn StreamDelegate>>, Option<AnyStream>) = {
        let registry = REGISTRY.lock();
        match registry.contexts.get(key) {
            None => (None, None),
            Some(reg) => (reg.delegate.upgrade(), (reg.stream)()),
        }
    };
    match (delegate, stream) {
        (Some(delegate), Some(stream)) => {
            tracing::trace!(?key, ?event, "delivering stream event");
            delegate.stream_event(&stream, event);
            true
        }
        _ => {
            tracing::warn!(?key, ?event, "stream event dropped: no live delegate");
            false
        }
    }
}
