//! Streams backed by a native endpoint.
//!
//! Both directions share one generic core: status, last error, weak
//! delegate, delegate context and run-loop schedules live next to the
//! endpoint behind a single mutex. Delegate callbacks and run-loop
//! registration always happen after that mutex is released.

use super::delegate::{self, ContextKey, StreamResolver};
use super::run_loop::{RunLoop, RunLoopMode, RunLoopSource};
use super::{
    AnyStream, BufferRef, InputStream, OutputStream, PropertyKey, PropertyValue, Stream,
    StreamDelegate, StreamEvent, StreamStatus,
};
use crate::error::StreamError;
use crate::native::endpoint::{
    BufferSink, DataSource, FileSource, FileSink, MemorySink, ReadEndpoint, WriteEndpoint,
};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Direction-specific glue between the shared core and an endpoint.
pub(crate) trait Endpoint: Send + 'static {
    const NAME: &'static str;

    fn open(&mut self) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
    /// Readiness event for an open stream, if any.
    fn readiness(&mut self) -> StreamEvent;
    fn property(&self, key: &PropertyKey) -> Option<PropertyValue>;
    fn set_property(&mut self, key: &PropertyKey, value: &PropertyValue) -> bool;
    fn wrap(shared: Arc<Shared<Self>>) -> AnyStream
    where
        Self: Sized;
}

impl Endpoint for Box<dyn ReadEndpoint> {
    const NAME: &'static str = "input";

    fn open(&mut self) -> io::Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }

    // A read never blocks once open, including at end of input, so an open
    // input stream is always readable. The read that hits the end moves it
    // to `AtEnd`.
    fn readiness(&mut self) -> StreamEvent {
        StreamEvent::HAS_BYTES_AVAILABLE
    }

    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        (**self).property(key)
    }

    fn set_property(&mut self, key: &PropertyKey, value: &PropertyValue) -> bool {
        (**self).set_property(key, value)
    }

    fn wrap(shared: Arc<Shared<Self>>) -> AnyStream {
        AnyStream::Input(NativeInputStream { shared })
    }
}

impl Endpoint for Box<dyn WriteEndpoint> {
    const NAME: &'static str = "output";

    fn open(&mut self) -> io::Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }

    fn readiness(&mut self) -> StreamEvent {
        if self.has_space_available() {
            StreamEvent::HAS_SPACE_AVAILABLE
        } else {
            StreamEvent::empty()
        }
    }

    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        (**self).property(key)
    }

    fn set_property(&mut self, key: &PropertyKey, value: &PropertyValue) -> bool {
        (**self).set_property(key, value)
    }

    fn wrap(shared: Arc<Shared<Self>>) -> AnyStream {
        AnyStream::Output(NativeOutputStream { shared })
    }
}

pub(crate) struct Core<E> {
    status: StreamStatus,
    error: Option<StreamError>,
    delegate: Option<Weak<dyn StreamDelegate>>,
    context: Option<ContextKey>,
    schedules: Vec<(RunLoop, RunLoopMode)>,
    /// Events already delivered and not re-armed since.
    delivered: StreamEvent,
    /// Open finished but `OPEN_COMPLETED` not yet delivered.
    open_pending: bool,
    endpoint: E,
}

impl<E> Core<E> {
    /// Complete a scheduled open early; the event still goes out on the
    /// next run-loop pass, ahead of any other.
    fn finish_open(&mut self) {
        if self.status == StreamStatus::Opening {
            self.status = StreamStatus::Open;
            self.open_pending = true;
        }
    }

    fn fail(&mut self, err: StreamError) {
        tracing::debug!(%err, "stream failed");
        self.status = StreamStatus::Error;
        self.error = Some(err);
    }

    /// Check that I/O may be attempted; records why not otherwise.
    fn usable(&mut self) -> Result<(), isize> {
        match self.status {
            StreamStatus::Opening | StreamStatus::Open => Ok(()),
            StreamStatus::AtEnd => Err(0),
            StreamStatus::NotOpen => {
                self.error = Some(StreamError::NotOpen);
                Err(-1)
            }
            StreamStatus::Closed => {
                self.error = Some(StreamError::Closed);
                Err(-1)
            }
            StreamStatus::Error | StreamStatus::Reading | StreamStatus::Writing => Err(-1),
        }
    }
}

pub(crate) struct Shared<E> {
    id: u64,
    core: Mutex<Core<E>>,
}

impl<E: Endpoint> Shared<E> {
    fn new(endpoint: E) -> Arc<Self> {
        Arc::new(Shared {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            core: Mutex::new(Core {
                status: StreamStatus::NotOpen,
                error: None,
                delegate: None,
                context: None,
                schedules: Vec::new(),
                delivered: StreamEvent::empty(),
                open_pending: false,
                endpoint,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Core<E>> {
        self.core.lock()
    }

    fn resolver(self: &Arc<Self>) -> StreamResolver {
        let weak = Arc::downgrade(self);
        Box::new(move || weak.upgrade().map(E::wrap))
    }

    fn open(self: &Arc<Self>) {
        let mut core = self.lock();
        if core.status != StreamStatus::NotOpen {
            tracing::debug!(id = self.id, status = ?core.status, "open ignored");
            return;
        }
        match core.endpoint.open() {
            Ok(()) => {
                // A scheduled stream reports completion from the run loop.
                core.status = if core.schedules.is_empty() {
                    StreamStatus::Open
                } else {
                    StreamStatus::Opening
                };
                tracing::debug!(id = self.id, kind = E::NAME, status = ?core.status, "stream opened");
            }
            Err(err) => core.fail(err.into()),
        }
    }

    fn close(self: &Arc<Self>) {
        let (context, schedules) = {
            let mut core = self.lock();
            if core.status == StreamStatus::Closed {
                return;
            }
            let closed = core.endpoint.close();
            core.status = StreamStatus::Closed;
            if let Err(err) = closed {
                core.error = Some(err.into());
            }
            (core.context.take(), std::mem::take(&mut core.schedules))
        };
        if let Some(key) = context {
            delegate::deregister(key);
        }
        for (run_loop, _) in schedules {
            run_loop.remove_owner(self.id);
        }
        tracing::debug!(id = self.id, kind = E::NAME, "stream closed");
    }

    fn schedule(self: &Arc<Self>, run_loop: &RunLoop, mode: RunLoopMode) {
        {
            let mut core = self.lock();
            if core.status == StreamStatus::Closed {
                return;
            }
            let known = core
                .schedules
                .iter()
                .any(|(rl, m)| rl.ptr_eq(run_loop) && *m == mode);
            if !known {
                core.schedules.push((run_loop.clone(), mode.clone()));
            }
            if core.context.is_none() {
                if let Some(d) = core.delegate.clone() {
                    core.context = Some(delegate::register(d, self.resolver()));
                }
            }
        }
        let this: Arc<dyn RunLoopSource> = self.clone();
        run_loop.add_source(self.id, mode, Arc::downgrade(&this));
    }

    fn remove_from(self: &Arc<Self>, run_loop: &RunLoop, mode: RunLoopMode) {
        let context = {
            let mut core = self.lock();
            core.schedules
                .retain(|(rl, m)| !(rl.ptr_eq(run_loop) && *m == mode));
            if core.schedules.is_empty() {
                core.context.take()
            } else {
                None
            }
        };
        run_loop.remove_source(self.id, &mode);
        if let Some(key) = context {
            delegate::deregister(key);
        }
    }

    fn set_delegate(self: &Arc<Self>, new: Option<&Arc<dyn StreamDelegate>>) {
        let weak = new.map(Arc::downgrade);
        let mut core = self.lock();
        core.delegate = weak.clone();
        match (weak, core.context) {
            (Some(d), Some(key)) => delegate::update(key, d),
            (Some(d), None) if !core.schedules.is_empty() => {
                core.context = Some(delegate::register(d, self.resolver()));
            }
            (None, Some(key)) => {
                core.context = None;
                drop(core);
                delegate::deregister(key);
            }
            _ => {}
        }
    }

    fn delegate(&self) -> Option<Arc<dyn StreamDelegate>> {
        self.lock().delegate.as_ref().and_then(Weak::upgrade)
    }

    fn status(&self) -> StreamStatus {
        self.lock().status
    }

    fn stream_error(&self) -> Option<StreamError> {
        self.lock().error.clone()
    }

    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        self.lock().endpoint.property(key)
    }

    fn set_property(&self, value: PropertyValue, key: &PropertyKey) -> bool {
        self.lock().endpoint.set_property(key, &value)
    }

    fn context(&self) -> Option<ContextKey> {
        self.lock().context
    }
}

// A stream dropped without `close` still gives back its context and its
// run-loop slots.
impl<E> Drop for Shared<E> {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        if let Some(key) = core.context.take() {
            delegate::deregister(key);
        }
        for (run_loop, _) in core.schedules.drain(..) {
            run_loop.remove_owner(self.id);
        }
    }
}

impl<E: Endpoint> RunLoopSource for Shared<E> {
    fn perform(&self) -> bool {
        let (opened, fresh, context) = {
            let mut core = self.lock();
            let opened = core.status == StreamStatus::Opening;
            core.finish_open();
            let mut events = if core.open_pending {
                StreamEvent::OPEN_COMPLETED
            } else {
                StreamEvent::empty()
            };
            events |= match core.status {
                StreamStatus::Open => core.endpoint.readiness(),
                StreamStatus::AtEnd => StreamEvent::END_ENCOUNTERED,
                StreamStatus::Error => StreamEvent::ERROR_OCCURRED,
                _ => StreamEvent::empty(),
            };
            let Some(context) = core.context else {
                // Nobody to tell yet; keep the events armed.
                return opened;
            };
            core.open_pending = false;
            let fresh = events - core.delivered;
            core.delivered |= fresh;
            (opened, fresh, context)
        };
        for event in fresh.iter() {
            delegate::dispatch(context, event);
        }
        opened || !fresh.is_empty()
    }
}

/// Input stream over a [`ReadEndpoint`].
#[derive(Clone)]
pub struct NativeInputStream {
    shared: Arc<Shared<Box<dyn ReadEndpoint>>>,
}

impl NativeInputStream {
    pub fn from_endpoint(endpoint: impl ReadEndpoint + 'static) -> Self {
        let endpoint: Box<dyn ReadEndpoint> = Box::new(endpoint);
        NativeInputStream {
            shared: Shared::new(endpoint),
        }
    }

    /// Stream over an in-memory copy of `bytes`.
    pub fn with_data(bytes: impl Into<Vec<u8>>) -> Self {
        NativeInputStream::from_endpoint(DataSource::new(bytes.into()))
    }

    /// Stream over the file at `path`, opened by `open`.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        NativeInputStream::from_endpoint(FileSource::new(path))
    }

    /// Delegate context currently registered for this stream.
    pub fn delegate_context(&self) -> Option<ContextKey> {
        self.shared.context()
    }

    pub fn ptr_eq(&self, other: &NativeInputStream) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

/// Output stream over a [`WriteEndpoint`].
#[derive(Clone)]
pub struct NativeOutputStream {
    shared: Arc<Shared<Box<dyn WriteEndpoint>>>,
}

impl NativeOutputStream {
    pub fn from_endpoint(endpoint: impl WriteEndpoint + 'static) -> Self {
        let endpoint: Box<dyn WriteEndpoint> = Box::new(endpoint);
        NativeOutputStream {
            shared: Shared::new(endpoint),
        }
    }

    /// Growable in-memory sink; read it back through
    /// [`PropertyKey::DATA_WRITTEN_TO_MEMORY`].
    pub fn to_memory() -> Self {
        NativeOutputStream::from_endpoint(MemorySink::new())
    }

    /// Sink that holds at most `capacity` bytes.
    pub fn to_buffer(capacity: usize) -> Self {
        NativeOutputStream::from_endpoint(BufferSink::new(capacity))
    }

    pub fn to_file(path: impl Into<PathBuf>, append: bool) -> Self {
        NativeOutputStream::from_endpoint(FileSink::new(path, append))
    }

    /// Bytes captured by a memory or buffer sink.
    pub fn written_data(&self) -> Option<Vec<u8>> {
        match self.property(&PropertyKey::DATA_WRITTEN_TO_MEMORY) {
            Some(PropertyValue::Data(d)) => Some(d),
            _ => None,
        }
    }

    pub fn delegate_context(&self) -> Option<ContextKey> {
        self.shared.context()
    }

    pub fn ptr_eq(&self, other: &NativeOutputStream) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

macro_rules! forward_stream {
    ($t:ty) => {
        impl Stream for $t {
            fn open(&self) {
                self.shared.open()
            }
            fn close(&self) {
                self.shared.close()
            }
            fn status(&self) -> StreamStatus {
                self.shared.status()
            }
            fn stream_error(&self) -> Option<StreamError> {
                self.shared.stream_error()
            }
            fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
                self.shared.property(key)
            }
            fn set_property(&self, value: PropertyValue, key: &PropertyKey) -> bool {
                self.shared.set_property(value, key)
            }
            fn schedule(&self, run_loop: &RunLoop, mode: RunLoopMode) {
                self.shared.schedule(run_loop, mode)
            }
            fn remove_from(&self, run_loop: &RunLoop, mode: RunLoopMode) {
                self.shared.remove_from(run_loop, mode)
            }
            fn set_delegate(&self, delegate: Option<&Arc<dyn StreamDelegate>>) {
                self.shared.set_delegate(delegate)
            }
            fn delegate(&self) -> Option<Arc<dyn StreamDelegate>> {
                self.shared.delegate()
            }
        }

        impl fmt::Debug for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($t))
                    .field("id", &self.shared.id)
                    .field("status", &self.status())
                    .finish()
            }
        }
    };
}

forward_stream!(NativeInputStream);
forward_stream!(NativeOutputStream);

impl InputStream for NativeInputStream {
    fn read(&self, buf: &mut [u8]) -> isize {
        let mut core = self.shared.lock();
        if let Err(sentinel) = core.usable() {
            return sentinel;
        }
        core.finish_open();
        if buf.is_empty() {
            return 0;
        }
        core.status = StreamStatus::Reading;
        let result = core.endpoint.read(buf);
        core.delivered.remove(StreamEvent::HAS_BYTES_AVAILABLE);
        match result {
            Ok(0) => {
                core.status = StreamStatus::AtEnd;
                tracing::trace!(id = self.shared.id, "end of input");
                0
            }
            Ok(n) => {
                core.status = StreamStatus::Open;
                n as isize
            }
            Err(err) => {
                core.fail(err.into());
                -1
            }
        }
    }

    fn get_buffer(&self) -> Option<BufferRef<'_>> {
        let core = self.shared.lock();
        if core.status != StreamStatus::Open {
            return None;
        }
        MutexGuard::try_map(core, |c| c.endpoint.buffered())
            .ok()
            .map(BufferRef)
    }

    fn has_bytes_available(&self) -> bool {
        let core = self.shared.lock();
        core.status == StreamStatus::Open && core.endpoint.has_bytes_available()
    }
}

impl OutputStream for NativeOutputStream {
    fn write(&self, buf: &[u8]) -> isize {
        let mut core = self.shared.lock();
        if let Err(sentinel) = core.usable() {
            return sentinel;
        }
        core.finish_open();
        if buf.is_empty() {
            return 0;
        }
        core.status = StreamStatus::Writing;
        let result = core.endpoint.write(buf);
        core.delivered.remove(StreamEvent::HAS_SPACE_AVAILABLE);
        match result {
            Ok(0) => {
                core.status = StreamStatus::AtEnd;
                tracing::trace!(id = self.shared.id, "output full");
                0
            }
            Ok(n) => {
                core.status = StreamStatus::Open;
                n as isize
            }
            Err(err) => {
                core.fail(err.into());
                -1
            }
        }
    }

    fn has_space_available(&self) -> bool {
        let core = self.shared.lock();
        core.status == StreamStatus::Open && core.endpoint.has_space_available()
    }
}
