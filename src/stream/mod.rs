//! Stream state machine.
//!
//! ```text
//! NotOpen -> Opening -> Open <-> {Reading | Writing}
//!                        |
//!                        +-> AtEnd | Error      (from any active state)
//! any state -> Closed
//! ```
//!
//! I/O never panics and never returns `Err`: `read`/`write` return a byte
//! count, 0 for end/full, or -1 with the diagnostic left in
//! [`Stream::stream_error`]. Readiness changes reach a [`StreamDelegate`]
//! once the stream is scheduled on a [`RunLoop`](run_loop::RunLoop).

pub mod delegate;
pub mod native;
pub mod run_loop;

use crate::bridge::store;
use crate::error::StreamError;
use crate::object::Object;
use bitflags::bitflags;
use parking_lot::MappedMutexGuard;
use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use self::native::{NativeInputStream, NativeOutputStream};
use self::run_loop::{RunLoop, RunLoopMode};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StreamStatus {
    NotOpen,
    Opening,
    Open,
    Reading,
    Writing,
    AtEnd,
    Closed,
    Error,
}

impl StreamStatus {
    /// Open, or in the middle of a transfer.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            StreamStatus::Opening | StreamStatus::Open | StreamStatus::Reading | StreamStatus::Writing
        )
    }
}

bitflags! {
    /// Readiness notifications delivered to a [`StreamDelegate`].
    ///
    /// Each callback carries exactly one flag; the set form is used for
    /// bookkeeping.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct StreamEvent: u32 {
        const OPEN_COMPLETED = 1 << 0;
        const HAS_BYTES_AVAILABLE = 1 << 1;
        const HAS_SPACE_AVAILABLE = 1 << 2;
        const ERROR_OCCURRED = 1 << 3;
        const END_ENCOUNTERED = 1 << 4;
    }
}

/// String identifier for an out-of-band stream property.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PropertyKey(Cow<'static, str>);

impl PropertyKey {
    /// Read/write position of a file or memory stream, as `UInt`.
    pub const FILE_CURRENT_OFFSET: PropertyKey = PropertyKey::from_static("file-current-offset");
    /// Bytes written so far by a memory sink, as `Data`.
    pub const DATA_WRITTEN_TO_MEMORY: PropertyKey =
        PropertyKey::from_static("data-written-to-memory");
    /// Open a file sink in append mode, as `Bool`. Only before `open`.
    pub const APPEND_TO_FILE: PropertyKey = PropertyKey::from_static("append-to-file");
    pub const SOCKET_SECURITY_LEVEL: PropertyKey =
        PropertyKey::from_static("socket-security-level");
    pub const SOCKS_PROXY_CONFIGURATION: PropertyKey =
        PropertyKey::from_static("socks-proxy-configuration");
    /// Preferred transfer chunk size, as `UInt`.
    pub const BUFFER_SIZE_HINT: PropertyKey = PropertyKey::from_static("buffer-size-hint");

    pub const fn from_static(name: &'static str) -> Self {
        PropertyKey(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        PropertyKey(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value carried by a stream property.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    String(String),
    Data(Vec<u8>),
}

impl PropertyValue {
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            PropertyValue::UInt(v) => Some(v),
            PropertyValue::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            PropertyValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Box the value into the object model.
    pub fn into_object(self) -> Object {
        match self {
            PropertyValue::Bool(b) => store(b),
            PropertyValue::Int(v) => store(v),
            PropertyValue::UInt(v) => store(v),
            PropertyValue::String(s) => store(s),
            PropertyValue::Data(d) => store(d),
        }
    }
}

/// Receives readiness events for streams it is attached to.
///
/// Streams hold their delegate weakly. Callbacks run on whichever thread
/// drives the run loop, with no stream or registry lock held, so the
/// delegate may call straight back into the stream.
pub trait StreamDelegate: Send + Sync {
    fn stream_event(&self, stream: &AnyStream, event: StreamEvent);
}

/// Operations every stream supports.
pub trait Stream: Send + Sync {
    /// Leave `NotOpen`. Calling it again is ignored.
    fn open(&self);

    /// Release the endpoint and deregister from every run loop. Idempotent.
    fn close(&self);

    fn status(&self) -> StreamStatus;

    /// Diagnostic behind the most recent failure.
    fn stream_error(&self) -> Option<StreamError>;

    /// Unknown keys yield `None`.
    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        let _ = key;
        None
    }

    /// Unknown or unsupported keys yield `false`.
    fn set_property(&self, value: PropertyValue, key: &PropertyKey) -> bool {
        let _ = (value, key);
        false
    }

    fn schedule(&self, run_loop: &RunLoop, mode: RunLoopMode);

    fn remove_from(&self, run_loop: &RunLoop, mode: RunLoopMode);

    /// Attach a delegate, held weakly. `None` detaches.
    fn set_delegate(&self, delegate: Option<&Arc<dyn StreamDelegate>>);

    fn delegate(&self) -> Option<Arc<dyn StreamDelegate>>;
}

/// Zero-copy view of bytes buffered inside an input stream.
///
/// Holds the stream's internal lock: drop it before the next operation on
/// the same stream.
pub struct BufferRef<'a>(pub(crate) MappedMutexGuard<'a, [u8]>);

impl Deref for BufferRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for BufferRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferRef({} bytes)", self.0.len())
    }
}

pub trait InputStream: Stream {
    /// Read into `buf`. Positive: bytes read; 0: end of stream; -1: failure.
    fn read(&self, buf: &mut [u8]) -> isize;

    /// Peek at internally buffered bytes without copying. `None` when the
    /// stream has no such buffer.
    fn get_buffer(&self) -> Option<BufferRef<'_>> {
        None
    }

    fn has_bytes_available(&self) -> bool;
}

pub trait OutputStream: Stream {
    /// Write from `buf`. Positive: bytes written; 0: fixed-capacity sink is
    /// full; -1: failure.
    fn write(&self, buf: &[u8]) -> isize;

    fn has_space_available(&self) -> bool;
}

/// The stream an event refers to.
#[derive(Clone, Debug)]
pub enum AnyStream {
    Input(NativeInputStream),
    Output(NativeOutputStream),
}

impl AnyStream {
    pub fn as_stream(&self) -> &dyn Stream {
        match self {
            AnyStream::Input(s) => s,
            AnyStream::Output(s) => s,
        }
    }

    pub fn as_input(&self) -> Option<&NativeInputStream> {
        match self {
            AnyStream::Input(s) => Some(s),
            AnyStream::Output(_) => None,
        }
    }

    pub fn as_output(&self) -> Option<&NativeOutputStream> {
        match self {
            AnyStream::Output(s) => Some(s),
            AnyStream::Input(_) => None,
        }
    }

    pub fn status(&self) -> StreamStatus {
        self.as_stream().status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::fetch;

    #[test]
    fn property_values_bridge() {
        assert_eq!(fetch::<u64>(&PropertyValue::UInt(9).into_object()), Some(9));
        assert_eq!(
            fetch::<String>(&PropertyValue::String("p".into()).into_object()).as_deref(),
            Some("p")
        );
        assert_eq!(PropertyValue::Int(-1).as_u64(), None);
        assert_eq!(PropertyValue::Bool(true).as_bool(), Some(true));
    }

    #[test]
    fn keys_compare_by_name() {
        assert_eq!(
            PropertyKey::new("buffer-size-hint".to_string()),
            PropertyKey::BUFFER_SIZE_HINT
        );
        assert_eq!(PropertyKey::APPEND_TO_FILE.as_str(), "append-to-file");
    }

    #[test]
    fn events_combine() {
        let e = StreamEvent::OPEN_COMPLETED | StreamEvent::END_ENCOUNTERED;
        assert!(e.contains(StreamEvent::END_ENCOUNTERED));
        assert_eq!((e - StreamEvent::OPEN_COMPLETED).bits(), 16);
    }
}
