use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Diagnostic recorded by a stream when `read`/`write` return -1, or when
/// it enters the error state. Retrieve it with `Stream::stream_error`.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),
    #[error("stream is not open")]
    NotOpen,
    #[error("stream is closed")]
    Closed,
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        StreamError::Io(Arc::new(err))
    }
}

impl StreamError {
    /// Kind of the underlying I/O error, if this is one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            StreamError::Io(e) => Some(e.kind()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn io_errors_keep_kind_and_source() {
        let e = StreamError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(e.io_kind(), Some(io::ErrorKind::NotFound));
        assert!(e.source().is_some());
        assert_eq!(e.to_string(), "I/O error: gone");
        assert_eq!(StreamError::Closed.io_kind(), None);
    }
}
