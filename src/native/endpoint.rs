//! Native stream endpoints: where a stream's bytes actually come from or
//! go to.
//!
//! Endpoints are plain `std::io` style objects. They know nothing about
//! stream status, delegates or run loops; `stream::native` layers the
//! state machine on top.

use crate::stream::{PropertyKey, PropertyValue};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

const DEFAULT_FILE_BUFFER: usize = 8 * 1024;

/// Source of bytes for an input stream.
pub trait ReadEndpoint: Send {
    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Read into `buf`; `Ok(0)` means end of input.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Whether a read would return data without blocking.
    fn has_bytes_available(&self) -> bool;

    /// Unread bytes already in memory. `None` if the endpoint keeps no such
    /// buffer or it is currently empty.
    fn buffered(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        let _ = key;
        None
    }

    fn set_property(&mut self, key: &PropertyKey, value: &PropertyValue) -> bool {
        let _ = (key, value);
        false
    }

    /// Release the native resource. An error is recorded on the stream,
    /// which closes regardless.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink for bytes from an output stream.
pub trait WriteEndpoint: Send {
    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Write from `buf`; `Ok(0)` for a non-empty `buf` means the sink is
    /// full.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn has_space_available(&self) -> bool;

    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        let _ = key;
        None
    }

    fn set_property(&mut self, key: &PropertyKey, value: &PropertyValue) -> bool {
        let _ = (key, value);
        false
    }

    /// Release the native resource. An error is recorded on the stream,
    /// which closes regardless.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory bytes.
#[derive(Debug, Default)]
pub struct DataSource {
    bytes: Vec<u8>,
    pos: usize,
}

impl DataSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        DataSource { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

impl ReadEndpoint for DataSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn has_bytes_available(&self) -> bool {
        self.remaining() > 0
    }

    fn buffered(&mut self) -> Option<&mut [u8]> {
        let rest = &mut self.bytes[self.pos..];
        (!rest.is_empty()).then_some(rest)
    }

    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        (*key == PropertyKey::FILE_CURRENT_OFFSET).then(|| PropertyValue::UInt(self.pos as u64))
    }

    fn set_property(&mut self, key: &PropertyKey, value: &PropertyValue) -> bool {
        if *key != PropertyKey::FILE_CURRENT_OFFSET {
            return false;
        }
        match value.as_u64().and_then(|v| usize::try_from(v).ok()) {
            Some(pos) if pos <= self.bytes.len() => {
                self.pos = pos;
                true
            }
            _ => false,
        }
    }
}

/// File opened for reading on `open`.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    capacity: usize,
    reader: Option<BufReader<File>>,
    offset: u64,
    eof: bool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource {
            path: path.into(),
            capacity: DEFAULT_FILE_BUFFER,
            reader: None,
            offset: 0,
            eof: false,
        }
    }
}

impl ReadEndpoint for FileSource {
    fn open(&mut self) -> io::Result<()> {
        let mut file = File::open(&self.path)?;
        if self.offset > 0 {
            file.seek(SeekFrom::Start(self.offset))?;
        }
        self.reader = Some(BufReader::with_capacity(self.capacity, file));
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "file source not open"))?;
        let n = reader.read(buf)?;
        self.offset += n as u64;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        Ok(n)
    }

    fn has_bytes_available(&self) -> bool {
        self.reader.is_some() && !self.eof
    }

    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        if *key == PropertyKey::FILE_CURRENT_OFFSET {
            Some(PropertyValue::UInt(self.offset))
        } else if *key == PropertyKey::BUFFER_SIZE_HINT {
            Some(PropertyValue::UInt(self.capacity as u64))
        } else {
            None
        }
    }

    fn set_property(&mut self, key: &PropertyKey, value: &PropertyValue) -> bool {
        let Some(v) = value.as_u64() else {
            return false;
        };
        if *key == PropertyKey::FILE_CURRENT_OFFSET {
            match self.reader.as_mut() {
                Some(r) => match r.seek(SeekFrom::Start(v)) {
                    Ok(_) => {
                        self.offset = v;
                        self.eof = false;
                        true
                    }
                    Err(_) => false,
                },
                None => {
                    self.offset = v;
                    true
                }
            }
        } else if *key == PropertyKey::BUFFER_SIZE_HINT && self.reader.is_none() && v > 0 {
            self.capacity = usize::try_from(v).unwrap_or(DEFAULT_FILE_BUFFER);
            true
        } else {
            false
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.reader = None;
        Ok(())
    }
}

/// Growable in-memory sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    bytes: Vec<u8>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }
}

impl WriteEndpoint for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn has_space_available(&self) -> bool {
        true
    }

    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        (*key == PropertyKey::DATA_WRITTEN_TO_MEMORY).then(|| PropertyValue::Data(self.bytes.clone()))
    }
}

/// Fixed-capacity in-memory sink. Writes past capacity are truncated, and
/// a write into a full sink transfers nothing.
#[derive(Debug)]
pub struct BufferSink {
    bytes: Vec<u8>,
    capacity: usize,
}

impl BufferSink {
    pub fn new(capacity: usize) -> Self {
        BufferSink {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.bytes
    }
}

impl WriteEndpoint for BufferSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.capacity - self.bytes.len());
        self.bytes.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn has_space_available(&self) -> bool {
        self.bytes.len() < self.capacity
    }

    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        (*key == PropertyKey::DATA_WRITTEN_TO_MEMORY).then(|| PropertyValue::Data(self.bytes.clone()))
    }
}

/// File created (or appended to) on `open`.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    append: bool,
    writer: Option<BufWriter<File>>,
    offset: u64,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, append: bool) -> Self {
        FileSink {
            path: path.into(),
            append,
            writer: None,
            offset: 0,
        }
    }
}

impl WriteEndpoint for FileSink {
    fn open(&mut self) -> io::Result<()> {
        let mut options = OpenOptions::new();
        options.create(true);
        if self.append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let mut file = options.open(&self.path)?;
        self.offset = file.seek(SeekFrom::End(0))?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "file sink not open"))?;
        let n = writer.write(buf)?;
        self.offset += n as u64;
        Ok(n)
    }

    fn has_space_available(&self) -> bool {
        self.writer.is_some()
    }

    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        if *key == PropertyKey::FILE_CURRENT_OFFSET {
            Some(PropertyValue::UInt(self.offset))
        } else if *key == PropertyKey::APPEND_TO_FILE {
            Some(PropertyValue::Bool(self.append))
        } else {
            None
        }
    }

    fn set_property(&mut self, key: &PropertyKey, value: &PropertyValue) -> bool {
        if *key == PropertyKey::APPEND_TO_FILE && self.writer.is_none() {
            match value.as_bool() {
                Some(b) => {
                    self.append = b;
                    true
                }
                None => false,
            }
        } else {
            false
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut w) => w.flush().map_err(|err| {
                tracing::warn!(path = %self.path.display(), %err, "flush on close failed");
                err
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_reads_and_peeks() {
        let mut s = DataSource::new(b"hello".to_vec());
        let mut buf = [0u8; 3];
        assert_eq!(s.read(&mut buf).unwrap(), 3);
        assert_eq!(s.buffered().map(|b| b.to_vec()), Some(b"lo".to_vec()));
        assert_eq!(s.read(&mut buf).unwrap(), 2);
        assert!(s.buffered().is_none());
        assert_eq!(s.read(&mut buf).unwrap(), 0);
        assert!(s.set_property(&PropertyKey::FILE_CURRENT_OFFSET, &PropertyValue::UInt(1)));
        assert!(!s.set_property(&PropertyKey::FILE_CURRENT_OFFSET, &PropertyValue::UInt(99)));
        assert_eq!(s.remaining(), 4);
    }

    #[test]
    fn buffer_sink_fills_up() {
        let mut s = BufferSink::new(4);
        assert_eq!(s.write(b"abc").unwrap(), 3);
        assert_eq!(s.write(b"de").unwrap(), 1);
        assert_eq!(s.write(b"f").unwrap(), 0);
        assert!(!s.has_space_available());
        assert_eq!(s.contents(), b"abcd");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn flush_failure_surfaces_on_close() {
        let full = std::path::Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let mut sink = FileSink::new(full, false);
        sink.open().unwrap();
        // Small writes stay in the buffer until close.
        assert_eq!(sink.write(b"xyz").unwrap(), 3);
        assert!(sink.close().is_err());
        assert!(sink.close().is_ok());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut sink = FileSink::new(&path, false);
        sink.open().unwrap();
        assert_eq!(sink.write(b"xyz").unwrap(), 3);
        sink.close().unwrap();
        let mut src = FileSource::new(&path);
        src.open().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(src.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"xyz");
        assert_eq!(src.read(&mut buf).unwrap(), 0);
        assert!(!src.has_bytes_available());
        assert_eq!(
            src.property(&PropertyKey::FILE_CURRENT_OFFSET),
            Some(PropertyValue::UInt(3))
        );
    }
}
