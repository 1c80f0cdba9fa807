//! Overflow storage for long pool values

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Append-only file holding the tails of values that exceed the inline
/// prefix of a pool entry.
pub struct FlatFile {
    inner: Mutex<FlatInner>,
}

struct FlatInner {
    file: File,
    len: u64,
}

impl FlatFile {
    /// Open or create the file at `path`
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let len = file.metadata()?.len();
        debug!("Opened flat file {:?} ({} bytes)", path.as_ref(), len);
        Ok(Self {
            inner: Mutex::new(FlatInner { file, len }),
        })
    }

    /// Anonymous file removed when dropped
    pub fn temporary() -> io::Result<Self> {
        let file = tempfile::tempfile()?;
        Ok(Self {
            inner: Mutex::new(FlatInner { file, len: 0 }),
        })
    }

    /// Append `bytes` and return the offset they were written at.
    pub fn append(&self, bytes: &[u8]) -> io::Result<u64> {
        let mut inner = self.inner.lock();
        let offset = inner.len;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(bytes)?;
        inner.len += bytes.len() as u64;
        Ok(offset)
    }

    /// Read `len` bytes starting at `offset`.
    pub fn read(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        if offset + len as u64 > inner.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read of {} bytes at {} past end of flat file", len, offset),
            ));
        }
        let mut buf = vec![0u8; len];
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Current length in bytes
    pub fn len(&self) -> u64 {
        self.inner.lock().len
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard everything after `len`.
    pub fn truncate(&self, len: u64) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if len < inner.len {
            inner.file.set_len(len)?;
            inner.len = len;
        }
        Ok(())
    }

    /// Flush written data to stable storage.
    pub fn force(&self) -> io::Result<()> {
        self.inner.lock().file.sync_data()
    }
}
