//! Integer-addressed file of 64-bit slots

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

const SLOT_SIZE: u64 = 8;

/// A file of 8-byte values addressed by key.
///
/// Slot `k` lives at byte offset `8 * k`. The file is sparse, and slots that
/// were never written read as 0, so 0 doubles as "absent".
pub struct IntFile {
    file: File,
    len: u64,
}

impl IntFile {
    /// Anonymous file removed when dropped
    pub fn temporary() -> io::Result<Self> {
        Ok(Self {
            file: tempfile::tempfile()?,
            len: 0,
        })
    }

    /// Open or create the file at `path`
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    fn offset(key: u64) -> io::Result<u64> {
        key.checked_mul(SLOT_SIZE).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("key {} out of range", key))
        })
    }

    /// Store `value` under `key`.
    pub fn put_long(&mut self, key: u64, value: u64) -> io::Result<()> {
        let offset = Self::offset(key)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&value.to_le_bytes())?;
        self.len = self.len.max(offset + SLOT_SIZE);
        Ok(())
    }

    /// The value under `key`, 0 if never written.
    pub fn get_long(&mut self, key: u64) -> io::Result<u64> {
        let offset = Self::offset(key)?;
        if offset + SLOT_SIZE > self.len {
            return Ok(0);
        }
        let mut buf = [0u8; 8];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Forget every slot.
    pub fn clear(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.len = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unwritten_slots_read_zero() {
        let mut file = IntFile::temporary().unwrap();
        assert_eq!(file.get_long(5).unwrap(), 0);
        file.put_long(1000, 42).unwrap();
        assert_eq!(file.get_long(1000).unwrap(), 42);
        assert_eq!(file.get_long(999).unwrap(), 0);
        assert_eq!(file.get_long(1001).unwrap(), 0);
    }

    #[test]
    fn test_clear_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("map.int");
        {
            let mut file = IntFile::open(&path).unwrap();
            file.put_long(3, 7).unwrap();
        }
        let mut file = IntFile::open(&path).unwrap();
        assert_eq!(file.get_long(3).unwrap(), 7);
        file.clear().unwrap();
        assert_eq!(file.get_long(3).unwrap(), 0);
        assert!(file.put_long(u64::MAX, 1).is_err());
    }
}
