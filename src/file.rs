//! Storage file handle
//!
//! Owns the single `File` behind a database. All physical access is
//! positioned (pread/pwrite style) so gated readers and the batch writer
//! never contend on a shared cursor.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// The one open handle to a basalt storage file
#[derive(Debug)]
pub struct StorageFile {
    file: File,
    path: PathBuf,
}

impl StorageFile {
    /// Open or create the storage file.
    ///
    /// Returns the handle plus `true` when the file is fresh (newly created
    /// or zero bytes); recovery only runs for non-fresh files.
    pub fn open(path: &Path) -> Result<(Self, bool)> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let fresh = file.metadata()?.len() == 0;

        Ok((
            Self {
                file,
                path: path.to_path_buf(),
            },
            fresh,
        ))
    }

    /// Read exactly `buf.len()` bytes starting at `offset`.
    #[cfg(unix)]
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        use std::os::unix::fs::FileExt;
        // pread does not move the file cursor
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }

    /// Read exactly `buf.len()` bytes starting at `offset`.
    #[cfg(windows)]
    pub fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            let n = self.file.seek_read(buf, offset)?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "unexpected end of storage file",
                )
                .into());
            }
            buf = &mut buf[n..];
            offset += n as u64;
        }
        Ok(())
    }

    /// Write all of `data` starting at `offset`.
    #[cfg(unix)]
    pub fn write_all_at(&self, data: &[u8], offset: u64) -> Result<()> {
        use std::os::unix::fs::FileExt;
        // pwrite does not move the file cursor
        self.file.write_all_at(data, offset)?;
        Ok(())
    }

    /// Write all of `data` starting at `offset`.
    #[cfg(windows)]
    pub fn write_all_at(&self, mut data: &[u8], mut offset: u64) -> Result<()> {
        use std::os::windows::fs::FileExt;
        while !data.is_empty() {
            let n = self.file.seek_write(data, offset)?;
            data = &data[n..];
            offset += n as u64;
        }
        Ok(())
    }

    /// Grow (or shrink) the file to `len` bytes. The engine only grows.
    pub fn set_len(&self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        Ok(())
    }

    /// Current file length in bytes
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Durably flush file contents and metadata to disk
    pub fn sync_all(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
