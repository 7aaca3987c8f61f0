//! Composable random-access byte streams.
//!
//! [`ByteStream`] is the one capability every layer implements and every
//! layer wraps. A raw container file is adapted with [`IoStream`], then
//! decorated as needed:
//!
//! ```text
//! IoStream<File>                      raw container bytes
//!   └── OffsetWindowStream            one section, zero-based
//!         └── DecryptingStream        AES-CTR plaintext view
//!               └── VerifiedStream    hash-tree verified data layer
//! ```
//!
//! Each wrapper owns exactly one inner stream. To let several chains read
//! the same backing storage, wrap it in a [`SharedStream`] and clone it:
//! every clone carries its own cursor and performs seek+I/O under one lock.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`IoStream`] | Adapts any `Read + Write + Seek` (a [`std::fs::File`], a [`std::io::Cursor`]) |
//! | [`SharedStream`] | Shared ownership with independent cursors |
//! | [`OffsetWindowStream`] | `[offset, offset + size)` of the inner stream |
//! | [`DecryptingStream`] | Transparent AES-CTR |
//! | [`StreamReader`] | Exposes any stream as `std::io::Read + Seek` |
//!
//! [`VerifiedStream`](crate::integrity::VerifiedStream) lives in
//! [`crate::integrity`].

mod ctr;
mod window;

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use crate::utils::check_range;
use crate::{Error, Result};

pub use ctr::{DEFAULT_CACHE_SIZE, DecryptingStream};
pub use window::OffsetWindowStream;

/// A seekable, randomly readable and writable byte range.
///
/// After a successful `read`/`write` of `n` bytes the cursor is
/// `position_before + n`. Streams are not meant for concurrent use; all
/// calls on one instance are issued in sequence.
pub trait ByteStream {
    /// Size of the stream in bytes.
    fn size(&self) -> u64;

    /// Current cursor position.
    fn position(&self) -> u64;

    /// Move the cursor. Whether out-of-bounds positions are clamped or
    /// rejected at the next I/O call is up to the implementation.
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Fill `out` from the cursor and advance it by `out.len()`.
    fn read(&mut self, out: &mut [u8]) -> Result<()>;

    /// Write `data` at the cursor and advance it by `data.len()`.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Seek to `offset`, then read.
    fn read_at(&mut self, offset: u64, out: &mut [u8]) -> Result<()> {
        self.seek(offset)?;
        self.read(out)
    }

    /// Seek to `offset`, then write.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.seek(offset)?;
        self.write(data)
    }
}

impl<S: ByteStream + ?Sized> ByteStream for Box<S> {
    fn size(&self) -> u64 {
        (**self).size()
    }
    fn position(&self) -> u64 {
        (**self).position()
    }
    fn seek(&mut self, offset: u64) -> Result<()> {
        (**self).seek(offset)
    }
    fn read(&mut self, out: &mut [u8]) -> Result<()> {
        (**self).read(out)
    }
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }
}

impl<S: ByteStream + ?Sized> ByteStream for &mut S {
    fn size(&self) -> u64 {
        (**self).size()
    }
    fn position(&self) -> u64 {
        (**self).position()
    }
    fn seek(&mut self, offset: u64) -> Result<()> {
        (**self).seek(offset)
    }
    fn read(&mut self, out: &mut [u8]) -> Result<()> {
        (**self).read(out)
    }
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }
}

/// Leaf stream over any `std::io` type.
///
/// The size is taken once at construction and grows as writes extend the
/// stream. Reads past the end fail with [`Error::OutOfRange`].
pub struct IoStream<T> {
    inner: T,
    size: u64,
    pos: u64,
}

impl<T: Read + Write + Seek> IoStream<T> {
    /// Wrap `inner`, taking its current length as the stream size.
    pub fn new(mut inner: T) -> Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        Ok(Self {
            inner,
            size,
            pos: 0,
        })
    }

    /// Consume the stream, returning the wrapped I/O object.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl IoStream<Cursor<Vec<u8>>> {
    /// An in-memory stream holding `data`.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            size: data.len() as u64,
            inner: Cursor::new(data),
            pos: 0,
        }
    }

    /// The backing bytes.
    pub fn get_ref(&self) -> &[u8] {
        self.inner.get_ref()
    }
}

impl<T: Read + Write + Seek> ByteStream for IoStream<T> {
    fn size(&self) -> u64 {
        self.size
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, out: &mut [u8]) -> Result<()> {
        let end = check_range(self.pos, out.len(), self.size)?;
        if out.is_empty() {
            return Ok(());
        }
        self.inner.seek(SeekFrom::Start(self.pos))?;
        self.inner.read_exact(out)?;
        self.pos = end;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.inner.seek(SeekFrom::Start(self.pos))?;
        self.inner.write_all(data)?;
        self.pos += data.len() as u64;
        self.size = self.size.max(self.pos);
        Ok(())
    }
}

/// Shared handle to a stream.
///
/// Clones share the backing stream but not the cursor. Each call locks the
/// backing stream for its whole seek+I/O pair, so interleaved use from
/// several wrapper chains never observes another chain's cursor.
pub struct SharedStream<S> {
    inner: Arc<Mutex<S>>,
    pos: u64,
}

impl<S: ByteStream> SharedStream<S> {
    /// Take ownership of `inner`; clone the result to share it.
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
            pos: 0,
        }
    }
}

impl<S> Clone for SharedStream<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            pos: self.pos,
        }
    }
}

impl<S: ByteStream> ByteStream for SharedStream<S> {
    fn size(&self) -> u64 {
        match self.inner.lock() {
            Ok(s) => s.size(),
            Err(poisoned) => poisoned.into_inner().size(),
        }
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, out: &mut [u8]) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| Error::Poisoned)?;
        inner.read_at(self.pos, out)?;
        self.pos += out.len() as u64;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| Error::Poisoned)?;
        inner.write_at(self.pos, data)?;
        self.pos += data.len() as u64;
        Ok(())
    }
}

/// Exposes a [`ByteStream`] through `std::io::Read` and `std::io::Seek`.
///
/// Reads stop at the end of the stream instead of failing, matching what
/// `std::io` callers expect from a file.
pub struct StreamReader<S> {
    inner: S,
}

impl<S: ByteStream> StreamReader<S> {
    /// Read `inner` from its current position.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Consume the reader, returning the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ByteStream> Read for StreamReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.inner.size().saturating_sub(self.inner.position());
        let n = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if n == 0 {
            return Ok(0);
        }
        self.inner.read(&mut buf[..n]).map_err(io::Error::other)?;
        Ok(n)
    }
}

impl<S: ByteStream> Seek for StreamReader<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.inner.size().checked_add_signed(d),
            SeekFrom::Current(d) => self.inner.position().checked_add_signed(d),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;
        self.inner.seek(target).map_err(io::Error::other)?;
        Ok(self.inner.position())
    }
}
