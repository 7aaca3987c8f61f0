//! Zero-based view of a sub-range of another stream.

use crate::stream::ByteStream;
use crate::{Error, Result};
use crate::utils::check_range;

/// Exposes `[base, base + size)` of the inner stream as a standalone stream.
///
/// The declared size is authoritative: it is not checked against the inner
/// stream, and no read or write may cross it.
pub struct OffsetWindowStream<S> {
    inner: S,
    base: u64,
    size: u64,
    pos: u64,
}

impl<S: ByteStream> OffsetWindowStream<S> {
    /// View `size` bytes of `inner` starting at `base`.
    pub fn new(inner: S, base: u64, size: u64) -> Self {
        Self {
            inner,
            base,
            size,
            pos: 0,
        }
    }

    /// Offset of the window within the inner stream.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Consume the window, returning the inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Offset in the inner stream of the cursor.
    fn inner_offset(&self, len: usize) -> Result<u64> {
        self.base.checked_add(self.pos).ok_or(Error::OutOfRange {
            offset: self.pos,
            len: len as u64,
            size: self.size,
        })
    }
}

impl<S: ByteStream> ByteStream for OffsetWindowStream<S> {
    fn size(&self) -> u64 {
        self.size
    }

    fn position(&self) -> u64 {
        self.pos
    }

    /// Clamps to `[0, size]`.
    fn seek(&mut self, offset: u64) -> Result<()> {
        self.pos = offset.min(self.size);
        Ok(())
    }

    fn read(&mut self, out: &mut [u8]) -> Result<()> {
        let end = check_range(self.pos, out.len(), self.size)?;
        if out.is_empty() {
            return Ok(());
        }
        let offset = self.inner_offset(out.len())?;
        self.inner.read_at(offset, out)?;
        self.pos = end;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let end = check_range(self.pos, data.len(), self.size)?;
        if data.is_empty() {
            return Ok(());
        }
        let offset = self.inner_offset(data.len())?;
        self.inner.write_at(offset, data)?;
        self.pos = end;
        Ok(())
    }
}
