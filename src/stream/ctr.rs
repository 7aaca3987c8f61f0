//! Transparent AES-128-CTR over another stream.
//!
//! The keystream for the 16-byte block at absolute stream offset `o` is
//! generated from `base_ctr + o / 16`, so any byte range can be decrypted
//! on its own. Each I/O call is split into chunks of at most `cache_size`
//! bytes; a chunk is widened down to the enclosing cipher-block boundary
//! before the keystream is applied, which is why the cache carries one
//! extra block of slack.

use crate::crypto::aes::{AES_BLOCK_SIZE, ctr_apply, increment_counter};
use crate::keys::{AesIv, AesKey};
use crate::logger::trace;
use crate::stream::ByteStream;
use crate::utils::{align_down, check_range, zeroed};
use crate::{Error, Result};

/// Default number of bytes processed per chunk by the stream wrappers.
pub const DEFAULT_CACHE_SIZE: usize = 0x10000;

const BLOCK: u64 = AES_BLOCK_SIZE as u64;

/// Decrypts on read and encrypts on write.
///
/// Writes may start and end at any byte: only the written bytes are
/// replaced in the inner stream, so the surrounding ciphertext keeps its
/// keystream alignment.
pub struct DecryptingStream<S> {
    inner: S,
    key: AesKey,
    base_ctr: AesIv,
    pos: u64,
    cache_size: usize,
    cache: Vec<u8>,
}

impl<S: ByteStream> DecryptingStream<S> {
    /// Wrap `inner`; `base_ctr` is the counter of the block at offset 0.
    pub fn new(inner: S, key: AesKey, base_ctr: AesIv) -> Result<Self> {
        Self::with_cache_size(inner, key, base_ctr, DEFAULT_CACHE_SIZE)
    }

    /// Like [`new`](Self::new) with a chosen chunk size, which must be a
    /// non-zero multiple of 16.
    pub fn with_cache_size(
        inner: S,
        key: AesKey,
        base_ctr: AesIv,
        cache_size: usize,
    ) -> Result<Self> {
        if cache_size == 0 || cache_size % AES_BLOCK_SIZE != 0 {
            return Err(Error::InvalidLength(cache_size));
        }
        Ok(Self {
            inner,
            key,
            base_ctr,
            pos: 0,
            cache_size,
            cache: zeroed(cache_size + AES_BLOCK_SIZE)?,
        })
    }

    /// Consume the stream, returning the (still encrypted) inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// The chunk of `[pos, pos + len)` starting `done` bytes in: its
    /// block-aligned start, the offset of its first byte within the cache
    /// and its length.
    fn chunk(&self, done: usize, len: usize) -> (u64, usize, usize) {
        let abs = self.pos + done as u64;
        let block_start = align_down(abs, BLOCK);
        let skip = (abs - block_start) as usize;
        (block_start, skip, (len - done).min(self.cache_size))
    }
}

impl<S: ByteStream> ByteStream for DecryptingStream<S> {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, out: &mut [u8]) -> Result<()> {
        let size = self.inner.size();
        let end = check_range(self.pos, out.len(), size)?;

        for done in (0..out.len()).step_by(self.cache_size) {
            let (block_start, skip, chunk) = self.chunk(done, out.len());
            // Never past the end of the inner stream; CTR handles the
            // trailing partial block.
            let fetch = ((skip + chunk) as u64)
                .next_multiple_of(BLOCK)
                .min(size - block_start) as usize;
            let cache = &mut self.cache[..fetch];
            self.inner.read_at(block_start, cache)?;

            let ctr = increment_counter(&self.base_ctr, block_start / BLOCK);
            trace!("ctr read: {fetch:#x} bytes at {block_start:#x}");
            ctr_apply(cache, &self.key, &ctr);

            out[done..done + chunk].copy_from_slice(&cache[skip..skip + chunk]);
        }

        self.pos = end;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let end = self
            .pos
            .checked_add(data.len() as u64)
            .ok_or(Error::OutOfRange {
                offset: self.pos,
                len: data.len() as u64,
                size: self.inner.size(),
            })?;

        for done in (0..data.len()).step_by(self.cache_size) {
            let (block_start, skip, chunk) = self.chunk(done, data.len());
            // The keystream byte for each position depends only on its
            // offset, so the bytes ahead of `skip` are placeholders that are
            // never written back.
            let cache = &mut self.cache[..skip + chunk];
            cache[..skip].fill(0);
            cache[skip..].copy_from_slice(&data[done..done + chunk]);

            let ctr = increment_counter(&self.base_ctr, block_start / BLOCK);
            trace!("ctr write: {chunk:#x} bytes at {:#x}", block_start + skip as u64);
            ctr_apply(cache, &self.key, &ctr);

            self.inner.write_at(block_start + skip as u64, &cache[skip..])?;
        }

        self.pos = end;
        Ok(())
    }
}
