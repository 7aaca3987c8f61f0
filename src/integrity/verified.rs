//! Read-only view of a hash tree's data layer, verified lazily.

use crate::crypto::hash::Sha256Hash;
use crate::error::HashLevel;
use crate::integrity::{HashTreeMetadata, Layer};
use crate::logger::{debug, trace, warn};
use crate::stream::{ByteStream, DEFAULT_CACHE_SIZE, OffsetWindowStream};
use crate::utils::{check_range, to_usize, zeroed};
use crate::{Error, Result};

/// Why a stream stopped serving reads.
#[derive(Debug, Clone, Copy)]
enum Poison {
    Integrity { level: HashLevel, block: u64 },
    Io,
}

impl Poison {
    fn error(self) -> Error {
        match self {
            Poison::Integrity { level, block } => Error::Integrity { level, block },
            Poison::Io => Error::Poisoned,
        }
    }
}

/// Exposes the data layer of a hash tree.
///
/// Opening the stream verifies every intermediate layer. Each read then
/// fetches the whole data blocks it touches and checks them against the
/// verified hash list before any byte reaches the caller. A read that fails
/// on a hash mismatch or an I/O error poisons the stream: every later read
/// fails without touching the inner stream.
pub struct VerifiedStream<S> {
    data: OffsetWindowStream<S>,
    layer: Layer,
    hashes: Vec<Sha256Hash>,
    align: bool,
    pos: u64,
    cache: Vec<u8>,
    cache_blocks: u64,
    poison: Option<Poison>,
}

impl<S: ByteStream> VerifiedStream<S> {
    /// Verify the intermediate layers of `metadata` in `inner` and open its
    /// data layer.
    pub fn new(inner: S, metadata: &HashTreeMetadata) -> Result<Self> {
        Self::with_cache_size(inner, metadata, DEFAULT_CACHE_SIZE)
    }

    /// Like [`new`](Self::new), fetching up to `cache_size` bytes (but at
    /// least one block) per chunk.
    pub fn with_cache_size(
        mut inner: S,
        metadata: &HashTreeMetadata,
        cache_size: usize,
    ) -> Result<Self> {
        let hashes = metadata.verify_layers(&mut inner)?;
        let layer = *metadata.data_layer();
        let block_size = to_usize(layer.block_size)?;
        let cache_blocks = (cache_size / block_size).max(1);
        let cache_len = cache_blocks
            .checked_mul(block_size)
            .ok_or(Error::AllocationFailure(usize::MAX))?;
        debug!(
            "data layer ready: {} blocks of {:#x}, {cache_blocks} per chunk",
            hashes.len(),
            layer.block_size
        );

        Ok(Self {
            data: OffsetWindowStream::new(inner, layer.offset, layer.size),
            layer,
            hashes,
            align: metadata.align_hash_to_block(),
            pos: 0,
            cache: zeroed(cache_len)?,
            cache_blocks: cache_blocks as u64,
            poison: None,
        })
    }

    /// Whether an earlier failure has disabled the stream.
    pub fn is_poisoned(&self) -> bool {
        self.poison.is_some()
    }

    pub fn into_inner(self) -> S {
        self.data.into_inner()
    }

    /// Fetch, verify and copy out the blocks covering `[pos, end)`.
    fn read_blocks(&mut self, out: &mut [u8], end: u64) -> Result<()> {
        let bs = self.layer.block_size;
        let size = self.layer.size;
        let last = (end - 1) / bs;
        let mut block = self.pos / bs;
        let mut done = 0;

        while block <= last {
            let count = (last - block + 1).min(self.cache_blocks);
            let start = block * bs;
            let fetch_end = ((block + count) * bs).min(size);
            self.data
                .read_at(start, &mut self.cache[..(fetch_end - start) as usize])?;

            for i in 0..count {
                let index = block + i;
                let at = (i * bs) as usize;
                let real = (size - index * bs).min(bs) as usize;
                if self.align {
                    // Short final block is hashed zero-padded.
                    self.cache[at + real..at + bs as usize].fill(0);
                }
                let hashed = self.layer.hashed_len(index, self.align) as usize;
                if !self.hashes[index as usize].verify(&self.cache[at..at + hashed]) {
                    warn!("hash mismatch in data block {index}");
                    return Err(Error::Integrity {
                        level: HashLevel::Data,
                        block: index,
                    });
                }
            }
            trace!("verified data blocks {block}..{}", block + count);

            let from = self.pos.max(start);
            let to = end.min(fetch_end);
            let n = (to - from) as usize;
            let skip = (from - start) as usize;
            out[done..done + n].copy_from_slice(&self.cache[skip..skip + n]);
            done += n;
            self.pos = to;
            block += count;
        }
        Ok(())
    }
}

impl<S: ByteStream> ByteStream for VerifiedStream<S> {
    fn size(&self) -> u64 {
        self.layer.size
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, out: &mut [u8]) -> Result<()> {
        if let Some(poison) = self.poison {
            return Err(poison.error());
        }
        let end = check_range(self.pos, out.len(), self.layer.size)?;
        if out.is_empty() {
            return Ok(());
        }

        let start = self.pos;
        match self.read_blocks(out, end) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.pos = start;
                self.poison = Some(match err {
                    Error::Integrity { level, block } => Poison::Integrity { level, block },
                    _ => Poison::Io,
                });
                Err(err)
            }
        }
    }

    fn write(&mut self, _data: &[u8]) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "write not supported on verified stream",
        ))
    }
}
