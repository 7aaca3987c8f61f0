//! Hash-tree shape and eager verification of the intermediate layers.
//!
//! ## Hierarchical SHA-256 info (0xF8 bytes, inside an NCA FsHeader)
//! ```text
//! [0x00] MasterHash     (0x20) - SHA-256 of the whole hash table
//! [0x20] BlockSize      (u32 LE) - data block size
//! [0x24] LayerCount     (u32 LE) - always 2
//! [0x28] LayerRegions   (5 × {Offset u64 LE, Size u64 LE})
//!        [0] hash table, [1] data
//! ```
//!
//! ## IVFC info (0xF8 bytes, inside an NCA FsHeader)
//! ```text
//! [0x00] Magic "IVFC"
//! [0x04] Version        (u32 LE) - 0x20000
//! [0x08] MasterHashSize (u32 LE)
//! [0x0C] LevelCount     (u32 LE) - includes the master hash level
//! [0x10] LevelInfo      (6 × 0x18 bytes)
//!        [0x00] Offset (u64 LE)  [0x08] Size (u64 LE)
//!        [0x10] BlockSizeLog2 (u32 LE)  [0x14] Reserved (u32)
//! [0xA0] SaltSource     (0x20)
//! [0xC0] MasterHash     (MasterHashSize bytes, at most 0x38)
//! ```

use crate::crypto::hash::{SHA256_SIZE, Sha256Hash};
use crate::error::HashLevel;
use crate::logger::{debug, warn};
use crate::stream::ByteStream;
use crate::utils::{align_up, bytesa, le_u32, le_u64, magic, to_usize, zeroed};
use crate::{Error, Result};

const HASH_SIZE: u64 = SHA256_SIZE as u64;

/// IVFC version understood by [`HashTreeMetadata::from_ivfc`].
pub const IVFC_VERSION: u32 = 0x20000;

/// Maximum number of levels (excluding the master hash) in an IVFC record.
pub const IVFC_MAX_LEVELS: usize = 6;

const IVFC_MAX_MASTER_HASH_SIZE: u32 = 0x38;

/// One level of a hash tree.
///
/// `offset`/`size` locate the level's bytes in the underlying stream;
/// `block_size` is the granularity at which those bytes are hashed and
/// checked against the previous (shallower) level's hash list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layer {
    pub offset: u64,
    pub size: u64,
    pub block_size: u64,
}

impl Layer {
    /// Number of hash blocks, counting a short final block.
    pub fn block_count(&self) -> u64 {
        self.size.div_ceil(self.block_size)
    }

    /// How many bytes of block `index` are fed to SHA-256.
    ///
    /// With `align` set every block is hashed over a full, zero-padded
    /// `block_size`; otherwise the final block covers only its real bytes.
    pub(crate) fn hashed_len(&self, index: u64, align: bool) -> u64 {
        if align {
            self.block_size
        } else {
            (self.size - index * self.block_size).min(self.block_size)
        }
    }
}

/// Shape of a verification hash tree.
///
/// `layers` run root-to-leaf: `layers[0]` is checked against the master hash
/// list and every layer's raw bytes are the hash list for the next one.
/// The deepest layer's bytes cover `data_layer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashTreeMetadata {
    layers: Vec<Layer>,
    data_layer: Layer,
    master_hash_list: Vec<Sha256Hash>,
    align_hash_to_block: bool,
}

impl HashTreeMetadata {
    /// Describe a hash tree, checking that each hash list is long enough
    /// for the level it covers.
    ///
    /// Returns [`Error::Parse`] for a zero block size, a short hash list or
    /// a level whose block-padded end does not fit in a `u64`.
    /// The shape usually comes from an untrusted container header, so this
    /// is an error rather than a panic.
    pub fn new(
        layers: Vec<Layer>,
        data_layer: Layer,
        master_hash_list: Vec<Sha256Hash>,
        align_hash_to_block: bool,
    ) -> Result<Self> {
        let mut available = master_hash_list.len() as u64;
        for layer in layers.iter().chain([&data_layer]) {
            if layer.block_size == 0 {
                return Err(Error::Parse("hash block size is zero"));
            }
            to_usize(layer.block_size)?;
            let end = layer
                .size
                .checked_next_multiple_of(layer.block_size)
                .and_then(|padded| padded.checked_add(layer.offset));
            if end.is_none() {
                return Err(Error::Parse("hash level ends past the addressable range"));
            }
            if layer.block_count() > available {
                return Err(Error::Parse("hash list too short for the level it covers"));
            }
            available = layer.size / HASH_SIZE;
        }

        Ok(Self {
            layers,
            data_layer,
            master_hash_list,
            align_hash_to_block,
        })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn data_layer(&self) -> &Layer {
        &self.data_layer
    }

    pub fn master_hash_list(&self) -> &[Sha256Hash] {
        &self.master_hash_list
    }

    pub fn align_hash_to_block(&self) -> bool {
        self.align_hash_to_block
    }

    /// Decode a Hierarchical SHA-256 hash-info record.
    ///
    /// The single master hash covers the whole hash table, so the table is
    /// one hash block. Data blocks are hashed over their real length.
    pub fn from_hierarchical_sha256(info: &[u8]) -> Result<Self> {
        let mut r = info;
        let master_hash = bytesa::<0x20>(&mut r)?;
        let block_size = le_u32(&mut r)?;
        let layer_count = le_u32(&mut r)?;
        if layer_count != 2 {
            return Err(Error::Parse("hierarchical SHA-256 needs exactly two layers"));
        }
        let table_offset = le_u64(&mut r)?;
        let table_size = le_u64(&mut r)?;
        let data_offset = le_u64(&mut r)?;
        let data_size = le_u64(&mut r)?;

        let table = Layer {
            offset: table_offset,
            size: table_size,
            block_size: table_size,
        };
        let data = Layer {
            offset: data_offset,
            size: data_size,
            block_size: u64::from(block_size),
        };
        Self::new(vec![table], data, vec![Sha256Hash(master_hash)], false)
    }

    /// Decode an IVFC hash-info record.
    ///
    /// `LevelCount - 1` levels are used; the last of them is the data layer.
    /// Every block, including a short final one, is hashed zero-padded.
    pub fn from_ivfc(info: &[u8]) -> Result<Self> {
        let mut r = info;
        magic(&mut r, b"IVFC")?;
        let version = le_u32(&mut r)?;
        if version != IVFC_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let master_hash_size = le_u32(&mut r)?;
        let level_count = le_u32(&mut r)? as usize;
        if !(2..=IVFC_MAX_LEVELS + 1).contains(&level_count) {
            return Err(Error::Parse("IVFC level count out of range"));
        }

        let mut raw_levels = [(0u64, 0u64, 0u32); IVFC_MAX_LEVELS];
        for level in &mut raw_levels {
            let offset = le_u64(&mut r)?;
            let size = le_u64(&mut r)?;
            let block_size_log2 = le_u32(&mut r)?;
            let _reserved = le_u32(&mut r)?;
            *level = (offset, size, block_size_log2);
        }
        let _salt_source = bytesa::<0x20>(&mut r)?;

        if master_hash_size == 0
            || master_hash_size % HASH_SIZE as u32 != 0
            || master_hash_size > IVFC_MAX_MASTER_HASH_SIZE
        {
            return Err(Error::Parse("invalid IVFC master hash size"));
        }
        let master = r
            .get(..master_hash_size as usize)
            .ok_or(Error::UnexpectedEof)?;

        let mut layers = Vec::with_capacity(level_count - 1);
        for &(offset, size, log2) in &raw_levels[..level_count - 1] {
            let block_size = 1u64
                .checked_shl(log2)
                .ok_or(Error::Parse("IVFC block size too large"))?;
            layers.push(Layer {
                offset,
                size,
                block_size,
            });
        }
        let data = layers.pop().ok_or(Error::Parse("IVFC has no data level"))?;

        Self::new(layers, data, Sha256Hash::list_from_bytes(master), true)
    }

    /// Check every intermediate layer of the tree stored in `stream`,
    /// root-to-leaf, and return the hash list covering the data layer.
    ///
    /// Stops at the first mismatch with [`Error::Integrity`]; no later block
    /// or layer is read.
    pub(crate) fn verify_layers<S: ByteStream>(&self, stream: &mut S) -> Result<Vec<Sha256Hash>> {
        let mut prev: Vec<u8> = self
            .master_hash_list
            .iter()
            .flat_map(|h| h.0)
            .collect();

        for (index, layer) in self.layers.iter().enumerate() {
            let size = to_usize(layer.size)?;
            let mut cur = zeroed(to_usize(align_up(layer.size, layer.block_size))?)?;
            stream.read_at(layer.offset, &mut cur[..size])?;

            let block_size = to_usize(layer.block_size)?;
            for (block, data) in cur.chunks(block_size).enumerate() {
                let block = block as u64;
                let hashed = to_usize(layer.hashed_len(block, self.align_hash_to_block))?;
                let at = block as usize * SHA256_SIZE;
                let expected = prev
                    .get(at..at + SHA256_SIZE)
                    .ok_or(Error::Parse("hash list too short for the level it covers"))?;
                if Sha256Hash::of(&data[..hashed]).as_bytes()[..] != *expected {
                    warn!("hash mismatch in layer {index}, block {block}");
                    return Err(Error::Integrity {
                        level: HashLevel::Layer(index),
                        block,
                    });
                }
            }

            debug!(
                "verified hash layer {index}: {:#x} bytes at {:#x}",
                layer.size, layer.offset
            );
            prev = cur;
        }

        let mut hashes = Sha256Hash::list_from_bytes(&prev);
        hashes.truncate(to_usize(self.data_layer.block_count())?);
        Ok(hashes)
    }
}
