//! Declarative description of a layered stream.
//!
//! A [`StreamConfig`] names which layers to stack on a raw stream;
//! [`open_stream`] builds them in the fixed order window, decryption,
//! verification. Any layer may be left out.
//!
//! ```no_run
//! # fn main() -> hacfile::Result<()> {
//! use hacfile::config::{StreamConfig, Window, open_stream};
//! use hacfile::stream::IoStream;
//!
//! let file = IoStream::new(std::fs::File::open("section.bin")?)?;
//! let key = "000102030405060708090a0b0c0d0e0f".parse()?;
//! let config = StreamConfig::new()
//!     .with_window(Window { offset: 0x4000, size: 0x10000 })
//!     .with_key(key);
//! let mut section = open_stream(file, &config)?;
//! # let _ = &mut section;
//! # Ok(())
//! # }
//! ```

use crate::Result;
use crate::integrity::{HashTreeMetadata, VerifiedStream};
use crate::keys::{AesIv, AesKey};
use crate::logger::debug;
use crate::stream::{ByteStream, DEFAULT_CACHE_SIZE, DecryptingStream, OffsetWindowStream};

/// `[offset, offset + size)` of the raw stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub size: u64,
}

/// Layers to stack on a raw stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Restrict the stream to a sub-range.
    pub window: Option<Window>,
    /// Decrypt with AES-CTR under this key.
    pub key: Option<AesKey>,
    /// Counter for the first byte of the (windowed) stream.
    pub counter: AesIv,
    /// Verify against this hash tree, whose offsets are relative to the
    /// decrypted stream.
    pub hash_tree: Option<HashTreeMetadata>,
    /// Chunk size used by the decrypting and verifying layers.
    pub cache_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            window: None,
            key: None,
            counter: AesIv::default(),
            hash_tree: None,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl StreamConfig {
    /// A config that stacks no layers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the stream to `window` before any other layer.
    pub fn with_window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    /// Decrypt with AES-128-CTR under `key`.
    pub fn with_key(mut self, key: AesKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Counter of the first 16-byte block of the windowed stream.
    pub fn with_counter(mut self, counter: AesIv) -> Self {
        self.counter = counter;
        self
    }

    /// Verify the decrypted stream against `hash_tree`.
    pub fn with_hash_tree(mut self, hash_tree: HashTreeMetadata) -> Self {
        self.hash_tree = Some(hash_tree);
        self
    }

    /// Chunk size for decryption and verification; see [`DEFAULT_CACHE_SIZE`].
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }
}

/// Stack the layers named by `config` on `stream`.
///
/// Fails if a layer cannot be constructed: an unaligned cache size for
/// decryption, or a hash layer that does not match the tree.
pub fn open_stream<'a, S: ByteStream + 'a>(
    stream: S,
    config: &StreamConfig,
) -> Result<Box<dyn ByteStream + 'a>> {
    let mut stream: Box<dyn ByteStream + 'a> = Box::new(stream);

    if let Some(Window { offset, size }) = config.window {
        debug!("window {size:#x} bytes at {offset:#x}");
        stream = Box::new(OffsetWindowStream::new(stream, offset, size));
    }
    if let Some(key) = config.key {
        debug!("AES-CTR decryption, cache {:#x}", config.cache_size);
        stream = Box::new(DecryptingStream::with_cache_size(
            stream,
            key,
            config.counter,
            config.cache_size,
        )?);
    }
    if let Some(tree) = &config.hash_tree {
        debug!("hash tree with {} layers", tree.layers().len());
        stream = Box::new(VerifiedStream::with_cache_size(
            stream,
            tree,
            config.cache_size,
        )?);
    }

    Ok(stream)
}
