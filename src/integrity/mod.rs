//! Hash-tree integrity verification.
//!
//! A hash tree is a chain of layers, each the concatenated SHA-256 digests
//! of the blocks of the next one:
//!
//! ```text
//! master hash list  (in the container header, trusted)
//!   └── layer 0     verified eagerly when the stream is opened
//!         └── ...
//!               └── layer N-1
//!                     └── data layer   verified block-by-block on read
//! ```
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`HashTreeMetadata`] | Tree shape, decoded from IVFC or Hierarchical SHA-256 records |
//! | [`VerifiedStream`] | Data layer view that checks every block it returns |

mod metadata;
mod verified;

pub use metadata::{HashTreeMetadata, IVFC_MAX_LEVELS, IVFC_VERSION, Layer};
pub use verified::VerifiedStream;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::hash::Sha256Hash;

    fn hash_blocks(bytes: &[u8], block_size: u64, align: bool) -> Vec<u8> {
        bytes
            .chunks(block_size as usize)
            .flat_map(|block| {
                let mut block = block.to_vec();
                if align {
                    block.resize(block_size as usize, 0);
                }
                Sha256Hash::of(&block).0
            })
            .collect()
    }

    /// Lay out a hash tree over `data` in one image.
    ///
    /// `layer_block_sizes` runs root-to-leaf. Every level is preceded by
    /// filler bytes that belong to no level.
    pub(crate) fn build_tree(
        data: &[u8],
        data_block_size: u64,
        layer_block_sizes: &[u64],
        align: bool,
    ) -> (Vec<u8>, HashTreeMetadata) {
        // Leaf-to-root while hashing.
        let mut levels = vec![(data.to_vec(), data_block_size)];
        for &block_size in layer_block_sizes.iter().rev() {
            let hashes = {
                let (below, below_bs) = &levels[levels.len() - 1];
                hash_blocks(below, *below_bs, align)
            };
            levels.push((hashes, block_size));
        }
        let (top, top_bs) = &levels[levels.len() - 1];
        let master = Sha256Hash::list_from_bytes(&hash_blocks(top, *top_bs, align));

        let mut image = vec![0xee; 0x20];
        let mut placed = Vec::new();
        for (bytes, block_size) in levels.iter().rev() {
            placed.push(Layer {
                offset: image.len() as u64,
                size: bytes.len() as u64,
                block_size: *block_size,
            });
            image.extend_from_slice(bytes);
            image.extend_from_slice(&[0xee; 0x10]);
        }
        let data_layer = placed.pop().unwrap();
        let meta = HashTreeMetadata::new(placed, data_layer, master, align).unwrap();
        (image, meta)
    }
}
