//! NCA-specific uses of the AES primitives.
//!
//! ## AES-128-XTS - NCA header
//!
//! The first 0xC00 bytes of every NCA are AES-128-XTS encrypted with
//! 0x200-byte sectors and a non-standard tweak: the sector index is stored
//! big-endian in the upper half of the tweak block. Sectors 0-1 hold the
//! NCA header and sectors 2-5 the four FsHeaders. NCA2 encrypts every
//! FsHeader as if it were sector 0.
//!
//! ## AES-128-CTR - NCA sections
//!
//! Section data uses AES-128-CTR. The counter is the FsHeader's 64-bit
//! upper counter followed by the big-endian block index (`offset / 0x10`)
//! of the byte being decrypted, counted from the start of the NCA.

use super::aes::{AES_BLOCK_SIZE, Block, ecb_decrypt, xts_decrypt_sectors};
use crate::keys::{AesIv, AesKey, AesXtsKey};
use crate::{Error, Result};

/// Size of the XTS-encrypted header region.
pub const HEADER_SIZE: usize = 0xC00;

/// XTS sector size used by the NCA header.
pub const HEADER_SECTOR_SIZE: usize = 0x200;

/// Nintendo's XTS tweak: big-endian sector index in bytes 8-15.
pub fn nintendo_tweak(sector: u64) -> Block {
    let mut t = [0u8; AES_BLOCK_SIZE];
    t[8..].copy_from_slice(&sector.to_be_bytes());
    t
}

/// Decrypt the 0xC00-byte NCA header region.
///
/// The NCA version is detected from the decrypted magic at 0x200 so the
/// FsHeader sectors can be numbered correctly. Returns
/// [`Error::UnexpectedEof`] if `encrypted` is shorter than [`HEADER_SIZE`].
pub fn decrypt_header(encrypted: &[u8], header_key: &AesXtsKey) -> Result<[u8; HEADER_SIZE]> {
    let src = encrypted.get(..HEADER_SIZE).ok_or(Error::UnexpectedEof)?;
    let mut out = [0u8; HEADER_SIZE];
    out.copy_from_slice(src);

    let (nca_header, fs_headers) = out.split_at_mut(2 * HEADER_SECTOR_SIZE);
    xts_decrypt_sectors(nca_header, header_key, 0, HEADER_SECTOR_SIZE, nintendo_tweak)?;

    if &nca_header[0x200..0x204] == b"NCA2" {
        for fs_header in fs_headers.chunks_mut(HEADER_SECTOR_SIZE) {
            xts_decrypt_sectors(fs_header, header_key, 0, HEADER_SECTOR_SIZE, nintendo_tweak)?;
        }
    } else {
        xts_decrypt_sectors(fs_headers, header_key, 2, HEADER_SECTOR_SIZE, nintendo_tweak)?;
    }

    Ok(out)
}

/// Build the AES-CTR counter for the byte at `offset` (from the start of
/// the NCA) of a section with the given upper counter.
pub fn section_counter(upper_counter: u64, offset: u64) -> AesIv {
    let mut ctr = [0u8; AES_BLOCK_SIZE];
    ctr[..8].copy_from_slice(&upper_counter.to_be_bytes());
    ctr[8..].copy_from_slice(&(offset >> 4).to_be_bytes());
    AesIv(ctr)
}

/// Unwrap one entry of an NCA key area (or an encrypted title key) with
/// AES-ECB under the given key-encryption key.
pub fn unwrap_key(encrypted: &AesKey, kek: &AesKey) -> Result<AesKey> {
    let mut key = encrypted.0;
    ecb_decrypt(&mut key, kek)?;
    Ok(AesKey(key))
}
