//! AES-128 block-cipher modes over byte buffers.
//!
//! Everything here transforms a caller-owned buffer in place and knows
//! nothing about streams. The raw block cipher comes from the `aes` crate;
//! the modes the stream layers depend on bit-for-bit (counter arithmetic,
//! XTS tweak stepping) are spelled out here.
//!
//! ## Known limitation
//! AES-XTS ciphertext stealing is not implemented. A sector whose length is
//! not a multiple of 16 bytes is rejected with
//! [`Error::UnsupportedSectorSize`] rather than producing corrupt output.

use ::aes::Aes128;
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};

use crate::keys::{AesIv, AesKey, AesXtsKey};
use crate::{Error, Result};

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 0x10;

/// One AES block.
pub type Block = [u8; AES_BLOCK_SIZE];

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

fn block_cipher(key: &AesKey) -> Aes128 {
    Aes128::new(GenericArray::from_slice(key.as_bytes()))
}

fn check_blocks(buf: &[u8]) -> Result<()> {
    if buf.len() % AES_BLOCK_SIZE != 0 {
        return Err(Error::InvalidLength(buf.len()));
    }
    Ok(())
}

fn xor_block(block: &mut [u8], other: &[u8]) {
    for (b, o) in block.iter_mut().zip(other) {
        *b ^= o;
    }
}

/// Encrypt `buf` in place with AES-128-ECB.
///
/// Fails with [`Error::InvalidLength`] if `buf` is not block aligned.
pub fn ecb_encrypt(buf: &mut [u8], key: &AesKey) -> Result<()> {
    check_blocks(buf)?;
    let aes = block_cipher(key);
    for block in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
        aes.encrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(())
}

/// Decrypt `buf` in place with AES-128-ECB.
pub fn ecb_decrypt(buf: &mut [u8], key: &AesKey) -> Result<()> {
    check_blocks(buf)?;
    let aes = block_cipher(key);
    for block in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
        aes.decrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(())
}

/// Encrypt `buf` in place with AES-128-CBC.
///
/// Returns the chaining value after the last block (the last ciphertext
/// block, or `iv` for an empty buffer). Pass it as `iv` to continue the
/// chain across calls.
pub fn cbc_encrypt(buf: &mut [u8], key: &AesKey, iv: &AesIv) -> Result<AesIv> {
    check_blocks(buf)?;
    let aes = block_cipher(key);
    let mut chain = iv.0;
    for block in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
        xor_block(block, &chain);
        aes.encrypt_block(GenericArray::from_mut_slice(block));
        chain.copy_from_slice(block);
    }
    Ok(AesIv(chain))
}

/// Decrypt `buf` in place with AES-128-CBC.
///
/// Returns the next chaining value, exactly as [`cbc_encrypt`] does for the
/// matching ciphertext.
pub fn cbc_decrypt(buf: &mut [u8], key: &AesKey, iv: &AesIv) -> Result<AesIv> {
    check_blocks(buf)?;
    let aes = block_cipher(key);
    let mut chain = iv.0;
    for block in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
        let mut saved = [0u8; AES_BLOCK_SIZE];
        saved.copy_from_slice(block);
        aes.decrypt_block(GenericArray::from_mut_slice(block));
        xor_block(block, &chain);
        chain = saved;
    }
    Ok(AesIv(chain))
}

/// XOR `buf` with the AES-128-CTR keystream starting at counter `ctr`.
///
/// The same call encrypts and decrypts. `buf` may have any length; a
/// trailing partial block uses the front of that block's keystream.
pub fn ctr_apply(buf: &mut [u8], key: &AesKey, ctr: &AesIv) {
    let mut aes = Aes128Ctr::new(
        GenericArray::from_slice(key.as_bytes()),
        GenericArray::from_slice(ctr.as_bytes()),
    );
    aes.apply_keystream(buf);
}

/// Advance a CTR counter by `block_count` blocks.
///
/// The counter is four big-endian 32-bit words, word 3 least significant.
/// The addition carries across all four words and wraps at 2^128.
pub fn increment_counter(ctr: &AesIv, block_count: u64) -> AesIv {
    let mut words = [0u32; 4];
    for (w, c) in words.iter_mut().zip(ctr.0.chunks_exact(4)) {
        *w = u32::from_be_bytes([c[0], c[1], c[2], c[3]]);
    }
    let addend = [0, 0, (block_count >> 32) as u32, block_count as u32];

    let mut carry = 0u64;
    for i in (0..4).rev() {
        let sum = u64::from(words[i]) + u64::from(addend[i]) + carry;
        words[i] = sum as u32;
        carry = sum >> 32;
    }

    let mut out = [0u8; AES_BLOCK_SIZE];
    for (c, w) in out.chunks_exact_mut(4).zip(words) {
        c.copy_from_slice(&w.to_be_bytes());
    }
    AesIv(out)
}

/// Multiply an XTS tweak by x in GF(2^128).
///
/// The tweak is little-endian (byte 0 least significant); overflow out of
/// the top bit is reduced with 0x87 (x^128 = x^7 + x^2 + x + 1).
pub fn galois_multiply(tweak: &mut Block) {
    let mut carry = 0u8;
    for byte in tweak.iter_mut() {
        let next = *byte >> 7;
        *byte = (*byte << 1) | carry;
        carry = next;
    }
    if carry != 0 {
        tweak[0] ^= 0x87;
    }
}

/// IEEE 1619 tweak: the sector index as a little-endian 128-bit value.
pub fn standard_tweak(sector: u64) -> Block {
    let mut t = [0u8; AES_BLOCK_SIZE];
    t[..8].copy_from_slice(&sector.to_le_bytes());
    t
}

fn xts_sector(buf: &mut [u8], key: &AesXtsKey, tweak: &Block, decrypt: bool) -> Result<()> {
    if buf.len() % AES_BLOCK_SIZE != 0 {
        return Err(Error::UnsupportedSectorSize(buf.len()));
    }
    let data_key = block_cipher(&key.data);

    let mut t = *tweak;
    block_cipher(&key.tweak).encrypt_block(GenericArray::from_mut_slice(&mut t));

    for block in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
        xor_block(block, &t);
        if decrypt {
            data_key.decrypt_block(GenericArray::from_mut_slice(block));
        } else {
            data_key.encrypt_block(GenericArray::from_mut_slice(block));
        }
        xor_block(block, &t);
        galois_multiply(&mut t);
    }
    Ok(())
}

/// Encrypt one XTS sector in place. `tweak` is the unencrypted tweak block.
pub fn xts_encrypt_sector(buf: &mut [u8], key: &AesXtsKey, tweak: &Block) -> Result<()> {
    xts_sector(buf, key, tweak, false)
}

/// Decrypt one XTS sector in place. `tweak` is the unencrypted tweak block.
pub fn xts_decrypt_sector(buf: &mut [u8], key: &AesXtsKey, tweak: &Block) -> Result<()> {
    xts_sector(buf, key, tweak, true)
}

fn xts_sectors(
    buf: &mut [u8],
    key: &AesXtsKey,
    first_sector: u64,
    sector_size: usize,
    make_tweak: impl Fn(u64) -> Block,
    decrypt: bool,
) -> Result<()> {
    if sector_size == 0 || sector_size % AES_BLOCK_SIZE != 0 {
        return Err(Error::UnsupportedSectorSize(sector_size));
    }
    for (i, sector) in buf.chunks_mut(sector_size).enumerate() {
        xts_sector(sector, key, &make_tweak(first_sector + i as u64), decrypt)?;
    }
    Ok(())
}

/// Encrypt consecutive `sector_size`-byte sectors starting at `first_sector`.
///
/// `make_tweak` turns a sector index into its tweak block, e.g.
/// [`standard_tweak`] or [`crate::crypto::nca::nintendo_tweak`].
pub fn xts_encrypt_sectors(
    buf: &mut [u8],
    key: &AesXtsKey,
    first_sector: u64,
    sector_size: usize,
    make_tweak: impl Fn(u64) -> Block,
) -> Result<()> {
    xts_sectors(buf, key, first_sector, sector_size, make_tweak, false)
}

/// Decrypt consecutive `sector_size`-byte sectors starting at `first_sector`.
pub fn xts_decrypt_sectors(
    buf: &mut [u8],
    key: &AesXtsKey,
    first_sector: u64,
    sector_size: usize,
    make_tweak: impl Fn(u64) -> Block,
) -> Result<()> {
    xts_sectors(buf, key, first_sector, sector_size, make_tweak, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    use hex_literal::hex;
    use test_case::test_case;

    const FIPS_KEY: AesKey = AesKey(hex!("000102030405060708090a0b0c0d0e0f"));
    const SP800_KEY: AesKey = AesKey(hex!("2b7e151628aed2a6abf7158809cf4f3c"));
    const SP800_PLAIN: [u8; 32] = hex!(
        "6bc1bee22e409f96e93d7e117393172a"
        "ae2d8a571e03ac9c9eb76fac45af8e51"
    );

    #[test]
    fn ecb_known_answer() {
        let mut buf = hex!("00112233445566778899aabbccddeeff");
        ecb_encrypt(&mut buf, &FIPS_KEY).unwrap();
        assert_eq!(buf, hex!("69c4e0d86a7b0430d8cdb78070b4c55a"));
        ecb_decrypt(&mut buf, &FIPS_KEY).unwrap();
        assert_eq!(buf, hex!("00112233445566778899aabbccddeeff"));
    }

    #[test]
    fn ecb_rejects_partial_block() {
        let mut buf = [0u8; 17];
        assert!(matches!(
            ecb_encrypt(&mut buf, &FIPS_KEY),
            Err(Error::InvalidLength(17))
        ));
    }

    #[test]
    fn cbc_known_answer_and_chaining() {
        let iv = AesIv(hex!("000102030405060708090a0b0c0d0e0f"));
        let mut buf = SP800_PLAIN;
        let next = cbc_encrypt(&mut buf, &SP800_KEY, &iv).unwrap();
        assert_eq!(
            buf,
            hex!(
                "7649abac8119b246cee98e9b12e9197d"
                "5086cb9b507219ee95db113a917678b2"
            )
        );
        assert_eq!(next.0, buf[16..]);

        // Splitting the call in two and feeding the returned IV gives the same result.
        let mut first = SP800_PLAIN;
        let (a, b) = first.split_at_mut(16);
        let mid = cbc_encrypt(a, &SP800_KEY, &iv).unwrap();
        cbc_encrypt(b, &SP800_KEY, &mid).unwrap();
        assert_eq!(first, buf);

        let after = cbc_decrypt(&mut buf, &SP800_KEY, &iv).unwrap();
        assert_eq!(buf, SP800_PLAIN);
        assert_eq!(after, next);
    }

    #[test]
    fn ctr_known_answer() {
        let ctr = AesIv(hex!("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff"));
        let mut buf = SP800_PLAIN;
        ctr_apply(&mut buf, &SP800_KEY, &ctr);
        assert_eq!(
            buf,
            hex!(
                "874d6191b620e3261bef6864990db6ce"
                "9806f66b7970fdff8617187bb9fffdff"
            )
        );

        // Starting one block later with an incremented counter lines up.
        let mut second = [0u8; 16];
        second.copy_from_slice(&SP800_PLAIN[16..]);
        ctr_apply(&mut second, &SP800_KEY, &increment_counter(&ctr, 1));
        assert_eq!(second, buf[16..]);
    }

    #[test_case(&[0u8; 0])]
    #[test_case(&[7u8; 16])]
    #[test_case(&[0xa5u8; 64])]
    fn ctr_round_trip(plain: &[u8]) {
        let ctr = AesIv([0x42; 16]);
        let mut buf = plain.to_vec();
        ctr_apply(&mut buf, &FIPS_KEY, &ctr);
        ctr_apply(&mut buf, &FIPS_KEY, &ctr);
        assert_eq!(buf, plain);
    }

    #[test_case([0; 16], 1, hex!("00000000000000000000000000000001"))]
    #[test_case(hex!("000000000000000000000000ffffffff"), 1, hex!("00000000000000000000000100000000"))]
    #[test_case(hex!("00000000ffffffffffffffffffffffff"), 1, hex!("00000001000000000000000000000000"))]
    #[test_case([0xff; 16], 1, [0; 16]; "wraps at 2^128")]
    #[test_case([0; 16], 0x1_0000_0002, hex!("00000000000000000000000100000002"))]
    fn counter_increment(start: Block, n: u64, expected: Block) {
        assert_eq!(increment_counter(&AesIv(start), n), AesIv(expected));
    }

    #[test_case(hex!("00000000000000000000000000000000"), 5, 7)]
    #[test_case(hex!("0123456789abcdeffedcba98fffffff0"), 0x20, u64::MAX)]
    #[test_case([0xff; 16], u64::MAX, u64::MAX)]
    fn counter_increment_is_additive(start: Block, m: u64, n: u64) {
        let c = AesIv(start);
        let stepwise = increment_counter(&increment_counter(&c, m), n);
        // m + n may exceed u64; split the sum across two increments of at most u64::MAX.
        let (sum, overflow) = m.overflowing_add(n);
        let direct = if overflow {
            increment_counter(&increment_counter(&c, u64::MAX), sum + 1)
        } else {
            increment_counter(&c, sum)
        };
        assert_eq!(stepwise, direct);
    }

    #[test]
    fn galois_multiply_carries() {
        let mut t = [0u8; 16];
        t[0] = 0x80;
        galois_multiply(&mut t);
        assert_eq!(t[0], 0x00);
        assert_eq!(t[1], 0x01);

        let mut t = [0u8; 16];
        t[15] = 0x80;
        galois_multiply(&mut t);
        assert_eq!(t[0], 0x87);
        assert_eq!(t[15], 0x00);
    }

    #[test]
    fn xts_ieee1619_vector_1() {
        let key = AesXtsKey::default();
        let mut buf = [0u8; 32];
        xts_encrypt_sector(&mut buf, &key, &standard_tweak(0)).unwrap();
        assert_eq!(
            buf,
            hex!(
                "917cf69ebd68b2ec9b9fe9a3eadda692"
                "cd43d2f59598ed858c02c2652fbf922e"
            )
        );
        xts_decrypt_sector(&mut buf, &key, &standard_tweak(0)).unwrap();
        assert_eq!(buf, [0u8; 32]);
    }

    #[test]
    fn xts_multi_sector_round_trip() {
        let key = AesXtsKey {
            data: FIPS_KEY,
            tweak: SP800_KEY,
        };
        let plain: Vec<u8> = (0..0x600u32).map(|i| i as u8).collect();
        let mut buf = plain.clone();
        xts_encrypt_sectors(&mut buf, &key, 3, 0x200, standard_tweak).unwrap();
        assert_ne!(buf, plain);

        // Sector 4 alone decrypts with its own tweak.
        let mut middle = buf[0x200..0x400].to_vec();
        xts_decrypt_sector(&mut middle, &key, &standard_tweak(4)).unwrap();
        assert_eq!(middle, plain[0x200..0x400]);

        xts_decrypt_sectors(&mut buf, &key, 3, 0x200, standard_tweak).unwrap();
        assert_eq!(buf, plain);
    }

    #[test]
    fn xts_rejects_unaligned_sector() {
        let key = AesXtsKey::default();
        let mut buf = [0u8; 33];
        assert!(matches!(
            xts_decrypt_sector(&mut buf, &key, &standard_tweak(0)),
            Err(Error::UnsupportedSectorSize(33))
        ));
        let mut buf = [0u8; 64];
        assert!(matches!(
            xts_decrypt_sectors(&mut buf, &key, 0, 24, standard_tweak),
            Err(Error::UnsupportedSectorSize(24))
        ));
    }
}
