//! End-to-end checks of stacked streams over an in-memory container.

use std::io::{Read, Seek, SeekFrom};

use hacfile::config::{StreamConfig, Window, open_stream};
use hacfile::crypto::aes::{ctr_apply, increment_counter};
use hacfile::crypto::hash::Sha256Hash;
use hacfile::crypto::nca::section_counter;
use hacfile::integrity::{HashTreeMetadata, Layer, VerifiedStream};
use hacfile::keys::AesKey;
use hacfile::stream::{
    ByteStream, DecryptingStream, IoStream, OffsetWindowStream, SharedStream, StreamReader,
};
use hacfile::{Error, HashLevel};

use test_case::test_case;

const KEY: AesKey = AesKey([0x6b; 16]);
const UPPER: u64 = 0x0000_0001_0000_0000;
const SECTION: u64 = 0x4000;

/// An IVFC-style tree: one 0x40-byte-block hash layer over 0x200-byte data
/// blocks, with at least 0x100 bytes of padding between the two.
fn section(plain: &[u8]) -> (Vec<u8>, HashTreeMetadata) {
    let hashes: Vec<u8> = plain
        .chunks(0x200)
        .flat_map(|block| {
            let mut block = block.to_vec();
            block.resize(0x200, 0);
            Sha256Hash::of(&block).0
        })
        .collect();
    let mut padded = hashes.clone();
    padded.resize(hashes.len().next_multiple_of(0x40), 0);
    let master: Vec<Sha256Hash> = padded.chunks(0x40).map(Sha256Hash::of).collect();

    let hash_layer = Layer {
        offset: 0,
        size: hashes.len() as u64,
        block_size: 0x40,
    };
    let data_offset = (hashes.len() as u64 + 0x100).next_multiple_of(0x200);
    let data_layer = Layer {
        offset: data_offset,
        size: plain.len() as u64,
        block_size: 0x200,
    };

    let mut image = hashes;
    image.resize(data_offset as usize, 0x5a);
    image.extend_from_slice(plain);
    image.resize(image.len() + 0x80, 0x5a);

    let meta = HashTreeMetadata::new(vec![hash_layer], data_layer, master, true).unwrap();
    (image, meta)
}

/// A container with `plain` stored as an encrypted section at `SECTION`.
fn container(plain: &[u8]) -> (Vec<u8>, HashTreeMetadata, u64) {
    let (mut image, meta) = section(plain);
    let len = image.len() as u64;
    ctr_apply(&mut image, &KEY, &section_counter(UPPER, SECTION));

    let mut raw = vec![0xcc; SECTION as usize];
    raw.extend_from_slice(&image);
    raw.extend_from_slice(&[0xcc; 0x300]);
    (raw, meta, len)
}

fn plaintext(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i ^ (i >> 8)) as u8).collect()
}

fn config(meta: HashTreeMetadata, len: u64) -> StreamConfig {
    StreamConfig::new()
        .with_window(Window {
            offset: SECTION,
            size: len,
        })
        .with_key(KEY)
        .with_counter(section_counter(UPPER, SECTION))
        .with_hash_tree(meta)
}

#[test_case(0, 0x1234)]
#[test_case(0x1ff, 2)]
#[test_case(0x400, 0x200)]
#[test_case(0x1233, 1)]
fn stacked_read(pos: u64, len: usize) {
    let plain = plaintext(0x1234);
    let (raw, meta, image_len) = container(&plain);
    let mut s = open_stream(IoStream::from_vec(raw), &config(meta, image_len)).unwrap();

    let mut out = vec![0u8; len];
    s.read_at(pos, &mut out).unwrap();
    assert_eq!(out, plain[pos as usize..pos as usize + len]);
}

#[test]
fn hand_built_chain_matches_config() {
    let plain = plaintext(0x800);
    let (raw, meta, image_len) = container(&plain);

    let window = OffsetWindowStream::new(IoStream::from_vec(raw), SECTION, image_len);
    let ctr = DecryptingStream::new(window, KEY, section_counter(UPPER, SECTION)).unwrap();
    let mut verified = VerifiedStream::new(ctr, &meta).unwrap();

    let mut out = vec![0u8; 0x800];
    verified.read(&mut out).unwrap();
    assert_eq!(out, plain);
    assert_eq!(verified.position(), 0x800);
}

#[test]
fn tampering_outside_the_section_is_harmless() {
    let plain = plaintext(0x600);
    let (mut raw, meta, image_len) = container(&plain);
    raw[0] ^= 0xff;
    raw[SECTION as usize - 1] ^= 0xff;
    let last = raw.len() - 1;
    raw[last] ^= 0xff;
    // Padding between the hash layer and the data layer.
    raw[SECTION as usize + 0x180] ^= 0xff;

    let mut s = open_stream(IoStream::from_vec(raw), &config(meta, image_len)).unwrap();
    let mut out = vec![0u8; 0x600];
    s.read(&mut out).unwrap();
    assert_eq!(out, plain);
}

#[test]
fn tampered_data_block_is_reported() {
    let plain = plaintext(0x600);
    let (mut raw, meta, image_len) = container(&plain);
    let data_offset = SECTION + meta.data_layer().offset;
    raw[(data_offset + 0x2a0) as usize] ^= 0x01;

    let mut s = open_stream(IoStream::from_vec(raw), &config(meta, image_len)).unwrap();
    let mut out = [0u8; 0x10];
    s.read_at(0x10, &mut out).unwrap();
    assert_eq!(out, plain[0x10..0x20]);

    let err = s.read_at(0x300, &mut [0u8; 0x200]).unwrap_err();
    assert!(
        matches!(
            err,
            Error::Integrity {
                level: HashLevel::Data,
                block: 1
            }
        ),
        "{err}"
    );
    assert!(err.is_integrity());
}

#[test]
fn shared_backing_for_two_sections() {
    let first = plaintext(0x300);
    let (raw, meta, image_len) = container(&first);
    let shared = SharedStream::new(IoStream::from_vec(raw));

    // One verified chain and one raw window over the bytes ahead of it.
    let mut verified = open_stream(shared.clone(), &config(meta, image_len)).unwrap();
    let mut prefix = OffsetWindowStream::new(shared, 0, SECTION);

    let mut a = [0u8; 0x20];
    let mut b = [0u8; 0x20];
    verified.read_at(0x100, &mut a).unwrap();
    prefix.read_at(0x10, &mut b).unwrap();
    verified.read(&mut a[..0x10]).unwrap();

    assert_eq!(a[..0x10], first[0x120..0x130]);
    assert_eq!(b, [0xcc; 0x20]);
}

#[test]
fn counter_carries_across_the_low_word() {
    // A counter whose low 32 bits are about to wrap.
    let base = hacfile::keys::AesIv([
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xfe,
    ]);
    let plain = plaintext(0x80);
    let mut enc = plain.clone();
    ctr_apply(&mut enc, &KEY, &base);

    let mut s = DecryptingStream::new(IoStream::from_vec(enc), KEY, base).unwrap();
    let mut out = [0u8; 0x20];
    s.read_at(0x30, &mut out).unwrap();
    assert_eq!(out, plain[0x30..0x50]);
    assert_eq!(increment_counter(&base, 2).0[11], 1);
}

#[test]
fn std_io_over_verified_stream() {
    let plain = plaintext(0x500);
    let (raw, meta, image_len) = container(&plain);
    let s = open_stream(IoStream::from_vec(raw), &config(meta, image_len)).unwrap();

    let mut reader = StreamReader::new(s);
    reader.seek(SeekFrom::Start(0x4f0)).unwrap();
    let mut tail = Vec::new();
    reader.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, plain[0x4f0..]);
}
