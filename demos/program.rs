use std::env;
use std::fs::File;
use std::io::Read;

use hacfile::config::{StreamConfig, Window, open_stream};
use hacfile::crypto::nca::{HEADER_SIZE, decrypt_header, section_counter, unwrap_key};
use hacfile::integrity::HashTreeMetadata;
use hacfile::keys::{AesKey, KaekIndex, KeySet};
use hacfile::stream::{ByteStream, IoStream, StreamReader};
use hacfile::{Error, Result};

const MEDIA_UNIT: u64 = 0x200;

fn le_u32_at(buf: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[at..at + 4]);
    u64::from(u32::from_le_bytes(b))
}

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "program.nca".to_owned());
    let section: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    if section >= 4 {
        return Err(Error::Parse("an NCA has at most four sections"));
    }

    let mut keys = KeySet::new();
    keys.load_prod_keys(File::open("prod.keys")?)?;
    let header_key = keys
        .header_key
        .ok_or(Error::Parse("header_key missing from prod.keys"))?;

    let mut file = File::open(&path)?;
    let mut raw = vec![0u8; HEADER_SIZE];
    file.read_exact(&mut raw)?;
    let header = decrypt_header(&raw, &header_key)?;

    if header[0x230..0x240].iter().any(|&b| b != 0) {
        return Err(Error::UnsupportedOperation("titlekey-encrypted NCA"));
    }
    let generation = header[0x206].max(header[0x220]).saturating_sub(1);
    let kaek = keys
        .get_kaek(KaekIndex::try_from(header[0x207])?, generation)
        .ok_or(Error::Parse("key area key missing from prod.keys"))?;
    let mut wrapped = [0u8; 16];
    wrapped.copy_from_slice(&header[0x320..0x330]);
    let key = unwrap_key(&AesKey(wrapped), kaek)?;

    let entry = &header[0x240 + section * 0x10..0x250 + section * 0x10];
    let start = le_u32_at(entry, 0) * MEDIA_UNIT;
    let end = le_u32_at(entry, 4) * MEDIA_UNIT;

    let fs_header = &header[0x400 + section * 0x200..0x600 + section * 0x200];
    let hash_info = &fs_header[0x08..0x100];
    let hash_tree = match fs_header[3] {
        2 => HashTreeMetadata::from_hierarchical_sha256(hash_info)?,
        3 => HashTreeMetadata::from_ivfc(hash_info)?,
        _ => return Err(Error::UnsupportedOperation("section without a hash tree")),
    };
    let mut upper = [0u8; 8];
    upper.copy_from_slice(&fs_header[0x140..0x148]);

    let config = StreamConfig::new()
        .with_window(Window {
            offset: start,
            size: end
                .checked_sub(start)
                .ok_or(Error::Parse("section ends before it starts"))?,
        })
        .with_key(key)
        .with_counter(section_counter(u64::from_le_bytes(upper), start))
        .with_hash_tree(hash_tree);
    let data = open_stream(IoStream::new(file)?, &config)?;

    println!("section {section}: {:#x} verified bytes", data.size());
    let mut magic = [0u8; 4];
    StreamReader::new(data).read_exact(&mut magic)?;
    println!("magic: {}", String::from_utf8_lossy(&magic));

    Ok(())
}
