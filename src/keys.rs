//! Key material value types and key-file loading.
//!
//! Keys and counters are fixed-size byte arrays wrapped in newtypes so a
//! counter can never be passed where a key is expected. All of them are
//! immutable values compared byte-wise and parse from hex strings.
//!
//! ## Key file format
//! Nintendo key files are simple `name = hex_value` text files, one entry
//! per line, comments prefixed with `;`. [`KeySet`] understands the
//! entries this crate has a use for: the XTS `header_key`, the
//! `key_area_key_*` family and `title.keys` rights-ID mappings.

use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::str::FromStr;

use crate::{Error, Result};

/// Maximum number of master key generations understood by this library.
pub const MAX_KEY_GENERATION: usize = 32;

/// A 128-bit AES key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AesKey(pub [u8; 16]);

/// A 128-bit AES IV or CTR counter block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AesIv(pub [u8; 16]);

/// An AES-128-XTS key pair: `data` encrypts sectors, `tweak` encrypts the
/// sector tweak.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AesXtsKey {
    pub data: AesKey,
    pub tweak: AesKey,
}

impl AesKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl AesIv {
    /// Raw counter/IV bytes, big-endian when used as a CTR counter.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl AesXtsKey {
    /// Split a 32-byte key: bytes 0-15 are the data key, 16-31 the tweak key.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let mut data = [0u8; 16];
        let mut tweak = [0u8; 16];
        data.copy_from_slice(&bytes[..16]);
        tweak.copy_from_slice(&bytes[16..]);
        Self {
            data: AesKey(data),
            tweak: AesKey(tweak),
        }
    }
}

impl From<[u8; 16]> for AesKey {
    fn from(b: [u8; 16]) -> Self {
        Self(b)
    }
}

impl From<[u8; 16]> for AesIv {
    fn from(b: [u8; 16]) -> Self {
        Self(b)
    }
}

impl FromStr for AesKey {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        decode_hex_n::<16>(s).map(Self)
    }
}

impl FromStr for AesIv {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        decode_hex_n::<16>(s).map(Self)
    }
}

impl FromStr for AesXtsKey {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        decode_hex_n::<32>(s).map(|b| Self::from_bytes(&b))
    }
}

// Key bytes are never printed in full.
impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AesKey({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl fmt::Debug for AesXtsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesXtsKey")
            .field("data", &self.data)
            .field("tweak", &self.tweak)
            .finish()
    }
}

impl fmt::Debug for AesIv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AesIv(")?;
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

/// Key area encryption key index (which KAEK chain an NCA uses).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KaekIndex {
    Application = 0,
    Ocean = 1,
    System = 2,
}

impl TryFrom<u8> for KaekIndex {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Application),
            1 => Ok(Self::Ocean),
            2 => Ok(Self::System),
            _ => Err(Error::Parse("invalid KAEK index")),
        }
    }
}

/// Keys loaded from `prod.keys` / `title.keys`.
///
/// Missing entries stay [`None`]; lookups return [`None`] rather than a
/// zero key that would silently produce garbage plaintext.
#[derive(Debug, Default)]
pub struct KeySet {
    /// AES-XTS key pair used for NCA headers.
    pub header_key: Option<AesXtsKey>,
    /// `kaek[index][generation]`.
    pub kaek: [[Option<AesKey>; MAX_KEY_GENERATION]; 3],
    /// Encrypted title keys by rights ID.
    pub title_keys: HashMap<[u8; 16], AesKey>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load keys from a `prod.keys`-style reader.
    ///
    /// Unknown names and malformed values are skipped so newer key files
    /// still load.
    pub fn load_prod_keys<R: Read>(&mut self, reader: R) -> Result<()> {
        for (name, value) in key_lines(reader)? {
            if name == "header_key" {
                if let Ok(key) = value.parse() {
                    self.header_key = Some(key);
                }
                continue;
            }

            for (idx, prefix) in [
                (KaekIndex::Application, "key_area_key_application_"),
                (KaekIndex::Ocean, "key_area_key_ocean_"),
                (KaekIndex::System, "key_area_key_system_"),
            ] {
                if let Some(gen_str) = name.strip_prefix(prefix)
                    && let (Ok(r#gen), Ok(key)) =
                        (usize::from_str_radix(gen_str, 16), value.parse::<AesKey>())
                    && r#gen < MAX_KEY_GENERATION
                {
                    self.kaek[idx as usize][r#gen] = Some(key);
                }
            }
        }
        Ok(())
    }

    /// Load title keys from a `title.keys`-style reader.
    ///
    /// Each line: `<32-hex-char rights_id> = <32-hex-char title_key>`.
    pub fn load_title_keys<R: Read>(&mut self, reader: R) -> Result<()> {
        for (rights, key) in key_lines(reader)? {
            if let (Ok(r), Ok(k)) = (decode_hex_n::<16>(&rights), key.parse()) {
                self.title_keys.insert(r, k);
            }
        }
        Ok(())
    }

    /// Look up the KAEK for the given index and key generation.
    pub fn get_kaek(&self, index: KaekIndex, generation: u8) -> Option<&AesKey> {
        self.kaek[index as usize]
            .get(generation as usize)
            .and_then(Option::as_ref)
    }

    /// Look up a title key by rights ID.
    pub fn get_title_key(&self, rights_id: &[u8; 16]) -> Option<&AesKey> {
        self.title_keys.get(rights_id)
    }
}

fn key_lines<R: Read>(reader: R) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        out.push((name.trim().to_owned(), value.trim().to_owned()));
    }
    Ok(out)
}

fn decode_hex_n<const N: usize>(s: &str) -> Result<[u8; N]> {
    let s = s.trim();
    if s.len() != N * 2 {
        return Err(Error::Parse("hex key has the wrong length"));
    }
    let mut out = [0u8; N];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        out[i] = (hex_nibble(chunk[0])? << 4) | hex_nibble(chunk[1])?;
    }
    Ok(out)
}

fn hex_nibble(b: u8) -> Result<u8> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(Error::Parse("invalid hex digit")),
    }
}
