//! Cryptographic primitives used by the stream layers.
//!
//! Pure functions over byte buffers: no I/O, no knowledge of streams.
//! The AES block cipher and the SHA digests come from the RustCrypto
//! crates; the mode plumbing that has to match Nintendo's layout
//! bit-for-bit lives here.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`aes`]  | AES-128 ECB / CBC / CTR / XTS, CTR counter arithmetic, XTS tweak stepping |
//! | [`hash`] | SHA-1 and SHA-256 one-shot digests, [`hash::Sha256Hash`] |
//! | [`nca`]  | NCA header XTS decryption, section CTR counters, key-area unwrapping |
//!
//! ## Key hierarchy (brief)
//!
//! ```text
//! prod.keys
//!   └── header_key (32 bytes)
//!         ├── data  (bytes  0–15)  ─┐  AES-XTS decrypt NCA header
//!         └── tweak (bytes 16–31)  ─┘
//!
//!   └── key_area_key_{app,ocean,system}_XX (16 bytes each)
//!         └── AES-ECB unwrap EncryptedKeyArea entries in NCA header
//!               └── section key → AES-CTR decrypt section data
//! ```

pub mod aes;
pub mod hash;
pub mod nca;
