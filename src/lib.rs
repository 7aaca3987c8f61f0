//! **hacfile** - layered random-access streams over Nintendo content
//! containers: windowing, transparent AES-CTR and hash-tree verification.
//!
//! # Modules
//! | Module | Purpose |
//! |--------|---------|
//! | [`stream`]    | [`ByteStream`](stream::ByteStream) and the window / AES-CTR wrappers |
//! | [`integrity`] | Hash-tree metadata and the lazily verified data stream |
//! | [`crypto`]    | AES-128 ECB/CBC/CTR/XTS, SHA-1/SHA-256, NCA helpers |
//! | [`keys`]      | Key types and `prod.keys` / `title.keys` loading |
//! | [`config`]    | Declarative layer stacking via [`open_stream`](config::open_stream) |
//!
//! # Features
//! - `logger`: route `debug!`/`trace!`/`warn!` output to the [`log`](https://docs.rs/log)
//!   facade. Without it logging compiles to nothing.

pub mod config;
pub mod crypto;
pub mod error;
pub mod integrity;
pub mod keys;
pub mod stream;

mod logger;
mod utils;

pub use error::{Error, HashLevel, Result};
