//! Library-wide error and result types.

use std::fmt;
use std::io;

/// Result alias used throughout hacfile.
pub type Result<T> = std::result::Result<T, Error>;

/// Which level of a hash tree a failed comparison belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashLevel {
    /// An intermediate hash layer, indexed root-to-leaf.
    Layer(usize),
    /// The data layer holding real content.
    Data,
}

impl fmt::Display for HashLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashLevel::Layer(i) => write!(f, "hash layer {i}"),
            HashLevel::Data => write!(f, "data layer"),
        }
    }
}

/// All errors the library can produce.
///
/// Every error is surfaced to the immediate caller; nothing in this crate
/// retries. A hash mismatch is never transient.
#[derive(Debug)]
pub enum Error {
    /// A buffer or cache of the given size could not be allocated.
    AllocationFailure(usize),
    /// A read or write would touch bytes outside the declared bounds.
    OutOfRange { offset: u64, len: u64, size: u64 },
    /// A buffer or cache length is not a multiple of the AES block size.
    InvalidLength(usize),
    /// AES-XTS was asked to process a sector that is not block aligned.
    /// Ciphertext stealing is not implemented.
    UnsupportedSectorSize(usize),
    /// A computed hash did not match the expected one.
    Integrity { level: HashLevel, block: u64 },
    /// The stream does not support the requested operation.
    UnsupportedOperation(&'static str),
    /// The stream failed earlier and can no longer be used.
    Poisoned,
    /// A magic/signature field did not match the expected value.
    BadMagic,
    /// A format version is present in the data but not supported.
    UnsupportedVersion(u32),
    /// The stream ended before all expected bytes could be read.
    UnexpectedEof,
    /// A structural constraint was violated (message describes which one).
    Parse(&'static str),
    /// An underlying I/O operation failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocationFailure(n) => write!(f, "failed to allocate {n} bytes"),
            Error::OutOfRange { offset, len, size } => write!(
                f,
                "range {offset:#x}+{len:#x} exceeds stream size {size:#x}"
            ),
            Error::InvalidLength(n) => {
                write!(f, "invalid length {n} for 16-byte AES blocks")
            }
            Error::UnsupportedSectorSize(n) => {
                write!(f, "unsupported XTS sector size {n} (not block aligned)")
            }
            Error::Integrity { level, block } => {
                write!(f, "integrity check failed in {level}, block {block}")
            }
            Error::UnsupportedOperation(s) => write!(f, "unsupported operation: {s}"),
            Error::Poisoned => write!(f, "stream is unusable after an earlier failure"),
            Error::BadMagic => write!(f, "bad magic value"),
            Error::UnsupportedVersion(v) => write!(f, "unsupported version: {v:#x}"),
            Error::UnexpectedEof => write!(f, "unexpected end of file"),
            Error::Parse(s) => write!(f, "parse error: {s}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Error::Io(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof
        } else {
            Error::Io(e)
        }
    }
}

impl Error {
    /// Returns true for a hash mismatch at any level.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Integrity { .. })
    }
}
