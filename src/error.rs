use core::fmt;
use std::path::PathBuf;

use crate::hash::Hash;

/// Every fallible operation in this crate returns through this type.
///
/// Variants are a direct rendering of the tagged outcomes a reimplementation
/// should use instead of the inverted `0 = present, 1 = absent` polarity of
/// the original source.
#[derive(Debug)]
pub enum Error {
    Io { path: PathBuf, source: std::io::Error },
    Format(String),
    NotFound(Hash),
    CorruptObject(Hash),
    CorruptDelta,
    MissingBase(Hash),
    Inflate(String),
    BadFraming(String),
    Http(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::Format(what) => write!(f, "format error: {}", what),
            Self::NotFound(hash) => write!(f, "object not found: {}", hash),
            Self::CorruptObject(hash) => write!(f, "corrupt object: {}", hash),
            Self::CorruptDelta => write!(f, "corrupt delta instruction stream"),
            Self::MissingBase(hash) => write!(f, "missing delta base: {}", hash),
            Self::Inflate(what) => write!(f, "inflate error: {}", what),
            Self::BadFraming(what) => write!(f, "bad packet-line framing: {}", what),
            Self::Http(what) => write!(f, "http error: {}", what),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
