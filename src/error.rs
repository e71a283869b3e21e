//! Error types for both directions of the codec.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::reference::RefKind;

/// What went wrong while decoding.
#[derive(Debug, Error)]
pub enum DecodeErrorKind {
    #[error("unknown type marker 0x{0:02x}")]
    UnknownMarker(u8),
    #[error("unexpected end of input")]
    TruncatedInput,
    #[error("integer field out of range")]
    MalformedInteger,
    #[error("invalid {table} reference index {index}")]
    InvalidReferenceIndex { table: RefKind, index: u32 },
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("nesting depth limit exceeded")]
    RecursionLimitExceeded,
    #[error("reference table overflow")]
    ReferenceTableOverflow,
    #[error("trailing bytes after the last value")]
    TrailingBytes,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A decode failure together with the byte offset it was detected at.
#[derive(Debug, Error)]
#[error("{kind} at byte offset {offset}")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub offset: usize,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, offset: usize) -> Self {
        DecodeError { kind, offset }
    }

    pub fn kind(&self) -> &DecodeErrorKind {
        &self.kind
    }
}

/// One step of an [`EncodePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Index(usize),
    Member(String),
}

/// Location of a value inside the graph handed to the encoder, rendered
/// as `$`, `$[2]`, `$[2].child` and so on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodePath(Vec<PathSegment>);

impl EncodePath {
    pub fn root() -> Self {
        EncodePath(Vec::new())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for EncodePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Index(i) => write!(f, "[{}]", i)?,
                PathSegment::Member(name) => write!(f, ".{}", name)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("cannot encode a value of type `{type_name}` at {path}")]
    UnencodableType { type_name: String, path: EncodePath },
    #[error("nesting depth limit exceeded at {path}")]
    RecursionLimitExceeded { path: EncodePath },
    #[error("{table} reference index {index} does not fit a U29 at {path}")]
    ReferenceOverflow {
        table: RefKind,
        index: u32,
        path: EncodePath,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EncodeError {
    pub(crate) fn unencodable(type_name: impl Into<String>) -> Self {
        EncodeError::UnencodableType {
            type_name: type_name.into(),
            path: EncodePath::root(),
        }
    }

    pub(crate) fn reference_overflow(table: RefKind, index: u32) -> Self {
        EncodeError::ReferenceOverflow {
            table,
            index,
            path: EncodePath::root(),
        }
    }

    pub(crate) fn too_deep() -> Self {
        EncodeError::RecursionLimitExceeded {
            path: EncodePath::root(),
        }
    }

    /// Prefixes the error's path with `segment`; called while unwinding.
    pub(crate) fn within(mut self, segment: PathSegment) -> Self {
        match &mut self {
            EncodeError::UnencodableType { path, .. }
            | EncodeError::RecursionLimitExceeded { path }
            | EncodeError::ReferenceOverflow { path, .. } => path.0.insert(0, segment),
            EncodeError::Io(_) => {}
        }
        self
    }

    pub(crate) fn at_index(self, index: usize) -> Self {
        self.within(PathSegment::Index(index))
    }

    pub(crate) fn at_member(self, name: &str) -> Self {
        self.within(PathSegment::Member(name.to_string()))
    }

    /// Path of the offending value, if the error has one.
    pub fn path(&self) -> Option<&EncodePath> {
        match self {
            EncodeError::UnencodableType { path, .. }
            | EncodeError::RecursionLimitExceeded { path }
            | EncodeError::ReferenceOverflow { path, .. } => Some(path),
            EncodeError::Io(_) => None,
        }
    }
}

/// Error of the serde-facing helpers ([`crate::to_vec`], [`crate::from_slice`],
/// [`crate::to_value`], [`crate::from_value`]).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("Serde error: {0}")]
    Serde(String),
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Serde(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Serde(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
