//! Wire decoding and encoding errors.

use core::fmt;
use std::error::Error;

use crate::encoding::WireType;

/// A Protobuf message decoding error.
///
/// `DecodeError` indicates that the input does not contain a valid Protobuf
/// message, or that a configured limit was exceeded while reading one. The
/// error carries a typed [`DecodeErrorKind`] plus the logical path of message
/// fields that were being decoded when the error occurred.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodeError {
    inner: Box<Inner>,
}

#[derive(Clone, PartialEq, Eq)]
struct Inner {
    kind: DecodeErrorKind,
    /// Stack of `Message.field` entries, innermost last.
    path: Vec<String>,
}

/// The root cause of a [`DecodeError`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// The input ended before a value was complete.
    Truncated,
    /// A varint used more than ten bytes or overflowed 64 bits.
    InvalidVarint,
    /// A tag carried a wire type value outside the encodable set.
    InvalidWireTypeValue { value: u32 },
    /// The wire type read off the stream is incompatible with the field's
    /// declared type and no alternative encoding applies.
    UnexpectedWireType {
        actual: WireType,
        expected: WireType,
    },
    /// A tag carried field number zero or a number in the reserved
    /// 19000..=19999 range.
    InvalidTag { field_number: u32 },
    /// A length delimiter decoded to a value above `i32::MAX`.
    NegativeLength,
    /// Nested messages or groups exceeded the reader's recursion limit.
    RecursionLimitExceeded,
    /// A stream source produced more bytes than the configured size limit.
    SizeLimitExceeded,
    /// An end-group tag appeared without a matching start, or with the wrong
    /// field number.
    UnexpectedEndGroupTag,
    /// A string field held bytes that are not valid UTF-8.
    InvalidUtf8,
    /// The underlying source failed.
    Io(std::io::ErrorKind),
}

impl DecodeError {
    pub(crate) fn new(kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            inner: Box::new(Inner {
                kind,
                path: Vec::new(),
            }),
        }
    }

    /// The root cause of this error.
    pub fn kind(&self) -> &DecodeErrorKind {
        &self.inner.kind
    }

    /// The logical field path where decoding failed, outermost first.
    ///
    /// Each entry has the form `full.message.Name.field_name`. The path is
    /// best effort: raw codec failures outside any message have none.
    pub fn path(&self) -> &[String] {
        &self.inner.path
    }

    pub(crate) fn push_path(mut self, message: &str, field: &str) -> DecodeError {
        self.inner.path.insert(0, format!("{message}.{field}"));
        self
    }
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeError")
            .field("kind", &self.inner.kind)
            .field("path", &self.inner.path)
            .finish()
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode Protobuf message: {}", self.inner.kind)?;
        for segment in &self.inner.path {
            write!(f, ": {segment}")?;
        }
        Ok(())
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::Truncated => f.write_str("truncated input"),
            DecodeErrorKind::InvalidVarint => f.write_str("invalid varint"),
            DecodeErrorKind::InvalidWireTypeValue { value } => {
                write!(f, "invalid wire type value: {value}")
            }
            DecodeErrorKind::UnexpectedWireType { actual, expected } => {
                write!(f, "invalid wire type: {actual:?} (expected {expected:?})")
            }
            DecodeErrorKind::InvalidTag { field_number } => {
                write!(f, "invalid tag: field number {field_number}")
            }
            DecodeErrorKind::NegativeLength => f.write_str("negative length delimiter"),
            DecodeErrorKind::RecursionLimitExceeded => f.write_str("recursion limit exceeded"),
            DecodeErrorKind::SizeLimitExceeded => f.write_str("size limit exceeded"),
            DecodeErrorKind::UnexpectedEndGroupTag => f.write_str("unexpected end group tag"),
            DecodeErrorKind::InvalidUtf8 => {
                f.write_str("invalid string value: data is not UTF-8 encoded")
            }
            DecodeErrorKind::Io(kind) => write!(f, "I/O failure: {kind}"),
        }
    }
}

impl Error for DecodeError {}

impl From<DecodeErrorKind> for DecodeError {
    fn from(kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(kind)
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(error: std::io::Error) -> DecodeError {
        DecodeError::new(DecodeErrorKind::Io(error.kind()))
    }
}

impl From<DecodeError> for std::io::Error {
    fn from(error: DecodeError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, error)
    }
}

/// A Protobuf message encoding error.
///
/// Encoding into a growable buffer is infallible; `EncodeError` arises only
/// from bounded sinks and external writers.
#[derive(Debug)]
pub enum EncodeError {
    /// A bounded sink ran out of space.
    OutOfSpace { required: usize, remaining: usize },
    /// A bounded sink was expected to be exactly full but was not.
    TrailingSpace { remaining: usize },
    /// The underlying sink failed.
    Io(std::io::Error),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::OutOfSpace {
                required,
                remaining,
            } => write!(
                f,
                "failed to encode Protobuf message; insufficient buffer capacity \
                 (required: {required}, remaining: {remaining})"
            ),
            EncodeError::TrailingSpace { remaining } => write!(
                f,
                "failed to encode Protobuf message; {remaining} bytes of buffer capacity left over"
            ),
            EncodeError::Io(error) => write!(f, "failed to encode Protobuf message: {error}"),
        }
    }
}

impl Error for EncodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EncodeError::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(error: std::io::Error) -> EncodeError {
        EncodeError::Io(error)
    }
}

impl From<EncodeError> for std::io::Error {
    fn from(error: EncodeError) -> std::io::Error {
        match error {
            EncodeError::Io(error) => error,
            other => std::io::Error::new(std::io::ErrorKind::InvalidInput, other),
        }
    }
}

/// Error returned when a message is missing required fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UninitializedError {
    path: String,
}

impl UninitializedError {
    pub(crate) fn new(path: String) -> UninitializedError {
        UninitializedError { path }
    }

    /// Dotted path to the first missing required field.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for UninitializedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message is missing required field: {}", self.path)
    }
}

impl Error for UninitializedError {}

/// Error produced while building or resolving a descriptor graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptorError {
    description: String,
}

impl DescriptorError {
    pub(crate) fn new(description: impl Into<String>) -> DescriptorError {
        DescriptorError {
            description: description.into(),
        }
    }
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid descriptor: {}", self.description)
    }
}

impl Error for DescriptorError {}
