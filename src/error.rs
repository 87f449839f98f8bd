use std::fmt;

use serde::{de, ser};

use crate::value::Kind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// Empty byte input, a missing capability, or otherwise structurally nonsensical input.
    InvalidData(String),
    /// The envelope's version byte isn't the one this crate understands.
    UnsupportedVersion(u8),
    /// The envelope's encoding tag isn't one of the known encodings.
    UnsupportedEncoding(u8),
    /// A path segment doesn't name a field on the structure it was looked up in.
    FieldNotFound {
        field: String,
        type_name: &'static str,
    },
    /// A scalar map value doesn't have the same kind as the field it targets.
    KindMismatch {
        key: String,
        expected: Kind,
        found: Kind,
    },
    /// A map value of a kind that can't be assigned to a field at all.
    UnmatchedKind { key: String, kind: Kind },
    /// A decoded number doesn't fit in the destination type.
    Overflow { value: String, target: &'static str },
    /// Payload ended before a sized read could complete.
    ShortBuffer { needed: usize, remaining: usize },
    /// Payload had bytes left over after decoding.
    UnreadData(usize),
    /// Two flattened keys disagree about whether a path is a leaf or a mapping.
    PathConflict(String),
    /// Occurs when serde serialization or deserialization fails
    SerdeFail(String),
    Json(serde_json::Error),
    MsgPackDecode(rmp_serde::decode::Error),
    MsgPackEncode(rmp_serde::encode::Error),
    Proto(prost::DecodeError),
    #[cfg(feature = "native")]
    Native(bincode::Error),
}

impl Error {
    /// Returns true for errors caused by a payload that was too short or too long.
    pub fn is_buffer_integrity(&self) -> bool {
        matches!(self, Error::ShortBuffer { .. } | Error::UnreadData(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidData(ref msg) => write!(f, "Invalid data: {}", msg),
            Error::UnsupportedVersion(v) => write!(f, "Unsupported version: {}", v),
            Error::UnsupportedEncoding(e) => write!(f, "Unsupported encoding: {}", e),
            Error::FieldNotFound {
                ref field,
                type_name,
            } => write!(
                f,
                "Field `{}` specified, but does not exist on structs of type `{}`",
                field, type_name
            ),
            Error::KindMismatch {
                ref key,
                expected,
                found,
            } => write!(
                f,
                "Field value `{}` has kind `{}`, when `{}` is expected",
                key, found, expected
            ),
            Error::UnmatchedKind { ref key, kind } => {
                write!(f, "Unmatched map value kind `{}` for `{}`", kind, key)
            }
            Error::Overflow { ref value, target } => {
                write!(f, "Stored value ({}) overflows {}", value, target)
            }
            Error::ShortBuffer { needed, remaining } => write!(
                f,
                "Expected {} more bytes, but only {} remain in buffer",
                needed, remaining
            ),
            Error::UnreadData(left) => write!(f, "Unread data left in buffer ({} bytes)", left),
            Error::PathConflict(ref path) => {
                write!(f, "Path `{}` is both a value and a mapping", path)
            }
            Error::SerdeFail(ref msg) => f.write_str(msg),
            Error::Json(ref err) => write!(f, "JSON decoding failed: {}", err),
            Error::MsgPackDecode(ref err) => write!(f, "MessagePack decoding failed: {}", err),
            Error::MsgPackEncode(ref err) => write!(f, "MessagePack encoding failed: {}", err),
            Error::Proto(ref err) => write!(f, "Protocol buffer decoding failed: {}", err),
            #[cfg(feature = "native")]
            Error::Native(ref err) => write!(f, "Native binary coding failed: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Json(ref err) => Some(err),
            Error::MsgPackDecode(ref err) => Some(err),
            Error::MsgPackEncode(ref err) => Some(err),
            Error::Proto(ref err) => Some(err),
            #[cfg(feature = "native")]
            Error::Native(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Self::MsgPackDecode(e)
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Self::MsgPackEncode(e)
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Self::Proto(e)
    }
}

#[cfg(feature = "native")]
impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Self::Native(e)
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}
