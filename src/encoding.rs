use std::fmt;

/// Envelope format generation, stored in the first byte of every envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Version(pub u8);

/// The only envelope version this crate reads or writes.
pub const DEFAULT_VERSION: Version = Version(1);

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoding tag, stored in the second byte of an envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Encoding {
    /// No payload. Decodes to absence for nillable types and to the zero value otherwise.
    #[default]
    Empty = 0,
    /// Fixed-width big-endian.
    BigEndian = 1,
    /// Fixed-width little-endian.
    LittleEndian = 2,
    Json = 3,
    Proto = 4,
    MsgPack = 5,
    /// Legacy native binary container. Only available with the `native` feature.
    Native = 6,
}

impl Encoding {
    /// Construct an encoding from its tag byte.
    pub fn from_u8(n: u8) -> Option<Encoding> {
        match n {
            0 => Some(Encoding::Empty),
            1 => Some(Encoding::BigEndian),
            2 => Some(Encoding::LittleEndian),
            3 => Some(Encoding::Json),
            4 => Some(Encoding::Proto),
            5 => Some(Encoding::MsgPack),
            6 => Some(Encoding::Native),
            _ => None,
        }
    }

    pub fn into_u8(self) -> u8 {
        self as u8
    }

    pub fn is_fixed_width(&self) -> bool {
        matches!(self, Encoding::BigEndian | Encoding::LittleEndian)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Encoding::Empty => "empty",
            Encoding::BigEndian => "big-endian",
            Encoding::LittleEndian => "little-endian",
            Encoding::Json => "json",
            Encoding::Proto => "protobuf",
            Encoding::MsgPack => "msgpack",
            Encoding::Native => "native",
        })
    }
}
