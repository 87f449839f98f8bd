//! entity-marshal converts structured entities to and from the two storage shapes a key-value
//! entity store works with:
//!
//! - Flattened maps, where each field of a struct (including fields of nested structs) is a
//!   separate entry keyed by its dotted path, and
//! - Envelopes, which hold a single value as bytes behind a version byte and an encoding tag.
//!
//! Map values are either scalars, stored exactly as they are, or byte strings holding an envelope.
//! Envelopes can hold fixed-width binary (either byte order), JSON, protocol buffers, MessagePack,
//! or a native binary form, and distinguish "nothing stored" from "zero stored" so that absent
//! optional fields stay absent.
//!
//! A type takes part by implementing [`Marshal`], which for structs is done by
//! [`marshal_struct!`]:
//!
//! ```
//! use entity_marshal::{decode_map, encode_map, marshal_struct, Value};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct Address {
//!     city: String,
//!     zip: u16,
//! }
//!
//! #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     name: String,
//!     address: Option<Address>,
//!     roles: Vec<String>,
//! }
//!
//! marshal_struct!(Address { city, zip });
//! marshal_struct!(User { name, address, roles });
//!
//! let user = User {
//!     name: "ann".into(),
//!     address: Some(Address { city: "Oslo".into(), zip: 150 }),
//!     roles: vec!["admin".into()],
//! };
//!
//! let map = encode_map(&user).unwrap();
//! assert_eq!(map["address.city"], Value::from("Oslo"));
//! assert_eq!(map["address.zip"], Value::U16(150));
//! assert!(map["roles"].is_bin());
//!
//! let mut back = User::default();
//! decode_map(&map, &mut back).unwrap();
//! assert_eq!(back, user);
//! ```
//!
//! Types can replace the generic logic with their own through the capability methods on
//! [`Marshal`]: custom map decoders and encoders, protocol buffer support (see [`proto`]), and
//! self-decoding MessagePack.
//!
//! The exact storage formats are described in the [`format`] module.
//!
//! # Features
//!
//! - `native` (default): support the native binary envelope encoding, through `bincode`.

mod de;
mod encoding;
mod envelope;
mod error;
mod map;
mod marshal;
mod msgpack;
mod path;
mod ser;
mod value;

pub mod format;
pub mod proto;

pub use encoding::{Encoding, Version, DEFAULT_VERSION};
pub use envelope::{decode_envelope, encode_envelope, encode_envelope_with};
pub use error::{Error, Result};
pub use map::{
    decode_byte_map, decode_map, encode_byte_map, encode_map, ByteMap, ByteMapDecoder,
    ByteMapEncoder, MapDecoder, MapEncoder,
};
pub use marshal::{Field, FieldVisitor, Marshal, Staged};
pub use path::{flatten, join_path, split_path, unflatten, FlatMap, NestedMap, SEPARATOR};
pub use value::{Kind, Value};
