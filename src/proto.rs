//! Helpers for types that store themselves as protocol buffer messages.
//!
//! A `prost` message opts in by overriding the proto capability in its `Marshal`
//! implementation:
//!
//! ```ignore
//! marshal_struct!(Session { id, scopes } {
//!     const ENCODING: Encoding = Encoding::Proto;
//!
//!     fn decode_proto(buf: &[u8]) -> Option<Result<Self>> {
//!         Some(proto::decode_message(buf))
//!     }
//!
//!     fn encode_proto(&self) -> Option<Vec<u8>> {
//!         Some(proto::encode_message(self))
//!     }
//! });
//! ```

use prost::Message;

use crate::error::Result;

/// Decode a complete protocol buffer message.
pub fn decode_message<M: Message + Default>(buf: &[u8]) -> Result<M> {
    Ok(M::decode(buf)?)
}

pub fn encode_message<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_to_vec()
}
