//! Static type descriptions used in place of runtime reflection.
//!
//! Every type that can be stored implements [`Marshal`], which describes its [`Kind`], how it is
//! stored as an envelope, and (for structs) how to reach its fields by name. [`Field`] is the
//! object-safe view of the same information, implemented for every `Marshal` type, which is what
//! the map decoder walks when following a dotted path.
//!
//! Structs normally get their `Marshal` implementation from [`marshal_struct!`]:
//!
//! ```
//! use entity_marshal::marshal_struct;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Address {
//!     street: String,
//!     number: u16,
//! }
//!
//! marshal_struct!(Address { street, number });
//! ```

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use serde::{de::DeserializeOwned, Serialize};

use crate::encoding::Encoding;
use crate::envelope::{decode_envelope, encode_envelope};
use crate::error::{Error, Result};
use crate::map::{ByteMapDecoder, ByteMapEncoder, MapDecoder, MapEncoder};
use crate::msgpack;
use crate::value::{Kind, Value};

/// Callback used to visit the named fields of a struct.
pub type FieldVisitor<'a> = dyn FnMut(&str, &dyn Field) -> Result<()> + 'a;

/// A decoded value of a field's exact type, waiting to be stored with [`Field::apply`].
pub type Staged = Box<dyn Any>;

/// Static description of a storable type.
///
/// Only [`KIND`](Marshal::KIND) is required. The capability methods
/// ([`as_map_decoder`](Marshal::as_map_decoder), [`decode_proto`](Marshal::decode_proto), and
/// so on) default to "not supported", and are overridden by types that want to replace the
/// generic logic with their own.
pub trait Marshal: Serialize + DeserializeOwned + Default + 'static {
    const KIND: Kind;
    /// Encoding used when this type is stored as an envelope.
    const ENCODING: Encoding = Encoding::MsgPack;
    /// True if every value of this type has the same fixed-width size.
    const FIXED_WIDTH: bool = false;

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// The kind of this type once any indirection (`Option`, `Box`) is looked through.
    fn resolved_kind() -> Kind {
        Self::KIND
    }

    /// Convert a scalar map value of exactly this type's kind.
    fn from_scalar(_value: &Value) -> Option<Self> {
        None
    }

    /// The scalar form of this value, if it has one.
    fn to_scalar(&self) -> Option<Value> {
        None
    }

    /// True if this value is explicitly absent, as opposed to merely zero.
    fn is_absent(&self) -> bool {
        false
    }

    /// Look up a named field, allocating through indirection if needed.
    fn field_mut(&mut self, _name: &str) -> Option<&mut dyn Field> {
        None
    }

    /// A default value whose fields can be inspected in place of this one's, when this is an
    /// absent indirection.
    fn stand_in(&self) -> Option<Box<dyn Field>> {
        None
    }

    /// Visit each named field in declaration order.
    fn for_each_field(&self, _f: &mut FieldVisitor) -> Result<()> {
        Ok(())
    }

    fn as_map_decoder(&mut self) -> Option<&mut dyn MapDecoder> {
        None
    }

    fn as_byte_map_decoder(&mut self) -> Option<&mut dyn ByteMapDecoder> {
        None
    }

    fn as_map_encoder(&self) -> Option<&dyn MapEncoder> {
        None
    }

    fn as_byte_map_encoder(&self) -> Option<&dyn ByteMapEncoder> {
        None
    }

    /// Decode from a serialized protocol buffer message. `None` means the type isn't one.
    fn decode_proto(_buf: &[u8]) -> Option<Result<Self>> {
        None
    }

    fn encode_proto(&self) -> Option<Vec<u8>> {
        None
    }

    /// Decode from MessagePack with type-specific logic, returning the value and the number of
    /// bytes consumed. `None` falls back to the generic serde decoder.
    fn decode_msgpack(_buf: &[u8]) -> Option<Result<(Self, usize)>> {
        None
    }

    fn encode_msgpack(&self) -> Option<Result<Vec<u8>>> {
        None
    }
}

/// Object-safe view of a [`Marshal`] value.
///
/// Decoding into a field happens in two steps: the new value is staged without touching the
/// field, then applied. This lets a whole mapping be checked before anything is changed.
pub trait Field {
    fn target_kind(&self) -> Kind;
    fn field_type(&self) -> &'static str;
    fn child(&mut self, name: &str) -> Option<&mut dyn Field>;
    fn placeholder(&self) -> Option<Box<dyn Field>>;
    fn stage_scalar(&self, value: &Value) -> Result<Staged>;
    /// Decode an envelope for this field. `None` means the envelope holds nothing and the field
    /// should be left as it is.
    fn stage_envelope(&self, buf: &[u8]) -> Result<Option<Staged>>;
    fn apply(&mut self, staged: Staged) -> Result<()>;
    fn map_decoder(&mut self) -> Option<&mut dyn MapDecoder>;
    fn absent(&self) -> bool;
    fn scalar(&self) -> Option<Value>;
    fn envelope(&self) -> Result<Vec<u8>>;
    fn visit_fields(&self, f: &mut FieldVisitor) -> Result<()>;
    fn map_encoder(&self) -> Option<&dyn MapEncoder>;
}

impl<T: Marshal> Field for T {
    fn target_kind(&self) -> Kind {
        T::resolved_kind()
    }

    fn field_type(&self) -> &'static str {
        T::type_name()
    }

    fn child(&mut self, name: &str) -> Option<&mut dyn Field> {
        self.field_mut(name)
    }

    fn placeholder(&self) -> Option<Box<dyn Field>> {
        self.stand_in()
    }

    fn stage_scalar(&self, value: &Value) -> Result<Staged> {
        match T::from_scalar(value) {
            Some(v) => Ok(Box::new(v) as Staged),
            None => Err(Error::InvalidData(format!(
                "value of kind `{}` can't be assigned to `{}`",
                value.kind(),
                T::type_name()
            ))),
        }
    }

    fn stage_envelope(&self, buf: &[u8]) -> Result<Option<Staged>> {
        Ok(decode_envelope::<T>(buf)?.map(|v| Box::new(v) as Staged))
    }

    fn apply(&mut self, staged: Staged) -> Result<()> {
        match staged.downcast::<T>() {
            Ok(v) => {
                *self = *v;
                Ok(())
            }
            Err(_) => Err(Error::InvalidData(format!(
                "staged value is not a `{}`",
                T::type_name()
            ))),
        }
    }

    fn map_decoder(&mut self) -> Option<&mut dyn MapDecoder> {
        self.as_map_decoder()
    }

    fn absent(&self) -> bool {
        self.is_absent()
    }

    fn scalar(&self) -> Option<Value> {
        self.to_scalar()
    }

    fn envelope(&self) -> Result<Vec<u8>> {
        encode_envelope(self)
    }

    fn visit_fields(&self, f: &mut FieldVisitor) -> Result<()> {
        self.for_each_field(f)
    }

    fn map_encoder(&self) -> Option<&dyn MapEncoder> {
        self.as_map_encoder()
    }
}

macro_rules! impl_marshal_scalar {
    ($t: ty, $kind: ident) => {
        impl Marshal for $t {
            const KIND: Kind = Kind::$kind;
            const ENCODING: Encoding = Encoding::BigEndian;
            const FIXED_WIDTH: bool = true;

            fn from_scalar(value: &Value) -> Option<Self> {
                match *value {
                    Value::$kind(v) => Some(v),
                    _ => None,
                }
            }

            fn to_scalar(&self) -> Option<Value> {
                Some(Value::$kind(*self))
            }
        }
    };
}

impl_marshal_scalar!(bool, Bool);
impl_marshal_scalar!(i8, I8);
impl_marshal_scalar!(i16, I16);
impl_marshal_scalar!(i32, I32);
impl_marshal_scalar!(i64, I64);
impl_marshal_scalar!(u8, U8);
impl_marshal_scalar!(u16, U16);
impl_marshal_scalar!(u32, U32);
impl_marshal_scalar!(u64, U64);
impl_marshal_scalar!(f32, F32);
impl_marshal_scalar!(f64, F64);

impl Marshal for String {
    const KIND: Kind = Kind::Str;
    const ENCODING: Encoding = Encoding::BigEndian;

    fn from_scalar(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn to_scalar(&self) -> Option<Value> {
        Some(Value::Str(self.clone()))
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    const KIND: Kind = Kind::Array;
    const ENCODING: Encoding = if T::FIXED_WIDTH {
        Encoding::BigEndian
    } else {
        Encoding::MsgPack
    };
}

impl<V: Marshal> Marshal for BTreeMap<String, V> {
    const KIND: Kind = Kind::Map;
}

impl<V: Marshal> Marshal for HashMap<String, V> {
    const KIND: Kind = Kind::Map;
}

impl Marshal for Value {
    const KIND: Kind = Kind::Any;

    fn from_scalar(value: &Value) -> Option<Self> {
        Some(value.clone())
    }

    fn to_scalar(&self) -> Option<Value> {
        if self.kind().is_scalar() {
            Some(self.clone())
        } else {
            None
        }
    }

    fn is_absent(&self) -> bool {
        self.is_null()
    }

    fn decode_msgpack(buf: &[u8]) -> Option<Result<(Self, usize)>> {
        let mut rd = buf;
        Some(msgpack::read_value(&mut rd).map(|v| (v, buf.len() - rd.len())))
    }

    fn encode_msgpack(&self) -> Option<Result<Vec<u8>>> {
        let mut buf = Vec::new();
        Some(msgpack::write_value(&mut buf, self).map(|()| buf))
    }
}

/// `Option` is the pointer-like indirection: it may be absent, and is allocated on demand when a
/// path walks through it.
impl<T: Marshal> Marshal for Option<T> {
    const KIND: Kind = Kind::Optional;
    const ENCODING: Encoding = T::ENCODING;

    fn type_name() -> &'static str {
        T::type_name()
    }

    fn resolved_kind() -> Kind {
        T::resolved_kind()
    }

    fn from_scalar(value: &Value) -> Option<Self> {
        T::from_scalar(value).map(Some)
    }

    fn to_scalar(&self) -> Option<Value> {
        self.as_ref().and_then(T::to_scalar)
    }

    fn is_absent(&self) -> bool {
        self.is_none()
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut dyn Field> {
        // Don't allocate just to find out the field doesn't exist
        if self.is_none() && T::default().field_mut(name).is_none() {
            return None;
        }
        self.get_or_insert_with(T::default).field_mut(name)
    }

    fn stand_in(&self) -> Option<Box<dyn Field>> {
        match self {
            Some(v) => v.stand_in(),
            None => Some(Box::new(T::default()) as Box<dyn Field>),
        }
    }

    fn for_each_field(&self, f: &mut FieldVisitor) -> Result<()> {
        match self {
            Some(v) => v.for_each_field(f),
            None => Ok(()),
        }
    }

    fn as_map_decoder(&mut self) -> Option<&mut dyn MapDecoder> {
        if self.is_none() && T::default().as_map_decoder().is_none() {
            return None;
        }
        self.get_or_insert_with(T::default).as_map_decoder()
    }

    fn as_byte_map_decoder(&mut self) -> Option<&mut dyn ByteMapDecoder> {
        if self.is_none() && T::default().as_byte_map_decoder().is_none() {
            return None;
        }
        self.get_or_insert_with(T::default).as_byte_map_decoder()
    }

    fn as_map_encoder(&self) -> Option<&dyn MapEncoder> {
        self.as_ref().and_then(T::as_map_encoder)
    }

    fn as_byte_map_encoder(&self) -> Option<&dyn ByteMapEncoder> {
        self.as_ref().and_then(T::as_byte_map_encoder)
    }

    fn decode_proto(buf: &[u8]) -> Option<Result<Self>> {
        T::decode_proto(buf).map(|res| res.map(Some))
    }

    fn encode_proto(&self) -> Option<Vec<u8>> {
        self.as_ref().and_then(T::encode_proto)
    }

    fn decode_msgpack(buf: &[u8]) -> Option<Result<(Self, usize)>> {
        T::decode_msgpack(buf).map(|res| res.map(|(v, n)| (Some(v), n)))
    }

    fn encode_msgpack(&self) -> Option<Result<Vec<u8>>> {
        self.as_ref().and_then(T::encode_msgpack)
    }
}

/// `Box` is an indirection that is never absent, so it is transparent.
impl<T: Marshal> Marshal for Box<T> {
    const KIND: Kind = T::KIND;
    const ENCODING: Encoding = T::ENCODING;
    const FIXED_WIDTH: bool = T::FIXED_WIDTH;

    fn type_name() -> &'static str {
        T::type_name()
    }

    fn resolved_kind() -> Kind {
        T::resolved_kind()
    }

    fn from_scalar(value: &Value) -> Option<Self> {
        T::from_scalar(value).map(Box::new)
    }

    fn to_scalar(&self) -> Option<Value> {
        (**self).to_scalar()
    }

    fn is_absent(&self) -> bool {
        (**self).is_absent()
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut dyn Field> {
        (**self).field_mut(name)
    }

    fn stand_in(&self) -> Option<Box<dyn Field>> {
        (**self).stand_in()
    }

    fn for_each_field(&self, f: &mut FieldVisitor) -> Result<()> {
        (**self).for_each_field(f)
    }

    fn as_map_decoder(&mut self) -> Option<&mut dyn MapDecoder> {
        (**self).as_map_decoder()
    }

    fn as_byte_map_decoder(&mut self) -> Option<&mut dyn ByteMapDecoder> {
        (**self).as_byte_map_decoder()
    }

    fn as_map_encoder(&self) -> Option<&dyn MapEncoder> {
        (**self).as_map_encoder()
    }

    fn as_byte_map_encoder(&self) -> Option<&dyn ByteMapEncoder> {
        (**self).as_byte_map_encoder()
    }

    fn decode_proto(buf: &[u8]) -> Option<Result<Self>> {
        T::decode_proto(buf).map(|res| res.map(Box::new))
    }

    fn encode_proto(&self) -> Option<Vec<u8>> {
        (**self).encode_proto()
    }

    fn decode_msgpack(buf: &[u8]) -> Option<Result<(Self, usize)>> {
        T::decode_msgpack(buf).map(|res| res.map(|(v, n)| (Box::new(v), n)))
    }

    fn encode_msgpack(&self) -> Option<Result<Vec<u8>>> {
        (**self).encode_msgpack()
    }
}

/// Implement [`Marshal`] for a struct, making the listed fields reachable by name.
///
/// Fields not listed are invisible to the map decoder and encoder. An optional trailing block
/// holds additional `Marshal` items, such as capability overrides:
///
/// ```ignore
/// marshal_struct!(Client { id, secret } {
///     const ENCODING: Encoding = Encoding::Json;
/// });
/// ```
#[macro_export]
macro_rules! marshal_struct {
    ($t:ty { $($field:ident),* $(,)? } $({ $($extra:tt)* })?) => {
        impl $crate::Marshal for $t {
            const KIND: $crate::Kind = $crate::Kind::Struct;

            fn field_mut(&mut self, name: &str) -> ::std::option::Option<&mut dyn $crate::Field> {
                match name {
                    $(stringify!($field) => ::std::option::Option::Some(&mut self.$field),)*
                    _ => ::std::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn for_each_field(
                &self,
                f: &mut $crate::FieldVisitor,
            ) -> $crate::Result<()> {
                $(f(stringify!($field), &self.$field)?;)*
                ::std::result::Result::Ok(())
            }

            $($($extra)*)?
        }
    };
}
