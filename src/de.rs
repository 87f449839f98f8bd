//! Fixed-width deserialization.
//!
//! The inverse of [`ser`](crate::ser), with a few rules for payloads that don't match the target
//! exactly:
//!
//! - An empty payload decodes as the zero value of any type.
//! - A payload that runs out partway through a value fails with [`Error::ShortBuffer`].
//! - Bytes left over once the target is fully decoded fail with [`Error::UnreadData`].
//! - A top-level integer narrower than 64 bits also accepts an 8-byte payload, which is read as a
//!   64-bit integer of the same signedness and narrowed, failing with [`Error::Overflow`] if it
//!   doesn't fit.
//! - Strings, byte strings, and sequences consume the remainder of the payload.

use std::convert::TryFrom;
use std::marker::PhantomData;

use byteorder::ByteOrder;
use serde::de::*;

use crate::error::{Error, Result};

/// Decode a value from its fixed-width form, requiring the entire payload be consumed.
pub fn from_slice<'de, O: ByteOrder, T: Deserialize<'de>>(buf: &'de [u8]) -> Result<T> {
    let mut de = FixedDeserializer::<O>::new(buf);
    let value = T::deserialize(&mut de)?;
    if !de.buf.is_empty() {
        tracing::debug!(left = de.buf.len(), "fixed-width payload not fully consumed");
        return Err(Error::UnreadData(de.buf.len()));
    }
    Ok(value)
}

struct FixedDeserializer<'de, O> {
    buf: &'de [u8],
    /// Set when the payload was empty to begin with. Every read then yields zero.
    zero: bool,
    /// Set until the first value is read or a compound value is entered.
    top_level: bool,
    order: PhantomData<O>,
}

fn overflow<V: ToString>(value: V, target: &'static str) -> Error {
    Error::Overflow {
        value: value.to_string(),
        target,
    }
}

impl<'de, O: ByteOrder> FixedDeserializer<'de, O> {
    fn new(buf: &'de [u8]) -> Self {
        Self {
            buf,
            zero: buf.is_empty(),
            top_level: true,
            order: PhantomData,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'de [u8]> {
        if self.buf.len() < n {
            return Err(Error::ShortBuffer {
                needed: n,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn take_rest(&mut self) -> &'de [u8] {
        self.top_level = false;
        std::mem::take(&mut self.buf)
    }

    /// Work out how many bytes to read for an integer of the given width.
    fn int_width(&mut self, width: usize) -> usize {
        let top_level = std::mem::replace(&mut self.top_level, false);
        if top_level && width < 8 && self.buf.len() == 8 {
            8
        } else {
            width
        }
    }

    fn read_unsigned(&mut self, width: usize) -> Result<u64> {
        let n = self.int_width(width);
        if self.zero {
            return Ok(0);
        }
        Ok(O::read_uint(self.take(n)?, n))
    }

    fn read_signed(&mut self, width: usize) -> Result<i64> {
        let n = self.int_width(width);
        if self.zero {
            return Ok(0);
        }
        Ok(O::read_int(self.take(n)?, n))
    }

    fn enter_compound(&mut self) {
        self.top_level = false;
    }
}

macro_rules! deserialize_unsigned {
    ($method:ident, $visit:ident, $t:ty, $width:expr) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            let v = self.read_unsigned($width)?;
            let v = <$t>::try_from(v).map_err(|_| overflow(v, stringify!($t)))?;
            visitor.$visit(v)
        }
    };
}

macro_rules! deserialize_signed {
    ($method:ident, $visit:ident, $t:ty, $width:expr) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            let v = self.read_signed($width)?;
            let v = <$t>::try_from(v).map_err(|_| overflow(v, stringify!($t)))?;
            visitor.$visit(v)
        }
    };
}

impl<'de, 'a, O: ByteOrder> serde::Deserializer<'de> for &'a mut FixedDeserializer<'de, O> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::InvalidData(
            "fixed-width payloads can only be decoded into a concrete type".to_string(),
        ))
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.top_level = false;
        if self.zero {
            return visitor.visit_bool(false);
        }
        let b = self.take(1)?;
        visitor.visit_bool(b[0] != 0)
    }

    deserialize_unsigned!(deserialize_u8, visit_u8, u8, 1);
    deserialize_unsigned!(deserialize_u16, visit_u16, u16, 2);
    deserialize_unsigned!(deserialize_u32, visit_u32, u32, 4);
    deserialize_unsigned!(deserialize_u64, visit_u64, u64, 8);
    deserialize_signed!(deserialize_i8, visit_i8, i8, 1);
    deserialize_signed!(deserialize_i16, visit_i16, i16, 2);
    deserialize_signed!(deserialize_i32, visit_i32, i32, 4);
    deserialize_signed!(deserialize_i64, visit_i64, i64, 8);

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.top_level = false;
        if self.zero {
            return visitor.visit_f32(0.0);
        }
        let b = self.take(4)?;
        visitor.visit_f32(O::read_f32(b))
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.top_level = false;
        if self.zero {
            return visitor.visit_f64(0.0);
        }
        let b = self.take(8)?;
        visitor.visit_f64(O::read_f64(b))
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.top_level = false;
        if self.zero {
            return visitor.visit_char('\0');
        }
        let n = O::read_u32(self.take(4)?);
        let c = char::from_u32(n)
            .ok_or_else(|| Error::InvalidData(format!("{:#x} is not a valid char", n)))?;
        visitor.visit_char(c)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let rest = self.take_rest();
        let s = std::str::from_utf8(rest)
            .map_err(|e| Error::InvalidData(format!("string is not valid UTF-8: {}", e)))?;
        visitor.visit_borrowed_str(s)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let rest = self.take_rest();
        visitor.visit_borrowed_bytes(rest)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        // Absence is expressed by the envelope, never inside a fixed-width payload
        visitor.visit_some(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.enter_compound();
        visitor.visit_seq(RestAccess { de: self })
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        self.enter_compound();
        visitor.visit_seq(CountedAccess {
            de: self,
            size_left: len,
        })
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::InvalidData(
            "a map has no fixed-width encoding".to_string(),
        ))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_tuple(fields.len(), visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        self.enter_compound();
        visitor.visit_enum(self)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_u32(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_any(visitor)
    }
}

impl<'de, 'a, O: ByteOrder> serde::de::EnumAccess<'de> for &'a mut FixedDeserializer<'de, O> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let index = if self.zero {
            0
        } else {
            O::read_u32(self.take(4)?)
        };
        let index: value::U32Deserializer<Error> = index.into_deserializer();
        let val = seed.deserialize(index)?;
        Ok((val, self))
    }
}

impl<'de, 'a, O: ByteOrder> serde::de::VariantAccess<'de> for &'a mut FixedDeserializer<'de, O> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(self)
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        serde::Deserializer::deserialize_tuple(self, len, visitor)
    }

    fn struct_variant<V>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        serde::Deserializer::deserialize_tuple(self, fields.len(), visitor)
    }
}

/// Yields elements until the payload runs out.
struct RestAccess<'a, 'de, O> {
    de: &'a mut FixedDeserializer<'de, O>,
}

impl<'a, 'de, O: ByteOrder> serde::de::SeqAccess<'de> for RestAccess<'a, 'de, O> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.de.buf.is_empty() {
            Ok(None)
        } else {
            seed.deserialize(&mut *self.de).map(Some)
        }
    }
}

/// Yields a known number of elements.
struct CountedAccess<'a, 'de, O> {
    de: &'a mut FixedDeserializer<'de, O>,
    size_left: usize,
}

impl<'a, 'de, O: ByteOrder> serde::de::SeqAccess<'de> for CountedAccess<'a, 'de, O> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.size_left > 0 {
            self.size_left -= 1;
            let val = seed.deserialize(&mut *self.de)?;
            Ok(Some(val))
        } else {
            Ok(None)
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.size_left)
    }
}
