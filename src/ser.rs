//! Fixed-width serialization.
//!
//! Values are written back to back with no markers or length prefixes:
//!
//! - Integers and floats are written at their native width in the chosen byte order
//! - `bool` is a single byte, 0 or 1
//! - Strings, byte strings, and sequences are written raw, with no length
//! - Tuples and structs are their elements written in order
//!
//! A string, byte string, or sequence runs to the end of the payload when decoded, so writing
//! anything after one is an error rather than a payload that can't be read back.
//! - Enum variants are a `u32` variant index followed by any content
//!
//! Maps and absent optional values have no fixed-width form and fail to serialize.

use std::marker::PhantomData;

use byteorder::{ByteOrder, WriteBytesExt};
use serde::ser::*;

use crate::error::{Error, Result};

/// Serialize a value into its fixed-width form.
pub fn to_vec<O: ByteOrder, T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut se = FixedSerializer::<O>::new();
    value.serialize(&mut se)?;
    Ok(se.buf)
}

struct FixedSerializer<O> {
    buf: Vec<u8>,
    /// Set once a value with no fixed length has been written.
    closed: bool,
    order: PhantomData<O>,
}

impl<O: ByteOrder> FixedSerializer<O> {
    fn new() -> Self {
        FixedSerializer {
            buf: Vec::new(),
            closed: false,
            order: PhantomData,
        }
    }

    fn out(&mut self) -> Result<&mut Vec<u8>> {
        if self.closed {
            return Err(Error::InvalidData(
                "nothing can follow a variable-length value in a fixed-width encoding".to_string(),
            ));
        }
        Ok(&mut self.buf)
    }
}

fn unsupported(what: &str) -> Error {
    Error::InvalidData(format!("{} has no fixed-width encoding", what))
}

// Writes into a Vec<u8> can't fail, so the io::Result from byteorder is discarded throughout.
impl<'a, O: ByteOrder> Serializer for &'a mut FixedSerializer<O> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Compound<'a, O>;
    type SerializeTuple = Compound<'a, O>;
    type SerializeTupleStruct = Compound<'a, O>;
    type SerializeTupleVariant = Compound<'a, O>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Compound<'a, O>;
    type SerializeStructVariant = Compound<'a, O>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.serialize_u8(v as u8)
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        let _ = self.out()?.write_i8(v);
        Ok(())
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        let _ = self.out()?.write_i16::<O>(v);
        Ok(())
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        let _ = self.out()?.write_i32::<O>(v);
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        let _ = self.out()?.write_i64::<O>(v);
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.out()?.push(v);
        Ok(())
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        let _ = self.out()?.write_u16::<O>(v);
        Ok(())
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        let _ = self.out()?.write_u32::<O>(v);
        Ok(())
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        let _ = self.out()?.write_u64::<O>(v);
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        let _ = self.out()?.write_f32::<O>(v);
        Ok(())
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        let _ = self.out()?.write_f64::<O>(v);
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.serialize_u32(v as u32)
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.serialize_bytes(v.as_bytes())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.out()?.extend_from_slice(v);
        self.closed = true;
        Ok(())
    }

    fn serialize_none(self) -> Result<()> {
        Err(unsupported("an absent value"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<()> {
        self.serialize_u32(variant_index)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<()> {
        let _ = self.out()?.write_u32::<O>(variant_index);
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.out()?;
        Ok(Compound { se: self })
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Ok(Compound { se: self })
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Ok(Compound { se: self })
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        let _ = self.out()?.write_u32::<O>(variant_index);
        Ok(Compound { se: self })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(unsupported("a map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Ok(Compound { se: self })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        let _ = self.out()?.write_u32::<O>(variant_index);
        Ok(Compound { se: self })
    }
}

/// Every compound value is just its parts written in order.
struct Compound<'a, O> {
    se: &'a mut FixedSerializer<O>,
}

impl<'a, O: ByteOrder> SerializeSeq for Compound<'a, O> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        self.se.closed = true;
        Ok(())
    }
}

impl<'a, O: ByteOrder> SerializeTuple for Compound<'a, O> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, O: ByteOrder> SerializeTupleStruct for Compound<'a, O> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, O: ByteOrder> SerializeTupleVariant for Compound<'a, O> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, O: ByteOrder> SerializeStruct for Compound<'a, O> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _field: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, O: ByteOrder> SerializeStructVariant for Compound<'a, O> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _field: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}
