//! MessagePack form of [`Value`] that keeps scalar widths.
//!
//! Going through serde lets the MessagePack encoder pick the smallest integer that fits, so an
//! `I64(5)` would come back as `U8(5)`. Here every scalar is written with the marker for its exact
//! width and read back from that marker. The compact fixint forms other encoders produce decode as
//! `U8` and `I8`.

use std::collections::BTreeMap;
use std::convert::TryFrom;

use byteorder::{BigEndian, ByteOrder};
use rmp::encode;
use rmp::Marker;

use crate::error::{Error, Result};
use crate::value::Value;

/// Deepest nesting of arrays and maps accepted when reading.
const MAX_DEPTH: usize = 100;

fn len32(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| Error::InvalidData(format!("length {} is too long for MessagePack", len)))
}

// Writes into a Vec<u8> can't fail, so the results from rmp are discarded throughout.
pub(crate) fn write_value(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Null => {
            let _ = encode::write_nil(buf);
        }
        Value::Bool(v) => {
            let _ = encode::write_bool(buf, *v);
        }
        Value::I8(v) => {
            let _ = encode::write_i8(buf, *v);
        }
        Value::I16(v) => {
            let _ = encode::write_i16(buf, *v);
        }
        Value::I32(v) => {
            let _ = encode::write_i32(buf, *v);
        }
        Value::I64(v) => {
            let _ = encode::write_i64(buf, *v);
        }
        Value::U8(v) => {
            let _ = encode::write_u8(buf, *v);
        }
        Value::U16(v) => {
            let _ = encode::write_u16(buf, *v);
        }
        Value::U32(v) => {
            let _ = encode::write_u32(buf, *v);
        }
        Value::U64(v) => {
            let _ = encode::write_u64(buf, *v);
        }
        Value::F32(v) => {
            let _ = encode::write_f32(buf, *v);
        }
        Value::F64(v) => {
            let _ = encode::write_f64(buf, *v);
        }
        Value::Str(v) => {
            len32(v.len())?;
            let _ = encode::write_str(buf, v);
        }
        Value::Bin(v) => {
            len32(v.len())?;
            let _ = encode::write_bin(buf, v);
        }
        Value::Array(v) => {
            let _ = encode::write_array_len(buf, len32(v.len())?);
            for item in v {
                write_value(buf, item)?;
            }
        }
        Value::Map(v) => {
            let _ = encode::write_map_len(buf, len32(v.len())?);
            for (key, item) in v {
                len32(key.len())?;
                let _ = encode::write_str(buf, key);
                write_value(buf, item)?;
            }
        }
    }
    Ok(())
}

/// Read one value from the front of `rd`, advancing past it.
pub(crate) fn read_value(rd: &mut &[u8]) -> Result<Value> {
    read_nested(rd, 0)
}

fn take<'a>(rd: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if rd.len() < n {
        return Err(Error::ShortBuffer {
            needed: n,
            remaining: rd.len(),
        });
    }
    let (head, tail) = rd.split_at(n);
    *rd = tail;
    Ok(head)
}

fn read_len(rd: &mut &[u8], width: usize) -> Result<usize> {
    let b = take(rd, width)?;
    Ok(match width {
        1 => b[0] as usize,
        2 => BigEndian::read_u16(b) as usize,
        _ => BigEndian::read_u32(b) as usize,
    })
}

fn read_str(rd: &mut &[u8], len: usize) -> Result<String> {
    let b = take(rd, len)?;
    std::str::from_utf8(b)
        .map(str::to_string)
        .map_err(|e| Error::InvalidData(format!("string is not valid UTF-8: {}", e)))
}

fn read_nested(rd: &mut &[u8], depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(Error::InvalidData(
            "MessagePack value is nested too deeply".to_string(),
        ));
    }
    let marker = Marker::from_u8(take(rd, 1)?[0]);
    let value = match marker {
        Marker::Null => Value::Null,
        Marker::True => Value::Bool(true),
        Marker::False => Value::Bool(false),
        Marker::FixPos(v) => Value::U8(v),
        Marker::FixNeg(v) => Value::I8(v),
        Marker::U8 => Value::U8(take(rd, 1)?[0]),
        Marker::U16 => Value::U16(BigEndian::read_u16(take(rd, 2)?)),
        Marker::U32 => Value::U32(BigEndian::read_u32(take(rd, 4)?)),
        Marker::U64 => Value::U64(BigEndian::read_u64(take(rd, 8)?)),
        Marker::I8 => Value::I8(take(rd, 1)?[0] as i8),
        Marker::I16 => Value::I16(BigEndian::read_i16(take(rd, 2)?)),
        Marker::I32 => Value::I32(BigEndian::read_i32(take(rd, 4)?)),
        Marker::I64 => Value::I64(BigEndian::read_i64(take(rd, 8)?)),
        Marker::F32 => Value::F32(BigEndian::read_f32(take(rd, 4)?)),
        Marker::F64 => Value::F64(BigEndian::read_f64(take(rd, 8)?)),
        Marker::FixStr(len) => Value::Str(read_str(rd, len as usize)?),
        Marker::Str8 => {
            let len = read_len(rd, 1)?;
            Value::Str(read_str(rd, len)?)
        }
        Marker::Str16 => {
            let len = read_len(rd, 2)?;
            Value::Str(read_str(rd, len)?)
        }
        Marker::Str32 => {
            let len = read_len(rd, 4)?;
            Value::Str(read_str(rd, len)?)
        }
        Marker::Bin8 => {
            let len = read_len(rd, 1)?;
            Value::Bin(take(rd, len)?.to_vec())
        }
        Marker::Bin16 => {
            let len = read_len(rd, 2)?;
            Value::Bin(take(rd, len)?.to_vec())
        }
        Marker::Bin32 => {
            let len = read_len(rd, 4)?;
            Value::Bin(take(rd, len)?.to_vec())
        }
        Marker::FixArray(len) => read_array(rd, len as usize, depth)?,
        Marker::Array16 => {
            let len = read_len(rd, 2)?;
            read_array(rd, len, depth)?
        }
        Marker::Array32 => {
            let len = read_len(rd, 4)?;
            read_array(rd, len, depth)?
        }
        Marker::FixMap(len) => read_map(rd, len as usize, depth)?,
        Marker::Map16 => {
            let len = read_len(rd, 2)?;
            read_map(rd, len, depth)?
        }
        Marker::Map32 => {
            let len = read_len(rd, 4)?;
            read_map(rd, len, depth)?
        }
        other => {
            return Err(Error::InvalidData(format!(
                "unsupported MessagePack marker {:?}",
                other
            )))
        }
    };
    Ok(value)
}

fn read_array(rd: &mut &[u8], len: usize, depth: usize) -> Result<Value> {
    // Every element takes at least one byte
    let mut seq = Vec::with_capacity(len.min(rd.len()));
    for _ in 0..len {
        seq.push(read_nested(rd, depth + 1)?);
    }
    Ok(Value::Array(seq))
}

fn read_map(rd: &mut &[u8], len: usize, depth: usize) -> Result<Value> {
    let mut map = BTreeMap::new();
    for _ in 0..len {
        let key = match read_nested(rd, depth + 1)? {
            Value::Str(key) => key,
            other => {
                return Err(Error::InvalidData(format!(
                    "map key must be a string, not {}",
                    other.kind()
                )))
            }
        };
        let item = read_nested(rd, depth + 1)?;
        map.insert(key, item);
    }
    Ok(Value::Map(map))
}
