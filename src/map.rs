//! Decoding and encoding structs as flattened mappings.
//!
//! Each key of a [`FlatMap`] is a dotted path naming a field, possibly nested inside other
//! structs. Scalar values are assigned directly, byte strings are treated as envelopes and
//! decoded into the field's own type, and null values are skipped. A [`ByteMap`] is the same
//! thing with every value stored as an envelope.
//!
//! Types that want to handle their mapping form themselves implement [`MapDecoder`] and friends,
//! and expose them through the matching [`Marshal`] capability method.

use std::collections::BTreeMap;

use tracing::debug;

use crate::envelope::encode_envelope;
use crate::error::{Error, Result};
use crate::marshal::{Field, Marshal, Staged};
use crate::path::{join_path, split_path, FlatMap};
use crate::value::{Kind, Value};

/// Mapping of dotted field paths to envelopes.
pub type ByteMap = BTreeMap<String, Vec<u8>>;

/// Replaces generic flattened-map decoding for a type.
pub trait MapDecoder {
    fn decode_map(&mut self, map: &FlatMap) -> Result<()>;
}

/// Replaces generic byte-map decoding for a type.
pub trait ByteMapDecoder {
    fn decode_byte_map(&mut self, map: &ByteMap) -> Result<()>;
}

pub trait MapEncoder {
    fn encode_map(&self) -> Result<FlatMap>;
}

pub trait ByteMapEncoder {
    fn encode_byte_map(&self) -> Result<ByteMap>;
}

/// Decode a flattened mapping into an existing value, field by field.
///
/// Fields not named in the map are left as they are. Every entry is checked and decoded before
/// any field is changed, so on failure the value is exactly as it was, with no optional fields
/// allocated along the way.
///
/// # Errors
///
/// - [`Error::FieldNotFound`] if a path segment doesn't name a field on the struct reached so far
/// - [`Error::KindMismatch`] if a scalar's kind differs from its field's kind
/// - [`Error::UnmatchedKind`] if a value is an array or nested map
/// - Any envelope decoding error for byte-string values
pub fn decode_map<T: Marshal>(map: &FlatMap, target: &mut T) -> Result<()> {
    decode_map_into(map, target)
}

fn decode_map_into(map: &FlatMap, target: &mut dyn Field) -> Result<()> {
    if let Some(decoder) = target.map_decoder() {
        return decoder.decode_map(map);
    }
    if map.is_empty() {
        return Ok(());
    }
    let mut staged = Vec::with_capacity(map.len());
    for (key, value) in map {
        let path = split_path(key);
        if let Some(v) = stage(&*target, &path, key, value)? {
            staged.push((path, v));
        }
    }
    for (path, v) in staged {
        resolve(&mut *target, &path)?.apply(v)?;
    }
    Ok(())
}

/// Check and decode one entry against the field its path names, without changing anything.
///
/// Absent optional structs along the path are inspected through a default stand-in.
fn stage(field: &dyn Field, path: &[&str], key: &str, value: &Value) -> Result<Option<Staged>> {
    let (first, rest) = match path.split_first() {
        Some(split) => split,
        None => return stage_leaf(key, value, field),
    };
    if let Some(stand_in) = field.placeholder() {
        return stage(&*stand_in, path, key, value);
    }
    let mut found = None;
    field.visit_fields(&mut |name: &str, child: &dyn Field| {
        if found.is_none() && name == *first {
            found = Some(stage(child, rest, key, value));
        }
        Ok(())
    })?;
    match found {
        Some(res) => res,
        None => {
            let type_name = field.field_type();
            debug!(field = first, type_name, "no such field");
            Err(Error::FieldNotFound {
                field: first.to_string(),
                type_name,
            })
        }
    }
}

/// Walk a path of field names down from `field`, allocating absent optional structs.
fn resolve<'a>(field: &'a mut dyn Field, path: &[&str]) -> Result<&'a mut dyn Field> {
    let (first, rest) = match path.split_first() {
        Some(split) => split,
        None => return Ok(field),
    };
    let type_name = field.field_type();
    match field.child(first) {
        Some(child) => resolve(child, rest),
        None => {
            debug!(field = first, type_name, "no such field");
            Err(Error::FieldNotFound {
                field: first.to_string(),
                type_name,
            })
        }
    }
}

fn stage_leaf(key: &str, value: &Value, field: &dyn Field) -> Result<Option<Staged>> {
    match value {
        Value::Null => Ok(None),
        Value::Bin(buf) => field.stage_envelope(buf),
        Value::Array(_) | Value::Map(_) => {
            debug!(key, kind = %value.kind(), "unassignable map value");
            Err(Error::UnmatchedKind {
                key: key.to_string(),
                kind: value.kind(),
            })
        }
        scalar => {
            let expected = field.target_kind();
            let found = scalar.kind();
            if expected != Kind::Any && expected != found {
                debug!(key, %expected, %found, "map value kind mismatch");
                return Err(Error::KindMismatch {
                    key: key.to_string(),
                    expected,
                    found,
                });
            }
            field.stage_scalar(scalar).map(Some)
        }
    }
}

/// Decode a mapping of envelopes into an existing value.
///
/// Every value is decoded as though it were a byte string in a [`FlatMap`], so this behaves
/// exactly like [`decode_map`] otherwise.
pub fn decode_byte_map<T: Marshal>(map: &ByteMap, target: &mut T) -> Result<()> {
    if let Some(decoder) = target.as_byte_map_decoder() {
        return decoder.decode_byte_map(map);
    }
    if map.is_empty() {
        return Ok(());
    }
    let flat: FlatMap = map
        .iter()
        .map(|(k, v)| (k.clone(), Value::Bin(v.clone())))
        .collect();
    decode_map_into(&flat, target)
}

/// Encode a value as a flattened mapping.
///
/// Absent fields are left out, nested structs are flattened into dotted paths, scalar fields
/// become scalar values, and everything else becomes an envelope in its preferred encoding.
pub fn encode_map<T: Marshal>(value: &T) -> Result<FlatMap> {
    encode_map_from(value)
}

fn encode_map_from(value: &dyn Field) -> Result<FlatMap> {
    if let Some(encoder) = value.map_encoder() {
        return encoder.encode_map();
    }
    let mut out = FlatMap::new();
    collect_fields(value, &mut Vec::new(), &mut out, &|field: &dyn Field| {
        Ok(match field.scalar() {
            Some(scalar) => scalar,
            None => Value::Bin(field.envelope()?),
        })
    })?;
    Ok(out)
}

type Leaf<L> = dyn Fn(&dyn Field) -> Result<L>;

fn collect_fields<L>(
    value: &dyn Field,
    path: &mut Vec<String>,
    out: &mut BTreeMap<String, L>,
    leaf: &Leaf<L>,
) -> Result<()> {
    value.visit_fields(&mut |name: &str, field: &dyn Field| {
        if field.absent() {
            return Ok(());
        }
        path.push(name.to_string());
        let res = if field.target_kind() == Kind::Struct {
            collect_fields(field, path, out, leaf)
        } else {
            leaf(field).map(|v| {
                out.insert(join_path(path.as_slice()), v);
            })
        };
        path.pop();
        res
    })
}

/// Encode a value as a mapping of envelopes.
///
/// Each field is stored as an envelope of its own type, so scalar fields end up as fixed-width
/// big-endian envelopes. A type with a [`MapEncoder`] but no [`ByteMapEncoder`] has each scalar
/// of its mapping stored as a [`Value`] envelope, which keeps the scalar's exact kind.
pub fn encode_byte_map<T: Marshal>(value: &T) -> Result<ByteMap> {
    if let Some(encoder) = value.as_byte_map_encoder() {
        return encoder.encode_byte_map();
    }
    if let Some(encoder) = value.as_map_encoder() {
        return encoder
            .encode_map()?
            .into_iter()
            .map(|(key, val)| Ok((key, value_envelope(val)?)))
            .collect();
    }
    let mut out = ByteMap::new();
    collect_fields(value, &mut Vec::new(), &mut out, &|field: &dyn Field| {
        field.envelope()
    })?;
    Ok(out)
}

fn value_envelope(value: Value) -> Result<Vec<u8>> {
    match value {
        Value::Bin(buf) => Ok(buf),
        other => encode_envelope(&other),
    }
}
