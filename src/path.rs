//! Field paths and conversion between flattened and nested mappings.
//!
//! A flattened mapping is a single level of `path -> value` pairs, where each path is a list of
//! field names joined with [`SEPARATOR`]. A nested mapping holds the same data as a tree of
//! [`Value::Map`]s. The two are isomorphic as long as no field name contains the separator.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// Separator between path segments in flattened keys.
pub const SEPARATOR: &str = ".";

/// Single-level mapping keyed by dotted field paths.
pub type FlatMap = BTreeMap<String, Value>;

/// Mapping whose intermediate levels are [`Value::Map`]s.
pub type NestedMap = BTreeMap<String, Value>;

/// Split a flattened key into its path segments.
pub fn split_path(key: &str) -> Vec<&str> {
    key.split(SEPARATOR).collect()
}

/// Join path segments into a flattened key.
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        if i > 0 {
            out.push_str(SEPARATOR);
        }
        out.push_str(seg.as_ref());
    }
    out
}

/// Expand a flattened mapping into a nested one.
///
/// Fails with [`Error::PathConflict`] if one key names a leaf that another key needs to descend
/// through, regardless of the order the keys are visited in.
pub fn unflatten(flat: &FlatMap) -> Result<NestedMap> {
    let mut out = NestedMap::new();
    for (key, val) in flat {
        let segments = split_path(key);
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => continue,
        };
        let mut parent = &mut out;
        for (depth, seg) in parents.iter().enumerate() {
            let entry = parent
                .entry((*seg).to_string())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            parent = match entry {
                Value::Map(map) => map,
                _ => return Err(Error::PathConflict(join_path(&segments[..=depth]))),
            };
        }
        if parent.contains_key(*last) {
            tracing::debug!(key = %key, "flattened key collides with an existing mapping");
            return Err(Error::PathConflict(key.clone()));
        }
        parent.insert((*last).to_string(), val.clone());
    }
    Ok(out)
}

/// Collapse a nested mapping into a flattened one.
///
/// Any non-mapping value terminates recursion and becomes a leaf. Fails with
/// [`Error::InvalidData`] if a key contains the separator, as it couldn't be split back apart.
pub fn flatten(nested: &NestedMap) -> Result<FlatMap> {
    let mut out = FlatMap::new();
    let mut path = Vec::new();
    flatten_into(nested, &mut path, &mut out)?;
    Ok(out)
}

fn flatten_into<'a>(
    nested: &'a NestedMap,
    path: &mut Vec<&'a str>,
    out: &mut FlatMap,
) -> Result<()> {
    for (key, val) in nested {
        if key.contains(SEPARATOR) {
            return Err(Error::InvalidData(format!(
                "path segment `{}` contains the separator `{}`",
                key, SEPARATOR
            )));
        }
        path.push(key.as_str());
        match val {
            Value::Map(map) => flatten_into(map, path, out)?,
            leaf => {
                out.insert(join_path(path.as_slice()), leaf.clone());
            }
        }
        path.pop();
    }
    Ok(())
}
