//! Versioned byte envelopes.
//!
//! An envelope is a version byte, an encoding tag byte, and a payload in that encoding. See the
//! [`format`](crate::format) module for the exact layout. Decoding dispatches on the tag and
//! reports absence separately from the zero value, so a nillable destination can be left alone
//! when nothing was stored.

use byteorder::{BigEndian, LittleEndian};
use tracing::{debug, trace};

use crate::de;
use crate::encoding::{Encoding, DEFAULT_VERSION};
use crate::error::{Error, Result};
use crate::marshal::Marshal;
use crate::ser;

fn missing_capability<T: Marshal>(what: &str) -> Error {
    debug!(target_type = T::type_name(), "missing capability: {}", what);
    Error::InvalidData(format!(
        "type `{}` does not implement {}",
        T::type_name(),
        what
    ))
}

/// Encode a value as an envelope using its preferred encoding.
///
/// Absent values (`None`, [`Value::Null`](crate::Value::Null)) become a payload-less
/// [`Encoding::Empty`] envelope.
pub fn encode_envelope<T: Marshal>(value: &T) -> Result<Vec<u8>> {
    if value.is_absent() {
        encode_envelope_with(value, Encoding::Empty)
    } else {
        encode_envelope_with(value, T::ENCODING)
    }
}

/// Encode a value as an envelope with a specific encoding.
///
/// Encoding with [`Encoding::Empty`] discards the value entirely.
pub fn encode_envelope_with<T: Marshal>(value: &T, encoding: Encoding) -> Result<Vec<u8>> {
    let mut buf = vec![DEFAULT_VERSION.0, encoding.into_u8()];
    match encoding {
        Encoding::Empty => (),
        Encoding::BigEndian => buf.extend_from_slice(&ser::to_vec::<BigEndian, T>(value)?),
        Encoding::LittleEndian => buf.extend_from_slice(&ser::to_vec::<LittleEndian, T>(value)?),
        Encoding::Json => serde_json::to_writer(&mut buf, value)?,
        Encoding::Proto => {
            let payload = value
                .encode_proto()
                .ok_or_else(|| missing_capability::<T>("protocol buffer message"))?;
            buf.extend_from_slice(&payload);
        }
        Encoding::MsgPack => {
            let payload = match value.encode_msgpack() {
                Some(res) => res?,
                None => rmp_serde::to_vec_named(value)?,
            };
            buf.extend_from_slice(&payload);
        }
        Encoding::Native => buf.extend_from_slice(&native::encode(value)?),
    }
    Ok(buf)
}

/// Decode an envelope.
///
/// Returns `Ok(None)` if the envelope explicitly holds nothing and `T` is nillable, in which
/// case a destination should be left untouched. An envelope with no tag byte is treated as
/// [`Encoding::Empty`].
///
/// # Errors
///
/// - [`Error::InvalidData`] on empty input, or if the encoding needs a capability `T` lacks
/// - [`Error::UnsupportedVersion`] if the version byte isn't [`DEFAULT_VERSION`]
/// - [`Error::UnsupportedEncoding`] on an unknown tag
/// - [`Error::ShortBuffer`] / [`Error::UnreadData`] if the payload is the wrong length
/// - Any error from the underlying payload decoder
pub fn decode_envelope<T: Marshal>(buf: &[u8]) -> Result<Option<T>> {
    let (&version, rest) = buf
        .split_first()
        .ok_or_else(|| Error::InvalidData("empty byte slice specified".to_string()))?;
    if version != DEFAULT_VERSION.0 {
        debug!(version, "rejected envelope version");
        return Err(Error::UnsupportedVersion(version));
    }
    let (encoding, payload) = match rest.split_first() {
        Some((&tag, payload)) => match Encoding::from_u8(tag) {
            Some(encoding) => (encoding, payload),
            None => {
                debug!(tag, "rejected envelope encoding");
                return Err(Error::UnsupportedEncoding(tag));
            }
        },
        None => (Encoding::Empty, rest),
    };
    trace!(
        %encoding,
        len = payload.len(),
        target_type = T::type_name(),
        "decoding envelope"
    );

    if encoding == Encoding::Empty && T::KIND.is_nillable() {
        return Ok(None);
    }

    let value = match encoding {
        Encoding::Empty => {
            if !payload.is_empty() {
                return Err(Error::UnreadData(payload.len()));
            }
            T::default()
        }
        Encoding::BigEndian => de::from_slice::<BigEndian, T>(payload)?,
        Encoding::LittleEndian => de::from_slice::<LittleEndian, T>(payload)?,
        Encoding::Json => json_payload::<T>(payload)?,
        Encoding::Proto => {
            T::decode_proto(payload)
                .ok_or_else(|| missing_capability::<T>("protocol buffer message"))??
        }
        Encoding::MsgPack => msgpack_payload::<T>(payload)?,
        Encoding::Native => native::decode::<T>(payload)?,
    };
    Ok(Some(value))
}

/// Decode JSON, rejecting any object key the target type doesn't know about.
///
/// A key is unknown if it disappears when the decoded value is encoded again.
fn json_payload<T: Marshal>(payload: &[u8]) -> Result<T> {
    let raw: serde_json::Value = serde_json::from_slice(payload)?;
    let value = T::deserialize(&raw)?;
    let known = serde_json::to_value(&value)?;
    if let Some(path) = unknown_key(&raw, &known) {
        debug!(%path, target_type = T::type_name(), "unknown JSON field");
        return Err(Error::InvalidData(format!(
            "unknown field `{}` for type `{}`",
            path,
            T::type_name()
        )));
    }
    Ok(value)
}

fn unknown_key(raw: &serde_json::Value, known: &serde_json::Value) -> Option<String> {
    use serde_json::Value as Json;
    match (raw, known) {
        (Json::Object(raw), Json::Object(known)) => raw.iter().find_map(|(key, rv)| {
            match known.get(key) {
                None => Some(key.clone()),
                Some(kv) => unknown_key(rv, kv).map(|p| format!("{}.{}", key, p)),
            }
        }),
        (Json::Array(raw), Json::Array(known)) => raw
            .iter()
            .zip(known)
            .find_map(|(rv, kv)| unknown_key(rv, kv)),
        _ => None,
    }
}

fn msgpack_payload<T: Marshal>(payload: &[u8]) -> Result<T> {
    if let Some(res) = T::decode_msgpack(payload) {
        let (value, used) = res?;
        if used < payload.len() {
            return Err(Error::UnreadData(payload.len() - used));
        }
        return Ok(value);
    }
    let mut rd = payload;
    let value = T::deserialize(&mut rmp_serde::Deserializer::new(&mut rd))?;
    if !rd.is_empty() {
        return Err(Error::UnreadData(rd.len()));
    }
    Ok(value)
}

#[cfg(feature = "native")]
mod native {
    use bincode::Options;
    use serde::{de::DeserializeOwned, Serialize};

    use crate::error::{Error, Result};

    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
    }

    pub(super) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(options().serialize(value)?)
    }

    /// Reads are limited to the payload length, so a length prefix can't claim more memory than
    /// the payload could possibly fill.
    pub(super) fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
        let mut rd = payload;
        let value = options()
            .with_limit(payload.len() as u64)
            .deserialize_from(&mut rd)?;
        if !rd.is_empty() {
            return Err(Error::UnreadData(rd.len()));
        }
        Ok(value)
    }
}

#[cfg(not(feature = "native"))]
mod native {
    use serde::{de::DeserializeOwned, Serialize};

    use crate::encoding::Encoding;
    use crate::error::{Error, Result};

    pub(super) fn encode<T: Serialize>(_value: &T) -> Result<Vec<u8>> {
        Err(Error::UnsupportedEncoding(Encoding::Native.into_u8()))
    }

    pub(super) fn decode<T: DeserializeOwned>(_payload: &[u8]) -> Result<T> {
        Err(Error::UnsupportedEncoding(Encoding::Native.into_u8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use rand::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Account {
        email: String,
        logins: u32,
        active: bool,
    }

    crate::marshal_struct!(Account { email, logins, active });

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: u16,
        celsius: f32,
        raw: i64,
    }

    crate::marshal_struct!(Reading { sensor, celsius, raw } {
        const ENCODING: Encoding = Encoding::LittleEndian;
    });

    /// Consumes exactly two bytes, to check that leftovers are caught for self-decoders too.
    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Pair(u8, u8);

    crate::marshal_struct!(Pair {} {
        fn decode_msgpack(buf: &[u8]) -> Option<Result<(Self, usize)>> {
            Some(match buf {
                [a, b, ..] => Ok((Pair(*a, *b), 2)),
                _ => Err(Error::ShortBuffer { needed: 2, remaining: buf.len() }),
            })
        }

        fn encode_msgpack(&self) -> Option<Result<Vec<u8>>> {
            Some(Ok(vec![self.0, self.1]))
        }
    });

    fn account() -> Account {
        Account {
            email: "user@example.com".to_string(),
            logins: 12,
            active: true,
        }
    }

    #[test]
    fn round_trip_all_serde_encodings() {
        let a = account();
        let mut encodings = vec![Encoding::Json, Encoding::MsgPack];
        if cfg!(feature = "native") {
            encodings.push(Encoding::Native);
        }
        for enc in encodings {
            let buf = encode_envelope_with(&a, enc).unwrap();
            assert_eq!(&buf[..2], &[1, enc.into_u8()]);
            let back: Option<Account> = decode_envelope(&buf).unwrap();
            assert_eq!(back, Some(a.clone()), "encoding {}", enc);
        }
    }

    #[test]
    fn fixed_width_struct() {
        let r = Reading {
            sensor: 7,
            celsius: 21.5,
            raw: -40,
        };
        let buf = encode_envelope(&r).unwrap();
        assert_eq!(buf[1], Encoding::LittleEndian.into_u8());
        assert_eq!(buf.len(), 2 + 2 + 4 + 8);
        assert_eq!(&buf[2..4], &[7, 0]);
        assert_eq!(decode_envelope::<Reading>(&buf).unwrap(), Some(r));
    }

    #[test]
    fn preferred_encodings() {
        assert_eq!(encode_envelope(&7u16).unwrap(), vec![1, 1, 0, 7]);
        assert_eq!(encode_envelope(&"hi".to_string()).unwrap(), vec![1, 1, b'h', b'i']);
        assert_eq!(encode_envelope(&Option::<u8>::None).unwrap(), vec![1, 0]);
        assert_eq!(encode_envelope(&Value::Null).unwrap(), vec![1, 0]);
        assert_eq!(encode_envelope(&account()).unwrap()[1], Encoding::MsgPack.into_u8());
    }

    #[test]
    fn widened_integer_overflows() {
        let buf = [vec![1, 1], 300u64.to_be_bytes().to_vec()].concat();
        let err = decode_envelope::<u8>(&buf).unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }), "{:?}", err);

        let buf = [vec![1, 1], 255u64.to_be_bytes().to_vec()].concat();
        assert_eq!(decode_envelope::<u8>(&buf).unwrap(), Some(255));
    }

    #[test]
    fn narrow_field_leftover() {
        let buf = [vec![1, 1], 0x0001_0002u32.to_be_bytes().to_vec()].concat();
        let err = decode_envelope::<u16>(&buf).unwrap_err();
        assert!(err.is_buffer_integrity(), "{:?}", err);
        assert!(matches!(err, Error::UnreadData(2)));

        let err = decode_envelope::<u32>(&[1, 1, 0, 1]).unwrap_err();
        assert!(matches!(err, Error::ShortBuffer { .. }), "{:?}", err);
    }

    #[test]
    fn empty_is_absence_or_zero() {
        assert_eq!(decode_envelope::<Vec<u8>>(&[1, 0]).unwrap(), None);
        assert_eq!(decode_envelope::<Option<u32>>(&[1, 0]).unwrap(), None);
        assert_eq!(decode_envelope::<Value>(&[1]).unwrap(), None);
        assert_eq!(decode_envelope::<i32>(&[1, 0]).unwrap(), Some(0));
        assert_eq!(decode_envelope::<i32>(&[1]).unwrap(), Some(0));
        assert_eq!(decode_envelope::<Account>(&[1, 0]).unwrap(), Some(Account::default()));
        assert!(matches!(
            decode_envelope::<i32>(&[1, 0, 9]),
            Err(Error::UnreadData(1))
        ));
    }

    #[test]
    fn empty_fixed_width_payload_is_zero() {
        assert_eq!(decode_envelope::<u64>(&[1, 1]).unwrap(), Some(0));
        assert_eq!(decode_envelope::<Option<u64>>(&[1, 2]).unwrap(), Some(Some(0)));
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(matches!(
            decode_envelope::<u8>(&[]),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            decode_envelope::<u8>(&[2, 1, 0]),
            Err(Error::UnsupportedVersion(2))
        ));
        assert!(matches!(
            decode_envelope::<u8>(&[1, 99, 0]),
            Err(Error::UnsupportedEncoding(99))
        ));
    }

    #[test]
    fn any_other_version_is_rejected() {
        let payloads: Vec<Vec<u8>> = vec![
            vec![],
            vec![0],
            vec![0xc0],
            vec![0xff; 9],
            br#"{"email":"a"}"#.to_vec(),
        ];
        for version in (0..=255u8).filter(|v| *v != DEFAULT_VERSION.0) {
            assert!(matches!(
                decode_envelope::<Account>(&[version]),
                Err(Error::UnsupportedVersion(v)) if v == version
            ));
            for tag in 0..=7u8 {
                for payload in &payloads {
                    let buf = [vec![version, tag], payload.clone()].concat();
                    assert!(matches!(
                        decode_envelope::<Account>(&buf),
                        Err(Error::UnsupportedVersion(v)) if v == version
                    ));
                    assert!(matches!(
                        decode_envelope::<Option<u32>>(&buf),
                        Err(Error::UnsupportedVersion(v)) if v == version
                    ));
                }
            }
        }
    }

    #[test]
    fn hostile_length_prefixes_fail_cleanly() {
        let huge = (1u64 << 40).to_le_bytes();
        let buf = [&[1, Encoding::Native.into_u8()][..], &huge[..]].concat();
        assert!(decode_envelope::<String>(&buf).is_err());
        assert!(decode_envelope::<Vec<u8>>(&buf).is_err());
        let buf = [&buf[..], b"abc"].concat();
        assert!(decode_envelope::<String>(&buf).is_err());

        // str32 and array32 claiming far more than the payload holds
        let buf = [1, Encoding::MsgPack.into_u8(), 0xdb, 0xff, 0xff, 0xff, 0xff, b'a'];
        assert!(decode_envelope::<String>(&buf).is_err());
        assert!(decode_envelope::<Value>(&buf).is_err());
        let buf = [1, Encoding::MsgPack.into_u8(), 0xdd, 0xff, 0xff, 0xff, 0xff, 0xc0];
        assert!(decode_envelope::<Vec<u8>>(&buf).is_err());
        assert!(decode_envelope::<Value>(&buf).is_err());
    }

    #[test]
    fn variable_length_values_must_come_last() {
        #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
        struct Token {
            token: String,
            ttl: u32,
        }
        crate::marshal_struct!(Token { token, ttl });

        let t = Token {
            token: "abc".to_string(),
            ttl: 7,
        };
        for enc in [Encoding::BigEndian, Encoding::LittleEndian] {
            assert!(matches!(
                encode_envelope_with(&t, enc),
                Err(Error::InvalidData(_))
            ));
            let words = vec!["a".to_string(), "b".to_string()];
            assert!(matches!(
                encode_envelope_with(&words, enc),
                Err(Error::InvalidData(_))
            ));
            let one = vec!["ab".to_string()];
            let buf = encode_envelope_with(&one, enc).unwrap();
            assert_eq!(decode_envelope::<Vec<String>>(&buf).unwrap(), Some(one));
        }
        // the preferred encoding still works
        let buf = encode_envelope(&t).unwrap();
        assert_eq!(decode_envelope::<Token>(&buf).unwrap(), Some(t));
    }

    #[test]
    fn dynamic_values_keep_their_kind() {
        for v in [Value::I64(5), Value::U16(5), Value::F32(1.5), Value::I8(-1)] {
            let buf = encode_envelope(&v).unwrap();
            assert_eq!(buf[1], Encoding::MsgPack.into_u8());
            assert_eq!(decode_envelope::<Value>(&buf).unwrap(), Some(v));
        }
        let mut buf = encode_envelope(&Value::U8(1)).unwrap();
        buf.push(0);
        assert!(matches!(
            decode_envelope::<Value>(&buf),
            Err(Error::UnreadData(1))
        ));
    }

    #[test]
    fn msgpack_leftovers() {
        let mut buf = encode_envelope(&account()).unwrap();
        buf.push(0xc0);
        assert!(matches!(
            decode_envelope::<Account>(&buf),
            Err(Error::UnreadData(1))
        ));

        let buf = encode_envelope(&Pair(3, 4)).unwrap();
        assert_eq!(buf, vec![1, 5, 3, 4]);
        assert_eq!(decode_envelope::<Pair>(&buf).unwrap(), Some(Pair(3, 4)));
        assert!(matches!(
            decode_envelope::<Pair>(&[1, 5, 3, 4, 5]),
            Err(Error::UnreadData(1))
        ));
    }

    #[test]
    fn missing_proto_capability() {
        match decode_envelope::<Account>(&[1, 4, 0x0a, 0x00]) {
            Err(Error::InvalidData(msg)) => assert!(msg.contains("protocol buffer")),
            other => panic!("expected missing capability, got {:?}", other),
        }
        assert!(matches!(
            encode_envelope_with(&account(), Encoding::Proto),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn json_rejects_unknown_fields() {
        let buf = [
            vec![1, 3],
            br#"{"email":"a@b.c","logins":1,"active":false,"role":"x"}"#.to_vec(),
        ]
        .concat();
        match decode_envelope::<Account>(&buf) {
            Err(Error::InvalidData(msg)) => assert!(msg.contains("role"), "{}", msg),
            other => panic!("expected unknown field error, got {:?}", other),
        }

        // missing fields are still an ordinary serde error
        let buf = [vec![1, 3], br#"{"email":"a@b.c"}"#.to_vec()].concat();
        assert!(matches!(
            decode_envelope::<Account>(&buf),
            Err(Error::Json(_))
        ));

        let buf = [vec![1, 3], br#"{"n":{"deep":1}}"#.to_vec()].concat();
        let value = decode_envelope::<Value>(&buf).unwrap().unwrap();
        assert_eq!(value["n"]["deep"], Value::U64(1));
    }

    #[test]
    fn json_type_mismatch_propagates() {
        let buf = [vec![1, 3], br#"{"email":5}"#.to_vec()].concat();
        assert!(matches!(
            decode_envelope::<Account>(&buf),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn random_round_trips() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let r = Reading {
                sensor: rng.gen(),
                celsius: rng.gen(),
                raw: rng.gen(),
            };
            let enc = match rng.gen_range(0..4) {
                0 => Encoding::BigEndian,
                1 => Encoding::LittleEndian,
                2 => Encoding::Json,
                _ => Encoding::MsgPack,
            };
            let buf = encode_envelope_with(&r, enc).unwrap();
            assert_eq!(decode_envelope::<Reading>(&buf).unwrap(), Some(r));

            let ints: Vec<i32> = (0..rng.gen_range(0..16)).map(|_| rng.gen()).collect();
            let buf = encode_envelope(&ints).unwrap();
            assert_eq!(decode_envelope::<Vec<i32>>(&buf).unwrap(), Some(ints));
        }
    }
}
