/*!

Storage formats produced and consumed by this crate.

There are two: envelopes, which hold a single value as bytes, and flattened
maps, which hold a struct as a set of path-keyed values.

# Envelopes

An envelope is a version byte, an encoding tag byte, and a payload. The payload
runs to the end of the buffer; its length is never encoded, and it is assumed
that whatever stores the envelope also stores its length.

```text
+----------+----------+=========+
| VVVVVVVV | EEEEEEEE | Payload |
+----------+----------+=========+

- VVVVVVVV is the format version, currently always 1
- EEEEEEEE is the encoding tag
```

An envelope holding only the version byte is treated as though its tag were
Empty. Any other version fails to decode, as does an unknown tag.

| Tag | Name          | Payload                                          |
| --  | --            | --                                               |
| 0   | Empty         | Nothing                                          |
| 1   | BigEndian     | Fixed-width form, big-endian                     |
| 2   | LittleEndian  | Fixed-width form, little-endian                  |
| 3   | Json          | A JSON text                                      |
| 4   | Proto         | A protocol buffer message                        |
| 5   | MsgPack       | A single MessagePack value                       |
| 6   | Native        | bincode, fixed-width integers, little-endian     |

Every payload must be consumed completely when decoding. Trailing bytes are an
error.

## Empty

Empty means nothing was stored. Decoding it into a type that can be absent
(`Option`, sequences, maps, and dynamic values) yields absence, and a
destination field is left untouched. Decoding it into any other type yields that
type's zero value. An Empty envelope carrying payload bytes is an error.

## Fixed-width

Values are written back to back with no markers, tags, or lengths:

- Integers are written at their native width. A top-level integer narrower than
    64 bits may also be read from an 8-byte payload, which is interpreted as a
    64-bit integer of the same signedness and must fit the narrower type.
- `bool` is one byte, 0 or 1.
- Floats are IEEE-754 at their native width.
- Strings and byte strings are written raw, and take up the rest of the
    payload.
- Sequences are their elements in order, also taking up the rest of the
    payload.
- Since strings, byte strings and sequences carry no length, nothing may
    follow one. Encoding a value that would put one before other data fails
    instead of producing a payload that can't be read back.
- Structs and tuples are their fields in declaration order.
- Enum variants are a 32-bit variant index followed by any content.

Maps and absent values have no fixed-width form. A payload of zero bytes
decodes as the zero value of any type; a payload that ends partway through a
value fails to decode.

## MessagePack

Structs are written as maps keyed by field name. A type may supply its own
MessagePack decoder, which must also consume the whole payload.

A dynamic value writes every scalar with the MessagePack marker for its exact
width (`int64` for an `i64`, `float32` for an `f32`, and so on) and reads the
width back from the marker. The compact positive and negative fixint forms
other writers use decode as `u8` and `i8`.

# Flattened Maps

A struct becomes a single-level map whose keys are field paths joined with `.`:

```text
User { name: "ann", address: Some(Address { city: "Oslo", zip: 150 }) }

name         -> "ann"
address.city -> "Oslo"
address.zip  -> 150u16
```

Absent fields are left out. Scalars (booleans, integers, floats, strings) are
stored as themselves, keeping their exact width. Every other value is stored as
an envelope in a byte string, using the value type's preferred encoding: the
fixed-width form for sequences of fixed-width values, and MessagePack for
everything else unless the type says otherwise.

When decoding, a scalar must have exactly the kind of the field it's assigned
to, unless the field is a dynamic value. A byte string is decoded as an
envelope into the field's type. Null values are ignored. Arrays and nested maps
can't be assigned.

Every entry of a flattened map is checked and decoded before any field is
assigned, so a failing map leaves the target unchanged.

A byte map stores every value as an envelope, with scalar fields in the
big-endian fixed-width form and dynamic values in MessagePack. A type with its
own map encoder but no byte map encoder has each scalar of its map stored as a
dynamic value envelope.

*/
