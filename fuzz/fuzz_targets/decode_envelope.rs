#![no_main]
use std::collections::BTreeMap;

use entity_marshal::{decode_envelope, Value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = decode_envelope::<u16>(data);
    let _ = decode_envelope::<Option<i64>>(data);
    let _ = decode_envelope::<String>(data);
    let _ = decode_envelope::<Vec<u32>>(data);
    let _ = decode_envelope::<Value>(data);
    let _ = decode_envelope::<BTreeMap<String, Value>>(data);
});
