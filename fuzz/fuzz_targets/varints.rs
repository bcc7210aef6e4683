#![no_main]

use asyncbus::varint::{decode_varint, encode_varint, MAX_VARINT_LENGTH};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|value: u64| {
    let mut output = [0; MAX_VARINT_LENGTH];
    let length = encode_varint(&mut output, value);
    assert_eq!(decode_varint(&output[..length]), Some(value));
});
