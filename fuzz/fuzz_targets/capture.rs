#![no_main]

use asyncbus::{Capture, Decoder, Options};
use libfuzzer_sys::fuzz_target;

// Arbitrary bytes must never panic the loader, and anything it accepts must
// decode to the end.
fuzz_target!(|data: &[u8]| {
    if let Ok(capture) = Capture::read_binary(&mut &data[..]) {
        let mut records = Vec::new();
        let _ = Decoder::new(capture.cursor(), Options::default()).decode_all(&mut records);
    }
});
