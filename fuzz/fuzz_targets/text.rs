#![no_main]

use asyncbus::{Capture, Decoder, Options};
use libfuzzer_sys::fuzz_target;

// Same as `capture` but for the text listing.
fuzz_target!(|data: &[u8]| {
    if let Ok(capture) = Capture::read_text(&mut &data[..]) {
        let mut records = Vec::new();
        let _ = Decoder::new(capture.cursor(), Options::default()).decode_all(&mut records);
    }
});
