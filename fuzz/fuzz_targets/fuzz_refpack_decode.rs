#![no_main]
use assetstream_rs::RefPackStream;
use libfuzzer_sys::fuzz_target;
use std::io::{Cursor, Read};

// Decoding arbitrary bytes must fail cleanly, never panic
fuzz_target!(|data: &[u8]| {
    let mut decoder = match RefPackStream::new(Cursor::new(data)) {
        Ok(d) => d,
        Err(_) => return,
    };

    // Declared lengths can be huge; cap the work per input
    let mut out = Vec::new();
    let _ = (&mut decoder).take(1 << 20).read_to_end(&mut out);
    assert!(out.len() as u64 <= decoder.len());
});
