#![no_main]

use emberws::decoder::decode_frame;
use libfuzzer_sys::fuzz_target;

// decode_frame must never panic on arbitrary input, whatever it returns.
fuzz_target!(|data: &[u8]| {
    let _ = decode_frame(data);
});
