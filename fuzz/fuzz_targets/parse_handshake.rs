#![no_main]

use emberws::handshake::parse_handshake;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = parse_handshake(data);
});
