#![no_main]

use libfuzzer_sys::fuzz_target;
use vigil_shamir::decode_share;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a share wire string: decode_share must never
    // panic — always Ok or Err.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = decode_share(s);
    }

    // Also as hex of the raw bytes to exercise the checksum path
    let _ = decode_share(&hex_encode(data));
});

fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}
