#![no_main]

use libfuzzer_sys::fuzz_target;
use vigil_relay::events::{CiphertextContent, ShareInitialContent, ShareReleaseContent};

fuzz_target!(|data: &[u8]| {
    // Event content is attacker-controlled JSON; deserialization into
    // any of the content schemas must never panic.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = serde_json::from_str::<CiphertextContent>(s);
        let _ = serde_json::from_str::<ShareInitialContent>(s);
        let _ = serde_json::from_str::<ShareReleaseContent>(s);
    }
});
