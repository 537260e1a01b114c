#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Binary detection and term extraction must accept any input
    let _ = dlocate::utils::is_binary(data);
    let text = String::from_utf8_lossy(data);
    let terms = dlocate::utils::term_frequencies(&text, true);
    assert!(terms.iter().all(|(_, score)| *score > 0.0 && *score <= 1.0));
});
