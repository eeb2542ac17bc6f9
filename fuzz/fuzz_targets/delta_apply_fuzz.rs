#![no_main]
use classpatch::delta::{apply_delta, parse_instructions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Hostile deltas must only ever produce errors.
    let _ = apply_delta(&[], data);
    let _ = parse_instructions(data);

    if data.len() >= 2 {
        let split = data.len() / 2;
        let (base, delta) = data.split_at(split);
        let _ = apply_delta(base, delta);
    }
});
