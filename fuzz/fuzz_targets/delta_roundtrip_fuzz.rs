#![no_main]
use classpatch::delta::{apply_delta, compute_delta};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let split = data[0] as usize % data.len();
    let (base, target) = data[1..].split_at(split.min(data.len() - 1));

    let delta = compute_delta(base, target);
    let rebuilt = apply_delta(base, &delta).expect("delta from compute_delta must apply");
    assert_eq!(rebuilt, target);
});
