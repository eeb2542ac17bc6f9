#![no_main]
use classpatch::binpatch::BinPatch;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything that parses must re-encode to the same bytes.
    if let Ok(patch) = BinPatch::from_bytes(data) {
        let bytes = patch.to_bytes().expect("parsed record must encode");
        assert_eq!(BinPatch::from_bytes(&bytes).expect("re-parse"), patch);
    }
});
