#![no_main]
use classpatch::textpatch::{FilePatch, MatchOptions, apply_file_patch};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let (patch_text, source) = text.split_once("\n====\n").unwrap_or((text.as_ref(), ""));
    let Ok(patches) = FilePatch::parse_all(patch_text, "fuzz.patch") else {
        return;
    };
    let options = MatchOptions {
        max_fuzz: 2,
        ..MatchOptions::default()
    };
    for patch in &patches {
        let _ = apply_file_patch("fuzz", source, patch, &options);
        let _ = FilePatch::parse_all(&patch.render(), "rendered");
    }
});
