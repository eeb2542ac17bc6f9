use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::Command;

use classpatch::archive::{ClassArchive, zip_to_vec};
use classpatch::binpatch::{BinPatch, PatchContainer, Side, TransformChain};
use classpatch::checksum::adler32;
use classpatch::delta::compute_delta;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_classpatch").to_string()
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn write_jar(path: &Path, classes: &[(&str, &[u8])]) {
    let entries: BTreeMap<String, Vec<u8>> = classes
        .iter()
        .map(|(n, b)| (format!("{n}.class"), b.to_vec()))
        .collect();
    fs::write(path, zip_to_vec(&entries, "test").unwrap()).unwrap();
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("classpatch version"));
}

#[test]
fn cli_binpatch_roundtrip() {
    let dir = tempdir().unwrap();
    let srg = dir.path().join("joined.srg");
    fs::write(&srg, "CL: a net/minecraft/Foo\nCL: c net/minecraft/Fresh\n").unwrap();
    write(dir.path(), "patches/net/minecraft/Foo.java.patch", "--- a/x\n+++ b/x\n");
    write(dir.path(), "patches/net/minecraft/Fresh.java.patch", "--- a/x\n+++ b/x\n");
    let client = dir.path().join("client.jar");
    let dirty = dir.path().join("dirty.jar");
    write_jar(&client, &[("a", &[1, 2, 3]), ("b", &[4])]);
    write_jar(&dirty, &[("a", &[1, 0x99, 3]), ("c", &[0xAA, 0xBB])]);
    let runtime = dir.path().join("runtime.pack");
    let dev = dir.path().join("dev.pack");

    let st = Command::new(bin())
        .arg("gen-binpatches")
        .arg("--srg")
        .arg(&srg)
        .arg("--patches")
        .arg(dir.path().join("patches"))
        .arg("--client")
        .arg(&client)
        .arg("--dirty")
        .arg(&dirty)
        .arg("--runtime-out")
        .arg(&runtime)
        .arg("--dev-out")
        .arg(&dev)
        .args(["--compressor", "zlib"])
        .status()
        .unwrap();
    assert!(st.success());
    assert!(runtime.exists() && dev.exists());

    let out = dir.path().join("patched.jar");
    let st = Command::new(bin())
        .arg("apply-binpatches")
        .arg("--patches")
        .arg(&runtime)
        .arg("--baseline")
        .arg(&client)
        .args(["--side", "client", "--compressor", "zlib", "-o"])
        .arg(&out)
        .status()
        .unwrap();
    assert!(st.success());

    let mut rebuilt = ClassArchive::open(&out).unwrap();
    assert_eq!(rebuilt.read_class("a").unwrap(), Some(vec![1, 0x99, 3]));
    assert_eq!(rebuilt.read_class("b").unwrap(), Some(vec![4]));
    assert_eq!(rebuilt.read_class("c").unwrap(), Some(vec![0xAA, 0xBB]));

    // Refuses to overwrite without --force.
    let st = Command::new(bin())
        .arg("apply-binpatches")
        .arg("--patches")
        .arg(&runtime)
        .arg("--baseline")
        .arg(&client)
        .args(["--side", "client", "--compressor", "zlib", "-o"])
        .arg(&out)
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(1));
}

/// A client container patching `a` and adding `c`, written with the default
/// transform chain.
fn write_client_container(path: &Path) {
    let clean = [1u8, 2, 3];
    let mut container = PatchContainer::new();
    container.insert(
        Side::Client,
        BinPatch {
            obf_name: "a".into(),
            source_name: "a".into(),
            target_name: "net.minecraft.Foo".into(),
            checksum: Some(adler32(&clean)),
            delta: compute_delta(&clean, &[1, 0x99, 3]),
        },
    );
    container.insert(
        Side::Client,
        BinPatch {
            obf_name: "c".into(),
            source_name: "c".into(),
            target_name: "net.minecraft.Fresh".into(),
            checksum: None,
            delta: compute_delta(&[], &[0xAA, 0xBB]),
        },
    );
    container.write_to(path, &TransformChain::default()).unwrap();
}

#[test]
fn cli_apply_binpatches_output_is_complete() {
    let dir = tempdir().unwrap();
    let patches = dir.path().join("binpatches.pack.lzma");
    write_client_container(&patches);
    let client = dir.path().join("client.jar");
    let filler: Vec<(String, Vec<u8>)> = (0..64)
        .map(|i| (format!("pkg/filler{i}"), vec![i as u8; 512]))
        .collect();
    let mut classes: Vec<(&str, &[u8])> = vec![("a", &[1, 2, 3]), ("b", &[4])];
    classes.extend(filler.iter().map(|(n, b)| (n.as_str(), b.as_slice())));
    write_jar(&client, &classes);

    let out = dir.path().join("client-patched.jar");
    let output = Command::new(bin())
        .args(["--json", "apply-binpatches", "--side", "client", "--patches"])
        .arg(&patches)
        .arg("--baseline")
        .arg(&client)
        .arg("-o")
        .arg(&out)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let mut rebuilt = ClassArchive::open(&out).unwrap();
    let all = rebuilt.read_all().unwrap();
    assert_eq!(all.len(), 67);
    assert_eq!(all["a.class"], [1, 0x99, 3]);
    assert_eq!(all["c.class"], [0xAA, 0xBB]);
    assert_eq!(all["pkg/filler63.class"], vec![63u8; 512]);

    let stats: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(stats["patched"], 1);
    assert_eq!(stats["added"], 1);
    assert_eq!(stats["copied"], 65);
}

#[cfg(target_os = "linux")]
#[test]
fn cli_apply_binpatches_write_failure_exits_nonzero() {
    let dir = tempdir().unwrap();
    let patches = dir.path().join("binpatches.pack.lzma");
    write_client_container(&patches);
    let client = dir.path().join("client.jar");
    write_jar(&client, &[("a", &[1, 2, 3]), ("b", &[4])]);

    let output = Command::new(bin())
        .args(["-f", "apply-binpatches", "--side", "client", "--patches"])
        .arg(&patches)
        .arg("--baseline")
        .arg(&client)
        .args(["-o", "/dev/full"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("classpatch: "));
}

#[test]
fn cli_source_patch_roundtrip_and_rejects() {
    let dir = tempdir().unwrap();
    let clean = dir.path().join("clean");
    let changed = dir.path().join("changed");
    let patches = dir.path().join("patches");
    write(&clean, "p/A.java", "a\nb\nc\n");
    write(&changed, "p/A.java", "a\nB\nc\n");

    let st = Command::new(bin())
        .arg("gen-patches")
        .arg("--original")
        .arg(&clean)
        .arg("--changed")
        .arg(&changed)
        .arg("-o")
        .arg(&patches)
        .status()
        .unwrap();
    assert!(st.success());
    assert!(patches.join("p/A.java.patch").exists());

    let out = dir.path().join("out");
    let st = Command::new(bin())
        .arg("apply-patches")
        .arg("--input")
        .arg(&clean)
        .arg("--patches")
        .arg(&patches)
        .arg("-o")
        .arg(&out)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(fs::read_to_string(out.join("p/A.java")).unwrap(), "a\nB\nc\n");

    // A tree the patch does not fit: exit code 2 in reject mode, 1 otherwise.
    let other = dir.path().join("other");
    write(&other, "p/A.java", "x\ny\nz\n");
    let st = Command::new(bin())
        .arg("apply-patches")
        .arg("--input")
        .arg(&other)
        .arg("--patches")
        .arg(&patches)
        .arg("--reject")
        .arg("-o")
        .arg(dir.path().join("out2"))
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(2));
    assert!(patches.join("p/A.java.patch.rej").exists());

    let st = Command::new(bin())
        .arg("apply-patches")
        .arg("--input")
        .arg(&other)
        .arg("--patches")
        .arg(&patches)
        .arg("-o")
        .arg(dir.path().join("out3"))
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(1));
}

#[test]
fn cli_missing_arguments_fail() {
    let st = Command::new(bin()).arg("gen-patches").status().unwrap();
    assert!(!st.success());
}
