use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use classpatch::binpatch::{BinPatch, PatchContainer, Side, TransformChain};
use classpatch::checksum::adler32;
use classpatch::delta::{apply_delta, compute_delta};
use classpatch::textpatch::{MatchOptions, apply_file_patch, diff_texts};
use std::fs;
use std::path::Path;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

fn mutate(base: &[u8], stride: usize) -> Vec<u8> {
    let mut out = base.to_vec();
    for i in (0..out.len()).step_by(stride.max(1)) {
        out[i] = out[i].wrapping_add(1);
    }
    out
}

fn gen_source(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("    public int field{i} = {};\n", i * 7))
        .collect()
}

fn write_ratio_snapshot() {
    let source = gen_data(256 * 1024, 123);
    let mut csv = String::from("stride,delta_bytes,target_bytes,ratio\n");
    for stride in [64usize, 256, 1024, 4096, 16384] {
        let target = mutate(&source, stride);
        let delta = compute_delta(&source, &target);
        let ratio = delta.len() as f64 / target.len() as f64;
        csv.push_str(&format!("{stride},{},{},{}\n", delta.len(), target.len(), ratio));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("delta_ratio_snapshot.csv"), csv);
}

fn bench_delta_encode(c: &mut Criterion) {
    let mut g = c.benchmark_group("delta_encode");
    for size in [4 * 1024usize, 64 * 1024, 1024 * 1024] {
        let source = gen_data(size, 1);
        let target = mutate(&source, 1024);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(compute_delta(black_box(&source), black_box(&target))));
        });
    }
    g.finish();
}

fn bench_delta_apply(c: &mut Criterion) {
    let mut g = c.benchmark_group("delta_apply");
    for size in [4 * 1024usize, 64 * 1024, 1024 * 1024] {
        let source = gen_data(size, 2);
        let target = mutate(&source, 2048);
        let delta = compute_delta(&source, &target);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(apply_delta(black_box(&source), black_box(&delta)).unwrap()));
        });
    }
    g.finish();
}

fn bench_delta_ratio(c: &mut Criterion) {
    write_ratio_snapshot();
    let mut g = c.benchmark_group("delta_ratio_vs_stride");
    let source = gen_data(256 * 1024, 3);
    for stride in [256usize, 4096] {
        let target = mutate(&source, stride);
        g.bench_with_input(BenchmarkId::from_parameter(stride), &stride, |b, _| {
            b.iter(|| {
                let delta = compute_delta(&source, &target);
                black_box(delta.len() as f64 / target.len() as f64);
            });
        });
    }
    g.finish();
}

fn bench_adler32(c: &mut Criterion) {
    let mut g = c.benchmark_group("adler32");
    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let data = gen_data(size, 4);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(adler32(black_box(&data))));
        });
    }
    g.finish();
}

fn bench_container(c: &mut Criterion) {
    let mut container = PatchContainer::new();
    for i in 0..200 {
        let clean = gen_data(4096, i);
        let dirty = mutate(&clean, 512);
        container.insert(
            Side::Client,
            BinPatch {
                obf_name: format!("c{i}"),
                source_name: format!("c{i}"),
                target_name: format!("net.minecraft.Class{i}"),
                checksum: Some(adler32(&clean)),
                delta: compute_delta(&clean, &dirty),
            },
        );
    }
    let chain = TransformChain::default();
    let encoded = container.encode(&chain).unwrap();

    let mut g = c.benchmark_group("container");
    g.bench_function("encode_200_records", |b| {
        b.iter(|| black_box(container.encode(&chain).unwrap()));
    });
    g.bench_function("decode_200_records", |b| {
        b.iter(|| black_box(PatchContainer::decode(&encoded, &chain).unwrap()));
    });
    g.finish();
}

fn bench_text_patch(c: &mut Criterion) {
    let mut g = c.benchmark_group("text_patch");
    for lines in [500usize, 5000] {
        let old = gen_source(lines);
        let new = old
            .replace("field10 ", "renamed10 ")
            .replace("field400 ", "renamed400 ");
        let patch = diff_texts("a/F.java", "b/F.java", &old, &new, 3).unwrap();
        let drifted = format!("// header\n// header\n{old}");

        g.bench_with_input(BenchmarkId::new("diff", lines), &lines, |b, _| {
            b.iter(|| black_box(diff_texts("a", "b", black_box(&old), black_box(&new), 3)));
        });
        g.bench_with_input(BenchmarkId::new("apply_offset", lines), &lines, |b, _| {
            b.iter(|| {
                black_box(apply_file_patch(
                    "F.java",
                    black_box(&drifted),
                    &patch,
                    &MatchOptions::default(),
                ))
            });
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_delta_encode,
    bench_delta_apply,
    bench_delta_ratio,
    bench_adler32,
    bench_container,
    bench_text_patch
);
criterion_main!(benches);
