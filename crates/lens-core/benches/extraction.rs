use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lens_core::{disassemble, ExtractorConfig, FeatureExtractor, OpcodeTable, Sample, UnknownOpcodePolicy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SIZES: &[(usize, &str)] = &[(1 << 10, "1KB"), (24 << 10, "24KB")];

/// Synthetic contract: a repeating dispatcher-like block padded with random
/// PUSH immediates so every byte decodes.
fn synthetic_contract(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let block: &[u8] = &[
        0x60, 0x80, 0x60, 0x40, 0x52, // PUSH1 0x80 PUSH1 0x40 MSTORE
        0x34, 0x80, 0x15, // CALLVALUE DUP1 ISZERO
        0x33, 0x54, 0x01, // CALLER SLOAD ADD
        0x5A, 0xF1, 0x50, // GAS CALL POP
        0x42, 0x57, // TIMESTAMP JUMPI
    ];
    let mut code = Vec::with_capacity(size + 33);
    while code.len() < size {
        code.extend_from_slice(block);
        let n = rng.gen_range(1..=32u8);
        code.push(0x5F + n);
        code.extend((0..n).map(|_| rng.gen::<u8>()));
    }
    code
}

fn bench_disassemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("disassemble");
    let table = OpcodeTable::default();

    for &(size, label) in SIZES {
        let code = synthetic_contract(size, 1);
        group.throughput(Throughput::Bytes(code.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &code, |b, code| {
            b.iter(|| disassemble(std::hint::black_box(code), &table, UnknownOpcodePolicy::Stop));
        });
    }
    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    let extractor = FeatureExtractor::default();

    for &(size, label) in SIZES {
        let code = synthetic_contract(size, 2);
        group.throughput(Throughput::Bytes(code.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &code, |b, code| {
            b.iter(|| extractor.extract(std::hint::black_box(code)));
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_batch");
    let corpus: Vec<Vec<u8>> = (0..256).map(|i| synthetic_contract(4 << 10, i)).collect();
    let bytes: usize = corpus.iter().map(Vec::len).sum();
    group.throughput(Throughput::Bytes(bytes as u64));

    for workers in [1usize, 2, 4, 8] {
        let extractor = FeatureExtractor::new(ExtractorConfig {
            workers: Some(workers),
            ..ExtractorConfig::default()
        });
        group.bench_with_input(BenchmarkId::new("workers", workers), &corpus, |b, corpus| {
            b.iter(|| {
                let samples: Vec<_> = corpus.iter().enumerate().map(|(i, c)| Sample::new(i, c)).collect();
                extractor.extract_batch(samples).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_disassemble, bench_extract, bench_batch);
criterion_main!(benches);
