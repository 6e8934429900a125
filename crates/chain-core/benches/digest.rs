use chain_core::{block_digest, Block};
use criterion::{criterion_group, criterion_main, Criterion};

fn bench_digest(c: &mut Criterion) {
    let block = Block {
        height: 42,
        body: "x".repeat(1024),
        time: 1_600_000_000,
        previous_block_hash: "ab".repeat(32),
        hash: String::new(),
    };

    c.bench_function("block_digest_1k_body", |b| {
        b.iter(|| block_digest(&block));
    });
}

criterion_group!(benches, bench_digest);
criterion_main!(benches);
