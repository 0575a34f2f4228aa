use criterion::{Criterion, criterion_group, criterion_main};
use lorekeeper::embeddings::chunking::{ChunkingConfig, chunk_text};
use std::hint::black_box;

fn sample_text() -> String {
    (0..400)
        .map(|i| {
            let sentence = format!("Entry {} of the chronicle recounts the long winter. ", i);
            sentence.repeat(i % 9 + 1)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let text = sample_text();
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_text(black_box(&text), black_box(&config)))
    });

    let unbroken = "x".repeat(200_000);
    c.bench_function("chunking_sliding_window", |b| {
        b.iter(|| chunk_text(black_box(&unbroken), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
