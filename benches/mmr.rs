use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ragqa::models::{ChunkingConfig, EmbeddedPassage, Passage};
use ragqa::services::{TextChunker, mmr};

/// Deterministic pseudo-random unit-ish vectors.
fn vectors(count: usize, dimension: usize) -> Vec<Vec<f32>> {
    let mut state = 0x2545_f491_u32;
    (0..count)
        .map(|_| {
            (0..dimension)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    (state as f32 / u32::MAX as f32) * 2.0 - 1.0
                })
                .collect()
        })
        .collect()
}

fn pool(count: usize, dimension: usize) -> Vec<EmbeddedPassage> {
    vectors(count, dimension)
        .into_iter()
        .enumerate()
        .map(|(i, v)| EmbeddedPassage::new(Passage::new(i as u32, format!("passage {i}"), 0), v))
        .collect()
}

fn bench_mmr_select(c: &mut Criterion) {
    let query = vectors(1, 768).remove(0);
    let mut group = c.benchmark_group("mmr_select");

    for fetch_k in [8usize, 32, 128] {
        let candidates = pool(fetch_k, 768);
        group.bench_with_input(BenchmarkId::from_parameter(fetch_k), &candidates, |b, cands| {
            b.iter(|| mmr::select_indices(black_box(&query), black_box(cands), 5, 0.7))
        });
    }
    group.finish();
}

fn bench_cosine(c: &mut Criterion) {
    let v = vectors(2, 768);
    c.bench_function("cosine_similarity_768", |b| {
        b.iter(|| mmr::cosine_similarity(black_box(&v[0]), black_box(&v[1])))
    });
}

fn bench_chunker(c: &mut Criterion) {
    let chunker = TextChunker::new(&ChunkingConfig::default()).unwrap();
    let document = (0..20_000)
        .map(|i| format!("Line {i}: the quick brown fox jumps over the lazy dog."))
        .collect::<Vec<_>>()
        .join("\n");

    c.bench_function("chunk_1mb_document", |b| {
        b.iter(|| chunker.chunk(black_box(&document)))
    });
}

criterion_group!(benches, bench_mmr_select, bench_cosine, bench_chunker);
criterion_main!(benches);
