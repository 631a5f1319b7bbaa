//! Benchmarks for feature assembly
//!
//! Run with: cargo bench --package pipeline
//!
//! Fits an encoder set on a synthetic corpus and measures single-sample and
//! batch assembly, which is the per-request cost on the inference path.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use data_loader::RawSample;
use pipeline::{EncoderConfig, FeatureAssembler, FeatureScaler};
use std::sync::Arc;

const GENRES: [&str; 8] = [
    "Action", "Adventure", "Animation", "Comedy", "Drama", "Horror", "Romance", "Thriller",
];
const RATINGS: [&str; 4] = ["G", "PG", "PG-13", "R"];

fn synthetic_corpus(n: usize) -> Vec<RawSample> {
    (0..n)
        .map(|i| {
            let mut s = RawSample::new(i as u64);
            s.budget = Some(1_000_000 + (i as u64 % 200) * 1_000_000);
            s.runtime = Some(80.0 + (i % 90) as f64);
            s.genres = vec![
                GENRES[i % GENRES.len()].to_string(),
                GENRES[(i * 7) % GENRES.len()].to_string(),
            ];
            s.rating = Some(RATINGS[i % RATINGS.len()].to_string());
            s.month = Some((i % 12) as u32 + 1);
            s.day = Some((i % 28) as u32 + 1);
            s.directors = vec![format!("Director {}", i % 300)];
            s.producers = (0..4).map(|p| format!("Producer {}", (i + p) % 500)).collect();
            s.writers = (0..2).map(|w| format!("Writer {}", (i + w) % 400)).collect();
            s.studios = vec![format!("Studio {}", i % 40)];
            s.keywords = (0..12).map(|k| format!("keyword {}", (i * k) % 1000)).collect();
            s.cast = (0..10).map(|c| format!("Actor {}", (i + c * 13) % 2000)).collect();
            s
        })
        .collect()
}

fn bench_assemble_single(c: &mut Criterion) {
    let corpus = synthetic_corpus(2_000);
    let encoders = EncoderConfig::new().fit(&corpus).unwrap();
    let assembler = FeatureAssembler::new(Arc::new(encoders)).unwrap();
    let sample = &corpus[42];

    c.bench_function("assemble_single", |b| {
        b.iter(|| {
            let row = assembler.assemble(black_box(sample)).unwrap();
            black_box(row)
        })
    });
}

fn bench_assemble_batch(c: &mut Criterion) {
    let corpus = synthetic_corpus(2_000);
    let encoders = EncoderConfig::new().fit(&corpus).unwrap();
    let assembler = FeatureAssembler::new(Arc::new(encoders)).unwrap();

    let mut group = c.benchmark_group("assemble_batch");
    for size in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let rows = assembler.assemble_batch(black_box(&corpus[..size])).unwrap();
                black_box(rows)
            })
        });
    }
    group.finish();
}

fn bench_scale(c: &mut Criterion) {
    let corpus = synthetic_corpus(1_000);
    let encoders = EncoderConfig::new().fit(&corpus).unwrap();
    let assembler = FeatureAssembler::new(Arc::new(encoders)).unwrap();
    let rows = assembler.assemble_batch(&corpus).unwrap();
    let scaler = FeatureScaler::fit(&rows).unwrap();

    c.bench_function("scale_single", |b| {
        b.iter(|| {
            let scaled = scaler.transform(black_box(&rows[7])).unwrap();
            black_box(scaled)
        })
    });
}

criterion_group!(
    benches,
    bench_assemble_single,
    bench_assemble_batch,
    bench_scale
);
criterion_main!(benches);
