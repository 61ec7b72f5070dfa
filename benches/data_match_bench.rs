use chart_sync::api::{DataMatchCache, DataMatchOptions, classify, data_match, data_match_cached};
use chart_sync::cache::CacheConfig;
use chart_sync::core::{AlignedDataset, ChartConfiguration};
use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;

fn generated_dataset(series: usize, points: usize) -> AlignedDataset {
    AlignedDataset::from_dense(
        (0..series)
            .map(|s| {
                (0..points)
                    .map(|i| (i as f64) * 0.5 + (s as f64) * 100.0)
                    .collect()
            })
            .collect(),
    )
}

fn bench_data_match_loose_4x10k(c: &mut Criterion) {
    let lhs = generated_dataset(4, 10_000);
    let rhs = generated_dataset(4, 10_000);

    c.bench_function("data_match_loose_4x10k", |b| {
        b.iter(|| {
            let _ = data_match(black_box(&lhs), black_box(&rhs), DataMatchOptions::default());
        })
    });
}

fn bench_data_match_strict_4x10k(c: &mut Criterion) {
    let lhs = generated_dataset(4, 10_000);
    let rhs = generated_dataset(4, 10_000);
    let options = DataMatchOptions::default().with_strict(true);

    c.bench_function("data_match_strict_4x10k", |b| {
        b.iter(|| {
            let _ = data_match(black_box(&lhs), black_box(&rhs), options);
        })
    });
}

fn bench_data_match_cached_hit_4x10k(c: &mut Criterion) {
    let lhs = generated_dataset(4, 10_000);
    let rhs = generated_dataset(4, 10_000);
    let mut cache = DataMatchCache::with_config(CacheConfig::default());

    c.bench_function("data_match_cached_hit_4x10k", |b| {
        b.iter(|| {
            let _ = data_match_cached(
                black_box(&lhs),
                black_box(&rhs),
                DataMatchOptions::default(),
                &mut cache,
            );
        })
    });
}

fn bench_classify_wide_configuration(c: &mut Criterion) {
    let series: Vec<_> = (0..32)
        .map(|i| json!({ "label": format!("series-{i}"), "stroke": "#2962ff", "width": 1.5 }))
        .collect();
    let value = json!({
        "width": 1600,
        "height": 900,
        "series": series,
        "axes": [{ "show": true }, { "size": 60 }],
        "scales": { "x": { "time": true }, "y": { "auto": true } }
    });
    let previous = ChartConfiguration::from_json_value(value.clone()).expect("valid config");
    let next = ChartConfiguration::from_json_value(value).expect("valid config");

    c.bench_function("classify_wide_configuration", |b| {
        b.iter(|| {
            let _ = classify(black_box(&previous), black_box(&next));
        })
    });
}

criterion_group!(
    benches,
    bench_data_match_loose_4x10k,
    bench_data_match_strict_4x10k,
    bench_data_match_cached_hit_4x10k,
    bench_classify_wide_configuration
);
criterion_main!(benches);
