//! Criterion benchmarks for screening hot paths.
//!
//! Benchmarks:
//! 1. RS rating over a synthetic 500-ticker universe
//! 2. Trend template, sequential vs rayon
//! 3. Full pipeline with an in-memory fundamentals source

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use screenlab_core::data::EmptySource;
use screenlab_core::domain::PriceHistory;
use screenlab_core::reporter::NullReporter;
use screenlab_core::rs_rating::RsRatingCalculator;
use screenlab_core::synthetic;
use screenlab_core::trend_template::TrendTemplateEvaluator;
use screenlab_core::{ScreenConfig, ScreeningPipeline};

// ── Helpers ──────────────────────────────────────────────────────────

/// Random walks with every tenth ticker replaced by a textbook leader.
fn make_universe(tickers: usize) -> PriceHistory {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    (0..tickers)
        .map(|i| {
            let ticker = format!("SYM{i}");
            if i % 10 == 0 {
                synthetic::leader(&ticker, start, 500)
            } else {
                synthetic::random_walk(&ticker, start, end).unwrap()
            }
        })
        .collect()
}

// ── 1. RS rating ─────────────────────────────────────────────────────

fn bench_rs_rating(c: &mut Criterion) {
    let mut group = c.benchmark_group("rs_rating");
    let calc = RsRatingCalculator::with_defaults();

    for &count in &[50, 500] {
        let history = make_universe(count);
        group.bench_with_input(BenchmarkId::new("rate", count), &count, |b, _| {
            b.iter(|| calc.rate(black_box(&history)));
        });
    }
    group.finish();
}

// ── 2. Trend template ────────────────────────────────────────────────

fn bench_trend_template(c: &mut Criterion) {
    let mut group = c.benchmark_group("trend_template");
    let history = make_universe(500);
    let ratings = RsRatingCalculator::with_defaults().rate(&history);
    let config = ScreenConfig::default();

    for parallel in [false, true] {
        let evaluator = TrendTemplateEvaluator::from_config(&config).with_parallel(parallel);
        let name = if parallel { "parallel_500" } else { "sequential_500" };
        group.bench_function(name, |b| {
            b.iter(|| evaluator.evaluate(black_box(&history), &ratings, &NullReporter));
        });
    }
    group.finish();
}

// ── 3. Full pipeline ─────────────────────────────────────────────────

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let history = make_universe(500);
    let pipeline = ScreeningPipeline::with_defaults();

    group.bench_function("500_tickers", |b| {
        b.iter(|| pipeline.run(black_box(&history), &EmptySource, &NullReporter));
    });
    group.finish();
}

criterion_group!(benches, bench_rs_rating, bench_trend_template, bench_pipeline);
criterion_main!(benches);
