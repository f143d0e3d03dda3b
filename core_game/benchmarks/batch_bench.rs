use std::sync::Arc;

use core_game::{
    run_batch, CancelToken, RulesConfig, SimulationConfig, SuggestionModel, TrainingAggregator,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn bench_batch(c: &mut Criterion) {
    let rules = RulesConfig::builtin();
    let model = Arc::new(SuggestionModel::new());
    let mut group = c.benchmark_group("batch");
    group.sample_size(10);

    for games in [1u64, 10, 50] {
        group.bench_with_input(BenchmarkId::new("simulate", games), &games, |b, &games| {
            b.iter(|| {
                run_batch(
                    games,
                    SimulationConfig::from_rules(&rules),
                    rules.clone(),
                    model.clone(),
                    CancelToken::new(),
                )
                .count()
            })
        });
    }

    group.bench_function("ingest/10", |b| {
        let samples: Vec<_> = run_batch(
            10,
            SimulationConfig::from_rules(&rules),
            rules.clone(),
            model.clone(),
            CancelToken::new(),
        )
        .collect();
        b.iter_batched(
            || (TrainingAggregator::new(rules.clone()), samples.clone()),
            |(aggregator, samples)| aggregator.ingest(samples),
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(batch_benches, bench_batch);
criterion_main!(batch_benches);
