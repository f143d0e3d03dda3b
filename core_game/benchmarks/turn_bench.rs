use std::sync::Arc;

use core_game::{
    resolver, suggest, ActionId, GameState, RulesConfig, SuggestionModel, TurnScheduler,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn bench_resolve(c: &mut Criterion) {
    let rules = RulesConfig::builtin();
    let scheduler = TurnScheduler::from_rules(&rules);
    let mut group = c.benchmark_group("resolve");

    // Seat 0 opens with no gold; fund it so workforce resolves instead of
    // bouncing off the gold check.
    let mut opening = GameState::new_game(&rules);
    opening.players[0].gold = 5;

    for action in [ActionId::Build, ActionId::Workforce, ActionId::OldWorld] {
        assert!(
            resolver::legal_actions(&opening, 0, &rules).has(action),
            "{action} should be legal at the opening"
        );
        group.bench_with_input(
            BenchmarkId::new("action", action.as_str()),
            &action,
            |b, &action| {
                b.iter_batched(
                    || opening.clone(),
                    |state| scheduler.play(&state, 0, action, &rules),
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.bench_function("legal_actions", |b| {
        let state = GameState::new_game(&rules);
        b.iter(|| resolver::legal_actions(&state, 0, &rules))
    });

    group.finish();
}

fn bench_suggest(c: &mut Criterion) {
    let rules = RulesConfig::builtin();
    let state = GameState::new_game(&rules);
    let model = Arc::new(SuggestionModel::new());
    c.bench_function("suggest/heuristic", |b| {
        b.iter(|| suggest(&state, &model, &rules))
    });
}

criterion_group!(turn_benches, bench_resolve, bench_suggest);
criterion_main!(turn_benches);
