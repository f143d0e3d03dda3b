mod common;

use std::sync::Arc;

use core_game::{
    run_batch, run_parallel_batch, CancelToken, IngestQueue, Sample, SimulationConfig,
    SuggestionModel, TrainingAggregator,
};

fn batch(seed: u64, games: u64) -> Vec<Sample> {
    let rules = common::test_rules();
    run_batch(
        games,
        SimulationConfig::from_rules(&rules).with_seed(seed),
        rules.clone(),
        Arc::new(SuggestionModel::new()),
        CancelToken::new(),
    )
    .collect()
}

/// Splits a sample stream at game boundaries.
fn per_game(samples: Vec<Sample>) -> Vec<Vec<Sample>> {
    let mut games = Vec::new();
    let mut current = Vec::new();
    for sample in samples {
        let boundary = !matches!(sample, Sample::Action(_));
        current.push(sample);
        if boundary {
            games.push(std::mem::take(&mut current));
        }
    }
    games
}

#[test]
fn identical_seeds_replay_identically() {
    let first = batch(99, 6);
    let second = batch(99, 6);
    assert_eq!(first, second);
}

#[test]
fn different_seeds_diverge() {
    assert_ne!(batch(1, 5), batch(2, 5));
}

#[test]
fn resumed_batch_matches_uninterrupted_one() {
    let rules = common::test_rules();
    let model = Arc::new(SuggestionModel::new());
    let config = SimulationConfig::from_rules(&rules);

    let whole: Vec<Sample> = run_batch(
        6,
        config.clone(),
        rules.clone(),
        model.clone(),
        CancelToken::new(),
    )
    .collect();

    let mut head = run_batch(
        6,
        config.clone(),
        rules.clone(),
        model.clone(),
        CancelToken::new(),
    );
    let mut resumed = Vec::new();
    while head.progress().games_completed + head.progress().games_failed < 2 {
        match head.next() {
            Some(sample) => resumed.push(sample),
            None => break,
        }
    }
    // Drain the buffered game before stopping.
    while !matches!(resumed.last(), Some(Sample::GameSummary(_) | Sample::Error(_))) {
        resumed.push(head.next().expect("game in flight completes"));
    }
    let resume_index = head.progress().next_game_index;
    let remaining = 6 - (resume_index - config.start_index);
    resumed.extend(run_batch(
        remaining,
        config.starting_at(resume_index),
        rules,
        model,
        CancelToken::new(),
    ));

    assert_eq!(resumed, whole);
}

#[test]
fn parallel_training_matches_sequential_training() {
    let rules = common::test_rules();
    let model = Arc::new(SuggestionModel::new());
    let config = SimulationConfig::from_rules(&rules).with_seed(7);

    let sequential = TrainingAggregator::new(rules.clone());
    let samples: Vec<Sample> = run_batch(
        12,
        config.clone(),
        rules.clone(),
        model.clone(),
        CancelToken::new(),
    )
    .collect();
    for game in per_game(samples) {
        sequential.ingest(game);
    }

    let parallel = Arc::new(TrainingAggregator::new(rules.clone()));
    let queue = IngestQueue::spawn(parallel.clone());
    let progress = run_parallel_batch(
        12,
        &config,
        &rules,
        &model,
        &CancelToken::new(),
        queue.sender(),
    );
    queue.finish();

    assert_eq!(progress.games_completed + progress.games_failed, 12);
    assert_eq!(parallel.stats().games_played, sequential.stats().games_played);
    assert_eq!(parallel.stats().data_points, sequential.stats().data_points);
    assert_eq!(*parallel.model(), *sequential.model());
    assert_eq!(parallel.metrics(), sequential.metrics());
}
