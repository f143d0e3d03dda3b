//! Headless self-play.
//!
//! A batch is a lazy stream of games. Each game is played to completion in
//! memory and only then released to the consumer, so a failing game never
//! leaks partial samples. Seeds are derived from `(base_seed, game_index)`,
//! which makes any game of a batch reproducible on its own and lets a
//! cancelled batch resume where it stopped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use thiserror::Error;

use crate::actions::{ActionId, ActionSet};
use crate::hashing::game_seed;
use crate::model::SuggestionModel;
use crate::resolver::{self, ResolveError};
use crate::rules_config::RulesConfig;
use crate::scheduler::TurnScheduler;
use crate::state::{GameState, StrategyProfile};
use crate::strategy::PolicySet;
use crate::victory::GameResult;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub base_seed: u64,
    /// Index of the first game; resuming a batch starts here.
    pub start_index: u64,
    pub exploration_rate: f64,
    pub max_actions_per_game: u32,
    pub profiles: Vec<StrategyProfile>,
}

impl SimulationConfig {
    pub fn from_rules(rules: &RulesConfig) -> Self {
        let defaults = rules.simulation();
        let profiles = if defaults.profiles().is_empty() {
            rules.setup().profiles()
        } else {
            defaults.profiles().to_vec()
        };
        Self {
            base_seed: defaults.seed(),
            start_index: 0,
            exploration_rate: defaults.exploration_rate(),
            max_actions_per_game: defaults.max_actions_per_game(),
            profiles,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    pub fn starting_at(mut self, index: u64) -> Self {
        self.start_index = index;
        self
    }

    pub fn with_exploration_rate(mut self, rate: f64) -> Self {
        self.exploration_rate = rate.clamp(0.0, 1.0);
        self
    }
}

/// Cooperative cancellation flag, checked between games.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("game {game_index}: {profile} policy for player {player} broke its contract: {source}")]
    StrategyContractViolation {
        game_index: u64,
        player: usize,
        profile: StrategyProfile,
        #[source]
        source: ResolveError,
    },
    #[error("game {game_index} did not finish within {actions} actions")]
    Stalled { game_index: u64, actions: u32 },
}

impl SimulationError {
    pub fn game_index(&self) -> u64 {
        match self {
            SimulationError::StrategyContractViolation { game_index, .. }
            | SimulationError::Stalled { game_index, .. } => *game_index,
        }
    }
}

/// One decision taken during self-play.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSample {
    pub game_index: u64,
    pub state_before: GameState,
    pub player: usize,
    pub profile: StrategyProfile,
    pub legal: ActionSet,
    pub action: ActionId,
    pub score_delta: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameSummary {
    pub game_index: u64,
    pub seed: u64,
    pub profiles: Vec<StrategyProfile>,
    pub final_scores: Vec<u32>,
    pub winner: usize,
    pub rounds: u32,
    pub actions: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Action(ActionSample),
    GameSummary(GameSummary),
    /// Marker for a game whose output was discarded.
    Error(SimulationError),
}

/// Complete output of one finished game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    pub actions: Vec<ActionSample>,
    pub summary: GameSummary,
}

impl GameRecord {
    pub fn into_samples(self) -> impl Iterator<Item = Sample> {
        self.actions
            .into_iter()
            .map(Sample::Action)
            .chain(std::iter::once(Sample::GameSummary(self.summary)))
    }
}

/// Plays game `game_index` of a batch to the end.
pub fn simulate_game(
    game_index: u64,
    config: &SimulationConfig,
    rules: &Arc<RulesConfig>,
    scheduler: &TurnScheduler,
    model: &Arc<SuggestionModel>,
) -> Result<GameRecord, SimulationError> {
    let seed = game_seed(config.base_seed, game_index);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut state = GameState::with_profiles(rules, &config.profiles);
    let policies = PolicySet::for_state(&state, rules.clone(), model.clone());
    let mut actions = Vec::new();

    while !state.is_over() {
        if actions.len() as u32 >= config.max_actions_per_game {
            return Err(SimulationError::Stalled {
                game_index,
                actions: config.max_actions_per_game,
            });
        }
        let player = state.current_player;
        let profile = state.players[player].profile;
        let legal = resolver::legal_actions(&state, player, rules);

        let explore = config.exploration_rate > 0.0 && rng.gen_bool(config.exploration_rate);
        let chosen = if explore {
            let options: Vec<ActionId> = legal.actions().collect();
            options.choose(&mut rng).copied()
        } else {
            None
        };
        let action = match (chosen, policies.seat(player)) {
            (Some(action), _) => action,
            (None, Some(policy)) => policy.choose(&state, player),
            (None, None) => crate::strategy::FALLBACK_ACTION,
        };

        let resolution = scheduler
            .play(&state, player, action, rules)
            .map_err(|source| SimulationError::StrategyContractViolation {
                game_index,
                player,
                profile,
                source,
            })?;
        actions.push(ActionSample {
            game_index,
            state_before: state,
            player,
            profile,
            legal,
            action,
            score_delta: resolution.entry.delta.score,
        });
        state = resolution.state;
    }

    let result = GameResult::from_state(&state).ok_or(SimulationError::Stalled {
        game_index,
        actions: actions.len() as u32,
    })?;
    let summary = GameSummary {
        game_index,
        seed,
        profiles: config.profiles.clone(),
        final_scores: result.final_scores,
        winner: result.winner,
        rounds: result.rounds,
        actions: actions.len() as u32,
    };
    Ok(GameRecord { actions, summary })
}

/// Where a batch stands. `next_game_index` is the first game not yet played.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub games_requested: u64,
    pub games_completed: u64,
    pub games_failed: u64,
    pub next_game_index: u64,
    pub cancelled: bool,
}

impl BatchProgress {
    pub fn games_remaining(&self) -> u64 {
        self.games_requested
            .saturating_sub(self.games_completed + self.games_failed)
    }
}

/// Lazy, finite, single-use stream of samples for a batch of games.
pub struct SampleStream {
    rules: Arc<RulesConfig>,
    scheduler: TurnScheduler,
    model: Arc<SuggestionModel>,
    config: SimulationConfig,
    cancel: CancelToken,
    end_index: u64,
    buffer: VecDeque<Sample>,
    progress: BatchProgress,
}

impl SampleStream {
    pub fn progress(&self) -> BatchProgress {
        self.progress
    }

    /// Plays the next game into the buffer. `false` once the batch is done or
    /// cancelled.
    fn fill(&mut self) -> bool {
        if self.progress.next_game_index >= self.end_index {
            return false;
        }
        if self.cancel.is_cancelled() {
            if !self.progress.cancelled {
                self.progress.cancelled = true;
                tracing::info!(
                    target: "companion::simulation",
                    next_game_index = self.progress.next_game_index,
                    completed = self.progress.games_completed,
                    "batch.cancelled"
                );
            }
            return false;
        }

        let index = self.progress.next_game_index;
        match simulate_game(index, &self.config, &self.rules, &self.scheduler, &self.model) {
            Ok(record) => {
                self.progress.games_completed += 1;
                self.buffer.extend(record.into_samples());
            }
            Err(err) => {
                self.progress.games_failed += 1;
                tracing::warn!(
                    target: "companion::simulation",
                    game_index = index,
                    error = %err,
                    "game.discarded"
                );
                self.buffer.push_back(Sample::Error(err));
            }
        }
        self.progress.next_game_index += 1;
        true
    }
}

impl Iterator for SampleStream {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        loop {
            if let Some(sample) = self.buffer.pop_front() {
                return Some(sample);
            }
            if !self.fill() {
                return None;
            }
        }
    }
}

/// Streams `game_count` games starting at `config.start_index`.
///
/// Every seat uses its profile's policy; human seats follow `model`.
pub fn run_batch(
    game_count: u64,
    config: SimulationConfig,
    rules: Arc<RulesConfig>,
    model: Arc<SuggestionModel>,
    cancel: CancelToken,
) -> SampleStream {
    let scheduler = TurnScheduler::from_rules(&rules);
    let start = config.start_index;
    SampleStream {
        rules,
        scheduler,
        model,
        end_index: start.saturating_add(game_count),
        config,
        cancel,
        buffer: VecDeque::new(),
        progress: BatchProgress {
            games_requested: game_count,
            next_game_index: start,
            ..BatchProgress::default()
        },
    }
}

/// Plays games across the rayon pool and forwards each game's samples, in
/// game order, to `sink`. Cancellation is observed between waves of games.
pub fn run_parallel_batch(
    game_count: u64,
    config: &SimulationConfig,
    rules: &Arc<RulesConfig>,
    model: &Arc<SuggestionModel>,
    cancel: &CancelToken,
    sink: &Sender<Vec<Sample>>,
) -> BatchProgress {
    let scheduler = TurnScheduler::from_rules(rules);
    let wave = (rayon::current_num_threads().max(1) * 2) as u64;
    let end = config.start_index.saturating_add(game_count);
    let mut progress = BatchProgress {
        games_requested: game_count,
        next_game_index: config.start_index,
        ..BatchProgress::default()
    };

    while progress.next_game_index < end {
        if cancel.is_cancelled() {
            progress.cancelled = true;
            tracing::info!(
                target: "companion::simulation",
                next_game_index = progress.next_game_index,
                "batch.cancelled"
            );
            break;
        }
        let wave_end = (progress.next_game_index + wave).min(end);
        let results: Vec<Result<GameRecord, SimulationError>> = (progress.next_game_index
            ..wave_end)
            .into_par_iter()
            .map(|index| simulate_game(index, config, rules, &scheduler, model))
            .collect();

        for result in results {
            let samples = match result {
                Ok(record) => {
                    progress.games_completed += 1;
                    record.into_samples().collect()
                }
                Err(err) => {
                    progress.games_failed += 1;
                    tracing::warn!(
                        target: "companion::simulation",
                        game_index = err.game_index(),
                        error = %err,
                        "game.discarded"
                    );
                    vec![Sample::Error(err)]
                }
            };
            if sink.send(samples).is_err() {
                tracing::warn!(target: "companion::simulation", "batch.sink_closed");
                progress.cancelled = true;
                return progress;
            }
        }
        progress.next_game_index = wave_end;
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::fingerprint;

    fn rules() -> Arc<RulesConfig> {
        RulesConfig::builtin()
    }

    fn config(rules: &RulesConfig) -> SimulationConfig {
        SimulationConfig::from_rules(rules).with_seed(42)
    }

    #[test]
    fn batch_yields_one_summary_per_game() {
        let rules = rules();
        let stream = run_batch(
            6,
            config(&rules),
            rules.clone(),
            Arc::default(),
            CancelToken::new(),
        );
        let samples: Vec<Sample> = stream.collect();
        let summaries = samples
            .iter()
            .filter(|s| matches!(s, Sample::GameSummary(_)))
            .count();
        assert_eq!(summaries, 6);
        assert!(!samples.iter().any(|s| matches!(s, Sample::Error(_))));
        assert!(matches!(samples.last(), Some(Sample::GameSummary(_))));
    }

    #[test]
    fn every_sample_respects_exhaustion_invariant() {
        let rules = rules();
        for sample in run_batch(3, config(&rules), rules.clone(), Arc::default(), CancelToken::new()) {
            if let Sample::Action(action) = sample {
                action
                    .state_before
                    .check_invariants()
                    .expect("consistent state");
                assert!(action.legal.has(action.action));
            }
        }
    }

    #[test]
    fn same_seed_replays_the_same_game() {
        let rules = rules();
        let scheduler = TurnScheduler::from_rules(&rules);
        let cfg = config(&rules);
        let model = Arc::default();
        let a = simulate_game(3, &cfg, &rules, &scheduler, &model).expect("game a");
        let b = simulate_game(3, &cfg, &rules, &scheduler, &model).expect("game b");
        assert_eq!(a, b);
        let c = simulate_game(4, &cfg, &rules, &scheduler, &model).expect("game c");
        assert_ne!(
            a.actions.iter().map(|s| fingerprint(&s.state_before)).collect::<Vec<_>>(),
            c.actions.iter().map(|s| fingerprint(&s.state_before)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn cancelled_batch_stops_between_games_and_resumes() {
        let rules = rules();
        let cancel = CancelToken::new();
        let mut stream = run_batch(5, config(&rules), rules.clone(), Arc::default(), cancel.clone());
        let mut seen_summaries = 0;
        for sample in stream.by_ref() {
            if matches!(sample, Sample::GameSummary(_)) {
                seen_summaries += 1;
                if seen_summaries == 2 {
                    cancel.cancel();
                }
            }
        }
        let progress = stream.progress();
        assert!(progress.cancelled);
        assert_eq!(progress.games_completed, 2);
        assert_eq!(progress.next_game_index, 2);
        assert_eq!(progress.games_remaining(), 3);

        let resumed: Vec<u64> = run_batch(
            progress.games_remaining(),
            config(&rules).starting_at(progress.next_game_index),
            rules.clone(),
            Arc::default(),
            CancelToken::new(),
        )
        .filter_map(|sample| match sample {
            Sample::GameSummary(summary) => Some(summary.game_index),
            _ => None,
        })
        .collect();
        assert_eq!(resumed, vec![2, 3, 4]);
    }

    #[test]
    fn broken_policy_contract_emits_error_marker() {
        // Without workers, cards, gold or tokens no action is legal, so the
        // fallback is rejected.
        let rules = Arc::new(
            RulesConfig::from_json_str(
                r#"{ "setup": {
                    "starting_gold": [0],
                    "population": { "farmer": 0, "worker": 0, "craftsman": 0 },
                    "hand_cards": 0, "trade_tokens": 0, "exploration_tokens": 0,
                    "profiles": ["balanced", "balanced"], "player_count": 2 },
                  "end": { "final_round_on_empty_hand": false } }"#,
            )
            .expect("config parses"),
        );
        let samples: Vec<Sample> = run_batch(
            2,
            SimulationConfig::from_rules(&rules).with_exploration_rate(0.0),
            rules.clone(),
            Arc::default(),
            CancelToken::new(),
        )
        .collect();
        assert_eq!(samples.len(), 2);
        for sample in samples {
            match sample {
                Sample::Error(SimulationError::StrategyContractViolation { source, .. }) => {
                    assert!(matches!(source, ResolveError::IllegalAction { .. }));
                }
                other => panic!("expected error marker, got {other:?}"),
            }
        }
    }

    #[test]
    fn parallel_batch_matches_sequential_order() {
        let rules = rules();
        let cfg = config(&rules);
        let (tx, rx) = crossbeam_channel::unbounded();
        let progress = run_parallel_batch(4, &cfg, &rules, &Arc::default(), &CancelToken::new(), &tx);
        drop(tx);
        assert_eq!(progress.games_completed, 4);
        let parallel: Vec<Sample> = rx.iter().flatten().collect();
        let sequential: Vec<Sample> =
            run_batch(4, cfg, rules.clone(), Arc::default(), CancelToken::new()).collect();
        assert_eq!(parallel, sequential);
    }
}
