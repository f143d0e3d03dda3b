//! Folds simulation samples into the suggestion model.
//!
//! All updates funnel through one mutex, so there is a single writer no
//! matter how many batches produce samples. Readers only ever see a fully
//! published model snapshot.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{unbounded, Sender};
use serde::{Deserialize, Serialize};

use crate::actions::{ActionId, ActionSet};
use crate::features::{self, FeatureVector};
use crate::metrics::StrategyMetrics;
use crate::model::SuggestionModel;
use crate::rules_config::{RulesConfig, TrainingConfig};
use crate::simulation::{ActionSample, GameSummary, Sample};

/// Session-wide training counters. `games_played` and `data_points` only
/// ever grow; `model_accuracy` may go either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainingStats {
    pub games_played: u64,
    pub data_points: u64,
    /// Held-out top-1 accuracy, 0 to 100.
    pub model_accuracy: f32,
    /// Milliseconds since the Unix epoch; `None` before the first batch.
    pub last_training_timestamp: Option<u64>,
    pub model_version: u64,
}

#[derive(Debug, Clone)]
struct ValidationSample {
    features: FeatureVector,
    legal: ActionSet,
    target: ActionId,
}

#[derive(Debug, Default)]
struct AggregatorState {
    model: SuggestionModel,
    stats: TrainingStats,
    metrics: StrategyMetrics,
    pending: HashMap<u64, Vec<ActionSample>>,
    validation: VecDeque<ValidationSample>,
    seen: u64,
    /// One past the highest game index seen, played or discarded.
    next_game_index: u64,
}

#[derive(Debug)]
pub struct TrainingAggregator {
    rules: Arc<RulesConfig>,
    state: Mutex<AggregatorState>,
    published: RwLock<Arc<SuggestionModel>>,
}

impl TrainingAggregator {
    pub fn new(rules: Arc<RulesConfig>) -> Self {
        Self {
            rules,
            state: Mutex::new(AggregatorState::default()),
            published: RwLock::new(Arc::new(SuggestionModel::new())),
        }
    }

    /// Seeds the aggregator from a previously saved model and counters.
    /// `next_game_index` is where the next batch should start.
    pub fn restore(
        rules: Arc<RulesConfig>,
        model: SuggestionModel,
        stats: TrainingStats,
        metrics: StrategyMetrics,
        next_game_index: u64,
    ) -> Self {
        let published = Arc::new(model.clone());
        Self {
            rules,
            state: Mutex::new(AggregatorState {
                model,
                stats,
                metrics,
                next_game_index,
                ..AggregatorState::default()
            }),
            published: RwLock::new(published),
        }
    }

    /// Current published model. Cheap to call; never blocks on training
    /// for longer than the pointer swap.
    pub fn model(&self) -> Arc<SuggestionModel> {
        self.published
            .read()
            .expect("published model lock poisoned")
            .clone()
    }

    pub fn stats(&self) -> TrainingStats {
        self.state.lock().expect("aggregator lock poisoned").stats
    }

    pub fn metrics(&self) -> StrategyMetrics {
        self.state
            .lock()
            .expect("aggregator lock poisoned")
            .metrics
            .clone()
    }

    /// First game index not yet folded in, counting discarded games too.
    /// Batches that start here never replay a game this aggregator has seen.
    pub fn next_game_index(&self) -> u64 {
        self.state
            .lock()
            .expect("aggregator lock poisoned")
            .next_game_index
    }

    /// Consumes samples and returns the updated counters.
    ///
    /// Action samples wait until their game's summary arrives so the winner
    /// is known; an error marker drops whatever was waiting for that game.
    pub fn ingest<I>(&self, samples: I) -> TrainingStats
    where
        I: IntoIterator<Item = Sample>,
    {
        let cfg = self.rules.training();
        let mut guard = self.state.lock().expect("aggregator lock poisoned");
        let state = &mut *guard;
        let mut games = 0u64;
        let mut trained = 0u64;

        for sample in samples {
            match sample {
                Sample::Action(action) => {
                    state
                        .pending
                        .entry(action.game_index)
                        .or_default()
                        .push(action);
                }
                Sample::GameSummary(summary) => {
                    state.next_game_index = state.next_game_index.max(summary.game_index + 1);
                    let actions = state.pending.remove(&summary.game_index).unwrap_or_default();
                    trained += train_game(state, &summary, actions, cfg);
                    state.metrics.record_game(
                        &summary.profiles,
                        &summary.final_scores,
                        summary.winner,
                        summary.rounds,
                    );
                    games += 1;
                }
                Sample::Error(err) => {
                    state.next_game_index = state.next_game_index.max(err.game_index() + 1);
                    let dropped = state
                        .pending
                        .remove(&err.game_index())
                        .map(|actions| actions.len())
                        .unwrap_or(0);
                    tracing::debug!(
                        target: "companion::training",
                        game_index = err.game_index(),
                        dropped,
                        "samples.discarded"
                    );
                }
            }
        }

        if games > 0 || trained > 0 {
            state.model.record_samples(trained);
            state.stats.games_played += games;
            state.stats.data_points += trained;
            state.stats.model_accuracy = validation_accuracy(&state.model, &state.validation);
            state.stats.model_version = state.model.version();
            state.stats.last_training_timestamp = Some(now_millis());
            *self.published.write().expect("published model lock poisoned") =
                Arc::new(state.model.clone());
            tracing::debug!(
                target: "companion::training",
                games,
                trained,
                games_played = state.stats.games_played,
                data_points = state.stats.data_points,
                accuracy = state.stats.model_accuracy,
                version = state.stats.model_version,
                "training.ingested"
            );
        }
        state.stats
    }
}

/// Trains on one finished game. Returns how many action samples it consumed.
fn train_game(
    state: &mut AggregatorState,
    summary: &GameSummary,
    actions: Vec<ActionSample>,
    cfg: &TrainingConfig,
) -> u64 {
    let count = actions.len() as u64;
    for action in actions {
        state.metrics.record_action(action.profile, action.action);
        state.seen += 1;
        let features = features::extract(&action.state_before, action.player);
        if state.seen % cfg.holdout_every() == 0 {
            state.validation.push_back(ValidationSample {
                features,
                legal: action.legal,
                target: action.action,
            });
            while state.validation.len() > cfg.validation_window() {
                state.validation.pop_front();
            }
            continue;
        }
        let weight = if action.player == summary.winner {
            cfg.winner_weight()
        } else {
            cfg.non_winner_weight()
        };
        state.model.sgd_step(
            &features,
            action.legal,
            action.action,
            weight,
            cfg.learning_rate(),
            cfg.l2(),
        );
    }
    count
}

fn validation_accuracy(model: &SuggestionModel, validation: &VecDeque<ValidationSample>) -> f32 {
    if validation.is_empty() {
        return 0.0;
    }
    let hits = validation
        .iter()
        .filter(|sample| model.predict(&sample.features, sample.legal) == Some(sample.target))
        .count();
    (hits as f32 * 100.0 / validation.len() as f32).clamp(0.0, 100.0)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Channel in front of an aggregator for producers on other threads. One
/// worker drains it, preserving the single-writer rule.
pub struct IngestQueue {
    sender: Sender<Vec<Sample>>,
    worker: JoinHandle<()>,
}

impl IngestQueue {
    pub fn spawn(aggregator: Arc<TrainingAggregator>) -> Self {
        let (sender, receiver) = unbounded::<Vec<Sample>>();
        let worker = thread::spawn(move || {
            while let Ok(batch) = receiver.recv() {
                aggregator.ingest(batch);
            }
        });
        Self { sender, worker }
    }

    pub fn sender(&self) -> &Sender<Vec<Sample>> {
        &self.sender
    }

    /// Closes the queue and waits for everything already sent to be folded in.
    pub fn finish(self) {
        let IngestQueue { sender, worker } = self;
        drop(sender);
        if worker.join().is_err() {
            tracing::error!(target: "companion::training", "ingest.worker_panicked");
        }
    }
}
