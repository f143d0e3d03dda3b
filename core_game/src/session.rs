use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::action_log::{ActionLog, LogEntry};
use crate::actions::ActionId;
use crate::resolver::{self, ResolveError};
use crate::rules_config::RulesConfig;
use crate::scheduler::TurnScheduler;
use crate::simulation::{run_batch, BatchProgress, CancelToken, Sample, SimulationConfig};
use crate::state::{GameState, StrategyProfile};
use crate::strategy::policy_for;
use crate::suggestion::{self, Suggestion};
use crate::training::{TrainingAggregator, TrainingStats};
use crate::victory::GameResult;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("player {player} is human-controlled and waits for external input")]
    HumanSeat { player: usize },
    #[error("background batch failed: {0}")]
    BatchJoin(#[from] tokio::task::JoinError),
}

/// Final word on a background batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchReport {
    pub progress: BatchProgress,
    pub action_samples: u64,
    pub stats: TrainingStats,
}

/// Handle to a batch running on the blocking pool.
#[derive(Debug)]
pub struct BatchHandle {
    cancel: CancelToken,
    progress: watch::Receiver<BatchProgress>,
    task: JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// Stops the batch after the game in flight.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Receiver updated after every game.
    pub fn progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress.clone()
    }

    pub async fn join(self) -> Result<BatchReport, SessionError> {
        Ok(self.task.await?)
    }
}

/// One authoritative game plus the session's training state.
///
/// Writers serialize on an internal mutex; readers grab the current
/// snapshot without waiting on them.
#[derive(Debug)]
pub struct GameSession {
    rules: Arc<RulesConfig>,
    scheduler: TurnScheduler,
    snapshot: RwLock<Arc<GameState>>,
    log: Mutex<ActionLog>,
    aggregator: Arc<TrainingAggregator>,
    /// First game index not yet handed to a batch.
    next_game_index: AtomicU64,
}

impl GameSession {
    pub fn new(rules: Arc<RulesConfig>) -> Self {
        let aggregator = Arc::new(TrainingAggregator::new(rules.clone()));
        Self::with_aggregator(rules, aggregator)
    }

    pub fn with_aggregator(rules: Arc<RulesConfig>, aggregator: Arc<TrainingAggregator>) -> Self {
        let state = GameState::new_game(&rules);
        Self {
            scheduler: TurnScheduler::from_rules(&rules),
            snapshot: RwLock::new(Arc::new(state)),
            log: Mutex::new(ActionLog::new()),
            next_game_index: AtomicU64::new(aggregator.next_game_index()),
            rules,
            aggregator,
        }
    }

    pub fn rules(&self) -> &Arc<RulesConfig> {
        &self.rules
    }

    pub fn aggregator(&self) -> &Arc<TrainingAggregator> {
        &self.aggregator
    }

    pub fn get_state(&self) -> Arc<GameState> {
        self.snapshot
            .read()
            .expect("game snapshot lock poisoned")
            .clone()
    }

    /// Resolves an action for `player` and advances the turn.
    pub fn resolve(
        &self,
        player: usize,
        action: ActionId,
    ) -> Result<(Arc<GameState>, LogEntry), ResolveError> {
        self.commit(|state| self.scheduler.play(state, player, action, &self.rules))
    }

    /// As [`GameSession::resolve`], with the action given by name.
    pub fn resolve_named(
        &self,
        player: usize,
        action: &str,
    ) -> Result<(Arc<GameState>, LogEntry), ResolveError> {
        self.commit(|state| {
            let mut resolution = resolver::resolve_named(state, player, action, &self.rules)?;
            self.scheduler.advance(&mut resolution.state);
            Ok(resolution)
        })
    }

    /// Lets the seat on turn pick and play its own action. Human seats are
    /// refused.
    pub fn play_ai_turn(&self) -> Result<(Arc<GameState>, LogEntry), SessionError> {
        let state = self.get_state();
        let player = state.current_player;
        let profile = state
            .player(player)
            .map(|p| p.profile)
            .unwrap_or(StrategyProfile::Human);
        if profile == StrategyProfile::Human {
            return Err(SessionError::HumanSeat { player });
        }
        let policy = policy_for(profile, self.rules.clone(), self.aggregator.model());
        let action = policy.choose(&state, player);
        Ok(self.resolve(player, action)?)
    }

    /// Ranked suggestions for the seat on turn.
    pub fn suggest(&self) -> Vec<Suggestion> {
        let state = self.get_state();
        let model = self.aggregator.model();
        suggestion::suggest(&state, &model, &self.rules)
    }

    /// The last `count` log entries of the current game, oldest first.
    pub fn recent_log(&self, count: usize) -> Vec<LogEntry> {
        self.log
            .lock()
            .expect("action log lock poisoned")
            .recent(count)
            .to_vec()
    }

    pub fn result(&self) -> Option<GameResult> {
        GameResult::from_state(&self.get_state())
    }

    /// Throws the current game away and deals a fresh one. Training state
    /// is kept.
    pub fn new_game(&self) -> Arc<GameState> {
        let mut log = self.log.lock().expect("action log lock poisoned");
        let state = Arc::new(GameState::new_game(&self.rules));
        *self.snapshot.write().expect("game snapshot lock poisoned") = state.clone();
        *log = ActionLog::new();
        tracing::info!(target: "companion::session", "game.reset");
        state
    }

    pub fn training_stats(&self) -> TrainingStats {
        self.aggregator.stats()
    }

    /// Plays `game_count` games synchronously, trains on them and hands the
    /// samples back. Each batch continues after the games of the last one.
    pub fn run_batch(&self, game_count: u64) -> (Vec<Sample>, TrainingStats) {
        let config = self.reserve_games(game_count, SimulationConfig::from_rules(&self.rules));
        let samples: Vec<Sample> = run_batch(
            game_count,
            config,
            self.rules.clone(),
            self.aggregator.model(),
            CancelToken::new(),
        )
        .collect();
        let stats = self.aggregator.ingest(samples.iter().cloned());
        (samples, stats)
    }

    /// Starts a batch on the Tokio blocking pool. Must be called from within
    /// a Tokio runtime.
    pub fn spawn_batch(&self, game_count: u64) -> BatchHandle {
        let config = self.reserve_games(game_count, SimulationConfig::from_rules(&self.rules));
        self.spawn_batch_with(game_count, config)
    }

    /// Runs a batch with an explicit config, e.g. to resume at a given index.
    /// Later session batches start after its range.
    pub fn spawn_batch_with(&self, game_count: u64, config: SimulationConfig) -> BatchHandle {
        self.next_game_index.fetch_max(
            config.start_index.saturating_add(game_count),
            Ordering::SeqCst,
        );
        spawn_training_batch(
            game_count,
            config,
            self.rules.clone(),
            self.aggregator.clone(),
        )
    }

    /// Claims `game_count` indices no other session batch will use.
    fn reserve_games(&self, game_count: u64, config: SimulationConfig) -> SimulationConfig {
        let start = self
            .next_game_index
            .fetch_add(game_count, Ordering::SeqCst)
            .max(self.aggregator.next_game_index());
        self.next_game_index
            .fetch_max(start.saturating_add(game_count), Ordering::SeqCst);
        config.starting_at(start)
    }

    fn commit<F>(&self, step: F) -> Result<(Arc<GameState>, LogEntry), ResolveError>
    where
        F: FnOnce(&GameState) -> Result<resolver::Resolution, ResolveError>,
    {
        let mut log = self.log.lock().expect("action log lock poisoned");
        let current = self.get_state();
        let resolution = step(&current)?;
        let next = Arc::new(resolution.state);
        *self.snapshot.write().expect("game snapshot lock poisoned") = next.clone();
        log.push(resolution.entry.clone());
        tracing::info!(
            target: "companion::session",
            player = resolution.entry.player,
            action = %resolution.entry.action,
            round = next.round,
            phase = %next.phase,
            "action.committed"
        );
        Ok((next, resolution.entry))
    }
}

/// Runs a batch on the blocking pool, feeding the aggregator one game at a
/// time and publishing progress after each.
pub fn spawn_training_batch(
    game_count: u64,
    config: SimulationConfig,
    rules: Arc<RulesConfig>,
    aggregator: Arc<TrainingAggregator>,
) -> BatchHandle {
    let cancel = CancelToken::new();
    let initial = BatchProgress {
        games_requested: game_count,
        next_game_index: config.start_index,
        ..BatchProgress::default()
    };
    let (progress_tx, progress_rx) = watch::channel(initial);
    let token = cancel.clone();

    let task = tokio::task::spawn_blocking(move || {
        let model = aggregator.model();
        let mut stream = run_batch(game_count, config, rules, model, token);
        let mut action_samples = 0u64;
        let mut game = Vec::new();
        while let Some(sample) = stream.next() {
            let game_done = !matches!(sample, Sample::Action(_));
            if !game_done {
                action_samples += 1;
            }
            game.push(sample);
            if game_done {
                aggregator.ingest(game.drain(..));
                // Receivers may all be gone; the batch carries on regardless.
                let _ = progress_tx.send(stream.progress());
            }
        }
        let progress = stream.progress();
        let _ = progress_tx.send(progress);
        let stats = aggregator.stats();
        tracing::info!(
            target: "companion::session",
            completed = progress.games_completed,
            failed = progress.games_failed,
            cancelled = progress.cancelled,
            games_played = stats.games_played,
            accuracy = stats.model_accuracy,
            "batch.finished"
        );
        BatchReport {
            progress,
            action_samples,
            stats,
        }
    });

    BatchHandle {
        cancel,
        progress: progress_rx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;

    fn session() -> GameSession {
        GameSession::new(RulesConfig::builtin())
    }

    #[test]
    fn human_seat_is_not_played_by_the_engine() {
        let session = session();
        assert!(matches!(
            session.play_ai_turn(),
            Err(SessionError::HumanSeat { player: 0 })
        ));
    }

    #[test]
    fn illegal_action_leaves_snapshot_and_log_alone() {
        let session = session();
        let before = session.get_state();
        let err = session
            .resolve(1, ActionId::Build)
            .expect_err("seat 1 is not on turn");
        assert!(matches!(err, ResolveError::IllegalAction { player: 1, .. }));
        assert_eq!(*session.get_state(), *before);
        assert!(session.recent_log(5).is_empty());
    }

    #[test]
    fn opening_round_then_log_tail() {
        let session = session();
        session.resolve(0, ActionId::Build).expect("human builds");
        for _ in 1..4 {
            session.play_ai_turn().expect("ai seat plays");
        }
        let state = session.get_state();
        assert_eq!(state.current_player, 0);
        assert_eq!(state.round, 2);
        assert_eq!(state.phase, Phase::Main);
        let log = session.recent_log(5);
        assert_eq!(log.len(), 4);
        assert_eq!(log[0].action, ActionId::Build);
        assert_eq!(
            log.iter().map(|e| e.player).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn resolve_named_rejects_unknown_actions() {
        let session = session();
        let err = session.resolve_named(0, "bribe").expect_err("unknown");
        assert!(matches!(err, ResolveError::IllegalAction { .. }));
        session.resolve_named(0, "playCard").expect("known action");
        assert_eq!(session.get_state().players[0].played_cards, 1);
    }

    #[test]
    fn new_game_resets_table_not_training() {
        let session = session();
        session.run_batch(2);
        session.resolve(0, ActionId::Build).expect("legal");
        let fresh = session.new_game();
        assert_eq!(fresh.round, 1);
        assert!(session.recent_log(5).is_empty());
        assert_eq!(session.training_stats().games_played, 2);
    }

    fn played_games(samples: &[Sample]) -> Vec<(u64, u64)> {
        samples
            .iter()
            .filter_map(|sample| match sample {
                Sample::GameSummary(summary) => Some((summary.game_index, summary.seed)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn consecutive_batches_play_fresh_games() {
        let session = session();
        let (first, _) = session.run_batch(3);
        let (second, stats) = session.run_batch(3);
        let first = played_games(&first);
        let second = played_games(&second);
        assert_eq!(first.iter().map(|(index, _)| *index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(second.iter().map(|(index, _)| *index).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert!(first.iter().all(|game| !second.contains(game)));
        assert_eq!(stats.games_played, 6);
    }

    #[test]
    fn restored_session_continues_after_saved_games() {
        let rules = RulesConfig::builtin();
        let trained = GameSession::new(rules.clone());
        trained.run_batch(2);
        let record = crate::record::TrainingRecord::capture(trained.aggregator()).expect("capture");
        let aggregator = Arc::new(record.into_aggregator(rules.clone()).expect("restore"));
        let resumed = GameSession::with_aggregator(rules, aggregator);
        let (samples, _) = resumed.run_batch(1);
        assert_eq!(played_games(&samples)[0].0, 2);
    }

    #[test]
    fn run_batch_updates_counters() {
        let session = session();
        let (samples, stats) = session.run_batch(3);
        let actions = samples
            .iter()
            .filter(|s| matches!(s, Sample::Action(_)))
            .count() as u64;
        assert_eq!(stats.games_played, 3);
        assert_eq!(stats.data_points, actions);
        assert_eq!(session.training_stats(), stats);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn spawned_batch_reports_progress() {
        let session = session();
        let handle = session.spawn_batch(3);
        let progress = handle.progress();
        let report = handle.join().await.expect("batch completes");
        assert_eq!(report.progress.games_completed, 3);
        assert!(!report.progress.cancelled);
        assert_eq!(report.stats.games_played, 3);
        assert_eq!(report.stats.data_points, report.action_samples);
        assert_eq!(progress.borrow().games_completed, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_spawned_batch_keeps_finished_games() {
        let session = session();
        let handle = session.spawn_batch(10_000);
        handle.cancel();
        let report = handle.join().await.expect("batch stops");
        assert!(report.progress.cancelled);
        assert!(report.progress.games_completed < 10_000);
        assert_eq!(
            session.training_stats().games_played,
            report.progress.games_completed
        );
    }
}
