//! Rules engine and self-play trainer for a four-seat island economy game.
//!
//! State is immutable between actions: [`resolver::resolve`] returns a new
//! [`GameState`] and a [`LogEntry`], and the [`TurnScheduler`] moves the turn
//! along. [`GameSession`] wraps one live game together with the training
//! pipeline that learns suggestions from simulated games.

pub mod action_log;
pub mod actions;
pub mod features;
pub mod hashing;
pub mod metrics;
pub mod model;
pub mod record;
pub mod resolver;
pub mod rules_config;
pub mod scheduler;
pub mod session;
pub mod simulation;
pub mod state;
pub mod strategy;
pub mod suggestion;
pub mod training;
pub mod victory;

pub use action_log::{ActionLog, LogEntry, StateDelta};
pub use actions::{ActionId, ActionSet, UnknownAction};
pub use hashing::{fingerprint, game_seed};
pub use metrics::{ProfileLedger, StrategyMetrics};
pub use model::{ModelError, SuggestionModel};
pub use record::{RecordError, TrainingRecord};
pub use resolver::{legal_actions, preview, resolve, IllegalReason, Resolution, ResolveError};
pub use rules_config::{load_rules_config_from_env, RulesConfig, RulesConfigError};
pub use scheduler::TurnScheduler;
pub use session::{BatchHandle, BatchReport, GameSession, SessionError};
pub use simulation::{
    run_batch, run_parallel_batch, simulate_game, ActionSample, BatchProgress, CancelToken,
    GameSummary, Sample, SampleStream, SimulationConfig, SimulationError,
};
pub use state::{
    GameState, InvariantViolation, Phase, Player, PopulationTier, StateSummary, StrategyProfile,
    TierCounts, TokenKind,
};
pub use strategy::{policy_for, Policy, PolicySet};
pub use suggestion::{suggest, RationaleCode, Suggestion};
pub use training::{IngestQueue, TrainingAggregator, TrainingStats};
pub use victory::{EndCondition, EndVerdict, GameResult};
