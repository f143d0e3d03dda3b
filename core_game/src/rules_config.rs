use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;

use crate::state::{PopulationTier, StrategyProfile, TierCounts, TokenKind};

pub const BUILTIN_RULES_CONFIG: &str = include_str!("data/rules_config.json");

/// Every tunable constant of the game: starting allocations, action costs,
/// end conditions, suggestion thresholds and training hyper-parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    setup: SetupConfig,
    actions: ActionRulesConfig,
    end: EndConfig,
    suggestion: SuggestionConfig,
    training: TrainingConfig,
    simulation: SimulationDefaults,
}

impl RulesConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_RULES_CONFIG)
                .expect("builtin rules config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, RulesConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| RulesConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config = RulesConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn setup(&self) -> &SetupConfig {
        &self.setup
    }

    pub fn actions(&self) -> &ActionRulesConfig {
        &self.actions
    }

    pub fn end(&self) -> &EndConfig {
        &self.end
    }

    pub fn suggestion(&self) -> &SuggestionConfig {
        &self.suggestion
    }

    pub fn training(&self) -> &TrainingConfig {
        &self.training
    }

    pub fn simulation(&self) -> &SimulationDefaults {
        &self.simulation
    }
}

#[derive(Debug, Error)]
pub enum RulesConfigError {
    #[error("failed to parse rules config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read rules config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Loads the rules from `RULES_CONFIG_PATH` when set, falling back to the
/// builtin table if the override is missing or malformed.
pub fn load_rules_config_from_env() -> Arc<RulesConfig> {
    if let Some(path) = env::var("RULES_CONFIG_PATH").ok().map(PathBuf::from) {
        match RulesConfig::from_file(&path) {
            Ok(config) => {
                tracing::debug!(
                    target: "companion::config",
                    path = %path.display(),
                    "rules_config.loaded"
                );
                return Arc::new(config);
            }
            Err(err) => {
                tracing::warn!(
                    target: "companion::config",
                    path = %path.display(),
                    error = %err,
                    "rules_config.load_failed"
                );
            }
        }
    }
    RulesConfig::builtin()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    player_count: usize,
    starting_gold: Vec<u32>,
    population: TierCounts,
    hand_cards: u32,
    trade_tokens: u32,
    exploration_tokens: u32,
    player_names: Vec<String>,
    profiles: Vec<StrategyProfile>,
}

impl SetupConfig {
    pub fn player_count(&self) -> usize {
        self.player_count.max(1)
    }

    /// Starting gold for a seat; seats beyond the table repeat its last entry.
    pub fn starting_gold(&self, seat: usize) -> u32 {
        self.starting_gold
            .get(seat)
            .or_else(|| self.starting_gold.last())
            .copied()
            .unwrap_or(0)
    }

    pub fn population(&self) -> TierCounts {
        self.population
    }

    pub fn hand_cards(&self) -> u32 {
        self.hand_cards
    }

    pub fn trade_tokens(&self) -> u32 {
        self.trade_tokens
    }

    pub fn exploration_tokens(&self) -> u32 {
        self.exploration_tokens
    }

    pub fn player_name(&self, seat: usize) -> String {
        self.player_names
            .get(seat)
            .cloned()
            .unwrap_or_else(|| format!("Player {}", seat + 1))
    }

    pub fn profile(&self, seat: usize) -> StrategyProfile {
        self.profiles
            .get(seat)
            .copied()
            .unwrap_or(StrategyProfile::Balanced)
    }

    pub fn profiles(&self) -> Vec<StrategyProfile> {
        (0..self.player_count()).map(|seat| self.profile(seat)).collect()
    }
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            player_count: 4,
            starting_gold: vec![0, 1, 2, 3],
            population: TierCounts::new(4, 3, 2, 0, 0),
            hand_cards: 9,
            trade_tokens: 2,
            exploration_tokens: 1,
            player_names: Vec::new(),
            profiles: vec![
                StrategyProfile::Human,
                StrategyProfile::Balanced,
                StrategyProfile::Economic,
                StrategyProfile::Explorer,
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActionRulesConfig {
    build_labor: u32,
    build_gold_yield: u32,
    play_card_labor: u32,
    exchange_max_cards: u32,
    workforce_gold_cost: u32,
    workforce_draws_card: bool,
    housing_base: TierCounts,
    housing_per_building: u32,
    upgrade_gold_cost: Vec<u32>,
    island_limit: u32,
    old_world_token: TokenKind,
    old_world_gold_yield: u32,
    new_world_token: TokenKind,
    new_world_card_draw: u32,
    expedition_token: TokenKind,
    festival_refreshes_tokens: bool,
}

impl ActionRulesConfig {
    pub fn build_labor(&self) -> u32 {
        self.build_labor
    }

    pub fn build_gold_yield(&self) -> u32 {
        self.build_gold_yield
    }

    pub fn play_card_labor(&self) -> u32 {
        self.play_card_labor
    }

    pub fn exchange_max_cards(&self) -> u32 {
        self.exchange_max_cards
    }

    pub fn workforce_gold_cost(&self) -> u32 {
        self.workforce_gold_cost
    }

    pub fn workforce_draws_card(&self) -> bool {
        self.workforce_draws_card
    }

    /// Housing ceiling for a tier given the player's building count.
    pub fn housing_capacity(&self, tier: PopulationTier, buildings: u32) -> u32 {
        self.housing_base
            .get(tier)
            .saturating_add(buildings.saturating_mul(self.housing_per_building))
    }

    /// Gold needed to promote one unit out of `tier`. `None` for the top tier.
    pub fn upgrade_gold_cost(&self, tier: PopulationTier) -> Option<u32> {
        tier.next()?;
        Some(
            self.upgrade_gold_cost
                .get(tier.index())
                .copied()
                .unwrap_or(0),
        )
    }

    pub fn island_limit(&self) -> u32 {
        self.island_limit
    }

    pub fn old_world_token(&self) -> TokenKind {
        self.old_world_token
    }

    pub fn old_world_gold_yield(&self) -> u32 {
        self.old_world_gold_yield
    }

    pub fn new_world_token(&self) -> TokenKind {
        self.new_world_token
    }

    pub fn new_world_card_draw(&self) -> u32 {
        self.new_world_card_draw
    }

    pub fn expedition_token(&self) -> TokenKind {
        self.expedition_token
    }

    pub fn festival_refreshes_tokens(&self) -> bool {
        self.festival_refreshes_tokens
    }
}

impl Default for ActionRulesConfig {
    fn default() -> Self {
        Self {
            build_labor: 2,
            build_gold_yield: 1,
            play_card_labor: 1,
            exchange_max_cards: 3,
            workforce_gold_cost: 1,
            workforce_draws_card: true,
            housing_base: TierCounts::new(6, 5, 4, 2, 1),
            housing_per_building: 1,
            upgrade_gold_cost: vec![0, 1, 1, 2],
            island_limit: 4,
            old_world_token: TokenKind::Trade,
            old_world_gold_yield: 2,
            new_world_token: TokenKind::Exploration,
            new_world_card_draw: 1,
            expedition_token: TokenKind::Exploration,
            festival_refreshes_tokens: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndConfig {
    max_rounds: u32,
    final_round_on_empty_hand: bool,
    victory_score: Option<u32>,
}

impl EndConfig {
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds.max(1)
    }

    pub fn final_round_on_empty_hand(&self) -> bool {
        self.final_round_on_empty_hand
    }

    pub fn victory_score(&self) -> Option<u32> {
        self.victory_score
    }
}

impl Default for EndConfig {
    fn default() -> Self {
        Self {
            max_rounds: 15,
            final_round_on_empty_hand: true,
            victory_score: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    min_data_points: u64,
    low_certainty_ceiling: f32,
    max_suggestions: usize,
    heuristic_temperature: f32,
}

impl SuggestionConfig {
    pub fn min_data_points(&self) -> u64 {
        self.min_data_points
    }

    pub fn low_certainty_ceiling(&self) -> f32 {
        self.low_certainty_ceiling.clamp(0.0, 100.0)
    }

    pub fn max_suggestions(&self) -> usize {
        self.max_suggestions.clamp(1, 3)
    }

    pub fn heuristic_temperature(&self) -> f32 {
        self.heuristic_temperature.max(0.01)
    }
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            min_data_points: 200,
            low_certainty_ceiling: 70.0,
            max_suggestions: 3,
            heuristic_temperature: 1.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    learning_rate: f32,
    l2: f32,
    holdout_every: u64,
    validation_window: usize,
    winner_weight: f32,
    non_winner_weight: f32,
}

impl TrainingConfig {
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn l2(&self) -> f32 {
        self.l2
    }

    /// Every n-th action sample is held out for validation instead of training.
    pub fn holdout_every(&self) -> u64 {
        self.holdout_every.max(2)
    }

    pub fn validation_window(&self) -> usize {
        self.validation_window.max(1)
    }

    pub fn winner_weight(&self) -> f32 {
        self.winner_weight
    }

    pub fn non_winner_weight(&self) -> f32 {
        self.non_winner_weight
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            l2: 0.0001,
            holdout_every: 5,
            validation_window: 2000,
            winner_weight: 1.0,
            non_winner_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationDefaults {
    seed: u64,
    exploration_rate: f64,
    max_actions_per_game: u32,
    profiles: Vec<StrategyProfile>,
}

impl SimulationDefaults {
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate.clamp(0.0, 1.0)
    }

    pub fn max_actions_per_game(&self) -> u32 {
        self.max_actions_per_game.max(1)
    }

    /// Seat profiles for simulated games. Empty means the table seating.
    pub fn profiles(&self) -> &[StrategyProfile] {
        &self.profiles
    }
}

impl Default for SimulationDefaults {
    fn default() -> Self {
        Self {
            seed: 1800,
            exploration_rate: 0.1,
            max_actions_per_game: 2000,
            profiles: Vec::new(),
        }
    }
}
