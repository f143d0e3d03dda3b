use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hashing::fingerprint;
use crate::rules_config::RulesConfig;

/// Population tiers ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopulationTier {
    Farmer,
    Worker,
    Craftsman,
    Engineer,
    Investor,
}

impl PopulationTier {
    pub const ALL: [PopulationTier; 5] = [
        PopulationTier::Farmer,
        PopulationTier::Worker,
        PopulationTier::Craftsman,
        PopulationTier::Engineer,
        PopulationTier::Investor,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<PopulationTier> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PopulationTier::Farmer => "farmer",
            PopulationTier::Worker => "worker",
            PopulationTier::Craftsman => "craftsman",
            PopulationTier::Engineer => "engineer",
            PopulationTier::Investor => "investor",
        }
    }
}

impl fmt::Display for PopulationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tier unit counts. Used for both population and exhaustion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TierCounts {
    pub farmer: u32,
    pub worker: u32,
    pub craftsman: u32,
    pub engineer: u32,
    pub investor: u32,
}

impl TierCounts {
    pub const fn new(farmer: u32, worker: u32, craftsman: u32, engineer: u32, investor: u32) -> Self {
        Self {
            farmer,
            worker,
            craftsman,
            engineer,
            investor,
        }
    }

    pub fn get(&self, tier: PopulationTier) -> u32 {
        match tier {
            PopulationTier::Farmer => self.farmer,
            PopulationTier::Worker => self.worker,
            PopulationTier::Craftsman => self.craftsman,
            PopulationTier::Engineer => self.engineer,
            PopulationTier::Investor => self.investor,
        }
    }

    pub fn get_mut(&mut self, tier: PopulationTier) -> &mut u32 {
        match tier {
            PopulationTier::Farmer => &mut self.farmer,
            PopulationTier::Worker => &mut self.worker,
            PopulationTier::Craftsman => &mut self.craftsman,
            PopulationTier::Engineer => &mut self.engineer,
            PopulationTier::Investor => &mut self.investor,
        }
    }

    pub fn total(&self) -> u32 {
        PopulationTier::ALL.iter().map(|tier| self.get(*tier)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PopulationTier, u32)> + '_ {
        PopulationTier::ALL.iter().map(move |tier| (*tier, self.get(*tier)))
    }
}

impl fmt::Display for TierCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.farmer, self.worker, self.craftsman, self.engineer, self.investor
        )
    }
}

/// The two kinds of marine tokens a player can exhaust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Trade,
    Exploration,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Trade => "trade",
            TokenKind::Exploration => "exploration",
        }
    }
}

/// Decision profile bound to a seat for the whole game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StrategyProfile {
    Human,
    #[default]
    Balanced,
    Economic,
    Explorer,
}

impl StrategyProfile {
    pub const ALL: [StrategyProfile; 4] = [
        StrategyProfile::Human,
        StrategyProfile::Balanced,
        StrategyProfile::Economic,
        StrategyProfile::Explorer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyProfile::Human => "human",
            StrategyProfile::Balanced => "balanced",
            StrategyProfile::Economic => "economic",
            StrategyProfile::Explorer => "explorer",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StrategyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub profile: StrategyProfile,
    pub gold: u32,
    pub hand_cards: u32,
    pub played_cards: u32,
    pub population: TierCounts,
    pub exhausted_population: TierCounts,
    pub trade_tokens: u32,
    pub exploration_tokens: u32,
    pub exhausted_trade: u32,
    pub exhausted_exploration: u32,
    pub old_world_islands: u32,
    pub new_world_islands: u32,
    pub expedition_cards: u32,
    pub buildings: u32,
}

impl Player {
    /// Three points per played card plus one per three gold. Never cached.
    pub fn score(&self) -> u32 {
        self.played_cards * 3 + self.gold / 3
    }

    pub fn available(&self, tier: PopulationTier) -> u32 {
        self.population
            .get(tier)
            .saturating_sub(self.exhausted_population.get(tier))
    }

    pub fn available_population(&self) -> u32 {
        PopulationTier::ALL
            .iter()
            .map(|tier| self.available(*tier))
            .sum()
    }

    pub fn token_capacity(&self, kind: TokenKind) -> u32 {
        match kind {
            TokenKind::Trade => self.trade_tokens,
            TokenKind::Exploration => self.exploration_tokens,
        }
    }

    pub fn exhausted_tokens(&self, kind: TokenKind) -> u32 {
        match kind {
            TokenKind::Trade => self.exhausted_trade,
            TokenKind::Exploration => self.exhausted_exploration,
        }
    }

    pub fn exhausted_tokens_mut(&mut self, kind: TokenKind) -> &mut u32 {
        match kind {
            TokenKind::Trade => &mut self.exhausted_trade,
            TokenKind::Exploration => &mut self.exhausted_exploration,
        }
    }

    pub fn available_tokens(&self, kind: TokenKind) -> u32 {
        self.token_capacity(kind)
            .saturating_sub(self.exhausted_tokens(kind))
    }

    pub fn has_exhaustion(&self) -> bool {
        self.exhausted_population.total() > 0
            || self.exhausted_trade > 0
            || self.exhausted_exploration > 0
    }

    pub fn islands(&self) -> u32 {
        self.old_world_islands + self.new_world_islands
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Main,
    /// Final round after an end trigger; closes when play wraps to seat 0.
    Cleanup,
    GameOver,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Main => "main",
            Phase::Cleanup => "cleanup",
            Phase::GameOver => "gameOver",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete snapshot of one game. Replaced wholesale after every action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameState {
    pub round: u32,
    pub current_player: usize,
    pub phase: Phase,
    pub players: Vec<Player>,
}

impl GameState {
    /// Fresh table with the configured starting allocations.
    pub fn new_game(rules: &RulesConfig) -> Self {
        Self::with_profiles(rules, &rules.setup().profiles())
    }

    /// Fresh table with explicit seat profiles; the seat count follows `profiles`.
    pub fn with_profiles(rules: &RulesConfig, profiles: &[StrategyProfile]) -> Self {
        let setup = rules.setup();
        let players = profiles
            .iter()
            .enumerate()
            .map(|(seat, profile)| Player {
                name: setup.player_name(seat),
                profile: *profile,
                gold: setup.starting_gold(seat),
                hand_cards: setup.hand_cards(),
                played_cards: 0,
                population: setup.population(),
                exhausted_population: TierCounts::default(),
                trade_tokens: setup.trade_tokens(),
                exploration_tokens: setup.exploration_tokens(),
                exhausted_trade: 0,
                exhausted_exploration: 0,
                old_world_islands: 0,
                new_world_islands: 0,
                expedition_cards: 0,
                buildings: 0,
            })
            .collect();
        Self {
            round: 1,
            current_player: 0,
            phase: Phase::Main,
            players,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, index: usize) -> Option<&Player> {
        self.players.get(index)
    }

    pub fn scores(&self) -> Vec<u32> {
        self.players.iter().map(Player::score).collect()
    }

    pub fn is_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    /// Highest score wins; ties go to the earliest seat.
    pub fn leader(&self) -> Option<usize> {
        self.players
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, u32)>, (index, player)| {
                let score = player.score();
                match best {
                    Some((_, best_score)) if best_score >= score => best,
                    _ => Some((index, score)),
                }
            })
            .map(|(index, _)| index)
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.players.is_empty() {
            return Err(InvariantViolation::NoPlayers);
        }
        if self.current_player >= self.players.len() {
            return Err(InvariantViolation::CurrentPlayerOutOfRange {
                index: self.current_player,
                players: self.players.len(),
            });
        }
        if self.round == 0 {
            return Err(InvariantViolation::RoundZero);
        }
        for (index, player) in self.players.iter().enumerate() {
            for tier in PopulationTier::ALL {
                if player.exhausted_population.get(tier) > player.population.get(tier) {
                    return Err(InvariantViolation::ExhaustedPopulation {
                        player: index,
                        tier,
                    });
                }
            }
            for kind in [TokenKind::Trade, TokenKind::Exploration] {
                if player.exhausted_tokens(kind) > player.token_capacity(kind) {
                    return Err(InvariantViolation::ExhaustedTokens {
                        player: index,
                        kind: kind.as_str(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            round: self.round,
            current_player: self.current_player,
            phase: self.phase,
            scores: self.scores(),
            fingerprint: fingerprint(self),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("game has no players")]
    NoPlayers,
    #[error("current player {index} out of range for {players} players")]
    CurrentPlayerOutOfRange { index: usize, players: usize },
    #[error("round counter is zero")]
    RoundZero,
    #[error("player {player} has more exhausted {tier} than population")]
    ExhaustedPopulation { player: usize, tier: PopulationTier },
    #[error("player {player} has more exhausted {kind} tokens than capacity")]
    ExhaustedTokens { player: usize, kind: &'static str },
}

/// Compact description of a state attached to errors and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSummary {
    pub round: u32,
    pub current_player: usize,
    pub phase: Phase,
    pub scores: Vec<u32>,
    pub fingerprint: u64,
}

impl fmt::Display for StateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "round {} seat {} phase {} scores {:?} [{:016x}]",
            self.round, self.current_player, self.phase, self.scores, self.fingerprint
        )
    }
}
