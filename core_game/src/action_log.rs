use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actions::ActionId;
use crate::state::{Player, PopulationTier, TokenKind};

/// Signed change of one player's ledger across a single action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateDelta {
    pub gold: i32,
    pub hand_cards: i32,
    pub played_cards: i32,
    pub population: i32,
    /// Sum of tier ranks; rises by one for every promotion step.
    pub tier_rank: i32,
    pub exhausted_population: i32,
    pub exhausted_tokens: i32,
    pub old_world_islands: i32,
    pub new_world_islands: i32,
    pub expedition_cards: i32,
    pub buildings: i32,
    pub score: i32,
}

impl StateDelta {
    pub fn between(before: &Player, after: &Player) -> Self {
        let diff = |a: u32, b: u32| b as i32 - a as i32;
        let rank = |player: &Player| -> u32 {
            PopulationTier::ALL
                .iter()
                .map(|tier| player.population.get(*tier) * tier.index() as u32)
                .sum()
        };
        let exhausted_tokens = |player: &Player| {
            player.exhausted_tokens(TokenKind::Trade) + player.exhausted_tokens(TokenKind::Exploration)
        };
        Self {
            gold: diff(before.gold, after.gold),
            hand_cards: diff(before.hand_cards, after.hand_cards),
            played_cards: diff(before.played_cards, after.played_cards),
            population: diff(before.population.total(), after.population.total()),
            tier_rank: diff(rank(before), rank(after)),
            exhausted_population: diff(
                before.exhausted_population.total(),
                after.exhausted_population.total(),
            ),
            exhausted_tokens: diff(exhausted_tokens(before), exhausted_tokens(after)),
            old_world_islands: diff(before.old_world_islands, after.old_world_islands),
            new_world_islands: diff(before.new_world_islands, after.new_world_islands),
            expedition_cards: diff(before.expedition_cards, after.expedition_cards),
            buildings: diff(before.buildings, after.buildings),
            score: diff(before.score(), after.score()),
        }
    }

    pub fn islands(&self) -> i32 {
        self.old_world_islands + self.new_world_islands
    }

    /// Units and tokens returned to the available pool.
    pub fn refreshed(&self) -> i32 {
        (-self.exhausted_population).max(0) + (-self.exhausted_tokens).max(0)
    }

    fn fields(&self) -> [(&'static str, i32); 12] {
        [
            ("gold", self.gold),
            ("hand", self.hand_cards),
            ("played", self.played_cards),
            ("population", self.population),
            ("rank", self.tier_rank),
            ("exhausted", self.exhausted_population),
            ("tokens", self.exhausted_tokens),
            ("old_world", self.old_world_islands),
            ("new_world", self.new_world_islands),
            ("expeditions", self.expedition_cards),
            ("buildings", self.buildings),
            ("score", self.score),
        ]
    }
}

impl fmt::Display for StateDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (label, value) in self.fields() {
            if value == 0 {
                continue;
            }
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{label} {value:+}")?;
            first = false;
        }
        if first {
            f.write_str("no change")?;
        }
        Ok(())
    }
}

/// One resolved action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub round: u32,
    pub player: usize,
    pub action: ActionId,
    pub delta: StateDelta,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[round {}] player {} {} ({})",
            self.round, self.player, self.action, self.delta
        )
    }
}

/// Append-only history of a game. Readers pick how much of the tail they want.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLog {
    entries: Vec<LogEntry>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// The last `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> &[LogEntry] {
        let start = self.entries.len().saturating_sub(count);
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn sample_entry(round: u32, action: ActionId) -> LogEntry {
        LogEntry {
            round,
            player: 0,
            action,
            delta: StateDelta::default(),
        }
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let mut log = ActionLog::new();
        for round in 1..=7 {
            log.push(sample_entry(round, ActionId::Exchange));
        }
        let tail: Vec<u32> = log.recent(5).iter().map(|e| e.round).collect();
        assert_eq!(tail, vec![3, 4, 5, 6, 7]);
        assert_eq!(log.recent(50).len(), 7);
        assert!(log.recent(0).is_empty());
        assert_eq!(log.len(), 7);
    }

    #[test]
    fn log_entry_renders_nonzero_fields() {
        let entry = LogEntry {
            round: 2,
            player: 3,
            action: ActionId::OldWorld,
            delta: StateDelta {
                gold: 2,
                exhausted_tokens: 1,
                old_world_islands: 1,
                score: 1,
                ..StateDelta::default()
            },
        };
        assert_snapshot!(
            entry.to_string(),
            @"[round 2] player 3 oldWorld (gold +2, tokens +1, old_world +1, score +1)"
        );
        assert_snapshot!(
            sample_entry(1, ActionId::Exchange).to_string(),
            @"[round 1] player 0 exchange (no change)"
        );
    }

    #[test]
    fn refreshed_counts_only_released_units() {
        let delta = StateDelta {
            exhausted_population: -4,
            exhausted_tokens: -1,
            ..StateDelta::default()
        };
        assert_eq!(delta.refreshed(), 5);
        assert_eq!(StateDelta::default().refreshed(), 0);
    }
}
