use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actions::ActionId;
use crate::state::StrategyProfile;

/// Running totals for one strategy profile across simulated games.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileLedger {
    pub games: u64,
    pub wins: u64,
    pub total_score: u64,
    pub total_rounds: u64,
    pub action_counts: [u64; ActionId::COUNT],
}

impl ProfileLedger {
    pub fn win_rate(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.wins as f64 / self.games as f64
        }
    }

    pub fn mean_score(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.total_score as f64 / self.games as f64
        }
    }

    pub fn mean_rounds(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.total_rounds as f64 / self.games as f64
        }
    }

    pub fn action_count(&self, action: ActionId) -> u64 {
        self.action_counts[action.index()]
    }
}

/// Win and action statistics per profile. A seat counts as one game for its
/// profile, so a profile seated twice accrues two games per table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyMetrics {
    profiles: BTreeMap<StrategyProfile, ProfileLedger>,
}

impl StrategyMetrics {
    pub fn record_action(&mut self, profile: StrategyProfile, action: ActionId) {
        self.profiles.entry(profile).or_default().action_counts[action.index()] += 1;
    }

    pub fn record_game(
        &mut self,
        profiles: &[StrategyProfile],
        scores: &[u32],
        winner: usize,
        rounds: u32,
    ) {
        for (seat, (profile, score)) in profiles.iter().zip(scores).enumerate() {
            let ledger = self.profiles.entry(*profile).or_default();
            ledger.games += 1;
            ledger.total_score += u64::from(*score);
            ledger.total_rounds += u64::from(rounds);
            if seat == winner {
                ledger.wins += 1;
            }
        }
    }

    pub fn ledger(&self, profile: StrategyProfile) -> Option<&ProfileLedger> {
        self.profiles.get(&profile)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StrategyProfile, &ProfileLedger)> {
        self.profiles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledgers_accumulate_per_seat() {
        let mut metrics = StrategyMetrics::default();
        let profiles = [
            StrategyProfile::Human,
            StrategyProfile::Balanced,
            StrategyProfile::Economic,
            StrategyProfile::Balanced,
        ];
        metrics.record_game(&profiles, &[4, 10, 7, 6], 1, 12);
        metrics.record_action(StrategyProfile::Balanced, ActionId::Build);
        metrics.record_action(StrategyProfile::Balanced, ActionId::Build);

        let balanced = metrics.ledger(StrategyProfile::Balanced).expect("balanced seated");
        assert_eq!(balanced.games, 2);
        assert_eq!(balanced.wins, 1);
        assert!((balanced.win_rate() - 0.5).abs() < 1e-9);
        assert!((balanced.mean_score() - 8.0).abs() < 1e-9);
        assert!((balanced.mean_rounds() - 12.0).abs() < 1e-9);
        assert_eq!(balanced.action_count(ActionId::Build), 2);
        assert!(metrics.ledger(StrategyProfile::Explorer).is_none());
    }

    #[test]
    fn ledgers_serialize_with_profile_keys() {
        let mut metrics = StrategyMetrics::default();
        metrics.record_action(StrategyProfile::Explorer, ActionId::Expedition);
        let json = serde_json::to_string(&metrics).expect("serialize");
        assert!(json.contains("\"explorer\""), "{json}");
        let back: StrategyMetrics = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, metrics);
    }
}
