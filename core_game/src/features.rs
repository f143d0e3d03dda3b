use crate::state::{GameState, Phase, PopulationTier, TokenKind};

pub const FEATURE_COUNT: usize = 24;

pub type FeatureVector = [f32; FEATURE_COUNT];

/// Fixed-width view of `state` from `player`'s seat, roughly unit-scaled.
/// Index 0 is a constant bias term.
pub fn extract(state: &GameState, player: usize) -> FeatureVector {
    let mut features = [0.0; FEATURE_COUNT];
    features[0] = 1.0;
    let Some(me) = state.player(player) else {
        return features;
    };

    features[1] = me.gold as f32 / 10.0;
    features[2] = me.hand_cards as f32 / 10.0;
    features[3] = me.played_cards as f32 / 10.0;
    for (offset, tier) in PopulationTier::ALL.iter().enumerate() {
        features[4 + offset] = me.available(*tier) as f32 / 5.0;
    }
    features[9] = me.exhausted_population.total() as f32 / 10.0;
    features[10] = me.available_tokens(TokenKind::Trade) as f32 / 2.0;
    features[11] = me.available_tokens(TokenKind::Exploration) as f32 / 2.0;
    features[12] = me.old_world_islands as f32 / 4.0;
    features[13] = me.new_world_islands as f32 / 4.0;
    features[14] = me.expedition_cards as f32 / 5.0;
    features[15] = me.buildings as f32 / 5.0;
    features[16] = state.round as f32 / 15.0;
    features[17] = me.score() as f32 / 30.0;

    let best_other = state
        .players
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != player)
        .map(|(_, other)| other.score())
        .max()
        .unwrap_or(0);
    features[18] = (me.score() as f32 - best_other as f32) / 10.0;
    features[19] = if state.phase == Phase::Cleanup { 1.0 } else { 0.0 };
    features[20] = if me.has_exhaustion() { 1.0 } else { 0.0 };
    features[21] = me.population.total() as f32 / 20.0;

    let others = state.player_count().saturating_sub(1).max(1) as f32;
    let other_islands: u32 = state
        .players
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != player)
        .map(|(_, other)| other.islands())
        .sum();
    features[22] = other_islands as f32 / others / 4.0;
    features[23] = state
        .players
        .iter()
        .map(|p| p.hand_cards)
        .min()
        .unwrap_or(0) as f32
        / 10.0;
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules_config::RulesConfig;

    #[test]
    fn opening_features_are_finite_and_scaled() {
        let state = GameState::new_game(&RulesConfig::default());
        let features = extract(&state, 3);
        assert_eq!(features[0], 1.0);
        assert!((features[1] - 0.3).abs() < 1e-6, "seat 3 starts with 3 gold");
        assert!((features[4] - 0.8).abs() < 1e-6);
        assert!(features.iter().all(|value| value.is_finite()));
        assert!(features.iter().all(|value| value.abs() <= 2.0));
    }

    #[test]
    fn out_of_range_seat_yields_bias_only() {
        let state = GameState::new_game(&RulesConfig::default());
        let features = extract(&state, 9);
        assert_eq!(features[0], 1.0);
        assert!(features[1..].iter().all(|value| *value == 0.0));
    }
}
