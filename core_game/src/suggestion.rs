use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action_log::StateDelta;
use crate::actions::ActionId;
use crate::features;
use crate::model::{masked_softmax, ModelError, SuggestionModel};
use crate::resolver;
use crate::rules_config::RulesConfig;
use crate::state::GameState;
use crate::strategy::{score_actions, PolicyWeights};

/// Short machine-readable reason attached to a suggestion. Front ends map
/// these to their own wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RationaleCode {
    GoldYield,
    PopulationGrowth,
    ScoreGain,
    IslandExpansion,
    ExpeditionProgress,
    RefreshWorkforce,
    HandCycling,
    LearnedPreference,
    OnlyLegalMove,
}

impl RationaleCode {
    /// The strongest positive effect in `delta`. Earlier entries win ties.
    pub fn for_delta(delta: &StateDelta) -> Self {
        let terms = [
            (RationaleCode::IslandExpansion, delta.islands() * 2),
            (RationaleCode::ExpeditionProgress, delta.expedition_cards),
            (RationaleCode::ScoreGain, delta.score),
            (RationaleCode::GoldYield, delta.gold + delta.buildings),
            (RationaleCode::PopulationGrowth, delta.population + delta.tier_rank),
            (RationaleCode::RefreshWorkforce, delta.refreshed()),
        ];
        terms
            .iter()
            .fold(None, |best: Option<(RationaleCode, i32)>, (code, value)| match best {
                Some((_, best_value)) if best_value >= *value => best,
                _ if *value > 0 => Some((*code, *value)),
                _ => best,
            })
            .map(|(code, _)| code)
            .unwrap_or(RationaleCode::HandCycling)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RationaleCode::GoldYield => "gold_yield",
            RationaleCode::PopulationGrowth => "population_growth",
            RationaleCode::ScoreGain => "score_gain",
            RationaleCode::IslandExpansion => "island_expansion",
            RationaleCode::ExpeditionProgress => "expedition_progress",
            RationaleCode::RefreshWorkforce => "refresh_workforce",
            RationaleCode::HandCycling => "hand_cycling",
            RationaleCode::LearnedPreference => "learned_preference",
            RationaleCode::OnlyLegalMove => "only_legal_move",
        }
    }
}

impl fmt::Display for RationaleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub action: ActionId,
    /// 0 to 100.
    pub confidence: f32,
    pub rationale: RationaleCode,
}

/// Ranked suggestions for whoever is on turn.
pub fn suggest(state: &GameState, model: &SuggestionModel, rules: &RulesConfig) -> Vec<Suggestion> {
    suggest_for(state, state.current_player, model, rules)
}

/// At most `max_suggestions` entries, highest confidence first, ties in
/// catalog order. Empty when `player` has nothing legal to do.
///
/// Below the training threshold the balanced heuristic is used instead of
/// the model, and confidences are capped at the low-certainty ceiling.
pub fn suggest_for(
    state: &GameState,
    player: usize,
    model: &SuggestionModel,
    rules: &RulesConfig,
) -> Vec<Suggestion> {
    let cfg = rules.suggestion();
    let legal = resolver::legal_actions(state, player, rules);
    if legal.is_empty() {
        return Vec::new();
    }
    let only_move = legal.len() == 1;

    let mut suggestions: Vec<Suggestion> = match model.ensure_ready(cfg.min_data_points()) {
        Ok(()) => {
            let features = features::extract(state, player);
            let probabilities = model.probabilities(&features, legal);
            legal
                .actions()
                .map(|action| Suggestion {
                    action,
                    confidence: to_confidence(probabilities[action.index()], 100.0),
                    rationale: if only_move {
                        RationaleCode::OnlyLegalMove
                    } else {
                        RationaleCode::LearnedPreference
                    },
                })
                .collect()
        }
        Err(ModelError::Unavailable { data_points, required }) => {
            tracing::trace!(
                target: "companion::suggestion",
                data_points,
                required,
                "suggestion.heuristic_fallback"
            );
            let scored = score_actions(state, player, &PolicyWeights::BALANCED, rules);
            let mut values = [0.0; ActionId::COUNT];
            for entry in &scored {
                values[entry.action.index()] = entry.value;
            }
            let probabilities = masked_softmax(&values, legal, cfg.heuristic_temperature());
            scored
                .iter()
                .map(|entry| Suggestion {
                    action: entry.action,
                    confidence: to_confidence(
                        probabilities[entry.action.index()],
                        cfg.low_certainty_ceiling(),
                    ),
                    rationale: if only_move {
                        RationaleCode::OnlyLegalMove
                    } else {
                        RationaleCode::for_delta(&entry.delta)
                    },
                })
                .collect()
        }
        Err(_) => Vec::new(),
    };

    // Stable sort keeps catalog order among equal confidences.
    suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    suggestions.truncate(cfg.max_suggestions());
    suggestions
}

fn to_confidence(probability: f32, ceiling: f32) -> f32 {
    if probability.is_finite() {
        (probability * ceiling).clamp(0.0, ceiling)
    } else {
        0.0
    }
}
