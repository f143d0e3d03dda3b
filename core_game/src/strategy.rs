//! Decision policies for automated seats.
//!
//! Every profile scores the previewed outcome of each legal action with its
//! own weight table and takes the best, breaking ties by catalog order.
//! Policies hold no randomness; the simulation runner injects exploration.

use std::fmt;
use std::sync::Arc;

use crate::action_log::StateDelta;
use crate::actions::ActionId;
use crate::model::SuggestionModel;
use crate::resolver;
use crate::rules_config::RulesConfig;
use crate::state::{GameState, Phase, StrategyProfile};
use crate::suggestion;

/// Action returned when nothing is legal. The resolver will reject it, which
/// surfaces the broken contract to the caller.
pub const FALLBACK_ACTION: ActionId = ActionId::Exchange;

pub trait Policy: Send + Sync + fmt::Debug {
    fn profile(&self) -> StrategyProfile;

    fn choose(&self, state: &GameState, player: usize) -> ActionId;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyWeights {
    pub gold: f32,
    pub population: f32,
    pub tier_rank: f32,
    pub score: f32,
    pub islands: f32,
    pub expedition: f32,
    pub refresh: f32,
    pub buildings: f32,
    pub exhaustion: f32,
    pub hand: f32,
    /// Flat per-action preference, indexed by catalog position.
    pub bias: [f32; ActionId::COUNT],
}

impl PolicyWeights {
    pub const BALANCED: PolicyWeights = PolicyWeights {
        gold: 1.0,
        population: 1.2,
        tier_rank: 0.6,
        score: 0.8,
        islands: 0.8,
        expedition: 0.5,
        refresh: 0.25,
        buildings: 0.5,
        exhaustion: 0.3,
        hand: 0.15,
        bias: [0.0, 0.0, -0.5, 0.0, 0.0, 0.0, 0.0, 0.0, -0.3],
    };

    pub const ECONOMIC: PolicyWeights = PolicyWeights {
        gold: 1.6,
        population: 0.9,
        tier_rank: 0.8,
        score: 0.6,
        islands: 0.3,
        expedition: 0.1,
        refresh: 0.2,
        buildings: 1.0,
        exhaustion: 0.2,
        hand: 0.1,
        bias: [0.8, 0.0, -0.5, 0.8, 0.0, 0.2, -0.4, -0.6, -0.3],
    };

    pub const EXPLORER: PolicyWeights = PolicyWeights {
        gold: 0.6,
        population: 0.5,
        tier_rank: 0.3,
        score: 0.6,
        islands: 1.8,
        expedition: 1.4,
        refresh: 0.3,
        buildings: 0.2,
        exhaustion: 0.25,
        hand: 0.2,
        bias: [-0.3, 0.0, -0.5, 0.0, 0.0, 0.6, 0.8, 0.6, -0.3],
    };

    /// Weighted value of an outcome. Score counts triple once the final
    /// round is under way.
    pub fn value(&self, action: ActionId, delta: &StateDelta, phase: Phase) -> f32 {
        let endgame = if phase == Phase::Cleanup { 3.0 } else { 1.0 };
        self.gold * delta.gold as f32
            + self.population * delta.population as f32
            + self.tier_rank * delta.tier_rank as f32
            + self.score * endgame * delta.score as f32
            + self.islands * delta.islands() as f32
            + self.expedition * delta.expedition_cards as f32
            + self.refresh * delta.refreshed() as f32
            + self.buildings * delta.buildings as f32
            - self.exhaustion * (delta.exhausted_population + delta.exhausted_tokens).max(0) as f32
            + self.hand * delta.hand_cards as f32
            + self.bias[action.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredAction {
    pub action: ActionId,
    pub value: f32,
    pub delta: StateDelta,
}

/// Values every legal action for `player`, in catalog order.
pub fn score_actions(
    state: &GameState,
    player: usize,
    weights: &PolicyWeights,
    rules: &RulesConfig,
) -> Vec<ScoredAction> {
    resolver::legal_actions(state, player, rules)
        .actions()
        .filter_map(|action| {
            let delta = resolver::preview(state, player, action, rules).ok()?;
            Some(ScoredAction {
                action,
                value: weights.value(action, &delta, state.phase),
                delta,
            })
        })
        .collect()
}

/// Highest value wins; the earlier catalog entry keeps a tie.
pub fn best_action(scored: &[ScoredAction]) -> Option<ActionId> {
    scored
        .iter()
        .fold(None, |best: Option<&ScoredAction>, candidate| match best {
            Some(current) if current.value >= candidate.value => Some(current),
            _ => Some(candidate),
        })
        .map(|scored| scored.action)
}

macro_rules! weighted_policy {
    ($name:ident, $profile:expr, $weights:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            rules: Arc<RulesConfig>,
        }

        impl $name {
            pub fn new(rules: Arc<RulesConfig>) -> Self {
                Self { rules }
            }
        }

        impl Policy for $name {
            fn profile(&self) -> StrategyProfile {
                $profile
            }

            fn choose(&self, state: &GameState, player: usize) -> ActionId {
                let scored = score_actions(state, player, &$weights, &self.rules);
                best_action(&scored).unwrap_or(FALLBACK_ACTION)
            }
        }
    };
}

weighted_policy!(BalancedPolicy, StrategyProfile::Balanced, PolicyWeights::BALANCED);
weighted_policy!(EconomicPolicy, StrategyProfile::Economic, PolicyWeights::ECONOMIC);
weighted_policy!(ExplorerPolicy, StrategyProfile::Explorer, PolicyWeights::EXPLORER);

/// Plays the Suggestion Engine's top pick. Stands in for human seats when
/// the engine plays against itself.
#[derive(Debug, Clone)]
pub struct ModelGuidedPolicy {
    rules: Arc<RulesConfig>,
    model: Arc<SuggestionModel>,
}

impl ModelGuidedPolicy {
    pub fn new(rules: Arc<RulesConfig>, model: Arc<SuggestionModel>) -> Self {
        Self { rules, model }
    }
}

impl Policy for ModelGuidedPolicy {
    fn profile(&self) -> StrategyProfile {
        StrategyProfile::Human
    }

    fn choose(&self, state: &GameState, player: usize) -> ActionId {
        suggestion::suggest_for(state, player, &self.model, &self.rules)
            .first()
            .map(|top| top.action)
            .unwrap_or(FALLBACK_ACTION)
    }
}

/// Policy bound to a seat's profile. Human seats get the model-guided stand-in.
pub fn policy_for(
    profile: StrategyProfile,
    rules: Arc<RulesConfig>,
    model: Arc<SuggestionModel>,
) -> Box<dyn Policy> {
    match profile {
        StrategyProfile::Human => Box::new(ModelGuidedPolicy::new(rules, model)),
        StrategyProfile::Balanced => Box::new(BalancedPolicy::new(rules)),
        StrategyProfile::Economic => Box::new(EconomicPolicy::new(rules)),
        StrategyProfile::Explorer => Box::new(ExplorerPolicy::new(rules)),
    }
}

/// One policy per seat, in seat order.
#[derive(Debug)]
pub struct PolicySet {
    seats: Vec<Box<dyn Policy>>,
}

impl PolicySet {
    pub fn for_state(
        state: &GameState,
        rules: Arc<RulesConfig>,
        model: Arc<SuggestionModel>,
    ) -> Self {
        let seats = state
            .players
            .iter()
            .map(|player| policy_for(player.profile, rules.clone(), model.clone()))
            .collect();
        Self { seats }
    }

    pub fn seat(&self, player: usize) -> Option<&dyn Policy> {
        self.seats.get(player).map(|policy| policy.as_ref())
    }
}
