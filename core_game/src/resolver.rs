//! Validation and application of a single action for the active player.
//!
//! The resolver owns every piece of rule arithmetic. It never advances the
//! turn; [`crate::scheduler::TurnScheduler`] does that once an action lands.

use thiserror::Error;

use crate::action_log::{LogEntry, StateDelta};
use crate::actions::{ActionId, ActionSet};
use crate::rules_config::RulesConfig;
use crate::state::{
    GameState, InvariantViolation, Phase, Player, PopulationTier, StateSummary, TokenKind,
};

/// Why an action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalReason {
    #[error("it is player {current}'s turn")]
    NotYourTurn { current: usize },
    #[error("no such player")]
    UnknownPlayer,
    #[error("unknown action")]
    UnknownAction,
    #[error("state is inconsistent: {0}")]
    InconsistentState(InvariantViolation),
    #[error("needs {needed} available workers, has {available}")]
    NotEnoughWorkers { needed: u32, available: u32 },
    #[error("hand is empty")]
    EmptyHand,
    #[error("needs {needed} gold, has {available}")]
    NotEnoughGold { needed: u32, available: u32 },
    #[error("every tier is at its housing limit")]
    HousingFull,
    #[error("no resident can be promoted")]
    NoUpgradePath,
    #[error("no {} token available", .0.as_str())]
    NoToken(TokenKind),
    #[error("island limit of {limit} reached")]
    IslandLimit { limit: u32 },
    #[error("nothing is exhausted")]
    NothingExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("illegal action {action} by player {player}: {reason} ({summary})")]
    IllegalAction {
        player: usize,
        action: String,
        reason: IllegalReason,
        summary: StateSummary,
    },
    #[error("game over: player {player} cannot {action} ({summary})")]
    GameOver {
        player: usize,
        action: String,
        summary: StateSummary,
    },
}

impl ResolveError {
    fn illegal(state: &GameState, player: usize, action: &str, reason: IllegalReason) -> Self {
        ResolveError::IllegalAction {
            player,
            action: action.to_string(),
            reason,
            summary: state.summary(),
        }
    }

    pub fn player(&self) -> usize {
        match self {
            ResolveError::IllegalAction { player, .. } | ResolveError::GameOver { player, .. } => {
                *player
            }
        }
    }

    pub fn reason(&self) -> Option<&IllegalReason> {
        match self {
            ResolveError::IllegalAction { reason, .. } => Some(reason),
            ResolveError::GameOver { .. } => None,
        }
    }
}

/// Output of a successful resolution. The turn has not advanced yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub state: GameState,
    pub entry: LogEntry,
}

/// Applies `action` for `player` against an immutable `state`.
///
/// On failure the input is untouched and the error carries a summary of it.
pub fn resolve(
    state: &GameState,
    player: usize,
    action: ActionId,
    rules: &RulesConfig,
) -> Result<Resolution, ResolveError> {
    let acting = check_turn(state, player, action.as_str())?;
    let mut next = acting.clone();
    if let Err(reason) = apply(&mut next, action, rules) {
        tracing::debug!(
            target: "companion::resolver",
            player,
            action = %action,
            reason = %reason,
            "action.rejected"
        );
        return Err(ResolveError::illegal(state, player, action.as_str(), reason));
    }

    let entry = LogEntry {
        round: state.round,
        player,
        action,
        delta: StateDelta::between(acting, &next),
    };
    let mut new_state = state.clone();
    new_state.players[player] = next;

    tracing::trace!(
        target: "companion::resolver",
        player,
        action = %action,
        delta = %entry.delta,
        "action.resolved"
    );
    Ok(Resolution {
        state: new_state,
        entry,
    })
}

/// Like [`resolve`] but takes the action by name, as submitted by a front end.
pub fn resolve_named(
    state: &GameState,
    player: usize,
    action: &str,
    rules: &RulesConfig,
) -> Result<Resolution, ResolveError> {
    match action.parse::<ActionId>() {
        Ok(action) => resolve(state, player, action, rules),
        Err(_) => {
            check_turn(state, player, action)?;
            Err(ResolveError::illegal(
                state,
                player,
                action,
                IllegalReason::UnknownAction,
            ))
        }
    }
}

/// The delta `action` would produce, without committing anything.
pub fn preview(
    state: &GameState,
    player: usize,
    action: ActionId,
    rules: &RulesConfig,
) -> Result<StateDelta, ResolveError> {
    let acting = check_turn(state, player, action.as_str())?;
    let mut next = acting.clone();
    apply(&mut next, action, rules)
        .map_err(|reason| ResolveError::illegal(state, player, action.as_str(), reason))?;
    Ok(StateDelta::between(acting, &next))
}

/// Every action `player` could legally take right now. Empty when it is not
/// their turn or the game has ended.
pub fn legal_actions(state: &GameState, player: usize, rules: &RulesConfig) -> ActionSet {
    let Ok(acting) = check_turn(state, player, "") else {
        return ActionSet::empty();
    };
    ActionId::ALL
        .into_iter()
        .filter(|action| check(acting, *action, rules).is_ok())
        .collect()
}

fn check_turn<'a>(
    state: &'a GameState,
    player: usize,
    action: &str,
) -> Result<&'a Player, ResolveError> {
    if state.phase == Phase::GameOver {
        return Err(ResolveError::GameOver {
            player,
            action: action.to_string(),
            summary: state.summary(),
        });
    }
    let acting = state
        .player(player)
        .ok_or_else(|| ResolveError::illegal(state, player, action, IllegalReason::UnknownPlayer))?;
    if player != state.current_player {
        return Err(ResolveError::illegal(
            state,
            player,
            action,
            IllegalReason::NotYourTurn {
                current: state.current_player,
            },
        ));
    }
    state.check_invariants().map_err(|violation| {
        ResolveError::illegal(
            state,
            player,
            action,
            IllegalReason::InconsistentState(violation),
        )
    })?;
    Ok(acting)
}

/// Preconditions only; mirrors the guards at the top of each arm in [`apply`].
fn check(player: &Player, action: ActionId, rules: &RulesConfig) -> Result<(), IllegalReason> {
    let cfg = rules.actions();
    match action {
        ActionId::Build => require_workers(player, cfg.build_labor()),
        ActionId::PlayCard => {
            require_hand(player)?;
            require_workers(player, cfg.play_card_labor())
        }
        ActionId::Exchange => require_hand(player),
        ActionId::Workforce => {
            require_gold(player, cfg.workforce_gold_cost())?;
            housing_target(player, rules)
                .map(|_| ())
                .ok_or(IllegalReason::HousingFull)
        }
        ActionId::Upgrade => upgrade_source(player, rules).map(|_| ()),
        ActionId::OldWorld => {
            require_island_room(player.old_world_islands, cfg.island_limit())?;
            require_token(player, cfg.old_world_token())
        }
        ActionId::NewWorld => {
            require_island_room(player.new_world_islands, cfg.island_limit())?;
            require_token(player, cfg.new_world_token())
        }
        ActionId::Expedition => require_token(player, cfg.expedition_token()),
        ActionId::Festival => {
            let tokens = cfg.festival_refreshes_tokens()
                && (player.exhausted_trade > 0 || player.exhausted_exploration > 0);
            if player.exhausted_population.total() > 0 || tokens {
                Ok(())
            } else {
                Err(IllegalReason::NothingExhausted)
            }
        }
    }
}

fn apply(player: &mut Player, action: ActionId, rules: &RulesConfig) -> Result<(), IllegalReason> {
    check(player, action, rules)?;
    let cfg = rules.actions();
    match action {
        ActionId::Build => {
            exhaust_workers(player, cfg.build_labor());
            player.gold += cfg.build_gold_yield();
            player.buildings += 1;
        }
        ActionId::PlayCard => {
            exhaust_workers(player, cfg.play_card_labor());
            player.hand_cards -= 1;
            player.played_cards += 1;
        }
        ActionId::Exchange => {
            // Cards are redrawn one for one, so only the hand contents change.
            let cycled = player.hand_cards.min(cfg.exchange_max_cards());
            tracing::trace!(target: "companion::resolver", cycled, "hand.exchanged");
        }
        ActionId::Workforce => {
            let tier = housing_target(player, rules).ok_or(IllegalReason::HousingFull)?;
            player.gold -= cfg.workforce_gold_cost();
            *player.population.get_mut(tier) += 1;
            if cfg.workforce_draws_card() {
                player.hand_cards += 1;
            }
        }
        ActionId::Upgrade => {
            let (tier, cost) = upgrade_source(player, rules)?;
            let target = tier.next().ok_or(IllegalReason::NoUpgradePath)?;
            player.gold -= cost;
            *player.population.get_mut(tier) -= 1;
            *player.population.get_mut(target) += 1;
        }
        ActionId::OldWorld => {
            *player.exhausted_tokens_mut(cfg.old_world_token()) += 1;
            player.old_world_islands += 1;
            player.gold += cfg.old_world_gold_yield();
        }
        ActionId::NewWorld => {
            *player.exhausted_tokens_mut(cfg.new_world_token()) += 1;
            player.new_world_islands += 1;
            player.hand_cards += cfg.new_world_card_draw();
        }
        ActionId::Expedition => {
            *player.exhausted_tokens_mut(cfg.expedition_token()) += 1;
            player.expedition_cards += 1;
        }
        ActionId::Festival => {
            player.exhausted_population = Default::default();
            if cfg.festival_refreshes_tokens() {
                player.exhausted_trade = 0;
                player.exhausted_exploration = 0;
            }
        }
    }
    Ok(())
}

fn require_workers(player: &Player, needed: u32) -> Result<(), IllegalReason> {
    let available = player.available_population();
    if available < needed {
        return Err(IllegalReason::NotEnoughWorkers { needed, available });
    }
    Ok(())
}

fn require_hand(player: &Player) -> Result<(), IllegalReason> {
    if player.hand_cards == 0 {
        return Err(IllegalReason::EmptyHand);
    }
    Ok(())
}

fn require_gold(player: &Player, needed: u32) -> Result<(), IllegalReason> {
    if player.gold < needed {
        return Err(IllegalReason::NotEnoughGold {
            needed,
            available: player.gold,
        });
    }
    Ok(())
}

fn require_token(player: &Player, kind: TokenKind) -> Result<(), IllegalReason> {
    if player.available_tokens(kind) == 0 {
        return Err(IllegalReason::NoToken(kind));
    }
    Ok(())
}

fn require_island_room(current: u32, limit: u32) -> Result<(), IllegalReason> {
    if current >= limit {
        return Err(IllegalReason::IslandLimit { limit });
    }
    Ok(())
}

/// Exhausts `count` available units, lowest tier first. Callers check
/// availability beforehand.
fn exhaust_workers(player: &mut Player, count: u32) {
    let mut remaining = count;
    for tier in PopulationTier::ALL {
        if remaining == 0 {
            break;
        }
        let take = player.available(tier).min(remaining);
        *player.exhausted_population.get_mut(tier) += take;
        remaining -= take;
    }
}

fn housing_target(player: &Player, rules: &RulesConfig) -> Option<PopulationTier> {
    PopulationTier::ALL.into_iter().find(|tier| {
        player.population.get(*tier) < rules.actions().housing_capacity(*tier, player.buildings)
    })
}

/// Highest promotable tier with an available unit and an affordable cost.
fn upgrade_source(
    player: &Player,
    rules: &RulesConfig,
) -> Result<(PopulationTier, u32), IllegalReason> {
    let mut cheapest_unaffordable: Option<u32> = None;
    for tier in PopulationTier::ALL.into_iter().rev() {
        let Some(cost) = rules.actions().upgrade_gold_cost(tier) else {
            continue;
        };
        if player.available(tier) == 0 {
            continue;
        }
        if cost <= player.gold {
            return Ok((tier, cost));
        }
        cheapest_unaffordable = Some(cheapest_unaffordable.map_or(cost, |c| c.min(cost)));
    }
    match cheapest_unaffordable {
        Some(needed) => Err(IllegalReason::NotEnoughGold {
            needed,
            available: player.gold,
        }),
        None => Err(IllegalReason::NoUpgradePath),
    }
}
