use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rules_config::RulesConfig;
use crate::state::GameState;

/// Outcome of checking an end condition after a turn advances.
/// Variants are ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EndVerdict {
    Continue,
    /// Finish the current round, then stop.
    FinalRound,
    GameOver,
}

pub trait EndCondition: Send + Sync + fmt::Debug {
    fn evaluate(&self, state: &GameState) -> EndVerdict;
}

/// Ends the game once `max_rounds` full rounds have been played.
#[derive(Debug, Clone, Copy)]
pub struct RoundLimit {
    pub max_rounds: u32,
}

impl EndCondition for RoundLimit {
    fn evaluate(&self, state: &GameState) -> EndVerdict {
        if state.round > self.max_rounds {
            EndVerdict::GameOver
        } else {
            EndVerdict::Continue
        }
    }
}

/// The classic trigger: someone has played out their whole hand.
#[derive(Debug, Clone, Copy)]
pub struct EmptyHand;

impl EndCondition for EmptyHand {
    fn evaluate(&self, state: &GameState) -> EndVerdict {
        if state.players.iter().any(|player| player.hand_cards == 0) {
            EndVerdict::FinalRound
        } else {
            EndVerdict::Continue
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreTarget {
    pub score: u32,
}

impl EndCondition for ScoreTarget {
    fn evaluate(&self, state: &GameState) -> EndVerdict {
        if state.players.iter().any(|player| player.score() >= self.score) {
            EndVerdict::FinalRound
        } else {
            EndVerdict::Continue
        }
    }
}

/// Most severe verdict of its members.
#[derive(Debug, Default)]
pub struct AnyOf(pub Vec<Box<dyn EndCondition>>);

impl EndCondition for AnyOf {
    fn evaluate(&self, state: &GameState) -> EndVerdict {
        self.0
            .iter()
            .map(|condition| condition.evaluate(state))
            .max()
            .unwrap_or(EndVerdict::Continue)
    }
}

/// End conditions enabled by the rules: always the round limit, plus the
/// empty-hand trigger and score target when configured.
pub fn end_condition_from_rules(rules: &RulesConfig) -> AnyOf {
    let end = rules.end();
    let mut conditions: Vec<Box<dyn EndCondition>> = vec![Box::new(RoundLimit {
        max_rounds: end.max_rounds(),
    })];
    if end.final_round_on_empty_hand() {
        conditions.push(Box::new(EmptyHand));
    }
    if let Some(score) = end.victory_score() {
        conditions.push(Box::new(ScoreTarget { score }));
    }
    AnyOf(conditions)
}

/// Final standings of a finished game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub final_scores: Vec<u32>,
    pub winner: usize,
    pub rounds: u32,
}

impl GameResult {
    /// `None` until the game has reached `gameOver`.
    pub fn from_state(state: &GameState) -> Option<Self> {
        if !state.is_over() {
            return None;
        }
        let winner = state.leader()?;
        // The turn pointer has already moved past the last action.
        let rounds = if state.current_player == 0 {
            state.round.saturating_sub(1).max(1)
        } else {
            state.round
        };
        Some(Self {
            final_scores: state.scores(),
            winner,
            rounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;

    fn state() -> GameState {
        GameState::new_game(&RulesConfig::default())
    }

    #[test]
    fn round_limit_fires_after_last_round() {
        let limit = RoundLimit { max_rounds: 3 };
        let mut state = state();
        state.round = 3;
        assert_eq!(limit.evaluate(&state), EndVerdict::Continue);
        state.round = 4;
        assert_eq!(limit.evaluate(&state), EndVerdict::GameOver);
    }

    #[test]
    fn any_of_takes_most_severe() {
        let conditions = AnyOf(vec![
            Box::new(EmptyHand),
            Box::new(RoundLimit { max_rounds: 1 }),
        ]);
        let mut state = state();
        assert_eq!(conditions.evaluate(&state), EndVerdict::Continue);
        state.players[2].hand_cards = 0;
        assert_eq!(conditions.evaluate(&state), EndVerdict::FinalRound);
        state.round = 2;
        assert_eq!(conditions.evaluate(&state), EndVerdict::GameOver);
        assert_eq!(AnyOf::default().evaluate(&state), EndVerdict::Continue);
    }

    #[test]
    fn score_target_triggers_final_round() {
        let target = ScoreTarget { score: 6 };
        let mut state = state();
        assert_eq!(target.evaluate(&state), EndVerdict::Continue);
        state.players[1].played_cards = 2;
        assert_eq!(target.evaluate(&state), EndVerdict::FinalRound);
    }

    #[test]
    fn result_only_for_finished_games() {
        let mut state = state();
        assert!(GameResult::from_state(&state).is_none());
        state.phase = Phase::GameOver;
        state.round = 16;
        state.players[2].played_cards = 4;
        let result = GameResult::from_state(&state).expect("finished");
        assert_eq!(result.winner, 2);
        assert_eq!(result.rounds, 15);
        assert_eq!(result.final_scores, vec![0, 0, 12, 1]);
    }
}
