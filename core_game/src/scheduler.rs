use crate::actions::ActionId;
use crate::resolver::{self, Resolution, ResolveError};
use crate::rules_config::RulesConfig;
use crate::state::{GameState, Phase};
use crate::victory::{end_condition_from_rules, EndCondition, EndVerdict};

/// Moves the turn pointer and phase after each resolved action.
#[derive(Debug)]
pub struct TurnScheduler {
    end: Box<dyn EndCondition>,
}

impl TurnScheduler {
    pub fn new(end: Box<dyn EndCondition>) -> Self {
        Self { end }
    }

    pub fn from_rules(rules: &RulesConfig) -> Self {
        Self::new(Box::new(end_condition_from_rules(rules)))
    }

    /// Passes the turn to the next seat. The round ticks over when play
    /// returns to seat 0.
    pub fn advance(&self, state: &mut GameState) {
        if state.phase == Phase::GameOver || state.players.is_empty() {
            return;
        }
        let previous = state.current_player;
        let seats = state.player_count();
        let wrapped = previous + 1 >= seats;
        state.current_player = (previous + 1) % seats;
        if wrapped {
            state.round += 1;
        }

        let verdict = self.end.evaluate(state);
        let next_phase = match (state.phase, verdict) {
            (_, EndVerdict::GameOver) => Phase::GameOver,
            (Phase::Cleanup, _) if wrapped => Phase::GameOver,
            // Triggered on the round's last action: that round is already complete.
            (Phase::Main, EndVerdict::FinalRound) if wrapped => Phase::GameOver,
            (Phase::Main, EndVerdict::FinalRound) => Phase::Cleanup,
            (phase, _) => phase,
        };

        if next_phase != state.phase {
            tracing::debug!(
                target: "companion::scheduler",
                round = state.round,
                from = %state.phase,
                to = %next_phase,
                "phase.changed"
            );
            state.phase = next_phase;
        }
    }

    /// Resolves `action` and advances the turn in one step.
    pub fn play(
        &self,
        state: &GameState,
        player: usize,
        action: ActionId,
        rules: &RulesConfig,
    ) -> Result<Resolution, ResolveError> {
        let mut resolution = resolver::resolve(state, player, action, rules)?;
        self.advance(&mut resolution.state);
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::victory::RoundLimit;

    fn setup() -> (GameState, RulesConfig, TurnScheduler) {
        let rules = RulesConfig::default();
        let scheduler = TurnScheduler::from_rules(&rules);
        (GameState::new_game(&rules), rules, scheduler)
    }

    #[test]
    fn seats_cycle_and_round_ticks_once_per_cycle() {
        let (mut state, _, scheduler) = setup();
        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push((state.current_player, state.round));
            scheduler.advance(&mut state);
        }
        assert_eq!(
            seen,
            vec![
                (0, 1),
                (1, 1),
                (2, 1),
                (3, 1),
                (0, 2),
                (1, 2),
                (2, 2),
                (3, 2)
            ]
        );
    }

    #[test]
    fn round_limit_ends_game_at_wrap() {
        let scheduler = TurnScheduler::new(Box::new(RoundLimit { max_rounds: 1 }));
        let mut state = GameState::new_game(&RulesConfig::default());
        for _ in 0..3 {
            scheduler.advance(&mut state);
            assert_eq!(state.phase, Phase::Main);
        }
        scheduler.advance(&mut state);
        assert_eq!(state.phase, Phase::GameOver);
        assert_eq!(state.round, 2);

        let frozen = state.clone();
        scheduler.advance(&mut state);
        assert_eq!(state, frozen, "no movement after game over");
    }

    #[test]
    fn empty_hand_runs_out_the_round() {
        let (mut state, _, scheduler) = setup();
        scheduler.advance(&mut state);
        state.players[0].hand_cards = 0;
        scheduler.advance(&mut state);
        assert_eq!(state.phase, Phase::Cleanup);
        assert_eq!(state.current_player, 2);
        scheduler.advance(&mut state);
        assert_eq!(state.phase, Phase::Cleanup);
        scheduler.advance(&mut state);
        assert_eq!(state.phase, Phase::GameOver);
        assert_eq!(state.current_player, 0);
    }

    #[test]
    fn trigger_on_last_seat_ends_immediately() {
        let (mut state, _, scheduler) = setup();
        for _ in 0..3 {
            scheduler.advance(&mut state);
        }
        state.players[3].hand_cards = 0;
        scheduler.advance(&mut state);
        assert_eq!(state.phase, Phase::GameOver);
    }

    #[test]
    fn opening_round_scenario() {
        let (state, rules, scheduler) = setup();
        let mut state = scheduler
            .play(&state, 0, ActionId::Build, &rules)
            .expect("build")
            .state;
        for seat in 1..4 {
            state = scheduler
                .play(&state, seat, ActionId::Expedition, &rules)
                .expect("expedition")
                .state;
        }
        assert_eq!(state.current_player, 0);
        assert_eq!(state.round, 2);
    }
}
