mod common;

use core_game::{GameSession, Phase, SessionError};

#[test]
fn fixture_rules_are_picked_up() {
    let rules = common::test_rules();
    assert_eq!(rules.end().max_rounds(), 8);
    assert_eq!(rules.setup().player_name(0), "Tester");
    // Sections the fixture leaves out keep their defaults.
    assert_eq!(rules.setup().hand_cards(), 9);
    assert_eq!(rules.actions().build_labor(), 2);
}

#[test]
fn session_plays_a_full_game() -> anyhow::Result<()> {
    let session = GameSession::new(common::test_rules());
    let mut actions = 0;
    while session.result().is_none() {
        match session.play_ai_turn() {
            Ok(_) => {}
            Err(SessionError::HumanSeat { player }) => {
                let pick = session
                    .suggest()
                    .first()
                    .map(|suggestion| suggestion.action)
                    .ok_or_else(|| anyhow::anyhow!("no suggestion for player {player}"))?;
                session.resolve(player, pick)?;
            }
            Err(err) => return Err(err.into()),
        }
        actions += 1;
        anyhow::ensure!(actions < 500, "game did not finish");
    }

    let state = session.get_state();
    let result = session.result().expect("loop exits on a result");
    assert_eq!(state.phase, Phase::GameOver);
    assert!(result.rounds <= 8);
    assert_eq!(result.final_scores, state.scores());
    let best = *result.final_scores.iter().max().expect("four seats");
    assert_eq!(result.final_scores[result.winner], best);
    assert_eq!(session.recent_log(5).len(), 5);
    Ok(())
}
