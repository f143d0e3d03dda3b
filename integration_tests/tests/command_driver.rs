mod common;

use core_game::{ActionId, GameSession, SessionError};
use game_runtime::{parse_command_line, CommandPayload};

/// Applies one command line to the session the way the companion binary does,
/// returning how many actions were committed.
fn apply(session: &GameSession, line: &str) -> anyhow::Result<usize> {
    match parse_command_line(line)? {
        CommandPayload::Play { player, action } => {
            session.resolve_named(player as usize, &action)?;
            Ok(1)
        }
        CommandPayload::Ai { turns } => {
            let mut played = 0;
            for _ in 0..turns {
                match session.play_ai_turn() {
                    Ok(_) => played += 1,
                    Err(SessionError::HumanSeat { .. }) => break,
                    Err(err) => return Err(err.into()),
                }
            }
            Ok(played)
        }
        CommandPayload::NewGame => {
            session.new_game();
            Ok(0)
        }
        _ => Ok(0),
    }
}

#[test]
fn scripted_opening_round() -> anyhow::Result<()> {
    let session = GameSession::new(common::test_rules());
    assert_eq!(apply(&session, "play 0 build")?, 1);
    assert_eq!(apply(&session, "ai 10")?, 3, "ai stops at the human seat");

    let state = session.get_state();
    assert_eq!(state.current_player, 0);
    assert_eq!(state.round, 2);

    let log = session.recent_log(game_runtime::DEFAULT_LOG_COUNT);
    assert_eq!(log.len(), 4);
    assert_eq!(log[0].action, ActionId::Build);
    assert_eq!(log[0].delta.gold, 1);
    Ok(())
}

#[test]
fn rejected_lines_do_not_touch_the_game() -> anyhow::Result<()> {
    let session = GameSession::new(common::test_rules());
    let before = session.get_state();

    assert!(apply(&session, "play 2 build").is_err(), "not seat 2's turn");
    assert!(apply(&session, "play 0 smuggle").is_err());
    assert!(apply(&session, "fly 0").is_err());
    assert_eq!(*session.get_state(), *before);

    apply(&session, "play 0 playCard")?;
    apply(&session, "new")?;
    assert_eq!(*session.get_state(), *before);
    assert!(session.recent_log(5).is_empty());
    Ok(())
}
