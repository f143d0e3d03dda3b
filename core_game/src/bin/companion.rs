use std::io::{self, BufRead};
use std::thread;

use crossbeam_channel::{unbounded, Receiver};
use tracing::{info, warn};

use core_game::{
    load_rules_config_from_env, GameResult, GameSession, GameState, ResolveError, SessionError,
    TokenKind,
};
use game_runtime::{parse_command_line, CommandPayload, COMMAND_HELP};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let rules = load_rules_config_from_env();
    let session = GameSession::new(rules);
    let command_rx = spawn_stdin_listener();

    info!(
        target: "companion::server",
        players = session.get_state().player_count(),
        "companion.ready"
    );
    print_state(&session.get_state());

    while let Ok(command) = command_rx.recv() {
        match command {
            CommandPayload::State => print_state(&session.get_state()),
            CommandPayload::Play { player, action } => {
                match session.resolve_named(player as usize, &action) {
                    Ok((state, entry)) => {
                        println!("{entry}");
                        print_state(&state);
                    }
                    Err(err) => report_rejection(&err),
                }
            }
            CommandPayload::Ai { turns } => run_ai_turns(&session, turns),
            CommandPayload::Suggest => {
                let state = session.get_state();
                let suggestions = session.suggest();
                if suggestions.is_empty() {
                    println!("no suggestions for player {}", state.current_player);
                }
                for (rank, suggestion) in suggestions.iter().enumerate() {
                    println!(
                        "{}. {:<10} {:>5.1}%  {}",
                        rank + 1,
                        suggestion.action.as_str(),
                        suggestion.confidence,
                        suggestion.rationale
                    );
                }
            }
            CommandPayload::Log { count } => {
                for entry in session.recent_log(count) {
                    println!("{entry}");
                }
            }
            CommandPayload::Simulate { games } => {
                let (samples, stats) = session.run_batch(games);
                info!(
                    target: "companion::server",
                    games,
                    samples = samples.len(),
                    "command.applied=simulate"
                );
                println!(
                    "games {} | data points {} | accuracy {:.1}% | model v{}",
                    stats.games_played, stats.data_points, stats.model_accuracy, stats.model_version
                );
            }
            CommandPayload::Stats => {
                let stats = session.training_stats();
                println!(
                    "games {} | data points {} | accuracy {:.1}% | model v{} | last trained {}",
                    stats.games_played,
                    stats.data_points,
                    stats.model_accuracy,
                    stats.model_version,
                    stats
                        .last_training_timestamp
                        .map(|ts| ts.to_string())
                        .unwrap_or_else(|| "never".to_string())
                );
                for (profile, ledger) in session.aggregator().metrics().iter() {
                    println!(
                        "  {:<9} games {:>6} win rate {:>5.1}% mean score {:>5.1}",
                        profile.as_str(),
                        ledger.games,
                        ledger.win_rate() * 100.0,
                        ledger.mean_score()
                    );
                }
            }
            CommandPayload::NewGame => print_state(&session.new_game()),
            CommandPayload::Help => {
                for (usage, summary) in COMMAND_HELP {
                    println!("  {usage:<24} {summary}");
                }
            }
            CommandPayload::Quit => break,
        }
    }
    info!(target: "companion::server", "companion.shutdown");
}

fn spawn_stdin_listener() -> Receiver<CommandPayload> {
    let (sender, receiver) = unbounded::<CommandPayload>();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(target: "companion::server", error = %err, "command.read_failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command_line(&line) {
                Ok(command) => {
                    if sender.send(command).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(target: "companion::server", input = %line.trim(), error = %err, "command.invalid");
                    println!("error: {err}");
                }
            }
        }
    });
    receiver
}

fn run_ai_turns(session: &GameSession, turns: u32) {
    for _ in 0..turns {
        match session.play_ai_turn() {
            Ok((_, entry)) => println!("{entry}"),
            Err(SessionError::HumanSeat { player }) => {
                println!("player {player} to move");
                break;
            }
            Err(SessionError::Resolve(err)) => {
                report_rejection(&err);
                break;
            }
            Err(err) => {
                warn!(target: "companion::server", error = %err, "ai.failed");
                break;
            }
        }
    }
    print_state(&session.get_state());
}

fn report_rejection(err: &ResolveError) {
    info!(
        target: "companion::server",
        player = err.player(),
        error = %err,
        "command.rejected"
    );
    println!("rejected: {err}");
}

fn print_state(state: &GameState) {
    println!(
        "round {} | {} | player {} to move",
        state.round, state.phase, state.current_player
    );
    for (seat, player) in state.players.iter().enumerate() {
        let marker = if seat == state.current_player { '>' } else { ' ' };
        println!(
            "{marker} {seat} {:<12} {:<9} score {:>3} gold {:>2} hand {:>2} played {:>2} pop {} tokens {}/{} islands {}/{}",
            player.name,
            player.profile.as_str(),
            player.score(),
            player.gold,
            player.hand_cards,
            player.played_cards,
            player.population,
            player.available_tokens(TokenKind::Trade),
            player.available_tokens(TokenKind::Exploration),
            player.old_world_islands,
            player.new_world_islands,
        );
    }
    if let Some(result) = GameResult::from_state(state) {
        println!(
            "game over: player {} wins with {} points",
            result.winner, result.final_scores[result.winner]
        );
    }
}
