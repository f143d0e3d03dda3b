use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing::info;

use core_game::{load_rules_config_from_env, GameResult, GameSession, SessionError};

mod train;

#[derive(Parser, Debug)]
#[command(author, version, about = "Self-play trainer for the island economy companion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run self-play batches and fold them into a saved training record.
    Train(train::TrainArgs),
    /// Play one game to the end, taking the top suggestion for human seats.
    Play {
        /// Print every action as it is taken.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the counters stored in a training record.
    Stats {
        #[arg(long, default_value = "training_record.json")]
        record: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Train(args) => train::run(args).await,
        Command::Play { verbose } => play(verbose),
        Command::Stats { record } => {
            let record = train::load_record(&record).await?;
            println!("{}", serde_json::to_string_pretty(&record.stats())?);
            for (profile, ledger) in record.metrics.iter() {
                println!(
                    "{:<9} games {:>7} win rate {:>5.1}% mean score {:>5.1} mean rounds {:>4.1}",
                    profile.as_str(),
                    ledger.games,
                    ledger.win_rate() * 100.0,
                    ledger.mean_score(),
                    ledger.mean_rounds()
                );
            }
            Ok(())
        }
    }
}

fn play(verbose: bool) -> Result<()> {
    let session = GameSession::new(load_rules_config_from_env());
    let mut actions = 0u32;
    let result = loop {
        if let Some(result) = session.result() {
            break result;
        }
        let entry = match session.play_ai_turn() {
            Ok((_, entry)) => entry,
            Err(SessionError::HumanSeat { player }) => {
                let Some(pick) = session.suggest().first().copied() else {
                    color_eyre::eyre::bail!("player {player} has no legal action");
                };
                session.resolve(player, pick.action)?.1
            }
            Err(err) => return Err(err.into()),
        };
        actions += 1;
        if verbose {
            println!("{entry}");
        }
    };
    report_result(&session, &result, actions);
    Ok(())
}

fn report_result(session: &GameSession, result: &GameResult, actions: u32) {
    let state = session.get_state();
    info!(
        target: "companion::cli",
        winner = result.winner,
        rounds = result.rounds,
        actions,
        "game.finished"
    );
    for (seat, score) in result.final_scores.iter().enumerate() {
        let marker = if seat == result.winner { '*' } else { ' ' };
        println!(
            "{marker} {seat} {:<12} {:<9} {score:>3}",
            state.players[seat].name,
            state.players[seat].profile.as_str()
        );
    }
    println!("{} rounds, {actions} actions", result.rounds);
}
