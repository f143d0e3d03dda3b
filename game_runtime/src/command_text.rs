use std::num::ParseIntError;

use thiserror::Error;

use crate::{CommandPayload, DEFAULT_LOG_COUNT};

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
}

pub fn parse_command_line(input: &str) -> Result<CommandPayload, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;

    let payload = match verb.as_str() {
        "state" | "show" => CommandPayload::State,
        "play" => {
            let player_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("player"))?;
            let action = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("action"))?;
            let player = parse_u32(player_str, "play player")?;
            CommandPayload::Play {
                player,
                action: action.to_string(),
            }
        }
        "ai" => {
            let turns_str = parts.next().unwrap_or("1");
            let turns = parse_u32(turns_str, "ai turns")?;
            CommandPayload::Ai { turns }
        }
        "suggest" | "hint" => CommandPayload::Suggest,
        "log" => {
            let count = match parts.next() {
                Some(value) => parse_u32(value, "log count")? as usize,
                None => DEFAULT_LOG_COUNT,
            };
            CommandPayload::Log { count }
        }
        "simulate" | "sim" => {
            let games_str = parts.next().unwrap_or("100");
            let games = parse_u64(games_str, "simulate games")?;
            CommandPayload::Simulate { games }
        }
        "stats" => CommandPayload::Stats,
        "new" | "reset" => CommandPayload::NewGame,
        "help" | "?" => CommandPayload::Help,
        "quit" | "exit" => CommandPayload::Quit,
        other => return Err(CommandParseError::UnknownCommand(other.to_string())),
    };

    if let Some(extra) = parts.next() {
        return Err(CommandParseError::UnexpectedArgument(extra.to_string()));
    }
    Ok(payload)
}

fn parse_u32(value: &str, context: &'static str) -> Result<u32, CommandParseError> {
    value
        .parse::<u32>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

fn parse_u64(value: &str, context: &'static str) -> Result<u64, CommandParseError> {
    value
        .parse::<u64>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}
