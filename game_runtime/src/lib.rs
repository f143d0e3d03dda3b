//! Command surface shared by the game drivers.
//!
//! Drivers read text lines from whatever transport they own and turn them
//! into [`CommandPayload`] values here, without pulling in the engine.

pub mod command_text;

pub use command_text::{parse_command_line, CommandParseError};

/// Default number of log entries shown by `log` without an argument.
pub const DEFAULT_LOG_COUNT: usize = 5;

/// Supported command payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPayload {
    /// Print the current state.
    State,
    /// Submit an action for a seat. The action name is resolved by the engine.
    Play { player: u32, action: String },
    /// Let computer seats play up to `turns` turns, stopping at a human seat.
    Ai { turns: u32 },
    /// Rank actions for the seat on turn.
    Suggest,
    /// Show the last `count` log entries.
    Log { count: usize },
    /// Run a self-play training batch.
    Simulate { games: u64 },
    /// Print training counters.
    Stats,
    /// Deal a fresh game.
    NewGame,
    Help,
    Quit,
}

impl CommandPayload {
    pub fn verb(&self) -> &'static str {
        match self {
            CommandPayload::State => "state",
            CommandPayload::Play { .. } => "play",
            CommandPayload::Ai { .. } => "ai",
            CommandPayload::Suggest => "suggest",
            CommandPayload::Log { .. } => "log",
            CommandPayload::Simulate { .. } => "simulate",
            CommandPayload::Stats => "stats",
            CommandPayload::NewGame => "new",
            CommandPayload::Help => "help",
            CommandPayload::Quit => "quit",
        }
    }
}

/// One-line usage summary per verb.
pub const COMMAND_HELP: &[(&str, &str)] = &[
    ("state", "show the table"),
    ("play <player> <action>", "take an action for a seat"),
    ("ai [turns]", "let computer seats move"),
    ("suggest", "rank actions for the seat on turn"),
    ("log [count]", "show recent actions"),
    ("simulate [games]", "run a self-play training batch"),
    ("stats", "show training counters"),
    ("new", "start a new game"),
    ("help", "list commands"),
    ("quit", "exit"),
];
