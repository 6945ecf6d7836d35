//! Console command parsing
//!
//! One command per line:
//!
//! ```text
//! play | stop | toggle <channel> on|off | loop on|off | status | help | quit
//! ```

use std::str::FromStr;

use thiserror::Error;

use crate::channel::{ChannelKind, UnknownChannel};
use crate::daemon::SessionCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Play,
    Stop,
    Toggle { channel: ChannelKind, enabled: bool },
    Loop(bool),
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("`{command}` needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error(transparent)]
    UnknownChannel(#[from] UnknownChannel),

    #[error("expected on or off, got `{0}`")]
    InvalidSwitch(String),

    #[error("unexpected trailing input: {0}")]
    Trailing(String),
}

pub const HELP: &str = "\
commands:
  play                      restart every enabled channel from zero
  stop                      stop playback
  toggle <channel> on|off   enable or disable drums, bass, others or vocals
  loop on|off               restart channels whose media ends
  status                    print the session state
  quit                      stop and exit";

fn parse_switch(word: &str) -> Result<bool, CommandParseError> {
    match word.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(CommandParseError::InvalidSwitch(word.to_string())),
    }
}

impl FromStr for ConsoleCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandParseError::Empty)?;

        let command = match verb.to_ascii_lowercase().as_str() {
            "play" | "p" | "start" => ConsoleCommand::Play,
            "stop" | "s" => ConsoleCommand::Stop,
            "status" | "st" => ConsoleCommand::Status,
            "help" | "h" | "?" => ConsoleCommand::Help,
            "quit" | "q" | "exit" => ConsoleCommand::Quit,
            "loop" | "l" => {
                let switch = words.next().ok_or(CommandParseError::MissingArgument {
                    command: "loop",
                    expected: "on or off",
                })?;
                ConsoleCommand::Loop(parse_switch(switch)?)
            }
            "toggle" | "t" => {
                let missing = CommandParseError::MissingArgument {
                    command: "toggle",
                    expected: "a channel and on or off",
                };
                let channel: ChannelKind = words.next().ok_or(missing.clone())?.parse()?;
                let enabled = parse_switch(words.next().ok_or(missing)?)?;
                ConsoleCommand::Toggle { channel, enabled }
            }
            other => return Err(CommandParseError::Unknown(other.to_string())),
        };

        let rest: Vec<&str> = words.collect();
        if !rest.is_empty() {
            return Err(CommandParseError::Trailing(rest.join(" ")));
        }
        Ok(command)
    }
}

impl ConsoleCommand {
    /// The session request this maps to; `Help` is handled locally
    pub fn to_session_command(self) -> Option<SessionCommand> {
        match self {
            ConsoleCommand::Play => Some(SessionCommand::PlayAll),
            ConsoleCommand::Stop => Some(SessionCommand::StopAll),
            ConsoleCommand::Toggle { channel, enabled } => Some(SessionCommand::Toggle {
                channel: channel.label().to_string(),
                enabled,
            }),
            ConsoleCommand::Loop(looping) => Some(SessionCommand::SetLooping(looping)),
            ConsoleCommand::Status => Some(SessionCommand::Snapshot),
            ConsoleCommand::Quit => Some(SessionCommand::Shutdown),
            ConsoleCommand::Help => None,
        }
    }
}
