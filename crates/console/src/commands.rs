//! Commands read from stdin

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Load the initial snapshot again after a failure
    Retry,
    /// Reopen the feed while disconnected
    Reconnect,
    /// Print the current screen
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl Command {
    pub const HELP: &'static str = "commands: retry | reconnect | status | help | quit";

    pub fn name(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Reconnect => "reconnect",
            Self::Status => "status",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retry" | "r" => Ok(Self::Retry),
            "reconnect" | "c" => Ok(Self::Reconnect),
            "status" | "s" | "" => Ok(Self::Status),
            "help" | "h" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
