//! Command parsing and originating context

use crate::error::{Error, Result};
use groupplay_common::{GroupId, NotifyTarget};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a command came from and where its notifications go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContext {
    pub group_id: GroupId,
    /// Voice/audio channel the caller is in, used when joining
    pub channel: Option<String>,
    pub notify_target: NotifyTarget,
    /// Emit an info "Done" acknowledgement before running the command
    #[serde(default)]
    pub acknowledge: bool,
}

impl CommandContext {
    pub fn new(group_id: impl Into<GroupId>, notify_target: impl Into<NotifyTarget>) -> Self {
        Self {
            group_id: group_id.into(),
            channel: None,
            notify_target: notify_target.into(),
            acknowledge: false,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn acknowledged(mut self) -> Self {
        self.acknowledge = true;
        self
    }
}

/// A playback command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "argument", rename_all = "lowercase")]
pub enum Command {
    Join,
    Leave,
    Play(String),
    Find(String),
    Stop,
    Skip,
    Queue,
    Delete(usize),
    Loop,
    Pause,
    Resume,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Join => "join",
            Command::Leave => "leave",
            Command::Play(_) => "play",
            Command::Find(_) => "find",
            Command::Stop => "stop",
            Command::Skip => "skip",
            Command::Queue => "queue",
            Command::Delete(_) => "delete",
            Command::Loop => "loop",
            Command::Pause => "pause",
            Command::Resume => "resume",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Play(reference) => write!(f, "play {}", reference),
            Command::Find(query) => write!(f, "find {}", query),
            Command::Delete(index) => write!(f, "delete {}", index),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    /// Parse `play <ref>`, `find <query...>`, `next`/`skip`, `delete <index>`
    /// and the argument-less commands. Keywords are case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (keyword, rest) = match s.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (s, ""),
        };

        let require_arg = |what: &str| -> Result<String> {
            if rest.is_empty() {
                Err(Error::InvalidCommand(format!("{} requires {}", keyword, what)))
            } else {
                Ok(rest.to_string())
            }
        };

        let command = match keyword.to_ascii_lowercase().as_str() {
            "join" => Command::Join,
            "leave" => Command::Leave,
            "play" => Command::Play(require_arg("a reference")?),
            "find" => Command::Find(require_arg("a query")?),
            "stop" => Command::Stop,
            "next" | "skip" => Command::Skip,
            "queue" => Command::Queue,
            "delete" => {
                let arg = require_arg("an index")?;
                let index = arg
                    .parse::<usize>()
                    .map_err(|_| Error::InvalidCommand(format!("invalid index: {}", arg)))?;
                Command::Delete(index)
            }
            "loop" => Command::Loop,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "" => return Err(Error::InvalidCommand("empty command".to_string())),
            other => return Err(Error::InvalidCommand(format!("unknown command: {}", other))),
        };

        Ok(command)
    }
}
