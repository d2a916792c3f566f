//! Text commands: parsing and the processor that executes them.

pub mod processor;
pub mod replies;

pub use processor::{CommandEvent, CommandProcessor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Start,
    Ping,
    On,
    Off,
    /// Raw duration argument, parsed by the processor
    Timeout(String),
    Delete,
    Setting,
    Stop,
    Unknown(String),
}

impl Command {
    /// Build a command from a lowercase name and its argument string
    pub fn parse(name: &str, args: &str) -> Self {
        match name {
            "help" => Command::Help,
            "start" => Command::Start,
            "ping" => Command::Ping,
            "on" => Command::On,
            "off" => Command::Off,
            "timeout" => Command::Timeout(args.trim().to_string()),
            "delete" => Command::Delete,
            "setting" => Command::Setting,
            "stop" => Command::Stop,
            other => Command::Unknown(other.to_string()),
        }
    }

    /// Parse a message text such as `/timeout@gcbot 10m`; `None` if it is not a command
    pub fn from_text(text: &str, prefix: &str) -> Option<Self> {
        let rest = text.trim_start().strip_prefix(prefix)?;
        let (token, args) = match rest.split_once(char::is_whitespace) {
            Some((token, args)) => (token, args),
            None => (rest, ""),
        };

        let name = token.split('@').next().unwrap_or_default().to_lowercase();
        if name.is_empty() {
            return None;
        }

        Some(Self::parse(&name, args))
    }

    pub fn name(&self) -> &str {
        match self {
            Command::Help => "help",
            Command::Start => "start",
            Command::Ping => "ping",
            Command::On => "on",
            Command::Off => "off",
            Command::Timeout(_) => "timeout",
            Command::Delete => "delete",
            Command::Setting => "setting",
            Command::Stop => "stop",
            Command::Unknown(name) => name,
        }
    }

    /// Commands answered in private chats; everything else needs a group
    pub fn allowed_in_private(&self) -> bool {
        matches!(self, Command::Help | Command::Start | Command::Ping)
    }
}
