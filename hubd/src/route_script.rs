//! # Route Script Parser
//!
//! Provides a line-based script format for driving the host deterministically.
//!
//! ## Format
//!
//! One command per line; blank lines and lines starting with `#` are skipped.
//!
//! - `attach P` / `detach P`: attach or tear down module port `P`
//! - `config <json>`: broadcast a shared configuration
//! - `core P`: `P` requests the `core` capability
//! - `request P NAME`: `P` requests a capability by name
//! - `link P FLOW Q FLOW`: `P` links one of its flows with one of `Q`'s
//! - `create P`: `P` creates a channel with its factory
//! - `bind P ID`: `P` binds channel `ID` of its factory
//! - `listen P ID SIDE EVENT`: listen for `EVENT` on one endpoint
//! - `send P ID SIDE EVENT <json>`: emit `EVENT` from one endpoint
//! - `close P ID`: close channel `ID`
//! - `debug P LEVEL TEXT`: `P` sends a log line to the debug port
//! - `run`: deliver everything queued
//!
//! `SIDE` is `input` (the endpoint `create` returns) or `output` (the one
//! `bind` returns).
//!
//! ## Example
//!
//! ```text
//! # Pair a channel inside one module
//! attach alice
//! core alice
//! create alice
//! listen alice 0 input message
//! bind alice 0
//! send alice 0 output message "whoo!"
//! run
//! ```

use core_types::PortId;
use ipc::{ChannelIdentifier, ChannelSide, LogLevel};
use serde_json::Value;
use std::collections::VecDeque;
use thiserror::Error;

/// Route script error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteScriptError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Empty script")]
    EmptyScript,
}

/// A single scripted host action
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    Attach(PortId),
    Detach(PortId),
    Config(Value),
    Core(PortId),
    Request {
        port: PortId,
        name: String,
    },
    Link {
        port: PortId,
        flow: String,
        to: PortId,
        to_flow: String,
    },
    Create(PortId),
    Bind {
        port: PortId,
        channel: ChannelIdentifier,
    },
    Listen {
        port: PortId,
        channel: ChannelIdentifier,
        side: ChannelSide,
        event: String,
    },
    Send {
        port: PortId,
        channel: ChannelIdentifier,
        side: ChannelSide,
        event: String,
        payload: Value,
    },
    Close {
        port: PortId,
        channel: ChannelIdentifier,
    },
    Debug {
        port: PortId,
        level: LogLevel,
        text: String,
    },
    Run,
}

/// Route script
#[derive(Debug, Clone, Default)]
pub struct RouteScript {
    commands: VecDeque<ScriptCommand>,
}

impl RouteScript {
    /// Creates a new empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a script from text
    pub fn from_text(text: &str) -> Result<Self, RouteScriptError> {
        let mut commands = VecDeque::new();

        for (line_num, line) in text.lines().enumerate() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            commands.push_back(Self::parse_line(line, line_num + 1)?);
        }

        if commands.is_empty() {
            return Err(RouteScriptError::EmptyScript);
        }

        Ok(Self { commands })
    }

    fn parse_line(line: &str, line_num: usize) -> Result<ScriptCommand, RouteScriptError> {
        let error = |message: String| RouteScriptError::ParseError {
            line: line_num,
            message,
        };
        let (keyword, rest) = split_word(line);

        let command = match keyword {
            "attach" => ScriptCommand::Attach(port_arg(rest).map_err(error)?),
            "detach" => ScriptCommand::Detach(port_arg(rest).map_err(error)?),
            "core" => ScriptCommand::Core(port_arg(rest).map_err(error)?),
            "create" => ScriptCommand::Create(port_arg(rest).map_err(error)?),
            "config" => ScriptCommand::Config(json_arg(rest).map_err(error)?),
            "request" => {
                let [port, name] = words(rest).map_err(error)?;
                ScriptCommand::Request {
                    port: PortId::new(port),
                    name: name.to_string(),
                }
            }
            "link" => {
                let [port, flow, to, to_flow] = words(rest).map_err(error)?;
                ScriptCommand::Link {
                    port: PortId::new(port),
                    flow: flow.to_string(),
                    to: PortId::new(to),
                    to_flow: to_flow.to_string(),
                }
            }
            "bind" => {
                let [port, channel] = words(rest).map_err(error)?;
                ScriptCommand::Bind {
                    port: PortId::new(port),
                    channel: channel_arg(channel).map_err(error)?,
                }
            }
            "close" => {
                let [port, channel] = words(rest).map_err(error)?;
                ScriptCommand::Close {
                    port: PortId::new(port),
                    channel: channel_arg(channel).map_err(error)?,
                }
            }
            "listen" => {
                let [port, channel, side, event] = words(rest).map_err(error)?;
                ScriptCommand::Listen {
                    port: PortId::new(port),
                    channel: channel_arg(channel).map_err(error)?,
                    side: side_arg(side).map_err(error)?,
                    event: event.to_string(),
                }
            }
            "send" => {
                let (head, payload) = split_words(rest, 4);
                let [port, channel, side, event]: [&str; 4] = head
                    .try_into()
                    .map_err(|_| error("expected P ID SIDE EVENT <json>".to_string()))?;
                ScriptCommand::Send {
                    port: PortId::new(port),
                    channel: channel_arg(channel).map_err(error)?,
                    side: side_arg(side).map_err(error)?,
                    event: event.to_string(),
                    payload: json_arg(payload).map_err(error)?,
                }
            }
            "debug" => {
                let (head, text) = split_words(rest, 2);
                let [port, level]: [&str; 2] = head
                    .try_into()
                    .map_err(|_| error("expected P LEVEL TEXT".to_string()))?;
                ScriptCommand::Debug {
                    port: PortId::new(port),
                    level: LogLevel::parse(level)
                        .ok_or_else(|| error(format!("invalid level: {}", level)))?,
                    text: text.to_string(),
                }
            }
            "run" if rest.is_empty() => ScriptCommand::Run,
            "run" => return Err(error("run takes no arguments".to_string())),
            other => return Err(RouteScriptError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }

    /// Returns the next command, if any
    pub fn next_command(&mut self) -> Option<ScriptCommand> {
        self.commands.pop_front()
    }

    /// Returns true if the script has more commands
    pub fn has_more(&self) -> bool {
        !self.commands.is_empty()
    }

    /// Returns the number of remaining commands
    pub fn remaining(&self) -> usize {
        self.commands.len()
    }
}

/// Splits off the first whitespace-delimited word
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(end) => (&input[..end], input[end..].trim()),
        None => (input, ""),
    }
}

/// Splits off up to `count` words, returning them and the rest of the line
fn split_words(input: &str, count: usize) -> (Vec<&str>, &str) {
    let mut words = Vec::with_capacity(count);
    let mut rest = input.trim();
    while words.len() < count && !rest.is_empty() {
        let (word, tail) = split_word(rest);
        words.push(word);
        rest = tail;
    }
    (words, rest)
}

/// Exactly `N` words
fn words<const N: usize>(input: &str) -> Result<[&str; N], String> {
    let found: Vec<&str> = input.split_whitespace().collect();
    let count = found.len();
    found
        .try_into()
        .map_err(|_| format!("expected {} arguments, found {}", N, count))
}

fn port_arg(input: &str) -> Result<PortId, String> {
    let [port] = words(input)?;
    Ok(PortId::new(port))
}

fn channel_arg(input: &str) -> Result<ChannelIdentifier, String> {
    input
        .parse::<u64>()
        .map(ChannelIdentifier::new)
        .map_err(|_| format!("invalid channel identifier: {}", input))
}

fn side_arg(input: &str) -> Result<ChannelSide, String> {
    match input.to_ascii_lowercase().as_str() {
        "input" | "in" => Ok(ChannelSide::Input),
        "output" | "out" => Ok(ChannelSide::Output),
        other => Err(format!("invalid side: {}", other)),
    }
}

fn json_arg(input: &str) -> Result<Value, String> {
    if input.is_empty() {
        return Err("missing JSON value".to_string());
    }
    serde_json::from_str(input).map_err(|e| format!("invalid JSON: {}", e))
}
