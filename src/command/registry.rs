//! The command registry: a case-insensitive map from command token (or
//! dotted "parent child" pair) to handler plus introspection metadata.
//!
//! Subcommands are registered as metadata-only entries; dispatch for them
//! is delegated to the parent's handler switching on `args[1]`.

use std::collections::HashMap;

use super::resp::{Command, RespValue};
use super::session::Session;
use crate::server::Handler;

/// What a handler invocation produced: the reply to write, and whether the
/// connection should close after writing it (`QUIT`).
pub struct HandlerOutcome {
    /// The RESP value to send back to the client.
    pub reply: RespValue,
    /// Whether the connection should be closed after this reply.
    pub close: bool,
}

impl HandlerOutcome {
    /// A reply that leaves the connection open.
    pub fn reply(value: RespValue) -> Self {
        Self {
            reply: value,
            close: false,
        }
    }

    /// A reply after which the connection closes.
    pub fn close_after(value: RespValue) -> Self {
        Self {
            reply: value,
            close: true,
        }
    }
}

/// Handler function signature. Synchronous: storage calls block the current
/// worker thread, which is acceptable since `redb` transactions are
/// short-lived.
pub type HandlerFn = fn(&Handler, &mut Session, &Command) -> HandlerOutcome;

/// Metadata describing a registered command for `COMMAND` introspection.
#[derive(Clone, Debug)]
pub struct CommandInfo {
    /// Command name, as registered (may be a dotted `"parent child"` pair).
    pub name: String,
    /// Arity: negative means "at least |n|".
    pub arity: i32,
    /// RESP flags (e.g. "write", "readonly").
    pub flags: Vec<String>,
    /// First key position in args, or -1 if keyless.
    pub first_key: i32,
    /// Last key position in args, or -1 if keyless.
    pub last_key: i32,
    /// Step between key positions, or 0 if keyless.
    pub step_key: i32,
    /// Command categories.
    pub categories: Vec<String>,
    /// (short name, description) shown by `COMMAND DOCS`.
    pub tips: (String, String),
}

struct CommandEntry {
    info: CommandInfo,
    handler: Option<HandlerFn>,
}

/// Case-insensitive registry of commands and subcommands.
pub struct CommandRegistry {
    entries: HashMap<String, CommandEntry>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers a command with both metadata and a handler.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &mut self,
        name: &str,
        handler: HandlerFn,
        arity: i32,
        flags: &[&str],
        first_key: i32,
        last_key: i32,
        step_key: i32,
        categories: &[&str],
        tips: (&str, &str),
    ) {
        self.entries.insert(
            name.to_string(),
            CommandEntry {
                info: CommandInfo {
                    name: name.to_string(),
                    arity,
                    flags: flags.iter().map(|s| s.to_string()).collect(),
                    first_key,
                    last_key,
                    step_key,
                    categories: categories.iter().map(|s| s.to_string()).collect(),
                    tips: (tips.0.to_string(), tips.1.to_string()),
                },
                handler: Some(handler),
            },
        );
    }

    /// Registers metadata only, for a subcommand whose dispatch is handled
    /// by its parent's handler.
    #[allow(clippy::too_many_arguments)]
    pub fn register_child(
        &mut self,
        name: &str,
        arity: i32,
        flags: &[&str],
        first_key: i32,
        last_key: i32,
        step_key: i32,
        categories: &[&str],
        tips: (&str, &str),
    ) {
        self.entries.insert(
            name.to_string(),
            CommandEntry {
                info: CommandInfo {
                    name: name.to_string(),
                    arity,
                    flags: flags.iter().map(|s| s.to_string()).collect(),
                    first_key,
                    last_key,
                    step_key,
                    categories: categories.iter().map(|s| s.to_string()).collect(),
                    tips: (tips.0.to_string(), tips.1.to_string()),
                },
                handler: None,
            },
        );
    }

    /// Looks up the handler for a (possibly dotted) command name.
    pub fn handler_for(&self, name: &str) -> Option<HandlerFn> {
        self.entries.get(name).and_then(|e| e.handler)
    }

    /// Looks up metadata for a (possibly dotted) command name.
    pub fn info_for(&self, name: &str) -> Option<&CommandInfo> {
        self.entries.get(name).map(|e| &e.info)
    }

    /// Returns every registered name (including dotted subcommands), sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered entries (commands and subcommands).
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
