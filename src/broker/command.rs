//! Console Command Protocol
//!
//! Client lines are tokenized into a [`Command`] and then executed against the
//! registries by [`CommandProcessor`].
//!
//! # Priority
//!
//! The first matching rule wins:
//!
//! ```text
//! <blank line>            -> Bare       back to console, help + prompt
//! spy <sender>            -> Spy        start spying, silent on success
//! exit                    -> Exit       session close signal
//! list                    -> List       senders + prompt
//! ping                    -> Ping       "pong"
//! help                    -> Help       help + prompt
//! @<sender> <command...>  -> Relay      spy sender and relay command
//! anything else           -> Unknown    verbatim echo
//! ```
//!
//! Keywords are case-insensitive, sender names are not.

use super::clients::{ClientRegistry, SubscriptionMode};
use super::outbox::{ClientId, Outbox};
use super::senders::SenderRegistry;

/// Token delivered to a client's writer to close the session
pub const EXIT_SIGNAL: &str = "exit";

/// Console help listing every command
pub const HELP_TEXT: &str = " Command Help:\n\n\
   \x20  - list                    => get a list of message senders\n\
   \x20  - spy <sender id>         => receive messages only from the sender identified by sender id\n\
   \x20  - <cr> (carriage return)  => stop realtime message receiving and show help\n\
   \x20  - help                    => show this help\n\
   \x20  - exit                    => close connection to message center\n\
   \x20  - @<sender id> <command>  => send a command to a sender and spy it\n\
   \x20  - ping                    => message center replies pong\n\
   \x20  - <unknown command>       => echo of the command\n";

/// A tokenized client line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Empty line
    Bare,
    /// `spy`, with its argument if one was given
    Spy(Option<&'a str>),
    Exit,
    List,
    Ping,
    Help,
    /// `@<sender> <command...>`; `sender` may be empty for a lone `@`
    Relay { sender: &'a str, command: String },
    /// Anything else, carrying the raw line
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    /// Tokenize one line of client input
    pub fn parse(line: &'a str) -> Self {
        let mut tokens = line.split_whitespace();

        let first = match tokens.next() {
            Some(token) => token,
            None => return Command::Bare,
        };

        match first.to_lowercase().as_str() {
            "spy" => Command::Spy(tokens.next()),
            "exit" => Command::Exit,
            "list" => Command::List,
            "ping" => Command::Ping,
            "help" => Command::Help,
            _ => match first.strip_prefix('@') {
                Some(sender) => Command::Relay {
                    sender,
                    command: tokens.collect::<Vec<_>>().join(" "),
                },
                None => Command::Unknown(line),
            },
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Bare => "bare",
            Command::Spy(_) => "spy",
            Command::Exit => "exit",
            Command::List => "list",
            Command::Ping => "ping",
            Command::Help => "help",
            Command::Relay { .. } => "relay",
            Command::Unknown(_) => "unknown",
        }
    }
}

/// Executes client commands against the registries
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    banner: String,
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self::new("Message Center 1.0")
    }
}

impl CommandProcessor {
    pub fn new(banner: impl Into<String>) -> Self {
        Self {
            banner: banner.into(),
        }
    }

    /// Greeting sent once to a newly registered client
    pub fn welcome(&self, prompt: &str) -> String {
        format!("\n\n{}\n\n{}{}", self.banner, HELP_TEXT, prompt)
    }

    /// Interpret one line from `client_id`.
    ///
    /// Lines from unregistered clients are ignored. Nothing is logged here:
    /// callers hold the broker lock, so the returned [`Outcome`] is logged
    /// after it is released.
    pub fn execute(
        &self,
        line: &str,
        client_id: ClientId,
        clients: &mut ClientRegistry,
        senders: &SenderRegistry,
        outbox: &dyn Outbox,
    ) -> Outcome {
        let prompt = match clients.lookup(client_id) {
            Some(client) => client.prompt(),
            None => return Outcome::Ignored,
        };

        let command = Command::parse(line);
        let kind = command.kind();

        match command {
            Command::Bare => {
                clients.set_mode(client_id, SubscriptionMode::Console);
                outbox.deliver_to_client(client_id, format!("\n{}{}", HELP_TEXT, prompt));
            }
            Command::Spy(target) => {
                let sender = target.unwrap_or_default();
                if !sender.is_empty() && senders.contains(sender) {
                    clients.set_mode(client_id, SubscriptionMode::Spying(sender.to_string()));
                    return Outcome::Spying(sender.to_string());
                }
                outbox.deliver_to_client(client_id, not_found(sender, &prompt));
            }
            Command::Exit => {
                outbox.deliver_to_client(client_id, EXIT_SIGNAL.to_string());
            }
            Command::List => {
                let mut reply = String::from("\n");
                for sender in senders.iter() {
                    reply.push_str("   - ");
                    reply.push_str(sender);
                    reply.push('\n');
                }
                reply.push_str(&prompt);
                outbox.deliver_to_client(client_id, reply);
            }
            Command::Ping => {
                outbox.deliver_to_client(client_id, "pong".to_string());
            }
            Command::Help => {
                outbox.deliver_to_client(client_id, format!("\n{}{}", HELP_TEXT, prompt));
            }
            Command::Relay { sender, command } => {
                if !sender.is_empty() && senders.contains(sender) {
                    clients.set_mode(client_id, SubscriptionMode::Spying(sender.to_string()));
                    outbox.dispatch_command_to_sender(sender, command.clone());
                    return Outcome::Relayed {
                        sender: sender.to_string(),
                        command,
                    };
                }
                outbox.deliver_to_client(client_id, not_found(sender, &prompt));
            }
            Command::Unknown(raw) => {
                outbox.deliver_to_client(client_id, raw.to_string());
            }
        }

        Outcome::Replied(kind)
    }
}

/// What executing one line did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The client is not registered
    Ignored,
    /// The client was answered; carries the command kind
    Replied(&'static str),
    /// The client now spies this sender
    Spying(String),
    /// A command was relayed and the client now spies the sender
    Relayed { sender: String, command: String },
}

fn not_found(sender: &str, prompt: &str) -> String {
    format!("\nSender not found: {}{}", sender, prompt)
}
