//! Sender Handle
//!
//! Application-side endpoint of one named sender: posts messages to spying
//! clients and receives commands relayed with `@<sender>`.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use super::switchboard::{InboxToken, Switchboard};
use crate::broker::Broker;

/// Errors that can occur when registering a sender
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SenderError {
    /// Name is empty or contains whitespace, so clients could not address it
    #[error("Invalid sender name: {0:?}")]
    InvalidName(String),

    /// Another live handle already owns this name
    #[error("Sender already attached: {0}")]
    AlreadyAttached(String),
}

/// Live registration of a sender.
///
/// Dropping the handle unregisters the sender.
pub struct SenderHandle {
    name: String,
    broker: Arc<Broker>,
    switchboard: Arc<Switchboard>,
    token: InboxToken,
    commands: mpsc::UnboundedReceiver<String>,
}

impl SenderHandle {
    pub(super) fn attach(
        name: &str,
        broker: Arc<Broker>,
        switchboard: Arc<Switchboard>,
    ) -> Result<Self, SenderError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(SenderError::InvalidName(name.to_string()));
        }

        let (tx, commands) = mpsc::unbounded_channel();
        let token = switchboard
            .attach_sender(name, tx)
            .ok_or_else(|| SenderError::AlreadyAttached(name.to_string()))?;
        broker.add_sender(name);

        Ok(Self {
            name: name.to_string(),
            broker,
            switchboard,
            token,
            commands,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish a message as `<name>: <text>`.
    ///
    /// Returns the number of clients it was handed to.
    pub fn post(&self, text: &str) -> usize {
        self.broker.post_message(text, &self.name, false)
    }

    /// Publish a message preceded by a line break
    pub fn post_line(&self, text: &str) -> usize {
        self.broker.post_message(text, &self.name, true)
    }

    /// Wait for the next relayed command.
    ///
    /// Returns `None` once the message center has shut down.
    pub async fn recv_command(&mut self) -> Option<String> {
        self.commands.recv().await
    }

    /// Next relayed command, if one is already queued
    pub fn try_recv_command(&mut self) -> Option<String> {
        self.commands.try_recv().ok()
    }
}

impl Drop for SenderHandle {
    fn drop(&mut self) {
        self.broker.remove_sender(&self.name);
        self.switchboard.detach_sender(&self.name, self.token);
    }
}

impl std::fmt::Debug for SenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderHandle")
            .field("name", &self.name)
            .field("token", &self.token)
            .finish()
    }
}
