//! Outbound hand-off
//!
//! The broker never writes to a socket or calls into application code while
//! holding its lock. Every reply, routed message and relayed command is handed
//! to an [`Outbox`], which must not block.

use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Opaque handle identifying one connected client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClientId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A single outbound delivery produced by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Text to be written to a client connection
    ToClient {
        /// Destination session
        client: ClientId,
        /// Text, written verbatim
        text: String,
    },
    /// Command relayed from a client to an application sender
    ToSender {
        /// Destination sender name
        sender: String,
        /// Command line with the `@<sender>` prefix stripped
        command: String,
    },
}

/// Sink for outbound deliveries.
///
/// Implementations are called with the broker lock held and must return
/// without waiting on I/O.
pub trait Outbox: Send + Sync {
    /// Hand text to the writer of `client`
    fn deliver_to_client(&self, client: ClientId, text: String);

    /// Hand a command to the application handler registered for `sender`
    fn dispatch_command_to_sender(&self, sender: &str, command: String);
}

/// [`Outbox`] backed by an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelOutbox {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelOutbox {
    /// Create an outbox and the receiver that drains it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    // Runs under the broker lock, so a closed receiver is not logged here
    fn push(&self, outbound: Outbound) {
        let _ = self.tx.send(outbound);
    }
}

impl Outbox for ChannelOutbox {
    fn deliver_to_client(&self, client: ClientId, text: String) {
        self.push(Outbound::ToClient { client, text });
    }

    fn dispatch_command_to_sender(&self, sender: &str, command: String) {
        self.push(Outbound::ToSender {
            sender: sender.to_string(),
            command,
        });
    }
}

/// [`Outbox`] that records deliveries in memory so they can be inspected
#[derive(Debug, Default)]
pub struct RecordingOutbox {
    records: Mutex<Vec<Outbound>>,
}

impl RecordingOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<Outbound> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *records)
    }

    /// Remove and return the texts delivered to `client`, in order
    pub fn take_for(&self, client: ClientId) -> Vec<String> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut taken = Vec::new();
        records.retain(|record| match record {
            Outbound::ToClient { client: c, text } if *c == client => {
                taken.push(text.clone());
                false
            }
            _ => true,
        });
        taken
    }

    fn push(&self, outbound: Outbound) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(outbound);
    }
}

impl Outbox for RecordingOutbox {
    fn deliver_to_client(&self, client: ClientId, text: String) {
        self.push(Outbound::ToClient { client, text });
    }

    fn dispatch_command_to_sender(&self, sender: &str, command: String) {
        self.push(Outbound::ToSender {
            sender: sender.to_string(),
            command,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_display() {
        assert_eq!(ClientId(42).to_string(), "42");
        assert_eq!(ClientId::from(7), ClientId(7));
    }

    #[test]
    fn test_channel_outbox_preserves_order() {
        let (outbox, mut rx) = ChannelOutbox::new();

        outbox.deliver_to_client(ClientId(1), "first".to_string());
        outbox.dispatch_command_to_sender("app1", "reload".to_string());
        outbox.deliver_to_client(ClientId(1), "second".to_string());

        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::ToClient {
                client: ClientId(1),
                text: "first".to_string()
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::ToSender {
                sender: "app1".to_string(),
                command: "reload".to_string()
            }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            Outbound::ToClient { text, .. } if text == "second"
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_outbox_survives_dropped_receiver() {
        let (outbox, rx) = ChannelOutbox::new();
        drop(rx);

        // Must not panic
        outbox.deliver_to_client(ClientId(1), "lost".to_string());
    }

    #[test]
    fn test_recording_outbox_take_for() {
        let outbox = RecordingOutbox::new();
        outbox.deliver_to_client(ClientId(1), "a".to_string());
        outbox.deliver_to_client(ClientId(2), "b".to_string());
        outbox.deliver_to_client(ClientId(1), "c".to_string());

        assert_eq!(outbox.take_for(ClientId(1)), vec!["a", "c"]);
        assert_eq!(outbox.take().len(), 1);
        assert!(outbox.take().is_empty());
    }
}
