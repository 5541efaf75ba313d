//! Message Router
//!
//! Fans a sender's message out to every client spying that sender. Nothing is
//! buffered: with no spies the message is dropped.

use super::clients::ClientRegistry;
use super::outbox::Outbox;

/// Routes sender messages to spying clients
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageRouter;

impl MessageRouter {
    pub fn new() -> Self {
        Self
    }

    /// Format a message as clients see it
    pub fn format(text: &str, sender: &str, prepend_line_break: bool) -> String {
        let line_break = if prepend_line_break { "\n" } else { "" };
        format!("{}{}: {}", line_break, sender, text)
    }

    /// Deliver `text` from `sender` to its spies.
    ///
    /// Returns the number of clients the message was handed to.
    pub fn route(
        &self,
        text: &str,
        sender: &str,
        prepend_line_break: bool,
        clients: &ClientRegistry,
        outbox: &dyn Outbox,
    ) -> usize {
        let message = Self::format(text, sender, prepend_line_break);

        let mut delivered = 0;
        for client in clients.spying(sender) {
            outbox.deliver_to_client(client, message.clone());
            delivered += 1;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::clients::SubscriptionMode;
    use crate::broker::outbox::{ClientId, RecordingOutbox};

    #[test]
    fn test_format() {
        assert_eq!(MessageRouter::format("hello", "app1", false), "app1: hello");
        assert_eq!(MessageRouter::format("hello", "app1", true), "\napp1: hello");
    }

    #[test]
    fn test_route_only_to_matching_spies() {
        let mut clients = ClientRegistry::default();
        for id in 1..=4 {
            clients.register(ClientId(id));
        }
        clients.set_mode(ClientId(1), SubscriptionMode::Spying("app1".into()));
        clients.set_mode(ClientId(2), SubscriptionMode::Spying("app2".into()));
        clients.set_mode(ClientId(4), SubscriptionMode::Spying("app1".into()));

        let outbox = RecordingOutbox::new();
        let delivered = MessageRouter::new().route("tick", "app1", true, &clients, &outbox);

        assert_eq!(delivered, 2);
        assert_eq!(outbox.take_for(ClientId(1)), vec!["\napp1: tick"]);
        assert_eq!(outbox.take_for(ClientId(4)), vec!["\napp1: tick"]);
        assert!(outbox.take().is_empty());
    }

    #[test]
    fn test_route_without_spies_drops_message() {
        let mut clients = ClientRegistry::default();
        clients.register(ClientId(1));

        let outbox = RecordingOutbox::new();
        let delivered = MessageRouter::new().route("lost", "app1", false, &clients, &outbox);

        assert_eq!(delivered, 0);
        assert!(outbox.take().is_empty());
    }
}
