//! Message Broker Core
//!
//! In-process broker between application senders and observer clients.
//!
//! ## Architecture
//!
//! - **SenderRegistry**: names of attached senders
//! - **ClientRegistry**: connected sessions and their subscription mode
//! - **CommandProcessor**: console protocol state machine
//! - **MessageRouter**: fan-out of sender messages to spying clients
//! - **Broker**: facade serializing everything behind one lock
//!
//! Every inbound call holds the lock for its whole duration. Deliveries are
//! handed to an [`Outbox`] and never written inline, and log events are
//! emitted only after the lock is released.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use msgcenter::broker::{Broker, BrokerConfig, ClientId, RecordingOutbox, SubscriptionMode};
//!
//! let outbox = Arc::new(RecordingOutbox::new());
//! let broker = Broker::new(BrokerConfig::default(), outbox.clone());
//!
//! broker.add_sender("app1");
//! broker.add_client(ClientId(1));
//! broker.send_command("spy app1", ClientId(1));
//! broker.post_message("hello", "app1", false);
//!
//! assert_eq!(
//!     broker.client(ClientId(1)).unwrap().mode,
//!     SubscriptionMode::Spying("app1".into())
//! );
//! assert_eq!(outbox.take_for(ClientId(1)).last().unwrap(), "app1: hello");
//! ```

mod clients;
mod command;
mod outbox;
mod router;
mod senders;

pub use clients::{Client, ClientRegistry, SubscriptionMode};
pub use command::{Command, CommandProcessor, Outcome, EXIT_SIGNAL, HELP_TEXT};
pub use outbox::{ChannelOutbox, ClientId, Outbound, Outbox, RecordingOutbox};
pub use router::MessageRouter;
pub use senders::SenderRegistry;

use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Broker behavior settings
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Title shown in the welcome message
    #[serde(default = "default_banner")]
    pub banner: String,

    /// Client display names are `<prefix><id>`
    #[serde(default = "default_display_name_prefix")]
    pub display_name_prefix: String,

    /// Return spies of a removed sender to console mode
    #[serde(default)]
    pub release_spies_on_sender_removal: bool,
}

fn default_banner() -> String {
    "Message Center 1.0".to_string()
}

fn default_display_name_prefix() -> String {
    "Host-".to_string()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            banner: default_banner(),
            display_name_prefix: default_display_name_prefix(),
            release_spies_on_sender_removal: false,
        }
    }
}

/// State guarded by the broker lock
struct BrokerState {
    clients: ClientRegistry,
    senders: SenderRegistry,
}

/// Thread-safe broker facade
pub struct Broker {
    state: Mutex<BrokerState>,
    processor: CommandProcessor,
    router: MessageRouter,
    outbox: Arc<dyn Outbox>,
    release_spies: bool,
}

impl Broker {
    /// Create a broker delivering through `outbox`
    pub fn new(config: BrokerConfig, outbox: Arc<dyn Outbox>) -> Self {
        Self {
            state: Mutex::new(BrokerState {
                clients: ClientRegistry::new(config.display_name_prefix),
                senders: SenderRegistry::new(),
            }),
            processor: CommandProcessor::new(config.banner),
            router: MessageRouter::new(),
            outbox,
            release_spies: config.release_spies_on_sender_removal,
        }
    }

    // Registry updates never leave the state half-written, so a panic in
    // another holder does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a client session.
    ///
    /// A new client is greeted with the banner, help and prompt. Returns
    /// `false` if the id was already registered.
    pub fn add_client(&self, id: ClientId) -> bool {
        let created = {
            let mut state = self.lock();
            let (client, created) = state.clients.register(id);
            if created {
                let welcome = self.processor.welcome(&client.prompt());
                self.outbox.deliver_to_client(id, welcome);
            }
            created
        };

        if created {
            tracing::info!(client_id = %id, "Client registered");
        }
        created
    }

    /// Remove a client session; no-op if unknown
    pub fn remove_client(&self, id: ClientId) -> bool {
        let removed = self.lock().clients.unregister(id).is_some();
        if removed {
            tracing::info!(client_id = %id, "Client unregistered");
        }
        removed
    }

    /// Register a sender name; no-op if already present
    pub fn add_sender(&self, name: &str) -> bool {
        let added = self.lock().senders.register(name);
        if added {
            tracing::info!(sender = %name, "Sender registered");
        }
        added
    }

    /// Remove a sender name; no-op if absent.
    ///
    /// Clients spying the sender keep their mode unless
    /// `release_spies_on_sender_removal` is set.
    pub fn remove_sender(&self, name: &str) -> bool {
        let released = {
            let mut state = self.lock();
            if !state.senders.unregister(name) {
                return false;
            }
            self.release_spies.then(|| state.clients.release_spies(name))
        };

        match released {
            Some(released) => tracing::info!(sender = %name, released, "Sender unregistered"),
            None => tracing::info!(sender = %name, "Sender unregistered"),
        }
        true
    }

    /// Process one line of console input from `client`
    pub fn send_command(&self, text: &str, client: ClientId) {
        let outcome = {
            let mut state = self.lock();
            let BrokerState { clients, senders } = &mut *state;
            self.processor
                .execute(text, client, clients, senders, self.outbox.as_ref())
        };

        match outcome {
            Outcome::Ignored => {
                tracing::debug!(client_id = %client, "Command from unknown client ignored");
            }
            Outcome::Replied(kind) => {
                tracing::trace!(client_id = %client, command = kind, "Command processed");
            }
            Outcome::Spying(sender) => {
                tracing::debug!(client_id = %client, sender = %sender, "Client spying");
            }
            Outcome::Relayed { sender, command } => {
                tracing::debug!(
                    client_id = %client,
                    sender = %sender,
                    command = %command,
                    "Relayed command to sender"
                );
            }
        }
    }

    /// Publish `text` from `sender` to every client spying it.
    ///
    /// Returns the number of clients the message was handed to.
    pub fn post_message(&self, text: &str, sender: &str, prepend_line_break: bool) -> usize {
        let delivered = {
            let state = self.lock();
            self.router.route(
                text,
                sender,
                prepend_line_break,
                &state.clients,
                self.outbox.as_ref(),
            )
        };

        if delivered > 0 {
            tracing::trace!(sender = %sender, subscribers = delivered, "Routed message");
        }
        delivered
    }

    /// Copy of a client's current entry
    pub fn client(&self, id: ClientId) -> Option<Client> {
        self.lock().clients.lookup(id).cloned()
    }

    /// All clients in connection order
    pub fn clients(&self) -> Vec<Client> {
        self.lock().clients.snapshot()
    }

    /// Sender names in registration order
    pub fn senders(&self) -> Vec<String> {
        self.lock().senders.snapshot()
    }

    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }
}
