//! Client Registry
//!
//! Holds one [`Client`] per connected session together with its subscription
//! mode. Lookups go through an id-keyed map; an order list keeps snapshots in
//! connection order.

use std::collections::HashMap;

use super::outbox::ClientId;

/// What a client currently receives
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubscriptionMode {
    /// Command replies and prompts only
    #[default]
    Console,
    /// Live messages from exactly one sender
    Spying(String),
}

impl SubscriptionMode {
    /// Name of the spied sender, if any
    pub fn spied_sender(&self) -> Option<&str> {
        match self {
            SubscriptionMode::Console => None,
            SubscriptionMode::Spying(sender) => Some(sender),
        }
    }
}

/// A connected observer session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: ClientId,
    /// Label used in the prompt, e.g. `Host-7`
    pub display_name: String,
    pub mode: SubscriptionMode,
    /// Carried for future use, no behavior attached
    pub user: String,
    /// Carried for future use, no behavior attached
    pub admin: bool,
}

impl Client {
    fn new(id: ClientId, name_prefix: &str) -> Self {
        Self {
            id,
            display_name: format!("{}{}", name_prefix, id),
            mode: SubscriptionMode::Console,
            user: "Anonymous".to_string(),
            admin: false,
        }
    }

    /// Prompt shown after command replies
    pub fn prompt(&self) -> String {
        format!("\n{}:> ", self.display_name)
    }

    pub fn is_spying(&self, sender: &str) -> bool {
        self.mode.spied_sender() == Some(sender)
    }
}

/// Registry of connected clients
#[derive(Debug)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, Client>,
    order: Vec<ClientId>,
    name_prefix: String,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new("Host-")
    }
}

impl ClientRegistry {
    /// Create a registry deriving display names as `<name_prefix><id>`
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            clients: HashMap::new(),
            order: Vec::new(),
            name_prefix: name_prefix.into(),
        }
    }

    /// Register a client, returning the entry and whether it was created.
    ///
    /// An existing entry is returned unchanged.
    pub fn register(&mut self, id: ClientId) -> (&Client, bool) {
        let created = !self.clients.contains_key(&id);
        if created {
            self.order.push(id);
        }
        let prefix = &self.name_prefix;
        let client = self
            .clients
            .entry(id)
            .or_insert_with(|| Client::new(id, prefix));
        (client, created)
    }

    /// Remove a client; returns the removed entry if it existed
    pub fn unregister(&mut self, id: ClientId) -> Option<Client> {
        let client = self.clients.remove(&id)?;
        self.order.retain(|c| *c != id);
        Some(client)
    }

    pub fn lookup(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Change a client's mode. No-op if the client is unknown.
    pub fn set_mode(&mut self, id: ClientId, mode: SubscriptionMode) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.mode = mode;
        }
    }

    /// Clients in connection order
    pub fn snapshot(&self) -> Vec<Client> {
        self.order
            .iter()
            .filter_map(|id| self.clients.get(id).cloned())
            .collect()
    }

    /// Ids of clients currently spying `sender`, in connection order
    pub fn spying<'a>(&'a self, sender: &'a str) -> impl Iterator<Item = ClientId> + 'a {
        self.order
            .iter()
            .filter_map(move |id| self.clients.get(id))
            .filter(move |client| client.is_spying(sender))
            .map(|client| client.id)
    }

    /// Return every client spying `sender` to console mode.
    ///
    /// Returns how many clients were switched.
    pub fn release_spies(&mut self, sender: &str) -> usize {
        let mut released = 0;
        for client in self.clients.values_mut() {
            if client.is_spying(sender) {
                client.mode = SubscriptionMode::Console;
                released += 1;
            }
        }
        released
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
