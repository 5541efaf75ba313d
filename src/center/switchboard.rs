//! Outbound Switchboard
//!
//! Drains the broker's outbound channel and forwards each delivery to the
//! connection writer or sender inbox it is addressed to. Missing or closed
//! targets are dropped: delivery is best-effort.
//!
//! The maps are behind `std::sync::RwLock`: no guard is held across an
//! `.await`, and sender handles must detach from `Drop`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broker::{ClientId, Outbound};

/// Identifies one attachment of a sender inbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxToken(u64);

struct Inbox {
    token: InboxToken,
    tx: mpsc::UnboundedSender<String>,
}

/// Routes outbound deliveries to their collaborators
#[derive(Default)]
pub struct Switchboard {
    /// Connection writers: ClientId → text channel
    writers: RwLock<HashMap<ClientId, mpsc::UnboundedSender<String>>>,
    /// Sender inboxes: sender name → command channel
    inboxes: RwLock<HashMap<String, Inbox>>,
    next_token: AtomicU64,
}

impl Switchboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the writer channel of a connection
    pub fn attach_client(&self, id: ClientId, writer: mpsc::UnboundedSender<String>) {
        self.writers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, writer);
    }

    pub fn detach_client(&self, id: ClientId) {
        self.writers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Attach the command inbox of an application sender.
    ///
    /// Returns `None` if another inbox is already attached under `name`.
    pub fn attach_sender(
        &self,
        name: &str,
        tx: mpsc::UnboundedSender<String>,
    ) -> Option<InboxToken> {
        let mut inboxes = self.inboxes.write().unwrap_or_else(PoisonError::into_inner);
        match inboxes.entry(name.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let token = InboxToken(self.next_token.fetch_add(1, Ordering::Relaxed));
                slot.insert(Inbox { token, tx });
                Some(token)
            }
        }
    }

    /// Detach the inbox of `name` if it is still the one behind `token`
    pub fn detach_sender(&self, name: &str, token: InboxToken) {
        let mut inboxes = self.inboxes.write().unwrap_or_else(PoisonError::into_inner);
        if inboxes.get(name).is_some_and(|inbox| inbox.token == token) {
            inboxes.remove(name);
        }
    }

    /// Drop every writer and inbox, closing their channels
    pub fn detach_all(&self) {
        self.writers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.inboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Forward one delivery
    pub fn route(&self, outbound: Outbound) {
        match outbound {
            Outbound::ToClient { client, text } => {
                let writers = self.writers.read().unwrap_or_else(PoisonError::into_inner);
                match writers.get(&client) {
                    Some(writer) => {
                        if writer.send(text).is_err() {
                            tracing::debug!(client_id = %client, "Writer closed, delivery dropped");
                        }
                    }
                    None => {
                        tracing::debug!(client_id = %client, "No writer attached, delivery dropped");
                    }
                }
            }
            Outbound::ToSender { sender, command } => {
                let inboxes = self.inboxes.read().unwrap_or_else(PoisonError::into_inner);
                match inboxes.get(&sender) {
                    Some(inbox) => {
                        if inbox.tx.send(command).is_err() {
                            tracing::debug!(sender = %sender, "Sender inbox closed, command dropped");
                        }
                    }
                    None => {
                        tracing::debug!(sender = %sender, "No inbox attached, command dropped");
                    }
                }
            }
        }
    }

    /// Spawn the task draining `rx` until every outbox handle is dropped
    pub fn spawn(self: &Arc<Self>, mut rx: mpsc::UnboundedReceiver<Outbound>) -> JoinHandle<()> {
        let switchboard = Arc::clone(self);

        tokio::spawn(async move {
            while let Some(outbound) = rx.recv().await {
                switchboard.route(outbound);
            }
            tracing::debug!("Outbound channel closed, switchboard stopped");
        })
    }

    pub fn writer_count(&self) -> usize {
        self.writers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn inbox_count(&self) -> usize {
        self.inboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
