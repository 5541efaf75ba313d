//! Sender Registry
//!
//! Tracks the names of application senders currently attached to the broker.
//! Registration order is kept so `list` always prints senders the way they
//! arrived.

use std::collections::HashSet;

/// Registry of known sender names
#[derive(Debug, Default)]
pub struct SenderRegistry {
    /// Names in registration order
    order: Vec<String>,
    /// Fast membership checks
    names: HashSet<String>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sender if not already present.
    ///
    /// Returns `true` if the name was newly added.
    pub fn register(&mut self, name: &str) -> bool {
        if !self.names.insert(name.to_string()) {
            return false;
        }
        self.order.push(name.to_string());
        true
    }

    /// Remove a sender if present.
    ///
    /// Returns `true` if the name was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        if !self.names.remove(name) {
            return false;
        }
        self.order.retain(|n| n != name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Sender names in registration order
    pub fn snapshot(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
