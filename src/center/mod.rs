//! Message Center
//!
//! Wires the [`Broker`] to its collaborators:
//!
//! - **Switchboard**: forwards outbound deliveries to connection writers and
//!   sender inboxes
//! - **SenderHandle**: application-side endpoint for one sender
//!
//! ## Example
//!
//! ```rust,no_run
//! use msgcenter::broker::BrokerConfig;
//! use msgcenter::center::MessageCenter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let center = MessageCenter::new(BrokerConfig::default());
//!     let mut worker = center.register_sender("worker")?;
//!
//!     worker.post("started");
//!     while let Some(command) = worker.recv_command().await {
//!         worker.post(&format!("got {}", command));
//!     }
//!     Ok(())
//! }
//! ```

mod handle;
mod switchboard;

pub use handle::{SenderError, SenderHandle};
pub use switchboard::{InboxToken, Switchboard};

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::broker::{Broker, BrokerConfig, ChannelOutbox};

/// Broker plus the task delivering its output
pub struct MessageCenter {
    broker: Arc<Broker>,
    switchboard: Arc<Switchboard>,
    dispatch: JoinHandle<()>,
}

impl MessageCenter {
    /// Create a message center.
    ///
    /// Must be called inside a tokio runtime: the dispatch task is spawned
    /// immediately.
    pub fn new(config: BrokerConfig) -> Self {
        let (outbox, rx) = ChannelOutbox::new();
        let broker = Arc::new(Broker::new(config, Arc::new(outbox)));
        let switchboard = Arc::new(Switchboard::new());
        let dispatch = switchboard.spawn(rx);

        Self {
            broker,
            switchboard,
            dispatch,
        }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    pub fn switchboard(&self) -> &Arc<Switchboard> {
        &self.switchboard
    }

    /// Register a named sender and return its handle
    pub fn register_sender(&self, name: &str) -> Result<SenderHandle, SenderError> {
        SenderHandle::attach(name, Arc::clone(&self.broker), Arc::clone(&self.switchboard))
    }

    /// Stop dispatching and close every connection writer and sender inbox
    pub fn shutdown(&self) {
        self.dispatch.abort();
        self.switchboard.detach_all();
        tracing::info!("Message center stopped");
    }
}

impl Drop for MessageCenter {
    fn drop(&mut self) {
        self.dispatch.abort();
    }
}
