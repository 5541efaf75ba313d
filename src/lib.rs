//! # msgcenter
//!
//! In-process message center: application components ("senders") publish
//! text messages, and console clients connected over TCP pick one sender to
//! spy on, list senders, and relay commands back to them.
//!
//! ## Modules
//!
//! - [`broker`]: registries, command protocol and routing behind one lock
//! - [`center`]: outbound switchboard and application-side sender handles
//! - [`server`]: TCP line server attaching connections as clients
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use msgcenter::{server, BrokerConfig, MessageCenter, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let center = Arc::new(MessageCenter::new(BrokerConfig::default()));
//!
//!     // Publish from the application
//!     let worker = center.register_sender("worker")?;
//!     worker.post("starting");
//!
//!     // Serve console clients until Ctrl-C
//!     let config = ServerConfig::default();
//!     let listener = server::bind(&config).await?;
//!     server::serve(Arc::clone(&center), listener, &config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     center.shutdown();
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod center;
pub mod config;
pub mod server;

pub use broker::{
    Broker, BrokerConfig, ChannelOutbox, Client, ClientId, Command, Outbound, Outbox,
    SubscriptionMode,
};

pub use center::{MessageCenter, SenderError, SenderHandle};

pub use server::{ServerConfig, ServerError};

pub use config::{Config, ConfigError, HeartbeatConfig, LoggingConfig};
