//! TCP Line Server
//!
//! Accepts plain TCP connections (telnet, `nc`) and attaches each one to the
//! message center as a client session.
//!
//! ## Usage
//!
//! ```text
//! $ nc localhost 7070
//!
//! Message Center 1.0
//! ...
//! Host-1:> list
//!    - system
//!
//! Host-1:> spy system
//! system: alive 12
//! ```

mod connection;

use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use crate::broker::ClientId;
use crate::center::MessageCenter;

/// TCP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of concurrent sessions
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Longer input lines are truncated
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7070
}

fn default_max_connections() -> usize {
    256
}

fn default_max_line_bytes() -> usize {
    4096
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string to bind to
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Errors that can occur in the TCP server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bind a listener for `config`
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr = config.addr();
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Accept connections until `shutdown` completes.
///
/// Open sessions are not closed when this returns; call
/// [`MessageCenter::shutdown`] for that.
pub async fn serve<F>(
    center: Arc<MessageCenter>,
    listener: TcpListener,
    config: &ServerConfig,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()>,
{
    tracing::info!("Message center listening on {}", listener.local_addr()?);

    let next_id = AtomicU64::new(1);
    let active = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        let (mut stream, peer) = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    continue;
                }
            },
        };

        let Some(slot) = SessionSlot::acquire(&active, config.max_connections) else {
            tracing::warn!(peer = %peer, limit = config.max_connections, "Connection refused");
            let _ = stream
                .write_all(format!("Too many connections (limit: {})\n", config.max_connections).as_bytes())
                .await;
            continue;
        };

        let id = ClientId(next_id.fetch_add(1, Ordering::Relaxed));
        tracing::info!(client_id = %id, peer = %peer, "Connection accepted");

        let center = Arc::clone(&center);
        let max_line_bytes = config.max_line_bytes;
        tokio::spawn(async move {
            let _slot = slot;
            connection::handle_connection(stream, id, center, max_line_bytes).await;
            tracing::info!(client_id = %id, "Connection closed");
        });
    }

    tracing::info!("Listener stopped");
    Ok(())
}

/// Counts one live session; released on drop
struct SessionSlot {
    active: Arc<AtomicUsize>,
}

impl SessionSlot {
    fn acquire(active: &Arc<AtomicUsize>, limit: usize) -> Option<Self> {
        active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then_some(n + 1))
            .ok()?;
        Some(Self {
            active: Arc::clone(active),
        })
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerConfig;
    use std::net::SocketAddr;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;
    use tokio::time::{timeout, Duration};

    async fn start_server(
        config: ServerConfig,
    ) -> (Arc<MessageCenter>, SocketAddr, oneshot::Sender<()>) {
        let center = Arc::new(MessageCenter::new(BrokerConfig::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server_center = Arc::clone(&center);
        tokio::spawn(async move {
            serve(server_center, listener, &config, async {
                let _ = stop_rx.await;
            })
            .await
            .unwrap();
        });

        (center, addr, stop_tx)
    }

    /// Read until the accumulated output contains `needle`
    async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
        let mut seen = Vec::new();
        let mut chunk = [0u8; 1024];

        timeout(Duration::from_secs(2), async {
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before {:?} arrived", needle);
                seen.extend_from_slice(&chunk[..n]);
                if String::from_utf8_lossy(&seen).contains(needle) {
                    break;
                }
            }
        })
        .await
        .expect("timed out waiting for output");

        String::from_utf8(seen).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:7070");
        assert_eq!(config.max_connections, 256);
        assert_eq!(config.max_line_bytes, 4096);
    }

    #[test]
    fn test_session_slot_limit() {
        let active = Arc::new(AtomicUsize::new(0));

        let first = SessionSlot::acquire(&active, 2).unwrap();
        let _second = SessionSlot::acquire(&active, 2).unwrap();
        assert!(SessionSlot::acquire(&active, 2).is_none());

        drop(first);
        assert!(SessionSlot::acquire(&active, 2).is_some());
    }

    #[tokio::test]
    async fn test_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            port: taken.local_addr().unwrap().port(),
            ..ServerConfig::default()
        };

        let err = bind(&config).await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_session_ping_and_echo() {
        let (_center, addr, _stop) = start_server(ServerConfig::default()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let welcome = read_until(&mut stream, ":> ").await;
        assert!(welcome.contains("Message Center 1.0"));
        assert!(welcome.contains("Host-1:> "));

        stream.write_all(b"ping\r\n").await.unwrap();
        assert_eq!(read_until(&mut stream, "pong").await, "pong");

        stream.write_all(b"xyzzy\n").await.unwrap();
        assert_eq!(read_until(&mut stream, "xyzzy").await, "xyzzy");
    }

    #[tokio::test]
    async fn test_session_spies_sender() {
        let (center, addr, _stop) = start_server(ServerConfig::default()).await;
        let app = center.register_sender("app1").unwrap();
        let mut stream = TcpStream::connect(addr).await.unwrap();
        read_until(&mut stream, ":> ").await;

        stream.write_all(b"spy app1\n").await.unwrap();

        // Wait for the spy command to be processed
        timeout(Duration::from_secs(2), async {
            while center.broker().clients().iter().all(|c| c.mode.spied_sender() != Some("app1")) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        app.post("hello");
        assert_eq!(read_until(&mut stream, "hello").await, "app1: hello");
    }

    #[tokio::test]
    async fn test_exit_closes_session() {
        let (center, addr, _stop) = start_server(ServerConfig::default()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        read_until(&mut stream, ":> ").await;

        stream.write_all(b"EXIT\n").await.unwrap();

        let mut rest = Vec::new();
        timeout(Duration::from_secs(2), stream.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert!(rest.is_empty());

        timeout(Duration::from_secs(2), async {
            while center.broker().client_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let config = ServerConfig {
            max_connections: 1,
            ..ServerConfig::default()
        };
        let (_center, addr, _stop) = start_server(config).await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        read_until(&mut first, ":> ").await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        let refused = read_until(&mut second, "\n").await;
        assert_eq!(refused, "Too many connections (limit: 1)\n");
    }
}
