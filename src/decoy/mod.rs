//! Decoy listeners and per-protocol session handlers.

pub mod ftp;
pub mod ssh;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncBufRead};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::event::Protocol;
use crate::store::EventStore;

/// Upper bound on bytes read from a single session. A decoy exchange is a
/// handful of short lines; anything past this is a hostile or broken peer.
pub(crate) const MAX_SESSION_BYTES: u64 = 8 * 1024;

/// Per-connection ephemeral state. Created on accept, dropped when the
/// handler returns; never shared across connections.
#[derive(Debug)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub peer: SocketAddr,
    pub protocol: Protocol,
    pub username: Option<String>,
}

impl SessionContext {
    pub fn new(protocol: Protocol, peer: SocketAddr) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            peer,
            protocol,
            username: None,
        }
    }
}

/// Seam between the accept loop and the protocol state machines.
///
/// The listener only ever spawns through this trait, so admission control
/// (a bounded pool, a semaphore) can be added around `handle` without
/// touching the state machines.
#[async_trait]
pub trait SessionHandler: Send + Sync + 'static {
    fn protocol(&self) -> Protocol;

    /// Run one scripted exchange over an accepted connection. Errors are
    /// session-local; the listener logs and discards them.
    async fn handle(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        store: Arc<EventStore>,
    ) -> Result<()>;
}

/// Per-protocol accept loop.
pub struct Listener {
    inner: TcpListener,
    protocol: Protocol,
}

impl Listener {
    /// Bind the decoy port. Failure here (port in use, permission denied)
    /// is fatal to this protocol's listener and is surfaced to the caller.
    pub async fn bind(protocol: Protocol, port: u16) -> Result<Self> {
        let inner = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("binding {protocol} decoy to port {port}"))?;
        info!(%protocol, port = inner.local_addr()?.port(), "decoy listening");
        Ok(Self { inner, protocol })
    }

    /// Actual bound address; tests bind port 0 and read the port back.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accept connections until the shutdown channel flips, dispatching
    /// each to a concurrently running session handler.
    ///
    /// Sessions are independent: a handler error is logged and dropped,
    /// never fed back into the loop. In-flight sessions are not awaited on
    /// shutdown; they run to completion bounded by their idle timeouts.
    pub async fn serve(
        self,
        handler: Arc<dyn SessionHandler>,
        store: Arc<EventStore>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                result = self.inner.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!(protocol = %self.protocol, %peer, "connection accepted");
                            let handler = Arc::clone(&handler);
                            let store = Arc::clone(&store);
                            tokio::spawn(async move {
                                if let Err(e) = handler.handle(stream, peer, store).await {
                                    debug!(%peer, error = %e, "session ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            // Transient accept failures (EMFILE, peer reset
                            // during the handshake) must not kill the loop.
                            warn!(protocol = %self.protocol, error = %e, "accept failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!(protocol = %self.protocol, "listener stopping");
                    return Ok(());
                }
            }
        }
    }
}

/// Read one line from the peer, bounded by the session idle timeout.
///
/// Returns `Ok(None)` when the peer disconnected or went silent past the
/// timeout; both end the session with no event. The returned line is
/// trimmed of the CRLF and surrounding whitespace.
pub(crate) async fn read_trimmed_line<R>(
    reader: &mut R,
    idle_timeout: Duration,
) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    match tokio::time::timeout(idle_timeout, reader.read_line(&mut line)).await {
        Ok(Ok(0)) => Ok(None),
        Ok(Ok(_)) => Ok(Some(line.trim().to_string())),
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn test_read_trimmed_line_strips_crlf() {
        let (client, server) = tokio::io::duplex(256);
        let mut reader = BufReader::new(server);

        let mut client = client;
        client.write_all(b"  admin\r\n").await.unwrap();

        let line = read_trimmed_line(&mut reader, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(line.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_read_trimmed_line_none_on_disconnect() {
        let (client, server) = tokio::io::duplex(256);
        let mut reader = BufReader::new(server);
        drop(client);

        let line = read_trimmed_line(&mut reader, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(line, None);
    }

    #[tokio::test]
    async fn test_read_trimmed_line_none_on_idle_timeout() {
        let (_client, server) = tokio::io::duplex(256);
        let mut reader = BufReader::new(server);

        let line = read_trimmed_line(&mut reader, Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(line, None);
    }
}
