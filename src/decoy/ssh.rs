//! SSH decoy session state machine.
//!
//! Scripts just enough of an interactive SSH login to coax a credential
//! pair out of an automated client: version banner, login prompt,
//! password prompt, denial. No key exchange ever happens; the exchange is
//! plain text, which is exactly what naive brute-force scripts expect.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use super::{read_trimmed_line, SessionContext, SessionHandler, MAX_SESSION_BYTES};
use crate::config::SessionTuning;
use crate::event::{AttackEvent, Protocol};
use crate::store::EventStore;

/// Version banner presented to connecting clients.
const BANNER: &str = "SSH-2.0-OpenSSH_8.2p1 Ubuntu-4ubuntu0.5\r\n";

/// Hostname shown in the password prompt.
const FAKE_HOST: &str = "web-prod-03";

pub struct SshDecoy {
    tuning: SessionTuning,
}

impl SshDecoy {
    pub fn new(tuning: SessionTuning) -> Self {
        Self { tuning }
    }
}

#[async_trait]
impl SessionHandler for SshDecoy {
    fn protocol(&self) -> Protocol {
        Protocol::Ssh
    }

    async fn handle(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        store: Arc<EventStore>,
    ) -> Result<()> {
        run_session(stream, peer, &store, self.tuning).await
    }
}

/// Drive one scripted SSH exchange.
///
/// States: GREETED -> AWAIT_USERNAME -> AWAIT_PASSWORD -> DONE. An empty
/// line, a disconnect, or an idle timeout at either prompt ends the
/// session with no event; only a completed username+password exchange is
/// recorded, exactly once.
pub async fn run_session<S>(
    stream: S,
    peer: SocketAddr,
    store: &EventStore,
    tuning: SessionTuning,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ctx = SessionContext::new(Protocol::Ssh, peer);
    let (read_half, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half).take(MAX_SESSION_BYTES);

    writer.write_all(BANNER.as_bytes()).await?;
    tokio::time::sleep(tuning.prompt_delay).await;
    writer.write_all(b"login as: ").await?;

    let username = match read_trimmed_line(&mut reader, tuning.idle_timeout).await? {
        Some(line) if !line.is_empty() => line,
        _ => {
            debug!(session = %ctx.session_id, %peer, "peer left before username");
            return Ok(());
        }
    };
    ctx.username = Some(username.clone());

    writer
        .write_all(format!("{username}@{FAKE_HOST}'s password: ").as_bytes())
        .await?;

    let password = match read_trimmed_line(&mut reader, tuning.idle_timeout).await? {
        Some(line) if !line.is_empty() => line,
        _ => {
            debug!(session = %ctx.session_id, %peer, "peer left before password");
            return Ok(());
        }
    };

    let event = AttackEvent::new(Protocol::Ssh, peer, username, password, "Brute-force");
    if let Err(e) = store.record(&event) {
        debug!(session = %ctx.session_id, error = %e, "event persistence degraded");
    }

    tokio::time::sleep(tuning.denial_delay).await;
    writer.write_all(b"Access denied\r\n").await?;
    Ok(())
}
