//! FTP decoy session state machine.
//!
//! Speaks just enough RFC 959 to walk a client through USER/PASS and
//! capture the pair: welcome banner, `331` after USER, `530` after PASS.
//! Everything else ends the session.

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

const WELCOME: &str = "220-Welcome to Vault FTP Service\r\n220 Please enter credentials.\r\n";

/// The slice of the FTP command vocabulary the decoy reacts to.
///
/// Keywords match case-insensitively; the argument is everything after the
/// first run of whitespace. Missing arguments take the defaults real
/// servers tolerate (`anonymous` for USER, empty for PASS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtpCommand {
    User(String),
    Pass(String),
    Quit,
    Other(String),
}

impl FtpCommand {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let mut parts = input.splitn(2, char::is_whitespace);
        let keyword = parts.next().unwrap_or_default().to_uppercase();
        let arg = parts.next().map(str::trim);

        match keyword.as_str() {
            "USER" => FtpCommand::User(arg.unwrap_or("anonymous").to_string()),
            "PASS" => FtpCommand::Pass(arg.unwrap_or("").to_string()),
            "QUIT" => FtpCommand::Quit,
            _ => FtpCommand::Other(input.to_string()),
        }
    }
}

pub struct FtpDecoy {
    tuning: SessionTuning,
}

impl FtpDecoy {
    pub fn new(tuning: SessionTuning) -> Self {
        Self { tuning }
    }
}

#[async_trait]
impl SessionHandler for FtpDecoy {
    fn protocol(&self) -> Protocol {
        Protocol::Ftp
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

/// Drive one scripted FTP exchange.
///
/// States: GREETED -> AWAIT_USER -> AWAIT_PASS -> DONE. Every completed
/// USER/PASS pair yields exactly one recorded event. A `PASS` arriving
/// before any `USER` is rejected by closing the connection with no event,
/// as is any other out-of-vocabulary input.
pub async fn run_session<S>(
    stream: S,
    peer: SocketAddr,
    store: &EventStore,
    tuning: SessionTuning,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ctx = SessionContext::new(Protocol::Ftp, peer);
    let (read_half, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half).take(MAX_SESSION_BYTES);

    writer.write_all(WELCOME.as_bytes()).await?;

    // AWAIT_USER
    let line = match read_trimmed_line(&mut reader, tuning.idle_timeout).await? {
        Some(line) => line,
        None => return Ok(()),
    };
    match FtpCommand::parse(&line) {
        FtpCommand::User(name) => {
            ctx.username = Some(name);
            tokio::time::sleep(tuning.prompt_delay).await;
            writer.write_all(b"331 Password required\r\n").await?;
        }
        FtpCommand::Quit => {
            writer.write_all(b"221 Goodbye\r\n").await?;
            return Ok(());
        }
        other => {
            debug!(session = %ctx.session_id, %peer, ?other, "closing on out-of-order command");
            return Ok(());
        }
    }

    // AWAIT_PASS
    let line = match read_trimmed_line(&mut reader, tuning.idle_timeout).await? {
        Some(line) => line,
        None => return Ok(()),
    };
    match FtpCommand::parse(&line) {
        FtpCommand::Pass(password) => {
            let username = ctx.username.take().unwrap_or_default();
            let event = AttackEvent::new(Protocol::Ftp, peer, username, password, "Incursion");
            if let Err(e) = store.record(&event) {
                debug!(session = %ctx.session_id, error = %e, "event persistence degraded");
            }
            tokio::time::sleep(tuning.denial_delay).await;
            writer.write_all(b"530 Login incorrect\r\n").await?;
        }
        other => {
            debug!(session = %ctx.session_id, %peer, ?other, "closing without credentials");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_tuning() -> SessionTuning {
        SessionTuning {
            prompt_delay: Duration::ZERO,
            denial_delay: Duration::ZERO,
            idle_timeout: Duration::from_millis(200),
        }
    }

    fn peer() -> SocketAddr {
        "203.0.113.6:50021".parse().unwrap()
    }

    #[test]
    fn test_parse_user_with_argument() {
        assert_eq!(
            FtpCommand::parse("USER admin"),
            FtpCommand::User("admin".to_string())
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            FtpCommand::parse("user admin"),
            FtpCommand::User("admin".to_string())
        );
        assert_eq!(
            FtpCommand::parse("pAsS secret"),
            FtpCommand::Pass("secret".to_string())
        );
    }

    #[test]
    fn test_parse_user_defaults_to_anonymous() {
        assert_eq!(
            FtpCommand::parse("USER"),
            FtpCommand::User("anonymous".to_string())
        );
    }

    #[test]
    fn test_parse_pass_defaults_to_empty() {
        assert_eq!(FtpCommand::parse("PASS"), FtpCommand::Pass(String::new()));
    }

    #[test]
    fn test_parse_unknown_is_other() {
        assert_eq!(
            FtpCommand::parse("FEAT"),
            FtpCommand::Other("FEAT".to_string())
        );
        assert_eq!(FtpCommand::parse(""), FtpCommand::Other(String::new()));
    }

    async fn drive(script: &'static [&'static str], store: &EventStore) -> String {
        let (client, server) = tokio::io::duplex(1024);

        let session = run_session(server, peer(), store, fast_tuning());
        let client_side = async {
            let mut client = client;
            for line in script {
                client.write_all(line.as_bytes()).await.unwrap();
                client.write_all(b"\r\n").await.unwrap();
            }
            client.shutdown().await.unwrap();
            let mut replies = String::new();
            client.read_to_string(&mut replies).await.unwrap();
            replies
        };

        let (result, replies) = tokio::join!(session, client_side);
        result.unwrap();
        replies
    }

    #[tokio::test]
    async fn test_user_pass_records_one_event() {
        let store = EventStore::with_sinks(vec![]);

        let replies = drive(&["USER backup", "PASS s3cret"], &store).await;

        assert!(replies.starts_with("220-"));
        assert!(replies.contains("331 Password required"));
        assert!(replies.contains("530 Login incorrect"));

        let aggregates = store.aggregates();
        assert_eq!(aggregates[&peer().ip()].ftp, 1);
    }

    #[tokio::test]
    async fn test_pass_without_user_is_rejected() {
        let store = EventStore::with_sinks(vec![]);

        let replies = drive(&["PASS s3cret"], &store).await;

        assert!(!replies.contains("530"));
        assert!(store.aggregates().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_after_user_records_nothing() {
        let store = EventStore::with_sinks(vec![]);

        let replies = drive(&["USER backup"], &store).await;

        assert!(replies.contains("331 Password required"));
        assert!(store.aggregates().is_empty());
    }

    #[tokio::test]
    async fn test_quit_closes_politely_without_event() {
        let store = EventStore::with_sinks(vec![]);

        let replies = drive(&["QUIT"], &store).await;

        assert!(replies.contains("221 Goodbye"));
        assert!(store.aggregates().is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_command_closes_without_event() {
        let store = EventStore::with_sinks(vec![]);

        let replies = drive(&["SYST"], &store).await;

        assert!(!replies.contains("331"));
        assert!(store.aggregates().is_empty());
    }

    #[tokio::test]
    async fn test_pass_after_user_uses_captured_username() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        drive(&["USER svc-deploy", "PASS rotate-me"], &store).await;

        let json = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| p.extension().is_some_and(|e| e == "json"))
            .unwrap();
        let doc: crate::store::sink::CaptureDocument =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();

        assert_eq!(doc.attacks.len(), 1);
        assert_eq!(doc.attacks[0].username, "svc-deploy");
        assert_eq!(doc.attacks[0].password, "rotate-me");
    }
}
