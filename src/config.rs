//! Runtime configuration for the decoy service.

use std::path::PathBuf;
use std::time::Duration;

/// Service-wide settings, normally derived from the CLI in `main.rs`.
///
/// The port defaults deliberately mimic the non-privileged analogues of
/// the real services (2222/2121) so the decoy never needs elevated
/// privileges to bind.
#[derive(Debug, Clone)]
pub struct Config {
    pub ssh_port: u16,
    pub ftp_port: u16,
    /// Directory the timestamped JSON/CSV capture logs are written to.
    pub log_dir: PathBuf,
    pub tuning: SessionTuning,
}

/// Per-session pacing and hardening knobs shared by both decoy protocols.
#[derive(Debug, Clone, Copy)]
pub struct SessionTuning {
    /// Pause before prompts, mimicking real authentication latency.
    pub prompt_delay: Duration,
    /// Pause before the final denial response.
    pub denial_delay: Duration,
    /// A peer that stays silent longer than this ends the session. Keeps
    /// a connected-but-idle client from holding a task forever.
    pub idle_timeout: Duration,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            prompt_delay: Duration::from_millis(500),
            denial_delay: Duration::from_millis(1000),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ssh_port: 2222,
            ftp_port: 2121,
            log_dir: PathBuf::from("capture_logs"),
            tuning: SessionTuning::default(),
        }
    }
}
