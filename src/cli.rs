use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use lurebox::config::{Config, SessionTuning};

/// lurebox — SSH & FTP credential-capture decoy service.
///
/// Listens on two fake service ports, scripts a plausible login exchange
/// with anything that connects, and records every submitted credential
/// pair into JSON and CSV capture logs.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "lurebox",
    version,
    about = "SSH & FTP credential-capture decoy service",
    long_about = None,
)]
pub struct Cli {
    /// TCP port for the SSH-like decoy.
    #[arg(short = 's', long = "ssh-port", value_name = "PORT", default_value_t = 2222)]
    pub ssh_port: u16,

    /// TCP port for the FTP-like decoy.
    #[arg(short = 'f', long = "ftp-port", value_name = "PORT", default_value_t = 2121)]
    pub ftp_port: u16,

    /// Directory the timestamped JSON/CSV capture logs are written to.
    ///
    /// Created if it does not exist.
    #[arg(short = 'l', long = "log-dir", value_name = "DIR", default_value = "capture_logs")]
    pub log_dir: PathBuf,

    /// Seconds a connected-but-silent peer may hold a session open.
    #[arg(long = "idle-timeout", value_name = "SECS", default_value_t = 30)]
    pub idle_timeout: u64,

    /// Milliseconds to pause before prompts, mimicking real auth latency.
    #[arg(long = "prompt-delay", value_name = "MS", default_value_t = 500)]
    pub prompt_delay_ms: u64,

    /// Milliseconds to pause before the final denial response.
    #[arg(long = "denial-delay", value_name = "MS", default_value_t = 1000)]
    pub denial_delay_ms: u64,
}

impl Cli {
    pub fn into_config(self) -> Config {
        Config {
            ssh_port: self.ssh_port,
            ftp_port: self.ftp_port,
            log_dir: self.log_dir,
            tuning: SessionTuning {
                prompt_delay: Duration::from_millis(self.prompt_delay_ms),
                denial_delay: Duration::from_millis(self.denial_delay_ms),
                idle_timeout: Duration::from_secs(self.idle_timeout),
            },
        }
    }
}
