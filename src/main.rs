mod cli;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use lurebox::config::Config;
use lurebox::decoy::ftp::FtpDecoy;
use lurebox::decoy::ssh::SshDecoy;
use lurebox::decoy::{Listener, SessionHandler};
use lurebox::stats::{summarize, SummaryReport};
use lurebox::store::EventStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    print_banner(&config);

    let store = Arc::new(EventStore::open(&config.log_dir)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let started = Instant::now();

    let handlers: [(u16, Arc<dyn SessionHandler>); 2] = [
        (config.ssh_port, Arc::new(SshDecoy::new(config.tuning))),
        (config.ftp_port, Arc::new(FtpDecoy::new(config.tuning))),
    ];

    let mut listeners = Vec::new();
    for (port, handler) in handlers {
        let protocol = handler.protocol();
        match Listener::bind(protocol, port).await {
            Ok(listener) => {
                let store = Arc::clone(&store);
                let shutdown = shutdown_rx.clone();
                listeners.push(tokio::spawn(async move {
                    if let Err(e) = listener.serve(handler, store, shutdown).await {
                        error!(%protocol, error = %e, "listener failed");
                    }
                }));
            }
            // One decoy failing to bind must not take the other down.
            Err(e) => error!(%protocol, error = %e, "decoy disabled"),
        }
    }
    anyhow::ensure!(!listeners.is_empty(), "no decoy listener could be started");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received; stopping listeners");

    let _ = shutdown_tx.send(true);
    for listener in listeners {
        let _ = listener.await;
    }

    let report = summarize(&store.aggregates());
    print_summary(&report, started.elapsed());
    Ok(())
}

fn print_banner(config: &Config) {
    println!("lurebox — SSH & FTP credential-capture decoy");
    println!(
        "  ssh port : {}\n  ftp port : {}\n  logs     : {}",
        config.ssh_port,
        config.ftp_port,
        config.log_dir.display()
    );
    println!("  press ctrl-c to stop and print the session summary\n");
}

fn print_summary(report: &SummaryReport, runtime: Duration) {
    println!("\n──────────── session summary ────────────");
    println!("runtime          : {}s", runtime.as_secs());
    println!("unique sources   : {}", report.unique_sources);
    println!(
        "attempts         : {} total (ssh {}, ftp {})",
        report.total_attempts, report.ssh_attempts, report.ftp_attempts
    );
    if !report.top_sources.is_empty() {
        println!("top sources:");
        for (rank, entry) in report.top_sources.iter().enumerate() {
            println!(
                "  [{}] {:<39} ssh {:>4} | ftp {:>4}",
                rank + 1,
                entry.source,
                entry.ssh,
                entry.ftp
            );
        }
    }
}
