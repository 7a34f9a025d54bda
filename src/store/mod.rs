//! Append-only event store with in-memory per-source aggregates.

pub mod sink;

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::event::{AttackEvent, Protocol};
use sink::{CsvLogSink, JsonLogSink, LogSink, SinkError};

/// Per-protocol attempt counters for one source address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolCounts {
    pub ssh: u64,
    pub ftp: u64,
}

impl ProtocolCounts {
    pub fn total(&self) -> u64 {
        self.ssh + self.ftp
    }

    fn increment(&mut self, protocol: Protocol) {
        match protocol {
            Protocol::Ssh => self.ssh += 1,
            Protocol::Ftp => self.ftp += 1,
        }
    }
}

/// Aggregate snapshot handed to the statistics reporter. BTreeMap keeps
/// source ordering deterministic for tie-breaking.
pub type AggregateStats = BTreeMap<IpAddr, ProtocolCounts>;

struct SinkSlot {
    sink: Box<dyn LogSink>,
    /// Set after the first failed append so the operator warning fires once.
    degraded: bool,
}

struct StoreInner {
    sinks: Vec<SinkSlot>,
    aggregates: AggregateStats,
}

/// Thread-safe recorder of attack events.
///
/// One lock guards both the durable sinks and the aggregate counters, so
/// from any reader's perspective the append and the increment happen as a
/// single unit: persisted records are never interleaved and increments are
/// never lost. Constructed once in `main` and passed to every session
/// handler; never a process-wide singleton.
pub struct EventStore {
    inner: Mutex<StoreInner>,
}

impl EventStore {
    /// Open a store writing timestamped JSON and CSV capture logs under
    /// `log_dir`, creating the directory if needed.
    pub fn open(log_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let log_dir = log_dir.as_ref();
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("creating log directory {}", log_dir.display()))?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let json_path = log_dir.join(format!("lurebox_{stamp}.json"));
        let csv_path = log_dir.join(format!("lurebox_{stamp}.csv"));

        let json = JsonLogSink::create(&json_path)
            .with_context(|| format!("initializing {}", json_path.display()))?;
        let csv = CsvLogSink::create(&csv_path)
            .with_context(|| format!("initializing {}", csv_path.display()))?;

        info!(
            json = %json_path.display(),
            csv = %csv_path.display(),
            "capture logs initialized"
        );

        Ok(Self::with_sinks(vec![Box::new(json), Box::new(csv)]))
    }

    /// Build a store over arbitrary sinks. This is the injection seam the
    /// tests use; an empty sink list yields a purely in-memory store.
    pub fn with_sinks(sinks: Vec<Box<dyn LogSink>>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                sinks: sinks
                    .into_iter()
                    .map(|sink| SinkSlot {
                        sink,
                        degraded: false,
                    })
                    .collect(),
                aggregates: AggregateStats::new(),
            }),
        }
    }

    /// Record one captured credential exchange.
    ///
    /// The event is appended to every sink, then the aggregate count for
    /// `(source_ip, protocol)` is incremented. The increment happens even
    /// when a sink fails, so statistics stay usable while durable logging
    /// is degraded; the first failure per sink is surfaced with a warning
    /// and the error is also returned to the caller.
    pub fn record(&self, event: &AttackEvent) -> Result<(), SinkError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let mut first_error = None;
        for slot in &mut inner.sinks {
            match slot.sink.append(event) {
                Ok(()) => {}
                Err(e) => {
                    if slot.degraded {
                        debug!(sink = slot.sink.name(), error = %e, "sink still degraded");
                    } else {
                        slot.degraded = true;
                        warn!(
                            sink = slot.sink.name(),
                            error = %e,
                            "event log degraded; continuing with in-memory statistics"
                        );
                    }
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        inner
            .aggregates
            .entry(event.source_ip)
            .or_default()
            .increment(event.protocol);
        let attempts = inner.aggregates[&event.source_ip].total();

        info!(
            protocol = %event.protocol,
            source = %event.source_ip,
            port = event.source_port,
            username = %event.username,
            attempts,
            "credential attempt captured"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Point-in-time snapshot of the aggregates. Taken under the same lock
    /// as `record`, so no partially applied increment is ever visible.
    pub fn aggregates(&self) -> AggregateStats {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .aggregates
            .clone()
    }
}
