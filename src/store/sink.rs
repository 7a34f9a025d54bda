//! Durable log sinks for captured attack events.
//!
//! Two formats are maintained side by side: a structured JSON document
//! (one object holding the session start and every event, rewritten
//! atomically on each append) and a tabular CSV file (header plus one row
//! appended per event, never rewritten). The [`LogSink`] trait is the
//! seam the event store is tested through.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::AttackEvent;

/// Errors from persisting an event to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Append-only destination for attack events.
pub trait LogSink: Send {
    /// Durably append one event. Implementations must leave the sink in a
    /// consistent state on failure so a later append can still succeed.
    fn append(&mut self, event: &AttackEvent) -> Result<(), SinkError>;

    /// Short name used when reporting a degraded sink.
    fn name(&self) -> &'static str;
}

/// On-disk document shape of the structured log.
#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureDocument {
    pub session_start: DateTime<Utc>,
    pub attacks: Vec<AttackEvent>,
}

/// Structured JSON sink.
///
/// The whole document is rewritten through a temp-file rename on every
/// append, so readers never observe a torn document.
pub struct JsonLogSink {
    path: PathBuf,
    document: CaptureDocument,
}

impl JsonLogSink {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let mut sink = Self {
            path: path.into(),
            document: CaptureDocument {
                session_start: Utc::now(),
                attacks: Vec::new(),
            },
        };
        sink.rewrite()?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rewrite(&mut self) -> Result<(), SinkError> {
        let json = serde_json::to_string_pretty(&self.document)?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, json.as_bytes())?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl LogSink for JsonLogSink {
    fn append(&mut self, event: &AttackEvent) -> Result<(), SinkError> {
        self.document.attacks.push(event.clone());
        if let Err(e) = self.rewrite() {
            // Keep the document consistent with what is actually on disk.
            self.document.attacks.pop();
            return Err(e);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Tabular CSV sink. Header written once at creation, rows appended and
/// flushed per event.
pub struct CsvLogSink {
    writer: csv::Writer<File>,
}

/// Column order of the tabular log.
const CSV_HEADER: [&str; 8] = [
    "Timestamp",
    "Protocol",
    "Source_IP",
    "Source_Port",
    "Username",
    "Password",
    "Success",
    "Additional_Info",
];

impl CsvLogSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }
}

impl LogSink for CsvLogSink {
    fn append(&mut self, event: &AttackEvent) -> Result<(), SinkError> {
        self.writer.write_record([
            event.timestamp.to_rfc3339().as_str(),
            event.protocol.as_str(),
            event.source_ip.to_string().as_str(),
            event.source_port.to_string().as_str(),
            event.username.as_str(),
            event.password.as_str(),
            if event.success { "true" } else { "false" },
            event.additional_info.as_str(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Protocol;
    use std::net::SocketAddr;
    use tempfile::tempdir;

    fn event(user: &str, pass: &str) -> AttackEvent {
        let peer: SocketAddr = "198.51.100.7:52121".parse().unwrap();
        AttackEvent::new(Protocol::Ftp, peer, user, pass, "Incursion")
    }

    #[test]
    fn test_json_sink_starts_with_empty_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.json");

        JsonLogSink::create(&path).unwrap();

        let doc: CaptureDocument =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(doc.attacks.is_empty());
    }

    #[test]
    fn test_json_sink_appends_events_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.json");
        let mut sink = JsonLogSink::create(&path).unwrap();

        sink.append(&event("admin", "admin")).unwrap();
        sink.append(&event("root", "123456")).unwrap();

        let doc: CaptureDocument =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc.attacks.len(), 2);
        assert_eq!(doc.attacks[0].username, "admin");
        assert_eq!(doc.attacks[1].password, "123456");
    }

    #[test]
    fn test_json_sink_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.json");
        let mut sink = JsonLogSink::create(&path).unwrap();

        sink.append(&event("admin", "admin")).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_csv_sink_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.csv");
        let mut sink = CsvLogSink::create(&path).unwrap();

        sink.append(&event("admin", "hunter2")).unwrap();
        sink.append(&event("guest", "guest")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Timestamp,Protocol,Source_IP,Source_Port,Username,Password,Success,Additional_Info"
        );
        assert!(lines[1].contains("hunter2"));
        assert!(lines[2].contains("guest"));
    }

    #[test]
    fn test_csv_sink_quotes_hostile_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.csv");
        let mut sink = CsvLogSink::create(&path).unwrap();

        sink.append(&event("a,b", "line\nbreak")).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[4], "a,b");
        assert_eq!(&row[5], "line\nbreak");
    }
}
