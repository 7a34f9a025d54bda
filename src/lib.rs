//! LureBox decoy service library.
//!
//! Exposes fake SSH-like and FTP-like endpoints that script just enough of
//! each protocol's login exchange to extract a credential pair from
//! automated brute-force clients, then records every attempt into durable
//! logs and in-memory per-source statistics.
//!
//! The crate is split along the lines a deployment cares about:
//! [`decoy`] holds the accept loops and per-protocol session state
//! machines, [`store`] the append-only event persistence and aggregates,
//! and [`stats`] the shutdown summary. The binary in `main.rs` wires these
//! together and owns all presentation.

pub mod config;
pub mod decoy;
pub mod event;
pub mod stats;
pub mod store;

pub use config::Config;
pub use event::{AttackEvent, Protocol};
pub use stats::{summarize, SummaryReport};
pub use store::EventStore;
