//! Shutdown statistics derived from the event store's aggregates.

use std::net::IpAddr;

use crate::store::AggregateStats;

/// How many offending sources the summary ranks.
pub const TOP_SOURCES: usize = 5;

/// One ranked entry in the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopSource {
    pub source: IpAddr,
    pub ssh: u64,
    pub ftp: u64,
    pub total: u64,
}

/// Session-level totals plus the top offending sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryReport {
    pub unique_sources: usize,
    pub ssh_attempts: u64,
    pub ftp_attempts: u64,
    pub total_attempts: u64,
    pub top_sources: Vec<TopSource>,
}

/// Pure reduction of an aggregate snapshot into a report.
///
/// Sources are ranked by combined attempt count, descending; ties break by
/// ascending source address so the ranking is deterministic. Rendering the
/// report is the caller's concern.
pub fn summarize(aggregates: &AggregateStats) -> SummaryReport {
    let mut ssh_attempts = 0;
    let mut ftp_attempts = 0;

    // BTreeMap iteration is address-ordered; the stable sort below then
    // yields the deterministic tie-break.
    let mut ranked: Vec<TopSource> = aggregates
        .iter()
        .map(|(source, counts)| {
            ssh_attempts += counts.ssh;
            ftp_attempts += counts.ftp;
            TopSource {
                source: *source,
                ssh: counts.ssh,
                ftp: counts.ftp,
                total: counts.total(),
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.total.cmp(&a.total));
    ranked.truncate(TOP_SOURCES);

    SummaryReport {
        unique_sources: aggregates.len(),
        ssh_attempts,
        ftp_attempts,
        total_attempts: ssh_attempts + ftp_attempts,
        top_sources: ranked,
    }
}
