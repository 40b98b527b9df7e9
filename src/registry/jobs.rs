//! Job entries and the registry that tracks them.
//!
//! A job is one OPEN session. Entries are refreshed by CHECK, removed by
//! CLOSE, and evicted by the periodic sweep once their last check is older
//! than the stale threshold. Sessions with the same program code and seat
//! slot share a pool; `count_seats` is what the seat cap is compared with.

use crate::clock::format_epoch;
use crate::program::ProgramCode;
use crate::protocol::models::RequestType;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr};

/// One open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEntry {
    /// Host claim as sent, `:suffix` included.
    pub host: String,
    /// User on the requesting host.
    pub user: String,
    /// Requesting process id.
    pub pid: u32,
    /// Address the connection came from.
    pub peer_addr: IpAddr,
    /// Address claimed in the request.
    pub addr: Ipv4Addr,
    /// Program the session was granted.
    pub program: ProgramCode,
    /// Seat pool the session counts against, if capped.
    pub slot: Option<u8>,
    /// Last request type seen for this session.
    #[serde(skip)]
    pub req_type: RequestType,
    /// Server time of the OPEN.
    pub opened_at: u32,
    /// Server time of the latest OPEN or CHECK.
    pub last_check: u32,
}

impl JobEntry {
    /// One listing line.
    pub fn describe(&self) -> String {
        let slot = match self.slot {
            Some(slot) => slot.to_string(),
            None => "-".to_string(),
        };
        format!(
            "{} {} pid={} program={} slot={} addr={} peer={} last={} opened={} checked={}",
            self.host,
            self.user,
            self.pid,
            self.program,
            slot,
            self.addr,
            self.peer_addr,
            self.req_type.name(),
            format_epoch(self.opened_at),
            format_epoch(self.last_check),
        )
    }
}

/// The daemon's session table.
#[derive(Debug, Default)]
pub struct JobRegistry {
    entries: Vec<JobEntry>,
}

impl JobRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new session. Every OPEN adds an entry, even for a host and
    /// pid already present, so each one holds a seat.
    pub fn insert(&mut self, entry: JobEntry) {
        tracing::debug!(
            host = %entry.host,
            pid = entry.pid,
            program = %entry.program,
            "job registered"
        );
        self.entries.push(entry);
    }

    /// Mark the session for `host`/`pid`/`program` as alive at `now`.
    ///
    /// Returns `false` when no such session exists.
    pub fn refresh(&mut self, host: &str, pid: u32, program: ProgramCode, now: u32) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.host == host && e.pid == pid && e.program == program)
        {
            Some(entry) => {
                entry.last_check = now;
                entry.req_type = RequestType::Check;
                true
            }
            None => false,
        }
    }

    /// Remove the oldest session for `host`/`pid`.
    pub fn remove(&mut self, host: &str, pid: u32) -> Option<JobEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.host == host && e.pid == pid)?;
        let entry = self.entries.remove(index);
        tracing::debug!(host = %entry.host, pid = entry.pid, "job removed");
        Some(entry)
    }

    /// Evict every session whose last check is more than `stale` seconds
    /// before `now`. Returns the evicted entries.
    pub fn sweep(&mut self, now: u32, stale: u32) -> Vec<JobEntry> {
        let (evicted, kept): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|e| now.saturating_sub(e.last_check) > stale);
        self.entries = kept;
        evicted
    }

    /// Live sessions in the pool identified by `program` and `slot`.
    pub fn count_seats(&self, program: ProgramCode, slot: u8) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.program == program && e.slot == Some(slot))
            .count() as u32
    }

    /// Listing lines, oldest session first.
    pub fn dump_lines(&self) -> Vec<String> {
        self.entries.iter().map(JobEntry::describe).collect()
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no session is open.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Open sessions, oldest first.
    pub fn entries(&self) -> &[JobEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(host: &str, pid: u32, program: ProgramCode, slot: Option<u8>, at: u32) -> JobEntry {
        JobEntry {
            host: host.to_string(),
            user: "alice".to_string(),
            pid,
            peer_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            addr: Ipv4Addr::new(192, 168, 0, 1),
            program,
            slot,
            req_type: RequestType::Open,
            opened_at: at,
            last_check: at,
        }
    }

    #[test]
    fn test_count_seats_per_pool() {
        let mut reg = JobRegistry::new();
        reg.insert(entry("a", 1, ProgramCode::Xic, Some(0), 10));
        reg.insert(entry("b", 2, ProgramCode::Xic, Some(0), 10));
        reg.insert(entry("c", 3, ProgramCode::Xic, Some(4), 10));
        reg.insert(entry("d", 4, ProgramCode::Xiv, Some(0), 10));
        reg.insert(entry("e", 5, ProgramCode::Xic, None, 10));

        assert_eq!(reg.count_seats(ProgramCode::Xic, 0), 2);
        assert_eq!(reg.count_seats(ProgramCode::Xic, 4), 1);
        assert_eq!(reg.count_seats(ProgramCode::Xiv, 0), 1);
        assert_eq!(reg.count_seats(ProgramCode::Oa, 0), 0);
    }

    #[test]
    fn test_duplicate_open_holds_two_seats() {
        let mut reg = JobRegistry::new();
        reg.insert(entry("a", 1, ProgramCode::Xic, Some(0), 10));
        reg.insert(entry("a", 1, ProgramCode::Xic, Some(0), 11));
        assert_eq!(reg.count_seats(ProgramCode::Xic, 0), 2);

        assert!(reg.remove("a", 1).is_some());
        assert_eq!(reg.count_seats(ProgramCode::Xic, 0), 1);
        assert_eq!(reg.entries()[0].opened_at, 11);
    }

    #[test]
    fn test_remove_unknown() {
        let mut reg = JobRegistry::new();
        reg.insert(entry("a", 1, ProgramCode::Xic, None, 10));
        assert!(reg.remove("a", 2).is_none());
        assert!(reg.remove("b", 1).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_sweep_boundary() {
        let mut reg = JobRegistry::new();
        reg.insert(entry("a", 1, ProgramCode::Xic, None, 1_000));

        // Exactly at the threshold the entry survives.
        assert!(reg.sweep(1_900, 900).is_empty());
        assert_eq!(reg.len(), 1);

        let evicted = reg.sweep(1_901, 900);
        assert_eq!(evicted.len(), 1);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_refresh_extends_life() {
        let mut reg = JobRegistry::new();
        reg.insert(entry("a", 1, ProgramCode::Xic, None, 1_000));

        assert!(reg.refresh("a", 1, ProgramCode::Xic, 1_800));
        assert!(!reg.refresh("a", 1, ProgramCode::Xiv, 1_800));
        assert!(!reg.refresh("a", 9, ProgramCode::Xic, 1_800));

        assert!(reg.sweep(2_000, 900).is_empty());
        assert_eq!(reg.entries()[0].req_type, RequestType::Check);
    }

    #[test]
    fn test_dump_lines() {
        let mut reg = JobRegistry::new();
        reg.insert(entry("build1", 42, ProgramCode::Xic, Some(0), 0));
        let lines = reg.dump_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("build1 alice pid=42 program=XIC slot=0"));
    }
}
