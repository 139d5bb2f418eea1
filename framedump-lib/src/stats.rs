use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};

/// Running totals for one driver run.
///
/// Only ever incremented; the driver decides when each counter moves.
#[derive(Debug, Clone)]
pub struct RunState {
    processed: u64,
    total_bytes: u64,
    errors: u64,
    truncated: u64,
    start: Instant,
}

impl RunState {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(start: Instant) -> Self {
        Self {
            processed: 0,
            total_bytes: 0,
            errors: 0,
            truncated: 0,
            start,
        }
    }

    /// Count one consumed frame of `len` bytes
    pub fn record_frame(&mut self, len: usize) {
        self.processed += 1;
        self.total_bytes += len as u64;
    }

    pub fn record_truncated(&mut self) {
        self.truncated += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn truncated(&self) -> u64 {
        self.truncated
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// Freeze the counters with elapsed time measured up to `now`
    pub fn snapshot_at(&self, now: Instant) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed,
            total_bytes: self.total_bytes,
            elapsed: now.saturating_duration_since(self.start),
            errors: self.errors,
            truncated: self.truncated,
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of a [`RunState`], the input to every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub processed: u64,
    pub total_bytes: u64,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub errors: u64,
    pub truncated: u64,
}

fn serialize_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}
