use std::io::Write;
use strum_macros::Display;

use crate::error::DumpError;
use crate::stats::StatsSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum ReportFormat {
    #[default]
    #[strum(to_string = "text")]
    Text,
    #[strum(to_string = "json")]
    Json,
}

/// True when a progress report is due after `processed` frames.
///
/// Reports land on every multiple of `report_every`, plus the frame that
/// ends a bounded run.
pub fn should_report(processed: u64, report_every: u64, done: bool) -> bool {
    done || (report_every > 0 && processed % report_every == 0)
}

/// The human-readable progress line for a snapshot
pub fn report_line(snapshot: &StatsSnapshot) -> String {
    format!(
        "Processed {} packets ({} bytes) in {:?}, {} errors and {} truncated packets",
        snapshot.processed, snapshot.total_bytes, snapshot.elapsed, snapshot.errors, snapshot.truncated
    )
}

/// Formats snapshots and writes them to the diagnostics channel.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    format: ReportFormat,
    emitted: u64,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format, emitted: 0 }
    }

    pub fn format(&self, snapshot: &StatsSnapshot) -> Result<String, DumpError> {
        match self.format {
            ReportFormat::Text => Ok(report_line(snapshot)),
            ReportFormat::Json => Ok(serde_json::to_string(snapshot)?),
        }
    }

    pub fn emit<W: Write>(&mut self, out: &mut W, snapshot: &StatsSnapshot) -> Result<(), DumpError> {
        let line = self.format(snapshot)?;
        writeln!(out, "{}", line)?;
        self.emitted += 1;
        Ok(())
    }

    /// Number of reports written so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}
