use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, trace};

use crate::classify::{self, Classification};
use crate::config::RunConfig;
use crate::decode::Pipeline;
use crate::error::DumpError;
use crate::frame::Frame;
use crate::registry;
use crate::render;
use crate::report::{self, Reporter};
use crate::source::FrameSource;
use crate::stats::{RunState, StatsSnapshot};

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The configured frame limit was reached
    Limit,
    /// The source ran out of frames
    Exhausted,
    /// The source failed; counters up to that point still stand
    SourceFailed(String),
    /// A stop was requested between frames
    Interrupted,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Limit => write!(f, "frame limit reached"),
            EndReason::Exhausted => write!(f, "source exhausted"),
            EndReason::SourceFailed(msg) => write!(f, "source failed: {}", msg),
            EndReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    pub reports: u64,
    pub end: EndReason,
}

/// The decode-classify-aggregate-report loop.
///
/// Construction resolves the decoder and validates the configuration, so a
/// bad configuration fails before any frame is pulled.
#[derive(Debug, Clone)]
pub struct Driver {
    config: RunConfig,
    pipeline: Pipeline,
    stop: Option<Arc<AtomicBool>>,
}

impl Driver {
    pub fn new(config: RunConfig) -> Result<Self, DumpError> {
        config.validate()?;
        let pipeline = registry::resolve(&config.decoder)?;
        Ok(Self {
            config,
            pipeline,
            stop: None,
        })
    }

    /// Stop the run before the next pull once `stop` is set
    pub fn with_stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|stop| stop.load(Ordering::Relaxed))
    }

    /// Pull frames until the limit is reached, the source ends or a stop is
    /// requested.
    ///
    /// Rendered packets and dumps go to `data`; progress lines go to
    /// `diagnostics`. Only a failure to write to either channel is returned
    /// as an error.
    pub fn run<S, D, E>(&self, source: &mut S, data: &mut D, diagnostics: &mut E) -> Result<RunSummary, DumpError>
    where
        S: FrameSource + ?Sized,
        D: Write,
        E: Write,
    {
        let limit = self.config.frame_limit();
        let mut state = RunState::new();
        let mut reporter = Reporter::new(self.config.report_format);

        info!(decoder = %self.pipeline.name(), limit = ?limit, "Starting run");
        writeln!(diagnostics, "Starting to read packets")?;

        let end = loop {
            if self.stop_requested() {
                info!(processed = state.processed(), "Stop requested");
                break EndReason::Interrupted;
            }
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break EndReason::Exhausted,
                Err(e) => {
                    error!(processed = state.processed(), "Frame source failed: {}", e);
                    break EndReason::SourceFailed(e.to_string());
                }
            };

            self.process(&frame, &mut state, data)?;

            let done = limit.is_some_and(|n| state.processed() >= n);
            if report::should_report(state.processed(), self.config.report_every, done) {
                reporter.emit(diagnostics, &state.snapshot())?;
            }
            if done {
                break EndReason::Limit;
            }
        };

        data.flush()?;
        diagnostics.flush()?;

        let summary = RunSummary {
            stats: state.snapshot(),
            reports: reporter.emitted(),
            end,
        };
        debug!(processed = summary.stats.processed, reports = summary.reports, end = %summary.end, "Run finished");
        Ok(summary)
    }

    /// Decode, count, classify and optionally render one frame.
    fn process<D: Write>(&self, frame: &Frame, state: &mut RunState, data: &mut D) -> Result<Classification, DumpError> {
        let packet = self.pipeline.decode_frame(frame);
        state.record_frame(frame.len());

        if self.config.render_packets {
            let text = if self.config.dump_verbose {
                render::render_dump(&packet)
            } else {
                render::render_packet(&packet)
            };
            writeln!(data, "{}", text)?;
        }

        let classification = classify::classify(frame, &packet);
        if classification.truncated {
            state.record_truncated();
        }
        if let Some(message) = &classification.error {
            state.record_error();
            trace!(frame = state.processed(), %message, "Decode error");
            if self.config.render_errors {
                writeln!(data, "Error: {}", message)?;
                writeln!(data, "--- Packet ---")?;
                writeln!(data, "{}", render::render_raw(frame.data()))?;
            }
        }

        Ok(classification)
    }
}
