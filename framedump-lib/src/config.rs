use crate::error::DumpError;
use crate::registry::DEFAULT_DECODER;
use crate::report::ReportFormat;

/// Immutable run configuration, handed to the driver once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Render every decoded packet to the data channel
    pub render_packets: bool,
    /// Stop after this many frames; zero or negative means unbounded
    pub max_frames: i64,
    /// Registry name of the pipeline to decode with
    pub decoder: String,
    /// Emit a progress report every N frames
    pub report_every: u64,
    /// Render message and raw dump for packets with decode errors
    pub render_errors: bool,
    /// Render per-layer hex dumps instead of the one-line-per-layer summary
    pub dump_verbose: bool,
    pub report_format: ReportFormat,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            render_packets: true,
            max_frames: -1,
            decoder: DEFAULT_DECODER.to_string(),
            report_every: 1000,
            render_errors: false,
            dump_verbose: false,
            report_format: ReportFormat::Text,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), DumpError> {
        if self.report_every == 0 {
            return Err(DumpError::InvalidConfig(
                "report cadence must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Frame limit, if the run is bounded
    pub fn frame_limit(&self) -> Option<u64> {
        (self.max_frames > 0).then_some(self.max_frames as u64)
    }
}
