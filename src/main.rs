use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinError;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use framedump_lib::report::ReportFormat;
use framedump_lib::{Driver, EndReason, PcapSource, RunConfig, RunSummary, registry};

/// How long a stopped run may take to finish its current frame
const STOP_GRACE: Duration = Duration::from_secs(1);

/// Decode captured packets layer by layer and report running statistics.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Capture file to read (pcap or pcapng), or `-` for standard input.
    #[arg(short = 'r', long = "read", value_name = "FILE", required_unless_present = "list_decoders")]
    read: Option<PathBuf>,
    /// Print each decoded packet.
    #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
    print: bool,
    /// Stop after this many packets; zero or negative reads until the end.
    #[arg(short = 'c', long = "count", default_value_t = -1, allow_negative_numbers = true)]
    count: i64,
    /// Decoder for the outermost layer (see --list-decoders).
    #[arg(long, default_value = registry::DEFAULT_DECODER)]
    decoder: String,
    /// Print statistics every N packets.
    #[arg(long = "stats", default_value_t = 1000, value_name = "N")]
    stats: u64,
    /// Hex dump every layer of each printed packet.
    #[arg(short = 'X')]
    dump: bool,
    /// Print the error and raw bytes of packets that fail to decode.
    #[arg(long)]
    errors: bool,
    /// Write statistics as JSON lines instead of text.
    #[arg(long)]
    json_stats: bool,
    /// List the available decoders and exit.
    #[arg(long)]
    list_decoders: bool,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            render_packets: self.print,
            max_frames: self.count,
            decoder: self.decoder.clone(),
            report_every: self.stats,
            render_errors: self.errors,
            dump_verbose: self.dump,
            report_format: if self.json_stats {
                ReportFormat::Json
            } else {
                ReportFormat::Text
            },
        }
    }
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    // stdout carries packet output, so console logs go to stderr
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if cli.list_decoders {
        for name in registry::names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = cli.run_config();
    debug!(?config, "Run configuration");
    let driver = match Driver::new(config) {
        Ok(driver) => driver,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let path = cli.read.context("No capture given, use -r <file> or -r - for stdin")?;
    let source = PcapSource::open(&path).with_context(|| format!("Failed to open capture {:?}", path))?;

    let stop = Arc::new(AtomicBool::new(false));
    let driver = driver.with_stop(Arc::clone(&stop));

    // The loop blocks on reads; keep it off the runtime so Ctrl+C is still seen
    let mut dump = tokio::task::spawn_blocking(move || run_dump(&driver, source));

    let finished = tokio::select! {
        res = &mut dump => Some(res),
        _ = signal::ctrl_c() => None,
    };

    let res = match finished {
        Some(res) => res,
        None => {
            info!("Ctrl+C received, stopping.");
            stop.store(true, Ordering::Relaxed);
            match tokio::time::timeout(STOP_GRACE, dump).await {
                Ok(res) => res,
                Err(_) => {
                    // Still blocked inside a read; the runtime would wait on it forever
                    warn!("Capture read did not return, exiting without a summary");
                    drop(guard);
                    process::exit(0);
                }
            }
        }
    };
    finish(res)
}

fn finish(res: Result<Result<RunSummary>, JoinError>) -> Result<()> {
    match res.context("Dump task panicked")? {
        Ok(summary) => log_summary(&summary),
        Err(e) => {
            error!("Dump failed: {:?}", e);
            process::exit(1);
        }
    }
    Ok(())
}

fn run_dump(driver: &Driver, mut source: PcapSource) -> Result<RunSummary> {
    let mut data = io::stdout().lock();
    let mut diagnostics = io::stderr();
    let summary = driver
        .run(&mut source, &mut data, &mut diagnostics)
        .context("Failed to write output")?;
    debug!(frames_read = source.frames_read(), "Capture closed");
    Ok(summary)
}

fn log_summary(summary: &RunSummary) {
    let stats = &summary.stats;
    match &summary.end {
        EndReason::SourceFailed(reason) => warn!(
            processed = stats.processed,
            errors = stats.errors,
            truncated = stats.truncated,
            "Stopped early, capture could not be read further: {}",
            reason
        ),
        end => info!(
            processed = stats.processed,
            bytes = stats.total_bytes,
            errors = stats.errors,
            truncated = stats.truncated,
            reports = summary.reports,
            "Done ({})",
            end
        ),
    }
}
