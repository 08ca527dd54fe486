//! # TareLog — serial scale data logger
//!
//! Connects to a laboratory scale over a serial port, timestamps every line
//! it emits, and durably writes batches to sharded (or flat) delimited
//! output. Runs one session per invocation; Ctrl-C stops it cleanly with a
//! final flush.
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! TARELOG_PORT        Serial port              (default: /dev/ttyUSB0)
//! TARELOG_BAUD        Baud rate                (default: 9600)
//! TARELOG_TIMEOUT_MS  Serial read timeout      (default: 200)
//! TARELOG_OUT         Output location          (default: "readings")
//! TARELOG_FORMAT      "sharded" or "flat"      (default: inferred — a
//!                     `.csv` path means flat, anything else sharded)
//! TARELOG_BATCH       Rows buffered per flush  (default: 500)
//! TARELOG_SHARD_ROWS  Rows per shard           (default: 800000)
//! TARELOG_REFRESH_MS  Status refresh interval  (default: 500)
//! ```
//!
//! ## Example
//!
//! ```text
//! $ TARELOG_PORT=/dev/ttyUSB0 TARELOG_OUT=trial-7 tarelog
//! tarelog started (port=/dev/ttyUSB0, baud=9600, out=trial-7, batch=500, shard_rows=800000)
//! [connecting]
//! [active]
//! shard 1 | 1500 rows committed (+214 buffered) | last: 119.98 g
//! saved 500 rows to shard 1
//! ^C[stopped]
//! session ended: stop requested (4 flushes, 1714 rows committed, 0 lost)
//! ```

use std::time::Duration;

use anyhow::Result;
use config::{Config, OutputFormat};
use session::{
    SessionController, SessionEvent, SessionSummary, StatusObserver, StopFlag,
};
use sink::{DurableSink, FlatCsvSink, ShardedCsvSink};
use source::SerialLineSource;

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn config_from_env() -> Config {
    let defaults = Config::default();

    let port = env_or("TARELOG_PORT", &defaults.port);
    let baud = env_or("TARELOG_BAUD", "9600").parse().unwrap_or(9600);
    let timeout_ms: u64 = env_or("TARELOG_TIMEOUT_MS", "200").parse().unwrap_or(200);
    let output = std::path::PathBuf::from(env_or("TARELOG_OUT", "readings"));
    let format = match env_or("TARELOG_FORMAT", "").as_str() {
        "flat" => OutputFormat::Flat,
        "sharded" => OutputFormat::Sharded,
        // Infer from the output location: a .csv path is a flat file.
        _ if output.extension().map(|e| e == "csv").unwrap_or(false) => OutputFormat::Flat,
        _ => OutputFormat::Sharded,
    };
    let batch_threshold = env_or("TARELOG_BATCH", "500").parse().unwrap_or(500);
    let shard_capacity = env_or("TARELOG_SHARD_ROWS", "800000")
        .parse()
        .unwrap_or(800_000);
    let refresh_ms: u64 = env_or("TARELOG_REFRESH_MS", "500").parse().unwrap_or(500);

    Config {
        port,
        baud,
        read_timeout: Duration::from_millis(timeout_ms),
        output,
        format,
        batch_threshold,
        shard_capacity,
        refresh_interval: Duration::from_millis(refresh_ms),
        ..defaults
    }
}

/// Console consumer of the status interface; the stand-in for the dashboard.
struct ConsoleObserver;

impl StatusObserver for ConsoleObserver {
    fn notify(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::StateChanged(state) => println!("[{state}]"),
            SessionEvent::Status(s) => {
                let last = s.last_reading.as_deref().unwrap_or("-");
                println!(
                    "shard {} | {} rows committed (+{} buffered) | last: {}",
                    s.shard_index, s.committed_rows, s.buffered_rows, last
                );
            }
            SessionEvent::Flushed { shard_index, rows } => {
                println!("saved {rows} rows to shard {shard_index}");
            }
            SessionEvent::Warning(msg) => eprintln!("warning: {msg}"),
            SessionEvent::Fatal(msg) => eprintln!("error: {msg}"),
            SessionEvent::DataLoss { rows } => {
                eprintln!("DATA LOSS: {rows} readings could not be written");
            }
        }
    }
}

fn run_session<S: DurableSink>(sink: S, cfg: &Config, stop: &StopFlag) -> SessionSummary {
    let controller = SessionController::new(sink, cfg.clone());
    let mut observer = ConsoleObserver;
    let (port, baud, timeout) = (cfg.port.clone(), cfg.baud, cfg.read_timeout);
    controller.run(
        move || SerialLineSource::open(&port, baud, timeout),
        &mut observer,
        stop,
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = config_from_env();

    let stop = StopFlag::new();
    signal_hook::flag::register(signal_hook::consts::SIGINT, stop.shared())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, stop.shared())?;

    println!(
        "tarelog started (port={}, baud={}, out={}, batch={}, shard_rows={})",
        cfg.port,
        cfg.baud,
        cfg.output.display(),
        cfg.batch_threshold,
        cfg.shard_capacity
    );

    let summary = match cfg.format {
        OutputFormat::Sharded => {
            let sink = ShardedCsvSink::new(&cfg.output, cfg.shard_capacity)?;
            run_session(sink, &cfg, &stop)
        }
        OutputFormat::Flat => {
            let sink = FlatCsvSink::new(&cfg.output)?;
            run_session(sink, &cfg, &stop)
        }
    };

    println!(
        "session ended: {} ({} flushes, {} rows committed, {} lost)",
        summary.reason, summary.flushes, summary.rows_committed, summary.rows_lost
    );
    Ok(())
}
