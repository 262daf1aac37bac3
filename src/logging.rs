//! Tracing subscriber setup

use std::fs::{File, OpenOptions};
use std::io;
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Value of `--logFile` that selects standard output
pub const STDOUT: &str = "stdout";

/// Where log lines go
#[derive(Debug)]
pub enum LogSink {
    Stdout,
    File(File),
}

impl LogSink {
    /// Open `target` for appending, or stdout for [`STDOUT`]
    pub fn open(target: &str) -> io::Result<Self> {
        if target == STDOUT {
            return Ok(LogSink::Stdout);
        }

        let file = OpenOptions::new().create(true).append(true).open(target)?;
        Ok(LogSink::File(file))
    }

    fn into_writer(self) -> BoxMakeWriter {
        match self {
            LogSink::Stdout => BoxMakeWriter::new(io::stdout),
            LogSink::File(file) => BoxMakeWriter::new(Mutex::new(file)),
        }
    }
}

fn crate_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Install the global subscriber
///
/// A log file that cannot be opened is not fatal: logging falls back to
/// stdout and the failure is the first thing logged.
pub fn init(verbose: bool, log_file: &str) {
    let (sink, open_error) = match LogSink::open(log_file) {
        Ok(sink) => (sink, None),
        Err(e) => (LogSink::Stdout, Some(e)),
    };

    let level = crate_level(verbose);
    let filter = filter::Targets::new().with_targets(vec![
        ("sql_exporter", level),
        ("tower_http", level),
    ]);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(sink.into_writer())
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();

    if let Some(e) = open_error {
        warn!("could not open log file {log_file}, logging to stdout: {e}");
    }
}
