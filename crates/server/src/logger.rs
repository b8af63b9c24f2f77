//! Logger initialization.
//!
//! Dispatches to stderr (colored when attached to a terminal) and,
//! optionally, to a flat log file, both governed by the same filter string
//! (e.g. `"info"` or `"server=debug"`).

use std::{
    fmt::Write as _,
    fs::{File, OpenOptions},
    io::{IsTerminal, Write as _},
    str::FromStr,
    sync::{Mutex, Once},
};

use jiff::{Zoned, tz::TimeZone};
use logforth::{
    append::{Append, Stderr},
    filter::EnvFilter,
    layout::Layout,
};

static INIT: Once = Once::new();

#[derive(Debug)]
struct UtcLayout {
    no_color: bool,
}

impl UtcLayout {
    fn new() -> Self {
        Self { no_color: false }
    }

    fn no_color(mut self) -> Self {
        self.no_color = true;
        self
    }
}

impl Layout for UtcLayout {
    fn format(
        &self,
        record: &log::Record<'_>,
        _diagnostics: &[Box<dyn logforth::diagnostic::Diagnostic>],
    ) -> anyhow::Result<Vec<u8>> {
        let mut output = String::new();
        let now = Zoned::now().with_time_zone(TimeZone::UTC);
        write!(output, "{} ", now.strftime("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level_str = if self.no_color {
            format!("{:>5}", record.level())
        } else {
            match record.level() {
                log::Level::Error => format!("\x1b[31m{:>5}\x1b[0m", record.level()),
                log::Level::Warn => format!("\x1b[33m{:>5}\x1b[0m", record.level()),
                log::Level::Info => format!("\x1b[32m{:>5}\x1b[0m", record.level()),
                log::Level::Debug => format!("\x1b[34m{:>5}\x1b[0m", record.level()),
                log::Level::Trace => format!("\x1b[35m{:>5}\x1b[0m", record.level()),
            }
        };
        write!(output, "{level_str}  {}", record.args())?;
        Ok(output.into_bytes())
    }
}

/// An [`Append`] that writes plain (uncolored) UTC-timestamped lines to an
/// already-open file, appending one line per record.
#[derive(Debug)]
struct FileAppender {
    file: Mutex<File>,
}

impl Append for FileAppender {
    fn append(
        &self,
        record: &log::Record<'_>,
        _diagnostics: &[Box<dyn logforth::diagnostic::Diagnostic>],
    ) -> anyhow::Result<()> {
        let now = Zoned::now().with_time_zone(TimeZone::UTC);
        let line = format!(
            "{} {:>5}  {}\n",
            now.strftime("%Y-%m-%dT%H:%M:%S%.6fZ"),
            record.level(),
            record.args()
        );
        self.file.lock().expect("log file lock poisoned").write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Initialize the global logger. Idempotent: subsequent calls are no-ops.
pub fn init(log_filter: &str, log_file: Option<&str>) {
    let log_filter = log_filter.to_owned();
    let log_file = log_file.map(str::to_owned);
    INIT.call_once(move || apply_logger(log_filter, log_file));
}

fn apply_logger(log_filter: String, log_file: Option<String>) {
    let mut builder = logforth::builder();

    let filter_for_stderr = log_filter.clone();
    builder = builder.dispatch(move |d| {
        let filter = parse_filter(&filter_for_stderr);
        let layout = if std::io::stderr().is_terminal() { UtcLayout::new() } else { UtcLayout::new().no_color() };
        d.filter(filter).append(Stderr::default().with_layout(layout))
    });

    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                let filter_for_file = log_filter.clone();
                builder = builder.dispatch(move |d| {
                    let filter = parse_filter(&filter_for_file);
                    d.filter(filter).append(FileAppender { file: Mutex::new(file) })
                });
            }
            Err(err) => eprintln!("failed to open log file {path}: {err}"),
        }
    }

    builder.apply();
}

fn parse_filter(log_filter: &str) -> EnvFilter {
    EnvFilter::from_str(log_filter).unwrap_or_else(|_| EnvFilter::from_str("info").expect("default filter is valid"))
}
