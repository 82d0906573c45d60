//! Station logging.
//!
//! Prints `[elapsed LEVEL target] message` to stderr. Counting stations run
//! unattended for hours, so the elapsed prefix is what an operator correlates
//! with the belt. Records from outside the `tally` crates are capped at
//! `Warn` so a verbose station log stays about the belt.
//!
//! Use [`init_station`] once at startup; `TALLY_LOG` (e.g. `TALLY_LOG=trace`)
//! overrides the verbosity picked by the caller.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable overriding the station log level.
pub const LOG_ENV: &str = "TALLY_LOG";

const FOREIGN_CAP: LevelFilter = LevelFilter::Warn;

struct StationLogger {
    level: LevelFilter,
    started: Instant,
}

fn is_station_target(target: &str) -> bool {
    target == "tally" || target.starts_with("tally_") || target.starts_with("tally::")
}

impl Log for StationLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let cap = if is_station_target(metadata.target()) {
            self.level
        } else {
            self.level.min(FOREIGN_CAP)
        };
        metadata.level() <= cap
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:9.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StationLogger> = OnceLock::new();

/// Level for a station run: `override_level` when it parses, else `Debug`
/// when verbose and `Info` otherwise.
pub fn station_level(verbose: bool, override_level: Option<&str>) -> LevelFilter {
    override_level
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
}

/// Install the station logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StationLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Set up logging for a station run at [`station_level`].
///
/// With the `tracing` feature this installs the `tracing` subscriber instead
/// of the plain logger; `log` records reach it through the subscriber's
/// `tracing-log` bridge.
pub fn init_station(verbose: bool) {
    let env = std::env::var(LOG_ENV).ok();
    let level = station_level(verbose, env.as_deref());
    #[cfg(feature = "tracing")]
    init_tracing(level, false);
    #[cfg(not(feature = "tracing"))]
    {
        let _ = init_with_level(level);
    }
}

/// Install a `tracing` subscriber that also reports span timings on close.
///
/// The filter comes from `RUST_LOG` and falls back to `level` for the
/// `tally` crates, `warn` for everything else.
#[cfg(feature = "tracing")]
pub fn init_tracing(level: LevelFilter, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_directives(level)));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    if json {
        let _ = builder.json().flatten_event(true).finish().try_init();
    } else {
        let _ = builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(feature = "tracing")]
fn tracing_directives(level: LevelFilter) -> String {
    let level = level.to_string().to_ascii_lowercase();
    let foreign = LevelFilter::Warn.min(level.parse().unwrap_or(LevelFilter::Warn));
    let foreign = foreign.to_string().to_ascii_lowercase();
    ["tally", "tally_core", "tally_weight", "tally_track"]
        .iter()
        .fold(foreign, |acc, krate| format!("{acc},{krate}={level}"))
}
