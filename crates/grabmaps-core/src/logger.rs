//! Stderr logging for grab sessions.
//!
//! Each record is printed as `[elapsed LEVEL component] message`, where the
//! component is the last segment of the record's module path (`session`,
//! `driver`, `discovery`, ...), so a long grab can be followed tile by tile
//! and every line says which stage produced it.

use std::fmt;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: our crates at `info`, the rest at `warn`.
pub const DEFAULT_FILTER: &str = "warn,grabmaps=info,grabmaps_core=info,grabmaps_session=info";

struct SessionLogger {
    level: LevelFilter,
    started: Instant,
}

/// Short component name for a log target.
fn component(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn write_line(
    out: &mut impl Write,
    elapsed_s: f64,
    level: log::Level,
    target: &str,
    args: fmt::Arguments<'_>,
) -> std::io::Result<()> {
    writeln!(
        out,
        "[{elapsed_s:8.2}s {level:>5} {}] {args}",
        component(target)
    )
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        let _ = write_line(
            &mut std::io::stderr().lock(),
            elapsed,
            record.level(),
            record.target(),
            *record.args(),
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

/// Install the logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| SessionLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`].
///
/// JSON output flattens event fields so status lines and span timings of a
/// session can be post-processed line by line.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_thread_names(true);
    let _ = if json {
        builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .finish()
            .try_init()
    } else {
        builder
            .with_target(false)
            .with_timer(tracing_subscriber::fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
