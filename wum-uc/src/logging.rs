//! Process logger for `wum-uc`.
//!
//! Output goes to stderr as `[HH:MM:SS] [LEVEL] message key=value`. The level
//! comes from the `--debug`/`--trace` flags only (see [`LogLevel::from_flags`]);
//! `RUST_LOG` is not consulted.

use std::fmt;

use tracing::{Event, Subscriber, debug, trace};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{ChronoLocal, FormatTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::level::LogLevel;

/// Timestamp format used in every log line.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Event formatter producing `[time] [LEVEL] fields`.
pub struct PatternFormat {
    timer: ChronoLocal,
}

impl PatternFormat {
    pub fn new() -> Self {
        Self {
            timer: ChronoLocal::new(TIME_FORMAT.to_string()),
        }
    }
}

impl Default for PatternFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, N> FormatEvent<S, N> for PatternFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        writer.write_str("[")?;
        self.timer.format_time(&mut writer)?;
        write!(writer, "] [{}] ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Build the subscriber for `level`, writing to `writer`, without installing it.
pub fn subscriber_with_writer<W>(level: LogLevel, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(EnvFilter::new(level.filter().to_string()))
        .with(
            tfmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .event_format(PatternFormat::new()),
        )
}

/// Build the stderr subscriber for `level` without installing it.
pub fn subscriber(level: LogLevel) -> impl Subscriber + Send + Sync {
    subscriber_with_writer(level, std::io::stderr)
}

/// Install the process-wide subscriber for `level`.
///
/// Only the first call installs anything; later calls return `false` and
/// leave the existing subscriber in place.
pub fn init(level: LogLevel) -> bool {
    let installed = subscriber(level).try_init().is_ok();
    match level {
        LogLevel::Debug => debug!("debug logs enabled"),
        LogLevel::Trace => trace!("trace logs enabled"),
        LogLevel::Default => {}
    }
    debug!(level = %level, installed, "log level");
    installed
}
