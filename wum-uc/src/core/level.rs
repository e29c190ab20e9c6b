//! Log level selection from verbosity flags.

use std::fmt;

use tracing::level_filters::LevelFilter;

/// Active log level for a run. Selected once at startup, never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Built-in level used when no verbosity flag is set.
    #[default]
    Default,
    Debug,
    Trace,
}

impl LogLevel {
    /// Select the level from the two verbosity flags.
    ///
    /// `--debug` wins over `--trace`; with neither set the level is
    /// [`LogLevel::Default`].
    pub fn from_flags(debug: bool, trace: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if trace {
            LogLevel::Trace
        } else {
            LogLevel::Default
        }
    }

    /// Filter applied to the subscriber for this level.
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Default => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Default => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        };
        f.write_str(name)
    }
}
