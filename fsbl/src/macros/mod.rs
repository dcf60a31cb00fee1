//! Zero FSBL Macros
//!
//! Leveled debug output for the boot flow. Call sites name a level token
//! (`ERROR`, `WARN`, `INFO`, `DEBUG`, `TRACE`) followed by a format string.
//! Records are forwarded to the `log` facade under the `fsbl` target; the
//! binary installs the UART logger, tests may install any logger or none.

use log::LevelFilter;

/// Debug output levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DebugLevel {
    /// Error messages - always shown
    Error = 0,
    /// Warning messages
    Warning = 1,
    /// Information messages
    #[default]
    Info = 2,
    /// Debug messages
    Debug = 3,
    /// Trace messages - most verbose
    Trace = 4,
}

impl DebugLevel {
    /// Maximum `log` level enabled by this debug level
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warning => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

/// Leveled boot loader diagnostics.
///
/// `debug_print!(INFO, "loading partition {}", n)`; a call without a level
/// token logs at info.
#[macro_export]
macro_rules! debug_print {
    (ERROR, $($arg:tt)+) => {
        $crate::__log::error!(target: "fsbl", $($arg)+)
    };
    (WARN, $($arg:tt)+) => {
        $crate::__log::warn!(target: "fsbl", $($arg)+)
    };
    (INFO, $($arg:tt)+) => {
        $crate::__log::info!(target: "fsbl", $($arg)+)
    };
    (DEBUG, $($arg:tt)+) => {
        $crate::__log::debug!(target: "fsbl", $($arg)+)
    };
    (TRACE, $($arg:tt)+) => {
        $crate::__log::trace!(target: "fsbl", $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__log::info!(target: "fsbl", $($arg)+)
    };
}
