//! Logging for the shader object engine
//!
//! Startup failures (compilation, creation, layout mismatches) are not
//! fatal, so the log is where they surface. Every entry goes through the
//! pluggable `Logger` installed on `Engine`; ERROR entries carry the
//! file:line they were raised at.

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Sink for engine log entries
///
/// # Example
///
/// ```no_run
/// use shader_object_engine::shobj::log::{Logger, LogEntry, LogSeverity};
///
/// struct ErrorsOnly;
///
/// impl Logger for ErrorsOnly {
///     fn log(&self, entry: &LogEntry) {
///         if entry.severity == LogSeverity::Error {
///             eprintln!("{}: {}", entry.source, entry.message);
///         }
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Emitting component, e.g. "shobj::StateSequencer" or "shobj::vulkan"
    pub source: String,
    pub message: String,
    /// Set for entries logged through `Engine::log_detailed`
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

impl LogEntry {
    /// `file:line` when the entry carries a location
    pub fn location(&self) -> Option<String> {
        match (self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            _ => None,
        }
    }
}

/// Log severity levels, least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogSeverity {
    /// Fixed-width label used in console output
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }

    fn colored_label(self) -> ColoredString {
        match self {
            LogSeverity::Trace => self.label().bright_black(),
            LogSeverity::Debug => self.label().cyan(),
            LogSeverity::Info => self.label().green(),
            LogSeverity::Warn => self.label().yellow(),
            LogSeverity::Error => self.label().red().bold(),
        }
    }
}

/// Console logger installed by default
///
/// Prints `[YYYY-MM-DD HH:MM:SS.mmm] [SEVERITY] [source] message`, followed
/// by `(file:line)` when the entry has a location. WARN and ERROR go to
/// stderr, everything else to stdout. Entries below `min_severity` are
/// dropped.
#[derive(Debug, Clone, Copy)]
pub struct DefaultLogger {
    min_severity: LogSeverity,
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self { min_severity: LogSeverity::Trace }
    }
}

impl DefaultLogger {
    pub fn with_min_severity(min_severity: LogSeverity) -> Self {
        Self { min_severity }
    }

    pub fn min_severity(&self) -> LogSeverity {
        self.min_severity
    }

    /// Whether an entry of this severity is printed
    pub fn accepts(&self, severity: LogSeverity) -> bool {
        severity >= self.min_severity
    }

    /// Plain (uncolored) line for an entry
    pub fn format_line(entry: &LogEntry) -> String {
        let mut line = format!(
            "[{}] [{}] [{}] {}",
            Self::timestamp(entry), entry.severity.label(), entry.source, entry.message
        );
        if let Some(location) = entry.location() {
            line.push_str(&format!(" ({})", location));
        }
        line
    }

    fn timestamp(entry: &LogEntry) -> String {
        let datetime: DateTime<Local> = entry.timestamp.into();
        datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        if !self.accepts(entry.severity) {
            return;
        }

        let mut line = format!(
            "[{}] [{}] [{}] {}",
            Self::timestamp(entry),
            entry.severity.colored_label(),
            entry.source.bright_blue(),
            entry.message
        );
        if let Some(location) = entry.location() {
            line.push_str(&format!(" ({})", location.dimmed()));
        }

        if entry.severity >= LogSeverity::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

// ===== LOGGING MACROS =====

#[doc(hidden)]
#[macro_export]
macro_rules! __engine_log {
    ($severity:ident, $source:expr, $($arg:tt)*) => {
        $crate::shobj::Engine::log(
            $crate::shobj::log::LogSeverity::$severity,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a TRACE message
///
/// ```ignore
/// engine_trace!("shobj::StateSequencer", "Snapshot cleared");
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Trace, $source, $($arg)*) };
}

/// Log a DEBUG message
///
/// ```ignore
/// engine_debug!("shobj::BindingTracker", "{} stages enabled", count);
/// ```
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Debug, $source, $($arg)*) };
}

/// Log an INFO message
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Info, $source, $($arg)*) };
}

/// Log a WARN message (excluded permutations, skipped draws)
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Warn, $source, $($arg)*) };
}

/// Log an ERROR message with file:line information
///
/// ```ignore
/// engine_error!("shobj::ShaderBuilder", "Creation failed: {}", error);
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::shobj::Engine::log_detailed(
            $crate::shobj::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR message and build an `Error::BackendError` from the same text
///
/// ```ignore
/// return Err(engine_err!("shobj::vulkan", "vkCreateShadersEXT failed: {:?}", code));
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::shobj::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return early with the given error
///
/// The first form builds an `Error::BackendError`; the second form takes an
/// explicit error value whose `Display` text is logged.
///
/// ```ignore
/// engine_bail!("shobj::vulkan", "Unsupported stage {:?}", stage);
/// engine_bail!("shobj::ShaderUnit", error = Error::InvalidResource(msg));
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, error = $err:expr) => {{
        let error = $err;
        $crate::engine_error!($source, "{}", error);
        return Err(error);
    }};
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}
