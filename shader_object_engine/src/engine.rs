/// Engine - process-wide logging hub
///
/// Shader units, builders, trackers and sequencers are all explicitly owned
/// values. The only process-wide state is the logger, so that startup
/// failures (compilation, creation, layout mismatches) and frame-fatal
/// binding violations end up in one place.

use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())))
}

/// Logging entry point used by the `engine_*` macros
///
/// # Example
///
/// ```no_run
/// use shader_object_engine::shobj::{Engine, log::{Logger, LogEntry}};
///
/// struct FileLogger;
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
///
/// Engine::set_logger(FileLogger);
/// ```
pub struct Engine;

impl Engine {
    /// Replace the active logger
    pub fn set_logger<L: Logger + 'static>(logger_impl: L) {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(logger_impl);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(DefaultLogger::default());
        }
    }

    /// Log without file:line (used by engine_trace! .. engine_warn!)
    ///
    /// # Arguments
    ///
    /// * `severity` - Log severity level
    /// * `source` - Source component (e.g., "shobj::StateSequencer")
    /// * `message` - Log message
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(severity, source, message, None);
    }

    /// Log with file:line (used by engine_error!, engine_err!, engine_bail!)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        Self::dispatch(severity, source, message, Some((file, line)));
    }

    fn dispatch(severity: LogSeverity, source: &str, message: String, location: Option<(&'static str, u32)>) {
        let lock = match logger().read() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        };
        lock.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: location.map(|(file, _)| file),
            line: location.map(|(_, line)| line),
        });
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
