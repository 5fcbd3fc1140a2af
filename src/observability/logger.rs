//! Injected logging capability.
//!
//! # Responsibilities
//! - Give the guard and the resolver a logger they do not own
//! - Forward to `tracing` in production
//! - Capture records in memory for tests and embedders
//!
//! # Design Decisions
//! - Every record carries a JSON `fields` payload, mirroring structured log lines
//! - `debug_enabled` lets callers skip building expensive debug-only fields

use std::sync::Mutex;

use serde_json::Value;
use tracing::Level;

/// Logging capability used by the decision engine and the resolver.
pub trait Logger: Send + Sync {
    /// Emit one record.
    fn log(&self, level: Level, message: &str, fields: &Value);

    /// Whether DEBUG records would be emitted.
    fn debug_enabled(&self) -> bool {
        false
    }

    fn debug(&self, message: &str, fields: &Value) {
        self.log(Level::DEBUG, message, fields);
    }

    fn info(&self, message: &str, fields: &Value) {
        self.log(Level::INFO, message, fields);
    }

    fn warn(&self, message: &str, fields: &Value) {
        self.log(Level::WARN, message, fields);
    }

    fn error(&self, message: &str, fields: &Value) {
        self.log(Level::ERROR, message, fields);
    }
}

/// Logger forwarding every record to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str, fields: &Value) {
        match level {
            Level::ERROR => tracing::error!(target: "large_response", fields = %fields, "{}", message),
            Level::WARN => tracing::warn!(target: "large_response", fields = %fields, "{}", message),
            Level::INFO => tracing::info!(target: "large_response", fields = %fields, "{}", message),
            Level::DEBUG => tracing::debug!(target: "large_response", fields = %fields, "{}", message),
            _ => tracing::trace!(target: "large_response", fields = %fields, "{}", message),
        }
    }

    fn debug_enabled(&self) -> bool {
        tracing::enabled!(target: "large_response", Level::DEBUG)
    }
}

/// A captured log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub fields: Value,
}

/// Logger that keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
    debug: bool,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A memory logger that reports DEBUG as enabled.
    pub fn with_debug() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            debug: true,
        }
    }

    /// Snapshot of all records so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Records emitted at exactly `level`.
    pub fn at(&self, level: Level) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .collect()
    }

    pub fn count(&self, level: Level) -> usize {
        self.at(level).len()
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, message: &str, fields: &Value) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                message: message.to_string(),
                fields: fields.clone(),
            });
        }
    }

    fn debug_enabled(&self) -> bool {
        self.debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_logger_counts_by_level() {
        let logger = MemoryLogger::new();
        logger.warn("first", &json!({}));
        logger.warn("second", &json!({ "a": 1 }));
        logger.error("third", &Value::Null);

        assert_eq!(logger.count(Level::WARN), 2);
        assert_eq!(logger.count(Level::ERROR), 1);
        assert_eq!(logger.count(Level::INFO), 0);
        assert_eq!(logger.at(Level::WARN)[1].fields["a"], 1);

        logger.clear();
        assert!(logger.records().is_empty());
    }

    #[test]
    fn test_debug_flag() {
        assert!(!MemoryLogger::new().debug_enabled());
        assert!(MemoryLogger::with_debug().debug_enabled());
    }
}
