//! Append-only per-order audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{OrderId, OrderLogId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// A single persisted audit-trail row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLog {
    pub id: OrderLogId,
    pub order_id: OrderId,
    pub level: LogLevel,
    pub step: String,
    pub message: String,
    pub details: serde_json::Value,
    pub screenshot_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The in-memory equivalent produced by the browser driver while it runs;
/// persisted in order by the worker once the pipeline returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLogEntry {
    pub level: LogLevel,
    pub step: String,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub screenshot_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StepLogEntry {
    #[must_use]
    pub fn new(level: LogLevel, step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            step: step.into(),
            message: message.into(),
            details: serde_json::Value::Null,
            screenshot_path: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    #[must_use]
    pub fn with_screenshot(mut self, path: impl Into<String>) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_details_to_null() {
        let entry = StepLogEntry::new(LogLevel::Info, "login", "started");
        assert_eq!(entry.details, serde_json::Value::Null);
        assert!(entry.screenshot_path.is_none());
    }
}
