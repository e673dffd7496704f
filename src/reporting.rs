//! Fire-and-forget sink for errors that keep the capturer from reaching a requested state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorDomain {
    /// Camera hardware or permission problems.
    Camera,
    /// Capturer/driver lifecycle problems.
    Capturer,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapturerErrorReport {
    pub domain: ErrorDomain,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl CapturerErrorReport {
    pub fn new(domain: ErrorDomain, message: impl Into<String>) -> Self {
        Self {
            domain,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for CapturerErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.domain, self.message)
    }
}

/// Receives capturer error reports. No retry, no queuing.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, report: CapturerErrorReport);
}

impl<F> ErrorReporter for F
where
    F: Fn(CapturerErrorReport) + Send + Sync,
{
    fn report(&self, report: CapturerErrorReport) {
        self(report)
    }
}

/// Reporter that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, report: CapturerErrorReport) {
        log::error!("Capturer error: {}", report);
    }
}
