//! Sinks for terminal failures.
//!
//! The toolkit itself only returns errors. Callers that hand failures to a
//! reporting channel use [`report_error`], which pulls out the directory
//! result code when there is one.

use crate::error::ToolkitError;
use crate::protocol::ResultCode;
use std::sync::Mutex;

/// Receiver of terminal failures.
pub trait ErrorSink {
    fn report(&self, code: Option<ResultCode>, message: &str);
}

/// Forwards reports to `log::error!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, code: Option<ResultCode>, message: &str) {
        match code {
            Some(code) => log::error!("[{}] {}", code, message),
            None => log::error!("{}", message),
        }
    }
}

/// A single recorded report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub code: Option<ResultCode>,
    pub message: String,
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<Report>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().map(|reports| reports.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, code: Option<ResultCode>, message: &str) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(Report {
                code,
                message: message.to_string(),
            });
        }
    }
}

/// Hand `error` to `sink` with its result code, if it carries one.
pub fn report_error<K>(sink: &K, error: &ToolkitError)
where
    K: ErrorSink + ?Sized,
{
    sink.report(error.result_code(), &error.to_string());
}
