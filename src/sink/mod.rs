// SPDX-License-Identifier: Apache-2.0 OR MIT
// Sink contract and error reporting shared by all destinations

mod console;
mod file;

pub use console::{ConsoleSink, ConsoleTarget};
pub use file::{FileSink, RotationPolicy};

use crate::error::{ErrorKind, Result};
use crate::level::Level;
use crate::metadata::{wall_clock_secs, Metadata};
use std::sync::Arc;
use std::time::Duration;

/// Sink variant, used by the logger to pick the matching formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Console,
    File,
    /// Anything user-provided
    User,
}

/// A destination for log records.
///
/// Sinks are driven behind the owning logger's mutex, hence `&mut self`.
/// `write_record` formats inside the sink for callers that bypass the
/// logger's formatter selection; `write_preformatted` takes bytes the
/// logger already rendered.
pub trait Sink: Send {
    fn kind(&self) -> SinkKind {
        SinkKind::User
    }

    /// Records below this level are skipped for this sink only.
    fn min_level(&self) -> Level {
        Level::Trace
    }

    fn write_record(
        &mut self,
        level: Level,
        message: &str,
        metadata: Option<&Metadata>,
    ) -> Result<()>;

    fn write_preformatted(&mut self, bytes: &[u8]) -> Result<()>;

    /// Durably commit buffered bytes.
    fn flush(&mut self) -> Result<()>;

    /// Flush, then release resources. The sink must tolerate further
    /// calls after close (they may fail).
    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

/// Context handed to the injectable error handler.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub file: &'static str,
    pub line: u32,
    pub timestamp: i64,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>, file: &'static str, line: u32) -> Self {
        Self {
            kind,
            message: message.into(),
            file,
            line,
            timestamp: wall_clock_secs(),
        }
    }
}

/// Injectable handler for sink-internal failures.
pub type ErrorHandler = Arc<dyn Fn(&ErrorReport) + Send + Sync>;

/// Default handler: one stamped line on stderr per failure.
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|report: &ErrorReport| {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        eprintln!(
            "[{}] [nexlog] {:?} error at {}:{}: {}",
            stamp, report.kind, report.file, report.line, report.message
        );
    })
}

/// Run `op`, retrying up to `max_retries` times with `delay` between
/// attempts. The last error wins.
pub(crate) fn with_retries<T>(
    max_retries: u32,
    delay: Duration,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_retries => {
                attempt += 1;
                std::thread::sleep(delay);
                let _ = err;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_with_retries_eventually_succeeds() {
        let mut failures_left = 2;
        let result = with_retries(3, Duration::from_millis(0), || {
            if failures_left > 0 {
                failures_left -= 1;
                Err(Error::Unexpected("transient".into()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_with_retries_exhausted() {
        let mut attempts = 0;
        let result: Result<()> = with_retries(2, Duration::from_millis(0), || {
            attempts += 1;
            Err(Error::Unexpected("always".into()))
        });
        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_error_report_fields() {
        let report = ErrorReport::new(ErrorKind::Io, "disk full", file!(), line!());
        assert_eq!(report.kind, ErrorKind::Io);
        assert!(report.timestamp > 0);
        assert!(report.file.ends_with("mod.rs"));
    }
}
