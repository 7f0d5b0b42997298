// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging macros for convenient logging

/// Capture call-site metadata (file, line, module path).
///
/// # Examples
/// ```ignore
/// let meta = nexlog::metadata!();
/// logger.info("ready", Some(&meta));
/// ```
#[macro_export]
macro_rules! metadata {
    () => {
        $crate::Metadata::capture(file!(), line!(), module_path!())
    };
}

/// Log a formatted message with trace level
///
/// # Examples
/// ```ignore
/// log_trace!(logger, "entering {}", name);
/// ```
#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)*) => {{
        let meta = $crate::metadata!();
        $logger.trace(&format!($($arg)*), Some(&meta))
    }};
}

/// Log a formatted message with debug level
///
/// # Examples
/// ```ignore
/// log_debug!(logger, "parsed {} records", count);
/// ```
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {{
        let meta = $crate::metadata!();
        $logger.debug(&format!($($arg)*), Some(&meta))
    }};
}

/// Log a formatted message with info level
///
/// # Examples
/// ```ignore
/// log_info!(logger, "listening on {}", addr);
/// ```
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {{
        let meta = $crate::metadata!();
        $logger.info(&format!($($arg)*), Some(&meta))
    }};
}

/// Log a formatted message with warn level
///
/// # Examples
/// ```ignore
/// log_warn!(logger, "buffer at {}%", pct);
/// ```
#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {{
        let meta = $crate::metadata!();
        $logger.warn(&format!($($arg)*), Some(&meta))
    }};
}

/// Log a formatted message with error level
///
/// # Examples
/// ```ignore
/// log_error!(logger, "write failed: {}", err);
/// ```
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {{
        let meta = $crate::metadata!();
        $logger.error(&format!($($arg)*), Some(&meta))
    }};
}

/// Log a formatted message with critical level
///
/// # Examples
/// ```ignore
/// log_critical!(logger, "out of descriptors");
/// ```
#[macro_export]
macro_rules! log_critical {
    ($logger:expr, $($arg:tt)*) => {{
        let meta = $crate::metadata!();
        $logger.critical(&format!($($arg)*), Some(&meta))
    }};
}

/// Log a structured record with named fields
///
/// # Examples
/// ```ignore
/// log_fields!(logger, Level::Info, "request done",
///             "status" => 200i64, "path" => "/api");
/// ```
#[macro_export]
macro_rules! log_fields {
    ($logger:expr, $level:expr, $msg:expr, $($key:expr => $value:expr),+ $(,)?) => {{
        let meta = $crate::metadata!();
        let fields = vec![$($crate::Field::new($key, $value)),+];
        $logger.log_structured($level, $msg, &fields, Some(&meta))
    }};
}
