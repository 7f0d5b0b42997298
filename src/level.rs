// SPDX-License-Identifier: Apache-2.0 OR MIT
// Log levels, totally ordered from Trace to Critical

use serde::{Deserialize, Serialize};

/// Log severity levels (0-5, higher is more severe)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Verbose tracing (per-record diagnostics)
    Trace = 0,
    /// Debug-level messages
    Debug = 1,
    /// Informational (normal operation)
    Info = 2,
    /// Warning conditions (recoverable, approaching limits)
    Warn = 3,
    /// Error conditions
    Error = 4,
    /// Critical conditions (imminent failure)
    Critical = 5,
}

impl Level {
    /// Get level as u8 (0-5)
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Long name, upper case
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    /// 3-letter short name, upper case
    pub const fn short_str(self) -> &'static str {
        match self {
            Level::Trace => "TRC",
            Level::Debug => "DBG",
            Level::Info => "INF",
            Level::Warn => "WRN",
            Level::Error => "ERR",
            Level::Critical => "CRT",
        }
    }

    /// ANSI escape sequence for this level
    pub const fn color_code(self) -> &'static str {
        match self {
            Level::Trace => "\x1b[90m",    // bright black
            Level::Debug => "\x1b[36m",    // cyan
            Level::Info => "\x1b[32m",     // green
            Level::Warn => "\x1b[33m",     // yellow
            Level::Error => "\x1b[31m",    // red
            Level::Critical => "\x1b[35m", // magenta
        }
    }

    /// Create from u8 value (returns None if out of range)
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Level::Trace),
            1 => Some(Level::Debug),
            2 => Some(Level::Info),
            3 => Some(Level::Warn),
            4 => Some(Level::Error),
            5 => Some(Level::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = crate::Error;

    /// Case-insensitive long-name parse, used for `NEXLOG_LEVEL`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "critical" => Ok(Level::Critical),
            other => Err(crate::Error::Config(format!("unknown level '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Critical);
    }

    #[test]
    fn test_level_names() {
        assert_eq!(Level::Info.as_str(), "INFO");
        assert_eq!(Level::Info.short_str(), "INF");
        assert_eq!(Level::Critical.short_str(), "CRT");
        assert_eq!(Level::Warn.short_str(), "WRN");
    }

    #[test]
    fn test_level_from_u8() {
        assert_eq!(Level::from_u8(0), Some(Level::Trace));
        assert_eq!(Level::from_u8(5), Some(Level::Critical));
        assert_eq!(Level::from_u8(6), None);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("info".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("Warning".parse::<Level>().unwrap(), Level::Warn);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_color_codes() {
        assert_eq!(Level::Error.color_code(), "\x1b[31m");
        assert!(Level::Trace.color_code().starts_with("\x1b["));
    }
}
