// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Logger configuration: a flat record with serde defaults, optional
//! embedded formatter settings, and environment overrides applied at
//! startup.

use crate::error::{Error, Result};
use crate::level::Level;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the minimum level (`NEXLOG_LEVEL=debug`).
pub const ENV_LEVEL: &str = "NEXLOG_LEVEL";
/// Environment variable overriding colored console output (`NEXLOG_COLOR=0`).
pub const ENV_COLOR: &str = "NEXLOG_COLOR";
/// Environment variable enabling file logging to the given path.
pub const ENV_FILE: &str = "NEXLOG_FILE";
/// Environment variable overriding the structured format (`json`, `logfmt`, `custom`).
pub const ENV_FORMAT: &str = "NEXLOG_FORMAT";

/// When to rotate the active log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    /// Rotate when the active file exceeds `max_file_size`
    #[default]
    Size,
    /// Rotate when `rotation_interval_secs` elapses
    Time,
    /// Rotate on whichever threshold fires first
    Both,
}

/// Rendering of the `{timestamp}` placeholder and structured timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimestampFormat {
    /// Decimal unix seconds
    #[default]
    Unix,
    /// `YYYY-MM-DDTHH:MM:SSZ`
    Iso8601,
    /// `custom_timestamp_format` (strftime), falls back to unix when unset
    Custom,
}

/// Rendering of the `{level}` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LevelFormat {
    #[default]
    Upper,
    Lower,
    ShortUpper,
    ShortLower,
}

/// Structured record encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StructuredFormat {
    #[default]
    Json,
    Logfmt,
    /// logfmt schema with configurable separators
    Custom,
}

/// Formatter settings, embeddable in [`Config`] or used standalone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Placeholder template; `None` selects the built-in default
    pub template: Option<String>,
    pub timestamp_format: TimestampFormat,
    /// strftime format used when `timestamp_format` is `custom`
    pub custom_timestamp_format: Option<String>,
    pub level_format: LevelFormat,
    pub use_color: bool,
    pub structured_format: StructuredFormat,
    pub custom_field_separator: String,
    pub custom_key_value_separator: String,
    /// Size of the stack-first render attempt before heap fallback
    pub stack_buffer_size: usize,
    /// Emit `timestamp` key in structured output
    pub include_timestamp: bool,
    /// Emit `level` key in structured output
    pub include_level: bool,
    /// Emit `msg` key in structured output
    pub include_message: bool,
    /// Value of the `{component}` placeholder
    pub component: Option<String>,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            template: None,
            timestamp_format: TimestampFormat::Unix,
            custom_timestamp_format: None,
            level_format: LevelFormat::Upper,
            use_color: true,
            structured_format: StructuredFormat::Json,
            custom_field_separator: " | ".to_string(),
            custom_key_value_separator: "=".to_string(),
            stack_buffer_size: 512,
            include_timestamp: true,
            include_level: true,
            include_message: true,
            component: None,
        }
    }
}

/// Top-level logger configuration.
///
/// Every field has a serde default so partial config files work; call
/// [`Config::validate`] before constructing a logger from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub min_level: Level,
    pub enable_console: bool,
    pub enable_colors: bool,
    pub enable_file_logging: bool,
    pub file_path: Option<PathBuf>,
    /// Rotation size threshold in bytes
    pub max_file_size: u64,
    pub max_rotated_files: usize,
    pub enable_rotation: bool,
    pub rotation_mode: RotationMode,
    /// Rotation time threshold in seconds
    pub rotation_interval_secs: u64,
    /// Compress rotated files (requires the `compression` feature)
    pub compress_rotated: bool,
    /// File sink staging buffer capacity in bytes
    pub buffer_size: usize,
    pub flush_interval_ms: u64,
    pub async_mode: bool,
    /// Async queue capacity (entries)
    pub queue_size: usize,
    pub enable_metadata: bool,
    /// Error-handler retry attempts for failing sink operations
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Embedded formatter settings; `None` selects defaults
    pub formatter: Option<FormatterConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_level: Level::Info,
            enable_console: true,
            enable_colors: true,
            enable_file_logging: false,
            file_path: None,
            max_file_size: 10 * 1024 * 1024,
            max_rotated_files: 5,
            enable_rotation: true,
            rotation_mode: RotationMode::Size,
            rotation_interval_secs: 86_400,
            compress_rotated: false,
            buffer_size: 4096,
            flush_interval_ms: 5000,
            async_mode: false,
            queue_size: 10_000,
            enable_metadata: true,
            max_retries: 0,
            retry_delay_ms: 100,
            formatter: None,
        }
    }
}

impl Config {
    /// Reject configurations that can never work before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::Config("buffer_size must be non-zero".into()));
        }
        if self.enable_file_logging {
            if self.file_path.is_none() {
                return Err(Error::Config(
                    "file_path is required when enable_file_logging is set".into(),
                ));
            }
            if self.enable_rotation && self.max_file_size == 0 {
                return Err(Error::Config(
                    "max_file_size must be non-zero when rotation is enabled".into(),
                ));
            }
        }
        if self.async_mode && self.queue_size == 0 {
            return Err(Error::Config("queue_size must be non-zero".into()));
        }
        if let Some(fmt) = &self.formatter {
            if fmt.stack_buffer_size == 0 {
                return Err(Error::Config("stack_buffer_size must be non-zero".into()));
            }
        }
        Ok(())
    }

    /// Apply `NEXLOG_*` environment overrides on top of programmatic values.
    ///
    /// Unparseable values are reported as Config errors rather than ignored.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var(ENV_LEVEL) {
            self.min_level = level.parse()?;
        }
        if let Ok(color) = std::env::var(ENV_COLOR) {
            self.enable_colors = parse_bool(ENV_COLOR, &color)?;
        }
        if let Ok(path) = std::env::var(ENV_FILE) {
            if !path.is_empty() {
                self.enable_file_logging = true;
                self.file_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(format) = std::env::var(ENV_FORMAT) {
            let fmt = self.formatter.get_or_insert_with(FormatterConfig::default);
            fmt.structured_format = match format.to_ascii_lowercase().as_str() {
                "json" => StructuredFormat::Json,
                "logfmt" => StructuredFormat::Logfmt,
                "custom" => StructuredFormat::Custom,
                other => {
                    return Err(Error::Config(format!(
                        "{} must be json, logfmt, or custom, got '{}'",
                        ENV_FORMAT, other
                    )))
                }
            };
        }
        Ok(())
    }

    /// Formatter settings, falling back to defaults when none are embedded.
    pub fn formatter_config(&self) -> FormatterConfig {
        self.formatter.clone().unwrap_or_default()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}
