// SPDX-License-Identifier: Apache-2.0 OR MIT
// Embeddable logging: compiled templates, buffered rotating file sinks,
// and an asynchronous drop-oldest pipeline.
//
// Documentation:
// - DESIGN.md - design notes and rationale
// - `Logger` for the synchronous path, `AsyncLogger` for the pipeline

pub mod buffer;
pub mod config;
pub mod context;
mod error;
pub mod format;
pub mod global;
mod level;
mod logger;
#[macro_use]
mod macros;
mod metadata;
pub mod pipeline;
pub mod sink;

// Public exports
pub use buffer::{BufferHealth, BufferStats, CircularBuffer, HealthStatus};
pub use config::{
    Config, FormatterConfig, LevelFormat, RotationMode, StructuredFormat, TimestampFormat,
};
pub use context::LogContext;
pub use error::{Error, ErrorKind, Result};
pub use format::{
    iso8601, CustomHandler, TemplateFormatter, DEFAULT_CONSOLE_TEMPLATE, DEFAULT_FILE_TEMPLATE,
};
pub use level::Level;
pub use logger::{Logger, SinkId};
pub use metadata::{Field, FieldValue, Metadata, OwnedMetadata};
pub use pipeline::{AsyncLogger, PipelineStats, FLUSH_SENTINEL};
pub use sink::{
    default_error_handler, ConsoleSink, ConsoleTarget, ErrorHandler, ErrorReport, FileSink,
    RotationPolicy, Sink, SinkKind,
};
