// Synchronous logger: level gate, per-sink formatter selection, fan-out
// under one mutex so each record reaches every sink before the next call.

use crate::config::Config;
use crate::context;
use crate::error::{Error, Result};
use crate::format::TemplateFormatter;
use crate::level::Level;
use crate::metadata::{Field, Metadata};
use crate::sink::{
    default_error_handler, ConsoleSink, ConsoleTarget, ErrorHandler, ErrorReport, FileSink, Sink,
    SinkKind,
};
use std::sync::{Mutex, PoisonError};

/// Handle returned by [`Logger::add_sink`], used to remove the sink later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkId(usize);

struct Registered {
    id: SinkId,
    sink: Box<dyn Sink>,
}

/// Synchronous fan-out logger.
///
/// Console-kind sinks receive records rendered by the console formatter
/// (colors per config); every other sink gets the file formatter, which
/// never emits colors.
pub struct Logger {
    min_level: Level,
    enable_metadata: bool,
    console_formatter: TemplateFormatter,
    file_formatter: TemplateFormatter,
    error_handler: ErrorHandler,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.min_level)
            .field("enable_metadata", &self.enable_metadata)
            .field("console_formatter", &self.console_formatter)
            .field("file_formatter", &self.file_formatter)
            .finish_non_exhaustive()
    }
}

struct Inner {
    sinks: Vec<Registered>,
    next_id: usize,
}

impl Logger {
    /// Logger with explicit formatters and no sinks attached yet.
    pub fn new(
        min_level: Level,
        console_formatter: TemplateFormatter,
        file_formatter: TemplateFormatter,
    ) -> Self {
        Self {
            min_level,
            enable_metadata: true,
            console_formatter,
            file_formatter,
            error_handler: default_error_handler(),
            inner: Mutex::new(Inner {
                sinks: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Build a logger with console/file sinks wired from `config`.
    ///
    /// Validation failures and unopenable files surface here, never later
    /// on the log path.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut console_config = config.formatter_config();
        console_config.use_color = console_config.use_color && config.enable_colors;
        let console_formatter = TemplateFormatter::new(console_config)?;
        let file_formatter = TemplateFormatter::for_file(config.formatter_config())?;

        let mut logger = Self::new(config.min_level, console_formatter, file_formatter);
        logger.enable_metadata = config.enable_metadata;

        if config.enable_console {
            let mut sink_config = config.formatter_config();
            sink_config.use_color = sink_config.use_color && config.enable_colors;
            let formatter = TemplateFormatter::new(sink_config)?;
            logger.add_sink(Box::new(ConsoleSink::new(ConsoleTarget::Stdout, formatter)));
        }
        if config.enable_file_logging {
            let sink = FileSink::from_config(config, logger.error_handler.clone())?;
            logger.add_sink(Box::new(sink));
        }
        Ok(logger)
    }

    /// Replace the default stderr error handler.
    pub fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.error_handler = handler;
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    /// Register a sink; records fan out in registration order.
    pub fn add_sink(&self, sink: Box<dyn Sink>) -> SinkId {
        let mut inner = self.lock_inner();
        let id = SinkId(inner.next_id);
        inner.next_id += 1;
        inner.sinks.push(Registered { id, sink });
        id
    }

    /// Close and remove a sink. Unknown ids are a state error.
    pub fn remove_sink(&self, id: SinkId) -> Result<()> {
        let mut inner = self.lock_inner();
        let position = inner
            .sinks
            .iter()
            .position(|registered| registered.id == id)
            .ok_or_else(|| Error::Unexpected("sink not registered".into()))?;
        let mut registered = inner.sinks.remove(position);
        drop(inner);
        registered.sink.close()
    }

    pub fn sink_count(&self) -> usize {
        self.lock_inner().sinks.len()
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, err: &Error) {
        let report = ErrorReport::new(err.kind(), err.to_string(), file!(), line!());
        (self.error_handler)(&report);
    }

    /// Log a record; the first sink failure is returned after the fan-out
    /// completes, so one bad sink cannot starve the rest.
    pub fn log(&self, level: Level, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        if level < self.min_level {
            return Ok(());
        }

        let metadata = if self.enable_metadata { metadata } else { None };

        // Attach the thread's context when the caller did not
        let thread_context = context::get();
        let enriched;
        let metadata = match (metadata, thread_context.as_ref()) {
            (Some(meta), Some(ctx)) if meta.context.is_none() => {
                enriched = meta.with_context(ctx);
                Some(&enriched)
            }
            (meta, _) => meta,
        };

        let mut inner = self.lock_inner();
        let mut console_rendered: Option<String> = None;
        let mut file_rendered: Option<String> = None;
        let mut first_error = None;

        for registered in inner.sinks.iter_mut() {
            if level < registered.sink.min_level() {
                continue;
            }
            let rendered = match registered.sink.kind() {
                SinkKind::Console => console_rendered.get_or_insert_with(|| {
                    self.console_formatter.format(level, message, metadata)
                }),
                _ => file_rendered
                    .get_or_insert_with(|| self.file_formatter.format(level, message, metadata)),
            };
            if let Err(err) = registered.sink.write_preformatted(rendered.as_bytes()) {
                self.report(&err);
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Log a structured record through the per-sink formatters.
    pub fn log_structured(
        &self,
        level: Level,
        message: &str,
        fields: &[Field],
        metadata: Option<&Metadata>,
    ) -> Result<()> {
        if level < self.min_level {
            return Ok(());
        }
        let metadata = if self.enable_metadata { metadata } else { None };

        let mut inner = self.lock_inner();
        let mut console_rendered: Option<String> = None;
        let mut file_rendered: Option<String> = None;
        let mut first_error = None;

        for registered in inner.sinks.iter_mut() {
            if level < registered.sink.min_level() {
                continue;
            }
            let rendered = match registered.sink.kind() {
                SinkKind::Console => console_rendered.get_or_insert_with(|| {
                    self.console_formatter
                        .format_structured(level, message, fields, metadata)
                }),
                _ => file_rendered.get_or_insert_with(|| {
                    self.file_formatter
                        .format_structured(level, message, fields, metadata)
                }),
            };
            if let Err(err) = registered.sink.write_preformatted(rendered.as_bytes()) {
                self.report(&err);
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Flush every sink; the first failure is returned after all sinks
    /// were attempted.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.lock_inner();
        let mut first_error = None;
        for registered in inner.sinks.iter_mut() {
            if let Err(err) = registered.sink.flush() {
                self.report(&err);
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Best-effort variant: swallow errors and flush, for exit paths.
    pub fn log_best_effort(&self, level: Level, message: &str, metadata: Option<&Metadata>) {
        let _ = self.log(level, message, metadata);
        let _ = self.flush();
    }

    /// Log with trace level, best effort
    #[inline]
    pub fn trace(&self, message: &str, metadata: Option<&Metadata>) {
        self.log_best_effort(Level::Trace, message, metadata);
    }

    /// Log with debug level, best effort
    #[inline]
    pub fn debug(&self, message: &str, metadata: Option<&Metadata>) {
        self.log_best_effort(Level::Debug, message, metadata);
    }

    /// Log with info level, best effort
    #[inline]
    pub fn info(&self, message: &str, metadata: Option<&Metadata>) {
        self.log_best_effort(Level::Info, message, metadata);
    }

    /// Log with warn level, best effort
    #[inline]
    pub fn warn(&self, message: &str, metadata: Option<&Metadata>) {
        self.log_best_effort(Level::Warn, message, metadata);
    }

    /// Log with error level, best effort
    #[inline]
    pub fn error(&self, message: &str, metadata: Option<&Metadata>) {
        self.log_best_effort(Level::Error, message, metadata);
    }

    /// Log with critical level, best effort
    #[inline]
    pub fn critical(&self, message: &str, metadata: Option<&Metadata>) {
        self.log_best_effort(Level::Critical, message, metadata);
    }

    /// Log with trace level, propagating sink failures
    #[inline]
    pub fn try_trace(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Trace, message, metadata)
    }

    /// Log with debug level, propagating sink failures
    #[inline]
    pub fn try_debug(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Debug, message, metadata)
    }

    /// Log with info level, propagating sink failures
    #[inline]
    pub fn try_info(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Info, message, metadata)
    }

    /// Log with warn level, propagating sink failures
    #[inline]
    pub fn try_warn(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Warn, message, metadata)
    }

    /// Log with error level, propagating sink failures
    #[inline]
    pub fn try_error(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Error, message, metadata)
    }

    /// Log with critical level, propagating sink failures
    #[inline]
    pub fn try_critical(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Critical, message, metadata)
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        // Deinitialize in reverse registration order, flushing first
        let mut inner = self.lock_inner();
        for registered in inner.sinks.iter_mut().rev() {
            if let Err(err) = registered.sink.close() {
                let report = ErrorReport::new(err.kind(), err.to_string(), file!(), line!());
                (self.error_handler)(&report);
            }
        }
        inner.sinks.clear();
    }
}
