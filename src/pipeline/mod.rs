// SPDX-License-Identifier: Apache-2.0 OR MIT
// Asynchronous pipeline: bounded drop-oldest queue, background worker,
// and a logger front end that copies records at the call site.

mod processor;
mod queue;

pub use processor::{PipelineStats, Processor};
pub use queue::{AsyncEntry, BoundedQueue, FLUSH_SENTINEL};

use crate::config::Config;
use crate::context;
use crate::error::{Error, Result};
use crate::level::Level;
use crate::metadata::{wall_clock_secs, Metadata};
use crate::sink::{default_error_handler, ConsoleSink, ConsoleTarget, FileSink, Sink};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Asynchronous logger: log calls copy the record into the queue and
/// return; a background worker fans entries out to the handlers.
pub struct AsyncLogger {
    min_level: Level,
    enable_metadata: bool,
    shared: Arc<processor::Shared>,
    processor: Mutex<Processor>,
}

impl AsyncLogger {
    /// Pipeline with an empty handler list; not started yet.
    pub fn new(min_level: Level, queue_capacity: usize) -> Self {
        let processor = Processor::new(queue_capacity);
        Self {
            min_level,
            enable_metadata: true,
            shared: processor.shared(),
            processor: Mutex::new(processor),
        }
    }

    /// Wire console/file handlers from `config`. The pipeline still needs
    /// an explicit [`AsyncLogger::start`].
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let mut logger = Self::new(config.min_level, config.queue_size);
        logger.enable_metadata = config.enable_metadata;

        if config.enable_console {
            let mut formatter_config = config.formatter_config();
            formatter_config.use_color = formatter_config.use_color && config.enable_colors;
            let formatter = crate::format::TemplateFormatter::new(formatter_config)?;
            logger.add_handler(Box::new(ConsoleSink::new(ConsoleTarget::Stdout, formatter)));
        }
        if config.enable_file_logging {
            let sink = FileSink::from_config(config, default_error_handler())?;
            logger.add_handler(Box::new(sink));
        }
        Ok(logger)
    }

    fn lock_processor(&self) -> std::sync::MutexGuard<'_, Processor> {
        self.processor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler; permitted while running, but entries already
    /// popped by the worker are not redelivered.
    pub fn add_handler(&self, handler: Box<dyn Sink>) {
        self.lock_processor().add_handler(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.lock_processor().handler_count()
    }

    /// Start the background worker. Starting twice is a state error.
    pub fn start(&self) -> Result<()> {
        self.lock_processor().start()
    }

    /// Stop the worker, draining residual entries first.
    pub fn stop(&self) -> Result<()> {
        self.lock_processor().stop()
    }

    pub fn is_started(&self) -> bool {
        self.lock_processor().is_started()
    }

    /// Enqueue a record; the message and metadata are copied so the
    /// caller's borrows end at return.
    pub fn log(&self, level: Level, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        if level < self.min_level {
            return Ok(());
        }
        if !self.enable_metadata {
            return self.push_entry(level, message, None);
        }

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
        self.push_entry(level, message, metadata)
    }

    fn push_entry(
        &self,
        level: Level,
        message: &str,
        metadata: Option<&Metadata>,
    ) -> Result<()> {
        self.shared.queue.push(AsyncEntry {
            level,
            message: message.to_string(),
            metadata: metadata.map(Metadata::to_owned),
            timestamp: wall_clock_secs(),
        })
    }

    /// Log with trace level
    #[inline]
    pub fn trace(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Trace, message, metadata)
    }

    /// Log with debug level
    #[inline]
    pub fn debug(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Debug, message, metadata)
    }

    /// Log with info level
    #[inline]
    pub fn info(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Info, message, metadata)
    }

    /// Log with warn level
    #[inline]
    pub fn warn(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Warn, message, metadata)
    }

    /// Log with error level
    #[inline]
    pub fn error(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Error, message, metadata)
    }

    /// Log with critical level
    #[inline]
    pub fn critical(&self, message: &str, metadata: Option<&Metadata>) -> Result<()> {
        self.log(Level::Critical, message, metadata)
    }

    /// Inject the flush sentinel: handlers flush when the worker reaches
    /// it, instead of emitting a record.
    pub fn flush(&self) -> Result<()> {
        self.shared.queue.push(AsyncEntry {
            level: Level::Info,
            message: FLUSH_SENTINEL.to_string(),
            metadata: None,
            timestamp: wall_clock_secs(),
        })
    }

    /// Wait until the queue is empty or `timeout_ms` elapses.
    pub fn drain(&self, timeout_ms: u64) -> Result<()> {
        let processor = self.lock_processor();
        if !processor.is_started() {
            return Err(Error::NotStarted);
        }
        processor.drain(Duration::from_millis(timeout_ms))
    }

    /// Counter snapshot; `accepted == processed + queued + dropped` holds
    /// whenever the worker is quiescent.
    pub fn stats(&self) -> PipelineStats {
        self.lock_processor().stats()
    }

    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }
}

impl Drop for AsyncLogger {
    fn drop(&mut self) {
        let mut processor = self.lock_processor();
        if processor.is_started() {
            let _ = processor.stop();
        }
    }
}
