// Background worker draining the queue into a fan-out of handlers.

use super::queue::{AsyncEntry, BoundedQueue};
use crate::error::{Error, Result};
use crate::sink::Sink;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Queue and handler state shared between the front end and the worker.
pub(crate) struct Shared {
    pub(crate) queue: BoundedQueue,
    handlers: Mutex<Vec<Box<dyn Sink>>>,
    stop: AtomicBool,
    processed: AtomicU64,
    handler_errors: AtomicU64,
    processing_errors: AtomicU64,
}

impl Shared {
    fn lock_handlers(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn Sink>>> {
        self.handlers.lock().unwrap_or_else(|poisoned| {
            self.processing_errors.fetch_add(1, Ordering::Relaxed);
            PoisonError::into_inner(poisoned)
        })
    }

    /// Deliver one entry to every handler; errors are counted, never
    /// propagated, so one bad handler cannot stall the pipeline.
    fn dispatch(&self, entry: &AsyncEntry) {
        let mut handlers = self.lock_handlers();

        if entry.is_flush_sentinel() {
            for handler in handlers.iter_mut() {
                if handler.flush().is_err() {
                    self.handler_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
            return;
        }

        let metadata = entry.metadata.as_ref().map(|owned| owned.as_metadata());
        for handler in handlers.iter_mut() {
            if entry.level < handler.min_level() {
                continue;
            }
            if handler
                .write_record(entry.level, &entry.message, metadata.as_ref())
                .is_err()
            {
                self.handler_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counters exposed by [`Processor::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    /// Entries accepted into the queue since start
    pub accepted: u64,
    /// Entries delivered to the handler fan-out
    pub processed: u64,
    /// Entries evicted by drop-oldest backpressure
    pub dropped: u64,
    /// Entries currently waiting in the queue
    pub queued: usize,
    pub handler_errors: u64,
    pub processing_errors: u64,
}

/// Owns the worker thread and handler list of the async pipeline.
pub struct Processor {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    started: bool,
}

impl Processor {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: BoundedQueue::new(queue_capacity),
                handlers: Mutex::new(Vec::new()),
                stop: AtomicBool::new(false),
                processed: AtomicU64::new(0),
                handler_errors: AtomicU64::new(0),
                processing_errors: AtomicU64::new(0),
            }),
            worker: None,
            started: false,
        }
    }

    pub(crate) fn shared(&self) -> Arc<Shared> {
        Arc::clone(&self.shared)
    }

    /// Register a handler; allowed before or after `start`, but entries
    /// already popped are not redelivered to late handlers.
    pub fn add_handler(&self, handler: Box<dyn Sink>) {
        self.shared.lock_handlers().push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.shared.lock_handlers().len()
    }

    /// Spawn the worker thread. Starting twice is a state error.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::AlreadyStarted);
        }

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("nexlog-worker".to_string())
            .spawn(move || {
                loop {
                    match shared.queue.pop() {
                        Ok(entry) => shared.dispatch(&entry),
                        // Closed and drained
                        Err(_) => break,
                    }
                    if shared.stop.load(Ordering::Relaxed) && shared.queue.is_empty() {
                        break;
                    }
                }
            })?;
        self.worker = Some(handle);
        self.started = true;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Stop the worker: close the queue, join, then drain any residual
    /// entries so no accepted record is discarded silently.
    pub fn stop(&mut self) -> Result<()> {
        if !self.started {
            return Err(Error::NotStarted);
        }
        self.shared.stop.store(true, Ordering::Relaxed);
        self.shared.queue.close();

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                self.shared
                    .processing_errors
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        while let Some(entry) = self.shared.queue.try_pop() {
            self.shared.dispatch(&entry);
        }

        // Final flush so handlers release buffered bytes
        let mut handlers = self.shared.lock_handlers();
        for handler in handlers.iter_mut() {
            if handler.close().is_err() {
                self.shared.handler_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.started = false;
        Ok(())
    }

    /// Poll until the queue is empty, sleeping 1 ms between checks.
    pub fn drain(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = self.shared.queue.len();
            if remaining == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::DrainTimeout { remaining });
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            accepted: self.shared.queue.accepted(),
            processed: self.shared.processed.load(Ordering::Relaxed),
            dropped: self.shared.queue.dropped(),
            queued: self.shared.queue.len(),
            handler_errors: self.shared.handler_errors.load(Ordering::Relaxed),
            processing_errors: self.shared.processing_errors.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        if self.started {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use crate::metadata::{wall_clock_secs, Metadata};
    use crate::pipeline::queue::FLUSH_SENTINEL;
    use crate::sink::SinkKind;
    use std::sync::Mutex as StdMutex;

    struct RecordingSink {
        messages: Arc<StdMutex<Vec<String>>>,
        flushes: Arc<StdMutex<u32>>,
    }

    impl RecordingSink {
        #[allow(clippy::type_complexity)]
        fn new() -> (Self, Arc<StdMutex<Vec<String>>>, Arc<StdMutex<u32>>) {
            let messages = Arc::new(StdMutex::new(Vec::new()));
            let flushes = Arc::new(StdMutex::new(0));
            (
                Self {
                    messages: Arc::clone(&messages),
                    flushes: Arc::clone(&flushes),
                },
                messages,
                flushes,
            )
        }
    }

    impl Sink for RecordingSink {
        fn kind(&self) -> SinkKind {
            SinkKind::User
        }

        fn write_record(
            &mut self,
            _level: Level,
            message: &str,
            _metadata: Option<&Metadata>,
        ) -> crate::Result<()> {
            self.messages.lock().unwrap().push(message.to_string());
            Ok(())
        }

        fn write_preformatted(&mut self, bytes: &[u8]) -> crate::Result<()> {
            self.messages
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(bytes).into_owned());
            Ok(())
        }

        fn flush(&mut self) -> crate::Result<()> {
            *self.flushes.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn entry(message: &str) -> AsyncEntry {
        AsyncEntry {
            level: Level::Info,
            message: message.to_string(),
            metadata: None,
            timestamp: wall_clock_secs(),
        }
    }

    #[test]
    fn test_start_twice_fails() {
        let mut processor = Processor::new(16);
        processor.start().unwrap();
        assert!(matches!(processor.start(), Err(Error::AlreadyStarted)));
        processor.stop().unwrap();
    }

    #[test]
    fn test_stop_without_start_fails() {
        let mut processor = Processor::new(16);
        assert!(matches!(processor.stop(), Err(Error::NotStarted)));
    }

    #[test]
    fn test_entries_reach_handlers_in_order() {
        let mut processor = Processor::new(16);
        let (sink, messages, _) = RecordingSink::new();
        processor.add_handler(Box::new(sink));
        processor.start().unwrap();

        let shared = processor.shared();
        shared.queue.push(entry("one")).unwrap();
        shared.queue.push(entry("two")).unwrap();

        processor.drain(Duration::from_secs(1)).unwrap();
        processor.stop().unwrap();

        assert_eq!(messages.lock().unwrap().as_slice(), ["one", "two"]);
        let stats = processor.stats();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.accepted, stats.processed + stats.dropped);
    }

    #[test]
    fn test_sentinel_triggers_flush() {
        let mut processor = Processor::new(16);
        let (sink, messages, flushes) = RecordingSink::new();
        processor.add_handler(Box::new(sink));
        processor.start().unwrap();

        let shared = processor.shared();
        shared.queue.push(entry(FLUSH_SENTINEL)).unwrap();
        processor.drain(Duration::from_secs(1)).unwrap();
        processor.stop().unwrap();

        // Sentinel is never emitted as a record
        assert!(messages.lock().unwrap().is_empty());
        assert!(*flushes.lock().unwrap() >= 1);
    }

    #[test]
    fn test_stop_drains_residual_entries() {
        let mut processor = Processor::new(16);
        let (sink, messages, _) = RecordingSink::new();
        processor.add_handler(Box::new(sink));

        // Push before the worker ever runs
        let shared = processor.shared();
        shared.queue.push(entry("pre-start")).unwrap();

        processor.start().unwrap();
        processor.stop().unwrap();

        assert_eq!(messages.lock().unwrap().as_slice(), ["pre-start"]);
    }

    #[test]
    fn test_late_handler_gets_new_entries_only() {
        let mut processor = Processor::new(16);
        let (early, early_messages, _) = RecordingSink::new();
        processor.add_handler(Box::new(early));
        processor.start().unwrap();

        let shared = processor.shared();
        shared.queue.push(entry("first")).unwrap();
        processor.drain(Duration::from_secs(1)).unwrap();
        // Give the worker a moment to finish dispatching the popped entry
        std::thread::sleep(Duration::from_millis(20));

        let (late, late_messages, _) = RecordingSink::new();
        processor.add_handler(Box::new(late));
        shared.queue.push(entry("second")).unwrap();
        processor.drain(Duration::from_secs(1)).unwrap();
        processor.stop().unwrap();

        assert_eq!(
            early_messages.lock().unwrap().as_slice(),
            ["first", "second"]
        );
        assert_eq!(late_messages.lock().unwrap().as_slice(), ["second"]);
    }

    #[test]
    fn test_drain_timeout() {
        let processor = Processor::new(16);
        // No worker: the queue never empties
        let shared = processor.shared();
        shared.queue.push(entry("stuck")).unwrap();

        let err = processor.drain(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, Error::DrainTimeout { remaining: 1 }));
    }
}
