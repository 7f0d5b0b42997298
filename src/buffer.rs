// Byte ring used as staging storage by the file sinks.
//
// One mutex guards the ring state; telemetry counters live in atomics so
// health checks never contend with writers.

use crate::error::{Error, Result};
use crate::metadata::wall_clock_secs;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Default fragmentation percent above which a failing write first
/// attempts compaction.
pub const DEFAULT_COMPACTION_THRESHOLD: u8 = 75;

/// Seconds without any operation before health reports inactivity.
const INACTIVITY_WARNING_SECS: i64 = 30;

struct Inner {
    storage: Box<[u8]>,
    read: usize,
    write: usize,
    full: bool,
}

impl Inner {
    fn occupancy(&self, capacity: usize) -> usize {
        if self.full {
            capacity
        } else {
            (self.write + capacity - self.read) % capacity
        }
    }

    /// Free bytes sitting at the start of storage when the occupied region
    /// is linear. A large write can only use them by wrapping; compaction
    /// merges them with the tail segment.
    fn wrapped_free(&self) -> usize {
        if !self.full && self.write >= self.read {
            self.read
        } else {
            0
        }
    }
}

/// Health classification returned by [`CircularBuffer::health`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

/// Health report: status plus human-readable issues.
#[derive(Debug, Clone)]
pub struct BufferHealth {
    pub status: HealthStatus,
    pub issues: Vec<String>,
}

/// Telemetry snapshot.
#[derive(Debug, Clone, Copy)]
pub struct BufferStats {
    pub capacity: usize,
    pub occupancy: usize,
    pub available: usize,
    pub total_bytes_written: u64,
    pub peak_usage: u64,
    pub overflow_attempts: u64,
    pub underflow_attempts: u64,
    pub compactions: u64,
    pub fragmentation_percent: u8,
}

/// Bounded byte ring with all-or-nothing writes, lazy compaction, and
/// health telemetry.
pub struct CircularBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
    compaction_threshold: u8,
    total_bytes_written: AtomicU64,
    peak_usage: AtomicU64,
    overflow_attempts: AtomicU64,
    underflow_attempts: AtomicU64,
    compactions: AtomicU64,
    total_ops: AtomicU64,
    last_operation: AtomicI64,
    last_compaction: AtomicI64,
}

impl CircularBuffer {
    /// Create a ring of `capacity` bytes with the default compaction
    /// threshold.
    pub fn new(capacity: usize) -> Self {
        Self::with_threshold(capacity, DEFAULT_COMPACTION_THRESHOLD)
    }

    /// Create a ring with an explicit fragmentation threshold (percent).
    pub fn with_threshold(capacity: usize, compaction_threshold: u8) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");
        let now = wall_clock_secs();
        Self {
            inner: Mutex::new(Inner {
                storage: vec![0u8; capacity].into_boxed_slice(),
                read: 0,
                write: 0,
                full: false,
            }),
            capacity,
            compaction_threshold,
            total_bytes_written: AtomicU64::new(0),
            peak_usage: AtomicU64::new(0),
            overflow_attempts: AtomicU64::new(0),
            underflow_attempts: AtomicU64::new(0),
            compactions: AtomicU64::new(0),
            total_ops: AtomicU64::new(0),
            last_operation: AtomicI64::new(now),
            last_compaction: AtomicI64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bytes currently stored.
    pub fn len(&self) -> usize {
        let inner = self.lock_inner();
        inner.occupancy(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.lock_inner().full
    }

    /// Free bytes.
    pub fn available(&self) -> usize {
        self.capacity - self.len()
    }

    /// Write all of `bytes` or nothing.
    ///
    /// A slice longer than the whole ring is a `BufferOverflow`; a slice
    /// that does not fit in the free space (even after compaction when the
    /// fragmentation threshold is exceeded) is a `BufferFull`. Returns the
    /// number of bytes written.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.total_ops.fetch_add(1, Ordering::Relaxed);
        if bytes.len() > self.capacity {
            self.overflow_attempts.fetch_add(1, Ordering::Relaxed);
            return Err(Error::BufferOverflow {
                requested: bytes.len(),
                capacity: self.capacity,
            });
        }

        let mut inner = self.lock_inner();
        let mut available = self.capacity - inner.occupancy(self.capacity);

        if bytes.len() > available {
            let frag = inner.wrapped_free() * 100 / self.capacity;
            if frag as u8 > self.compaction_threshold {
                self.compact_locked(&mut inner);
                available = self.capacity - inner.occupancy(self.capacity);
            }
            if bytes.len() > available {
                self.overflow_attempts.fetch_add(1, Ordering::Relaxed);
                return Err(Error::BufferFull {
                    requested: bytes.len(),
                    available,
                });
            }
        }

        if !bytes.is_empty() {
            let write = inner.write;
            let tail = (self.capacity - write).min(bytes.len());
            inner.storage[write..write + tail].copy_from_slice(&bytes[..tail]);
            if tail < bytes.len() {
                // Wrapping write: second copy at the start of storage
                let rest = bytes.len() - tail;
                inner.storage[..rest].copy_from_slice(&bytes[tail..]);
            }
            inner.write = (write + bytes.len()) % self.capacity;
            if inner.write == inner.read {
                inner.full = true;
            }
        }

        let occupancy = inner.occupancy(self.capacity) as u64;
        drop(inner);

        self.total_bytes_written
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        self.peak_usage.fetch_max(occupancy, Ordering::Relaxed);
        self.last_operation
            .store(wall_clock_secs(), Ordering::Relaxed);
        Ok(bytes.len())
    }

    /// Copy up to `dest.len()` bytes out of the ring.
    ///
    /// Fails with `BufferUnderflow` when the ring is empty.
    pub fn read(&self, dest: &mut [u8]) -> Result<usize> {
        self.total_ops.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.lock_inner();
        let occupancy = inner.occupancy(self.capacity);
        if occupancy == 0 {
            self.underflow_attempts.fetch_add(1, Ordering::Relaxed);
            return Err(Error::BufferUnderflow);
        }

        let n = dest.len().min(occupancy);
        if n > 0 {
            let read = inner.read;
            let tail = (self.capacity - read).min(n);
            dest[..tail].copy_from_slice(&inner.storage[read..read + tail]);
            if tail < n {
                dest[tail..n].copy_from_slice(&inner.storage[..n - tail]);
            }
            inner.read = (read + n) % self.capacity;
            inner.full = false;
        }
        drop(inner);

        self.last_operation
            .store(wall_clock_secs(), Ordering::Relaxed);
        Ok(n)
    }

    /// Relinearize wrapped data so occupied bytes start at offset 0.
    /// No-op when the occupied region is already contiguous.
    pub fn compact(&self) {
        let mut inner = self.lock_inner();
        self.compact_locked(&mut inner);
    }

    fn compact_locked(&self, inner: &mut Inner) {
        let occupancy = inner.occupancy(self.capacity);
        // Wrapped iff read >= write with data present
        if occupancy == 0 || inner.read < inner.write {
            return;
        }

        let mut tmp = vec![0u8; occupancy];
        let tail = self.capacity - inner.read;
        tmp[..tail].copy_from_slice(&inner.storage[inner.read..]);
        tmp[tail..].copy_from_slice(&inner.storage[..inner.write]);
        inner.storage[..occupancy].copy_from_slice(&tmp);

        inner.read = 0;
        inner.write = occupancy % self.capacity;
        inner.full = occupancy == self.capacity;

        self.compactions.fetch_add(1, Ordering::Relaxed);
        self.last_compaction
            .store(wall_clock_secs(), Ordering::Relaxed);
    }

    /// Current fragmentation percent (wrapped free bytes over capacity).
    pub fn fragmentation_percent(&self) -> u8 {
        let inner = self.lock_inner();
        (inner.wrapped_free() * 100 / self.capacity) as u8
    }

    /// Telemetry snapshot.
    pub fn stats(&self) -> BufferStats {
        let (occupancy, frag) = {
            let inner = self.lock_inner();
            (
                inner.occupancy(self.capacity),
                (inner.wrapped_free() * 100 / self.capacity) as u8,
            )
        };
        BufferStats {
            capacity: self.capacity,
            occupancy,
            available: self.capacity - occupancy,
            total_bytes_written: self.total_bytes_written.load(Ordering::Relaxed),
            peak_usage: self.peak_usage.load(Ordering::Relaxed),
            overflow_attempts: self.overflow_attempts.load(Ordering::Relaxed),
            underflow_attempts: self.underflow_attempts.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            fragmentation_percent: frag,
        }
    }

    /// Classify buffer health as of `now` (unix seconds).
    ///
    /// Warning: >90% usage, >5% failed-op rate, >50% fragmentation, or
    /// >30s inactivity. Critical: >95% usage.
    pub fn health(&self, now: i64) -> BufferHealth {
        let stats = self.stats();
        let usage_pct = stats.occupancy * 100 / stats.capacity;
        let mut issues = Vec::new();
        let mut status = HealthStatus::Healthy;

        if usage_pct > 90 {
            issues.push(format!("usage at {}%", usage_pct));
            status = HealthStatus::Warning;
        }

        let failures = stats.overflow_attempts + stats.underflow_attempts;
        let total_ops = self.total_ops.load(Ordering::Relaxed);
        if total_ops > 0 && failures * 100 / total_ops > 5 {
            issues.push(format!(
                "{} failed operations out of {}",
                failures, total_ops
            ));
            status = HealthStatus::Warning;
        }

        if stats.fragmentation_percent > 50 {
            issues.push(format!(
                "fragmentation at {}%",
                stats.fragmentation_percent
            ));
            status = HealthStatus::Warning;
        }

        let idle = now - self.last_operation.load(Ordering::Relaxed);
        if idle > INACTIVITY_WARNING_SECS {
            issues.push(format!("no operations for {}s", idle));
            status = HealthStatus::Warning;
        }

        if usage_pct > 95 {
            issues.push(format!("usage critical at {}%", usage_pct));
            status = HealthStatus::Critical;
        }

        BufferHealth { status, issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_invariant() {
        let buf = CircularBuffer::new(8);
        assert!(buf.is_empty());
        assert!(!buf.is_full());
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.available(), 8);
    }

    #[test]
    fn test_write_read_round_trip() {
        let buf = CircularBuffer::new(16);
        assert_eq!(buf.write(b"hello").unwrap(), 5);
        assert_eq!(buf.len(), 5);

        let mut dest = [0u8; 16];
        let n = buf.read(&mut dest).unwrap();
        assert_eq!(&dest[..n], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_wrap_around_scenario() {
        // 8-byte ring: write 5, read 3, write 4 wraps; occupancy 6
        let buf = CircularBuffer::new(8);
        buf.write(b"ABCDE").unwrap();

        let mut dest = [0u8; 3];
        assert_eq!(buf.read(&mut dest).unwrap(), 3);
        assert_eq!(&dest, b"ABC");

        buf.write(b"FGHI").unwrap();
        assert_eq!(buf.len(), 6);

        let mut dest = [0u8; 6];
        assert_eq!(buf.read(&mut dest).unwrap(), 6);
        assert_eq!(&dest, b"DEFGHI");
    }

    #[test]
    fn test_full_flag() {
        let buf = CircularBuffer::new(4);
        buf.write(b"abcd").unwrap();
        assert!(buf.is_full());
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.available(), 0);

        let mut dest = [0u8; 1];
        buf.read(&mut dest).unwrap();
        assert!(!buf.is_full());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_overflow_rejected() {
        let buf = CircularBuffer::new(4);
        let err = buf.write(b"abcdef").unwrap_err();
        assert!(matches!(err, Error::BufferOverflow { requested: 6, capacity: 4 }));
        // Nothing was written
        assert!(buf.is_empty());
    }

    #[test]
    fn test_full_rejected_all_or_nothing() {
        let buf = CircularBuffer::new(8);
        buf.write(b"abcdef").unwrap();
        let err = buf.write(b"xyz").unwrap_err();
        assert!(matches!(err, Error::BufferFull { requested: 3, available: 2 }));
        // Prior contents untouched
        let mut dest = [0u8; 8];
        let n = buf.read(&mut dest).unwrap();
        assert_eq!(&dest[..n], b"abcdef");
    }

    #[test]
    fn test_underflow() {
        let buf = CircularBuffer::new(8);
        let mut dest = [0u8; 4];
        assert!(matches!(buf.read(&mut dest), Err(Error::BufferUnderflow)));
    }

    #[test]
    fn test_compact_relinearizes() {
        let buf = CircularBuffer::new(8);
        buf.write(b"ABCDEF").unwrap();
        let mut dest = [0u8; 5];
        buf.read(&mut dest).unwrap(); // read=5, write=6
        buf.write(b"GHI").unwrap(); // wraps: write=1, read=5

        buf.compact();
        assert_eq!(buf.stats().compactions, 1);
        assert_eq!(buf.len(), 4);

        let mut dest = [0u8; 4];
        buf.read(&mut dest).unwrap();
        assert_eq!(&dest, b"FGHI");
    }

    #[test]
    fn test_compact_noop_when_contiguous() {
        let buf = CircularBuffer::new(8);
        buf.write(b"AB").unwrap();
        buf.compact();
        assert_eq!(buf.stats().compactions, 0);
    }

    #[test]
    fn test_compact_when_exactly_full() {
        let buf = CircularBuffer::new(4);
        buf.write(b"abcd").unwrap();
        let mut dest = [0u8; 2];
        buf.read(&mut dest).unwrap();
        buf.write(b"ef").unwrap(); // read == write == 2, full
        assert!(buf.is_full());

        buf.compact();
        assert!(buf.is_full());
        let mut dest = [0u8; 4];
        buf.read(&mut dest).unwrap();
        assert_eq!(&dest, b"cdef");
    }

    #[test]
    fn test_ring_integrity_sequence() {
        // Interleaved writes and reads below capacity observe bytes in
        // write order.
        let buf = CircularBuffer::new(32);
        let mut expected = Vec::new();
        let mut observed = Vec::new();
        for round in 0u8..10 {
            let chunk: Vec<u8> = (0..7).map(|i| round * 7 + i).collect();
            buf.write(&chunk).unwrap();
            expected.extend_from_slice(&chunk);

            let mut dest = [0u8; 7];
            let n = buf.read(&mut dest).unwrap();
            observed.extend_from_slice(&dest[..n]);
        }
        assert_eq!(observed, expected);
    }

    #[test]
    fn test_stats_counters() {
        let buf = CircularBuffer::new(8);
        buf.write(b"abcd").unwrap();
        buf.write(b"ef").unwrap();
        let stats = buf.stats();
        assert_eq!(stats.total_bytes_written, 6);
        assert_eq!(stats.peak_usage, 6);
        assert_eq!(stats.occupancy, 6);

        let mut dest = [0u8; 8];
        buf.read(&mut dest).unwrap();
        let _ = buf.read(&mut dest); // underflow
        assert_eq!(buf.stats().underflow_attempts, 1);
    }

    #[test]
    fn test_health_usage_thresholds() {
        let buf = CircularBuffer::new(100);
        let now = wall_clock_secs();

        buf.write(&vec![0u8; 50]).unwrap();
        assert_eq!(buf.health(now).status, HealthStatus::Healthy);

        buf.write(&vec![0u8; 42]).unwrap(); // 92%
        assert_eq!(buf.health(now).status, HealthStatus::Warning);

        buf.write(&vec![0u8; 4]).unwrap(); // 96%
        let health = buf.health(now);
        assert_eq!(health.status, HealthStatus::Critical);
        assert!(!health.issues.is_empty());
    }

    #[test]
    fn test_health_inactivity() {
        let buf = CircularBuffer::new(8);
        let future = wall_clock_secs() + 60;
        let health = buf.health(future);
        assert_eq!(health.status, HealthStatus::Warning);
        assert!(health.issues.iter().any(|i| i.contains("no operations")));
    }
}
