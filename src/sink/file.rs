// File sink: circular-buffer staging, threshold flush, and rotation.
//
// All methods run behind the owning logger's (or async processor's) mutex;
// rotation therefore blocks concurrent writers until the fresh file exists.

use super::{with_retries, ErrorHandler, ErrorReport, Sink, SinkKind};
use crate::buffer::CircularBuffer;
use crate::config::{Config, RotationMode};
use crate::error::{Error, Result};
use crate::format::TemplateFormatter;
use crate::level::Level;
use crate::metadata::Metadata;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Drain chunk size while flushing the staging buffer.
const DRAIN_CHUNK: usize = 4096;

/// Rotation thresholds and retention.
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    pub enabled: bool,
    pub mode: RotationMode,
    pub max_size: u64,
    pub interval: Duration,
    pub max_rotated_files: usize,
    pub compress: bool,
}

impl RotationPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.enable_rotation,
            mode: config.rotation_mode,
            max_size: config.max_file_size,
            interval: Duration::from_secs(config.rotation_interval_secs),
            max_rotated_files: config.max_rotated_files,
            compress: config.compress_rotated,
        }
    }

    fn size_due(&self, bytes_written: u64) -> bool {
        bytes_written >= self.max_size
    }

    fn time_due(&self, since_rotation: Duration) -> bool {
        since_rotation >= self.interval
    }

    fn due(&self, bytes_written: u64, since_rotation: Duration) -> bool {
        if !self.enabled {
            return false;
        }
        match self.mode {
            RotationMode::Size => self.size_due(bytes_written),
            RotationMode::Time => self.time_due(since_rotation),
            RotationMode::Both => {
                self.size_due(bytes_written) || self.time_due(since_rotation)
            }
        }
    }
}

/// Sink appending rendered records to a rotating file through a staging
/// ring.
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
    buffer: CircularBuffer,
    formatter: TemplateFormatter,
    min_level: Level,
    flush_interval: Duration,
    last_flush: Instant,
    /// Bytes in the active file (flushed, not staged)
    bytes_written: u64,
    rotation: RotationPolicy,
    last_rotation: Instant,
    error_handler: ErrorHandler,
    max_retries: u32,
    retry_delay: Duration,
}

impl FileSink {
    /// Open (or create) the active file and set up staging.
    pub fn new(
        path: impl Into<PathBuf>,
        buffer_size: usize,
        formatter: TemplateFormatter,
        rotation: RotationPolicy,
        error_handler: ErrorHandler,
    ) -> Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        let bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            path,
            file: Some(file),
            buffer: CircularBuffer::new(buffer_size),
            formatter,
            min_level: Level::Trace,
            flush_interval: Duration::from_millis(5000),
            last_flush: Instant::now(),
            bytes_written,
            rotation,
            last_rotation: Instant::now(),
            error_handler,
            max_retries: 0,
            retry_delay: Duration::from_millis(100),
        })
    }

    /// Build from [`Config`]; requires `config.file_path`.
    pub fn from_config(config: &Config, error_handler: ErrorHandler) -> Result<Self> {
        let path = config
            .file_path
            .clone()
            .ok_or_else(|| Error::Config("file_path is required for a file sink".into()))?;
        let formatter = TemplateFormatter::for_file(config.formatter_config())?;
        let mut sink = Self::new(
            path,
            config.buffer_size,
            formatter,
            RotationPolicy::from_config(config),
            error_handler,
        )?;
        sink.flush_interval = Duration::from_millis(config.flush_interval_ms);
        sink.max_retries = config.max_retries;
        sink.retry_delay = Duration::from_millis(config.retry_delay_ms);
        Ok(sink)
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Staging buffer telemetry, for health checks.
    pub fn buffer_stats(&self) -> crate::buffer::BufferStats {
        self.buffer.stats()
    }

    fn report(&self, err: &Error) {
        let report = ErrorReport::new(err.kind(), err.to_string(), file!(), line!());
        (self.error_handler)(&report);
    }

    /// Stage bytes, draining first when the ring cannot take them.
    fn stage(&mut self, bytes: &[u8]) -> Result<()> {
        match self.buffer.write(bytes) {
            Ok(_) => Ok(()),
            Err(Error::BufferFull { .. }) => {
                self.drain_to_file()?;
                // Re-report a still-failing stage as I/O per the sink contract
                self.buffer.write(bytes).map(|_| ()).map_err(|err| {
                    self.report(&err);
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        err.to_string(),
                    ))
                })
            }
            Err(Error::BufferOverflow { .. }) => {
                // Record larger than the whole ring: drain, then write through
                self.drain_to_file()?;
                self.write_direct(bytes)
            }
            Err(err) => Err(err),
        }
    }

    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.stage(bytes)?;
        if bytes.last() != Some(&b'\n') {
            self.stage(b"\n")?;
        }

        let due_by_size = self.buffer.len() >= self.buffer.capacity() / 2;
        let due_by_time = self.last_flush.elapsed() >= self.flush_interval;
        if due_by_size || due_by_time {
            self.flush_to_disk()?;
        }
        Ok(())
    }

    fn ensure_file(&mut self) -> Result<&mut File> {
        if self.file.is_none() {
            let file = open_append(&self.path)?;
            self.bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| Error::Unexpected("log file handle missing".into()))
    }

    fn write_direct(&mut self, bytes: &[u8]) -> Result<()> {
        let max_retries = self.max_retries;
        let retry_delay = self.retry_delay;
        let file = self.ensure_file()?;
        with_retries(max_retries, retry_delay, || {
            file.write_all(bytes)?;
            Ok(())
        })?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// One `write_all` per contiguous chunk handed out by the ring.
    fn drain_to_file(&mut self) -> Result<()> {
        let mut chunk = [0u8; DRAIN_CHUNK];
        while !self.buffer.is_empty() {
            let n = self.buffer.read(&mut chunk)?;
            let max_retries = self.max_retries;
            let retry_delay = self.retry_delay;
            let file = self.ensure_file()?;
            let result = with_retries(max_retries, retry_delay, || {
                file.write_all(&chunk[..n])?;
                Ok(())
            });
            if let Err(err) = result {
                self.report(&err);
                return Err(err);
            }
            self.bytes_written += n as u64;
        }
        Ok(())
    }

    fn flush_to_disk(&mut self) -> Result<()> {
        self.drain_to_file()?;
        if let Some(file) = self.file.as_mut() {
            file.sync_all()?;
        }
        self.last_flush = Instant::now();
        self.maybe_rotate()
    }

    fn maybe_rotate(&mut self) -> Result<()> {
        if self
            .rotation
            .due(self.bytes_written, self.last_rotation.elapsed())
        {
            self.rotate()?;
        }
        Ok(())
    }

    /// Archive the active file and start a fresh one. The staging buffer
    /// was drained by the caller, so no accepted record crosses the
    /// rotation boundary unflushed.
    fn rotate(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }

        self.shift_archives();

        if self.rotation.max_rotated_files == 0 {
            // No retention: the previous contents are discarded
            remove_if_exists(&self.path);
        } else {
            rename_if_exists(&self.path, &rotated_path(&self.path, 0));
            if self.rotation.compress {
                self.compress_archive(&rotated_path(&self.path, 0));
            }
        }

        self.file = Some(open_append(&self.path)?);
        self.bytes_written = 0;
        self.last_rotation = Instant::now();
        Ok(())
    }

    /// Shift `path.{i-1}` onto `path.{i}`, dropping the oldest archive.
    fn shift_archives(&self) {
        let max = self.rotation.max_rotated_files;
        if max == 0 {
            return;
        }

        remove_if_exists(&rotated_path(&self.path, max - 1));
        remove_if_exists(&gz_path(&rotated_path(&self.path, max - 1)));

        for i in (1..max).rev() {
            let from = rotated_path(&self.path, i - 1);
            let to = rotated_path(&self.path, i);
            rename_if_exists(&from, &to);
            rename_if_exists(&gz_path(&from), &gz_path(&to));
        }
    }

    #[cfg(feature = "compression")]
    fn compress_archive(&self, src: &Path) {
        // Non-fatal: on failure the uncompressed archive stays in place
        if let Err(err) = gzip_file(src) {
            self.report(&err);
        }
    }

    #[cfg(not(feature = "compression"))]
    fn compress_archive(&self, _src: &Path) {
        let report = ErrorReport::new(
            crate::error::ErrorKind::Config,
            "compression requested but the 'compression' feature is disabled",
            file!(),
            line!(),
        );
        (self.error_handler)(&report);
    }
}

impl Sink for FileSink {
    fn kind(&self) -> SinkKind {
        SinkKind::File
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn write_record(
        &mut self,
        level: Level,
        message: &str,
        metadata: Option<&Metadata>,
    ) -> Result<()> {
        if level < self.min_level {
            return Ok(());
        }
        let rendered = self.formatter.format(level, message, metadata);
        self.append(rendered.as_bytes())
    }

    fn write_preformatted(&mut self, bytes: &[u8]) -> Result<()> {
        self.append(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_to_disk()
    }

    fn close(&mut self) -> Result<()> {
        self.flush_to_disk()?;
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // Best effort: pending staged bytes should reach disk
        let _ = self.close();
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// `app.log` -> `app.log.3`
fn rotated_path(path: &Path, index: usize) -> PathBuf {
    let mut os = path.to_path_buf().into_os_string();
    os.push(format!(".{}", index));
    PathBuf::from(os)
}

/// `app.log.3` -> `app.log.3.gz`
fn gz_path(path: &Path) -> PathBuf {
    let mut os = path.to_path_buf().into_os_string();
    os.push(".gz");
    PathBuf::from(os)
}

fn remove_if_exists(path: &Path) {
    let _ = fs::remove_file(path);
}

fn rename_if_exists(from: &Path, to: &Path) {
    let _ = fs::rename(from, to);
}

#[cfg(feature = "compression")]
fn gzip_file(src: &Path) -> Result<()> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut os = src.to_path_buf().into_os_string();
    os.push(".gz.tmp");
    let tmp = PathBuf::from(os);
    let target = gz_path(src);

    let mut input = File::open(src)?;
    let output = File::create(&tmp)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    std::io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.sync_all()?;

    fs::rename(&tmp, &target)?;
    fs::remove_file(src)?;
    Ok(())
}
