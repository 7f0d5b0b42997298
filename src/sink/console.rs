// Console sink: stdout or stderr, optional colors, optional fast path

use super::{Sink, SinkKind};
use crate::error::Result;
use crate::format::TemplateFormatter;
use crate::level::Level;
use crate::metadata::{wall_clock_secs, Metadata};
use std::io::Write;

/// Which standard stream the sink writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stdout,
    Stderr,
}

enum Stream {
    Stdout(std::io::Stdout),
    Stderr(std::io::Stderr),
}

impl Stream {
    fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            Stream::Stdout(s) => s.write_all(bytes),
            Stream::Stderr(s) => s.write_all(bytes),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Stdout(s) => s.flush(),
            Stream::Stderr(s) => s.flush(),
        }
    }
}

/// Sink writing rendered records to a standard stream.
pub struct ConsoleSink {
    stream: Stream,
    formatter: TemplateFormatter,
    min_level: Level,
    /// Bypass the formatter and emit `[unix_seconds] message`
    fast_mode: bool,
}

impl ConsoleSink {
    pub fn new(target: ConsoleTarget, formatter: TemplateFormatter) -> Self {
        let stream = match target {
            ConsoleTarget::Stdout => Stream::Stdout(std::io::stdout()),
            ConsoleTarget::Stderr => Stream::Stderr(std::io::stderr()),
        };
        Self {
            stream,
            formatter,
            min_level: Level::Trace,
            fast_mode: false,
        }
    }

    pub fn stdout(formatter: TemplateFormatter) -> Self {
        Self::new(ConsoleTarget::Stdout, formatter)
    }

    pub fn stderr(formatter: TemplateFormatter) -> Self {
        Self::new(ConsoleTarget::Stderr, formatter)
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_fast_mode(mut self, fast: bool) -> Self {
        self.fast_mode = fast;
        self
    }

    fn write_line(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        if bytes.last() != Some(&b'\n') {
            self.stream.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl Sink for ConsoleSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Console
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
        if self.fast_mode {
            let secs = metadata.map_or_else(wall_clock_secs, |m| m.timestamp);
            let line = format!("[{}] {}\n", secs, message);
            return self.write_line(line.as_bytes());
        }
        let rendered = self.formatter.format(level, message, metadata);
        self.write_line(rendered.as_bytes())
    }

    fn write_preformatted(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_line(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }
}
