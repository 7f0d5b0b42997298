// Record metadata and structured field values

use crate::context::LogContext;
use std::time::{SystemTime, UNIX_EPOCH};

/// Call-site metadata attached to a log record.
///
/// All string fields are borrowed for the duration of the call; the logger
/// never retains them past return except by value copy (see [`OwnedMetadata`]).
#[derive(Debug, Clone, Copy)]
pub struct Metadata<'a> {
    /// Wall-clock timestamp in whole seconds
    pub timestamp: i64,
    /// OS thread identifier
    pub thread_id: u32,
    /// Source file path
    pub file: &'a str,
    /// Source line number
    pub line: u32,
    /// Function (or module path) name
    pub function: &'a str,
    /// Optional per-thread context sub-record
    pub context: Option<&'a LogContext>,
}

impl<'a> Metadata<'a> {
    /// Capture metadata for the current call site.
    pub fn capture(file: &'a str, line: u32, function: &'a str) -> Self {
        Self {
            timestamp: wall_clock_secs(),
            thread_id: current_thread_id(),
            file,
            line,
            function,
            context: None,
        }
    }

    /// Attach a context sub-record.
    pub fn with_context(mut self, context: &'a LogContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Copy into owned storage for the async queue.
    pub fn to_owned(&self) -> OwnedMetadata {
        OwnedMetadata {
            timestamp: self.timestamp,
            thread_id: self.thread_id,
            file: self.file.to_string(),
            line: self.line,
            function: self.function.to_string(),
            context: self.context.cloned(),
        }
    }
}

/// Owned copy of [`Metadata`], held by async queue entries.
#[derive(Debug, Clone)]
pub struct OwnedMetadata {
    pub timestamp: i64,
    pub thread_id: u32,
    pub file: String,
    pub line: u32,
    pub function: String,
    pub context: Option<LogContext>,
}

impl OwnedMetadata {
    /// Borrow back as [`Metadata`] for formatting.
    pub fn as_metadata(&self) -> Metadata<'_> {
        Metadata {
            timestamp: self.timestamp,
            thread_id: self.thread_id,
            file: &self.file,
            line: self.line,
            function: &self.function,
            context: self.context.as_ref(),
        }
    }
}

/// Tagged value for structured fields.
///
/// Object entries keep insertion order (vector of pairs, not a map).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<FieldValue>),
    Object(Vec<(String, FieldValue)>),
    Null,
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// Named structured field with optional attributes.
///
/// Attributes render as `name_key` siblings immediately after the parent
/// field in structured output.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub attributes: Vec<(String, String)>,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}

/// Wall clock in whole seconds since the epoch.
pub(crate) fn wall_clock_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Get current thread ID (truncated to u32)
pub(crate) fn current_thread_id() -> u32 {
    #[cfg(target_os = "linux")]
    {
        unsafe { libc::gettid() as u32 }
    }
    #[cfg(not(target_os = "linux"))]
    {
        // Stable fallback: hash the opaque thread ID
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        hasher.finish() as u32
    }
}
