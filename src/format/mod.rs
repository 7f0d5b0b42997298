// SPDX-License-Identifier: Apache-2.0 OR MIT
// Template formatter: templates are parsed once at construction into a
// segment cache; rendering walks the cache and never re-scans the template.

mod timestamp;

pub use timestamp::iso8601;

use crate::config::{FormatterConfig, LevelFormat, StructuredFormat, TimestampFormat};
use crate::error::{Error, Result};
use crate::level::Level;
use crate::metadata::{wall_clock_secs, Field, FieldValue, Metadata};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Default record format for console sinks.
pub const DEFAULT_CONSOLE_TEMPLATE: &str =
    "[{timestamp}] [{color}{level}{reset}] [{file}:{line}] {message}";

/// Default record format for file sinks (colors off).
pub const DEFAULT_FILE_TEMPLATE: &str = "[{timestamp}] [{level}] {message}";

/// Reset escape emitted by `{reset}` when colors are enabled.
const ANSI_RESET: &str = "\x1b[0m";

/// Upper bound for the stack-first render attempt.
const STACK_CAPACITY: usize = 1024;

/// Handler for custom placeholders: `(level, message, metadata) -> rendered`.
pub type CustomHandler = Box<dyn Fn(Level, &str, Option<&Metadata>) -> String + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Timestamp,
    Level,
    Message,
    Thread,
    File,
    Line,
    Function,
    Color,
    Reset,
    RequestId,
    CorrelationId,
    TraceId,
    SpanId,
    UserId,
    SessionId,
    Operation,
    Component,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "timestamp" => Placeholder::Timestamp,
            "level" => Placeholder::Level,
            "message" => Placeholder::Message,
            "thread" => Placeholder::Thread,
            "file" => Placeholder::File,
            "line" => Placeholder::Line,
            "function" => Placeholder::Function,
            "color" => Placeholder::Color,
            "reset" => Placeholder::Reset,
            "request_id" => Placeholder::RequestId,
            "correlation_id" => Placeholder::CorrelationId,
            "trace_id" => Placeholder::TraceId,
            "span_id" => Placeholder::SpanId,
            "user_id" => Placeholder::UserId,
            "session_id" => Placeholder::SessionId,
            "operation" => Placeholder::Operation,
            "component" => Placeholder::Component,
            _ => return None,
        })
    }
}

/// Optional `{name:spec}` alignment: `<` left (default), `>` right, `^` center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormatSpec {
    align: char,
    width: usize,
}

#[derive(Debug)]
enum Segment {
    /// Byte range into the original template
    Literal { start: usize, end: usize },
    Placeholder {
        kind: Placeholder,
        spec: Option<FormatSpec>,
    },
    /// Dispatches to the handler registered under this name
    Custom { name: String },
}

impl std::fmt::Debug for TemplateFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateFormatter")
            .field("config", &self.config)
            .field("template", &self.template)
            .field("segments", &self.segments)
            .field("custom_handlers", &self.custom_handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Compiled template renderer for plain and structured records.
pub struct TemplateFormatter {
    config: FormatterConfig,
    template: String,
    segments: Vec<Segment>,
    custom_handlers: HashMap<String, CustomHandler>,
}

impl TemplateFormatter {
    /// Compile `config.template` (or the console default).
    pub fn new(config: FormatterConfig) -> Result<Self> {
        let template = config
            .template
            .clone()
            .unwrap_or_else(|| DEFAULT_CONSOLE_TEMPLATE.to_string());
        let custom_handlers = HashMap::new();
        let segments = parse_template(&template, &custom_handlers)?;
        Ok(Self {
            config,
            template,
            segments,
            custom_handlers,
        })
    }

    /// Compile with custom placeholder handlers already registered, so
    /// templates may reference them.
    pub fn with_custom(
        config: FormatterConfig,
        handlers: Vec<(String, CustomHandler)>,
    ) -> Result<Self> {
        let template = config
            .template
            .clone()
            .unwrap_or_else(|| DEFAULT_CONSOLE_TEMPLATE.to_string());
        let custom_handlers: HashMap<String, CustomHandler> = handlers.into_iter().collect();
        let segments = parse_template(&template, &custom_handlers)?;
        Ok(Self {
            config,
            template,
            segments,
            custom_handlers,
        })
    }

    /// Formatter with the file defaults: file template, colors off.
    pub fn for_file(mut config: FormatterConfig) -> Result<Self> {
        if config.template.is_none() {
            config.template = Some(DEFAULT_FILE_TEMPLATE.to_string());
        }
        config.use_color = false;
        Self::new(config)
    }

    /// Register a handler and re-validate the template; names registered
    /// here become legal placeholders.
    pub fn register_custom(
        &mut self,
        name: impl Into<String>,
        handler: CustomHandler,
    ) -> Result<()> {
        self.custom_handlers.insert(name.into(), handler);
        self.segments = parse_template(&self.template, &self.custom_handlers)?;
        Ok(())
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Render a plain record.
    ///
    /// The render is attempted into a stack buffer first and falls back to
    /// a heap string when the output does not fit.
    pub fn format(&self, level: Level, message: &str, metadata: Option<&Metadata>) -> String {
        let mut stack = [0u8; STACK_CAPACITY];
        let limit = self.config.stack_buffer_size.min(STACK_CAPACITY);
        let mut writer = StackWriter {
            buf: &mut stack[..limit],
            len: 0,
        };
        if self.render(&mut writer, level, message, metadata).is_ok() {
            let len = writer.len;
            return String::from_utf8_lossy(&stack[..len]).into_owned();
        }

        let mut out = String::with_capacity(self.template.len() + message.len() + 64);
        // Writing into a String cannot fail
        let _ = self.render(&mut out, level, message, metadata);
        out
    }

    fn render(
        &self,
        out: &mut impl std::fmt::Write,
        level: Level,
        message: &str,
        metadata: Option<&Metadata>,
    ) -> std::fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal { start, end } => out.write_str(&self.template[*start..*end])?,
                Segment::Placeholder { kind, spec } => {
                    self.render_placeholder(out, *kind, *spec, level, message, metadata)?
                }
                Segment::Custom { name } => {
                    if let Some(handler) = self.custom_handlers.get(name) {
                        out.write_str(&handler(level, message, metadata))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn render_placeholder(
        &self,
        out: &mut impl std::fmt::Write,
        kind: Placeholder,
        spec: Option<FormatSpec>,
        level: Level,
        message: &str,
        metadata: Option<&Metadata>,
    ) -> std::fmt::Result {
        // Alignment requires the rendered value up front; the common
        // spec-less path writes straight through.
        if let Some(spec) = spec {
            let mut value = String::new();
            self.render_placeholder_value(&mut value, kind, level, message, metadata)?;
            return match spec.align {
                '>' => write!(out, "{:>width$}", value, width = spec.width),
                '^' => write!(out, "{:^width$}", value, width = spec.width),
                _ => write!(out, "{:<width$}", value, width = spec.width),
            };
        }
        self.render_placeholder_value(out, kind, level, message, metadata)
    }

    fn render_placeholder_value(
        &self,
        out: &mut impl std::fmt::Write,
        kind: Placeholder,
        level: Level,
        message: &str,
        metadata: Option<&Metadata>,
    ) -> std::fmt::Result {
        match kind {
            Placeholder::Timestamp => {
                let secs = metadata.map_or_else(wall_clock_secs, |m| m.timestamp);
                self.write_timestamp(out, secs)?;
            }
            Placeholder::Level => out.write_str(&self.level_text(level))?,
            Placeholder::Message => out.write_str(message)?,
            Placeholder::Thread => {
                if let Some(meta) = metadata {
                    write!(out, "{}", meta.thread_id)?;
                }
            }
            Placeholder::File => {
                if let Some(meta) = metadata {
                    out.write_str(meta.file)?;
                }
            }
            Placeholder::Line => {
                if let Some(meta) = metadata {
                    write!(out, "{}", meta.line)?;
                }
            }
            Placeholder::Function => {
                if let Some(meta) = metadata {
                    out.write_str(meta.function)?;
                }
            }
            Placeholder::Color => {
                if self.config.use_color {
                    out.write_str(level.color_code())?;
                }
            }
            Placeholder::Reset => {
                if self.config.use_color {
                    out.write_str(ANSI_RESET)?;
                }
            }
            Placeholder::Component => {
                out.write_str(self.config.component.as_deref().unwrap_or("-"))?
            }
            Placeholder::RequestId
            | Placeholder::CorrelationId
            | Placeholder::TraceId
            | Placeholder::SpanId
            | Placeholder::UserId
            | Placeholder::SessionId
            | Placeholder::Operation => {
                let value = metadata
                    .and_then(|m| m.context)
                    .and_then(|ctx| match kind {
                        Placeholder::RequestId => ctx.request_id.as_deref(),
                        Placeholder::CorrelationId => ctx.correlation_id.as_deref(),
                        Placeholder::TraceId => ctx.trace_id.as_deref(),
                        Placeholder::SpanId => ctx.span_id.as_deref(),
                        Placeholder::UserId => ctx.user_id.as_deref(),
                        Placeholder::SessionId => ctx.session_id.as_deref(),
                        Placeholder::Operation => ctx.operation.as_deref(),
                        _ => unreachable!(),
                    })
                    .unwrap_or("-");
                out.write_str(value)?;
            }
        }
        Ok(())
    }

    fn level_text(&self, level: Level) -> String {
        match self.config.level_format {
            LevelFormat::Upper => level.as_str().to_string(),
            LevelFormat::Lower => level.as_str().to_ascii_lowercase(),
            LevelFormat::ShortUpper => level.short_str().to_string(),
            LevelFormat::ShortLower => level.short_str().to_ascii_lowercase(),
        }
    }

    fn write_timestamp(&self, out: &mut impl std::fmt::Write, secs: i64) -> std::fmt::Result {
        match self.config.timestamp_format {
            TimestampFormat::Unix => write!(out, "{}", secs),
            TimestampFormat::Iso8601 => timestamp::write_iso8601(out, secs),
            TimestampFormat::Custom => match self.config.custom_timestamp_format.as_deref() {
                Some(format) => match chrono::DateTime::from_timestamp(secs, 0) {
                    Some(dt) => write!(out, "{}", dt.format(format)),
                    None => write!(out, "{}", secs),
                },
                None => write!(out, "{}", secs),
            },
        }
    }

    fn timestamp_text(&self, metadata: Option<&Metadata>) -> String {
        let secs = metadata.map_or_else(wall_clock_secs, |m| m.timestamp);
        let mut out = String::with_capacity(20);
        let _ = self.write_timestamp(&mut out, secs);
        out
    }

    /// Render a structured record in the configured encoding.
    pub fn format_structured(
        &self,
        level: Level,
        message: &str,
        fields: &[Field],
        metadata: Option<&Metadata>,
    ) -> String {
        match self.config.structured_format {
            StructuredFormat::Json => self.format_json(level, message, fields, metadata),
            StructuredFormat::Logfmt => self.format_pairs(level, message, fields, metadata, " ", "="),
            StructuredFormat::Custom => self.format_pairs(
                level,
                message,
                fields,
                metadata,
                &self.config.custom_field_separator,
                &self.config.custom_key_value_separator,
            ),
        }
    }

    fn format_json(
        &self,
        level: Level,
        message: &str,
        fields: &[Field],
        metadata: Option<&Metadata>,
    ) -> String {
        let mut out = String::with_capacity(64 + message.len() + fields.len() * 24);
        out.push('{');
        let mut first = true;

        if self.config.include_timestamp {
            push_json_key(&mut out, &mut first, "timestamp");
            push_json_string(&mut out, &self.timestamp_text(metadata));
        }
        if self.config.include_level {
            push_json_key(&mut out, &mut first, "level");
            push_json_string(&mut out, &self.level_text(level));
        }
        if self.config.include_message {
            push_json_key(&mut out, &mut first, "msg");
            push_json_string(&mut out, message);
        }

        for field in fields {
            push_json_key(&mut out, &mut first, &field.name);
            push_json_value(&mut out, &field.value);
            for (attr_key, attr_value) in &field.attributes {
                let sibling = format!("{}_{}", field.name, attr_key);
                push_json_key(&mut out, &mut first, &sibling);
                push_json_string(&mut out, attr_value);
            }
        }

        out.push('}');
        out
    }

    fn format_pairs(
        &self,
        level: Level,
        message: &str,
        fields: &[Field],
        metadata: Option<&Metadata>,
        field_sep: &str,
        kv_sep: &str,
    ) -> String {
        let mut out = String::with_capacity(48 + message.len() + fields.len() * 16);
        let mut first = true;

        let mut push_pair = |out: &mut String, first: &mut bool, key: &str, value: &str| {
            if !*first {
                out.push_str(field_sep);
            }
            *first = false;
            out.push_str(key);
            out.push_str(kv_sep);
            push_logfmt_value(out, value);
        };

        if self.config.include_timestamp {
            push_pair(&mut out, &mut first, "timestamp", &self.timestamp_text(metadata));
        }
        if self.config.include_level {
            push_pair(&mut out, &mut first, "level", &self.level_text(level));
        }
        if self.config.include_message {
            push_pair(&mut out, &mut first, "msg", message);
        }

        for field in fields {
            push_pair(&mut out, &mut first, &field.name, &field.value.to_plain_string());
            for (attr_key, attr_value) in &field.attributes {
                let sibling = format!("{}_{}", field.name, attr_key);
                push_pair(&mut out, &mut first, &sibling, attr_value);
            }
        }

        out
    }
}

impl FieldValue {
    /// Plain rendering for logfmt-style output; containers render as
    /// compact JSON.
    fn to_plain_string(&self) -> String {
        match self {
            FieldValue::Str(s) => s.clone(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => format_float(*f),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Null => "null".to_string(),
            FieldValue::Array(_) | FieldValue::Object(_) => {
                let mut out = String::new();
                push_json_value(&mut out, self);
                out
            }
        }
    }
}

fn parse_template(
    template: &str,
    custom_handlers: &HashMap<String, CustomHandler>,
) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }

        let close = template[i..]
            .find('}')
            .map(|offset| i + offset)
            .ok_or_else(|| {
                Error::InvalidPlaceholder(format!("unbalanced '{{' at byte {}", i))
            })?;

        if literal_start < i {
            segments.push(Segment::Literal {
                start: literal_start,
                end: i,
            });
        }

        let body = &template[i + 1..close];
        let (name, spec) = match body.split_once(':') {
            Some((name, spec)) => (name, Some(parse_format_spec(name, spec)?)),
            None => (body, None),
        };

        if let Some(kind) = Placeholder::from_name(name) {
            segments.push(Segment::Placeholder { kind, spec });
        } else if custom_handlers.contains_key(name) {
            segments.push(Segment::Custom {
                name: name.to_string(),
            });
        } else {
            return Err(Error::InvalidPlaceholder(format!(
                "unknown placeholder '{{{}}}'",
                name
            )));
        }

        i = close + 1;
        literal_start = i;
    }

    if literal_start < bytes.len() {
        segments.push(Segment::Literal {
            start: literal_start,
            end: bytes.len(),
        });
    }

    Ok(segments)
}

fn parse_format_spec(name: &str, spec: &str) -> Result<FormatSpec> {
    let malformed = || {
        Error::InvalidPlaceholder(format!(
            "malformed format spec '{}' for placeholder '{{{}}}'",
            spec, name
        ))
    };

    let mut chars = spec.chars().peekable();
    let align = match chars.peek() {
        Some(&c @ ('<' | '>' | '^')) => {
            chars.next();
            c
        }
        _ => '<',
    };

    let digits: String = chars.collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let width = digits.parse().map_err(|_| malformed())?;
    Ok(FormatSpec { align, width })
}

fn push_json_key(out: &mut String, first: &mut bool, key: &str) {
    if !*first {
        out.push(',');
    }
    *first = false;
    push_json_string(out, key);
    out.push(':');
}

fn push_json_string(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn push_json_value(out: &mut String, value: &FieldValue) {
    match value {
        FieldValue::Str(s) => push_json_string(out, s),
        FieldValue::Int(i) => {
            let _ = write!(out, "{}", i);
        }
        FieldValue::Float(f) => out.push_str(&format_float(*f)),
        FieldValue::Bool(b) => {
            let _ = write!(out, "{}", b);
        }
        FieldValue::Null => out.push_str("null"),
        FieldValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_json_value(out, item);
            }
            out.push(']');
        }
        FieldValue::Object(entries) => {
            out.push('{');
            let mut first = true;
            for (key, item) in entries {
                push_json_key(out, &mut first, key);
                push_json_value(out, item);
            }
            out.push('}');
        }
    }
}

/// Non-finite floats have no JSON encoding; render as null.
fn format_float(f: f64) -> String {
    if f.is_finite() {
        format!("{}", f)
    } else {
        "null".to_string()
    }
}

/// logfmt value: quoted when it contains space, quote, equals, or newline.
fn push_logfmt_value(out: &mut String, value: &str) {
    let needs_quoting = value
        .chars()
        .any(|c| c == ' ' || c == '"' || c == '=' || c == '\n');
    if !needs_quoting {
        out.push_str(value);
        return;
    }
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Fixed-capacity writer backing the stack-first render attempt; fails
/// with `fmt::Error` on overflow so the caller can retry on the heap.
struct StackWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl std::fmt::Write for StackWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let bytes = s.as_bytes();
        if self.len + bytes.len() > self.buf.len() {
            return Err(std::fmt::Error);
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LogContext;

    fn meta(timestamp: i64) -> Metadata<'static> {
        Metadata {
            timestamp,
            thread_id: 1,
            file: "main.rs",
            line: 10,
            function: "main",
            context: None,
        }
    }

    fn formatter(config: FormatterConfig) -> TemplateFormatter {
        TemplateFormatter::new(config).unwrap()
    }

    #[test]
    fn test_basic_template() {
        let config = FormatterConfig {
            template: Some("[{timestamp}] [{level}] {message}".into()),
            ..Default::default()
        };
        let fmt = formatter(config);
        let out = fmt.format(Level::Info, "hello", Some(&meta(1_640_995_200)));
        assert_eq!(out, "[1640995200] [INFO] hello");
    }

    #[test]
    fn test_short_lower_level() {
        let config = FormatterConfig {
            template: Some("[{timestamp}] [{level}] {message}".into()),
            level_format: LevelFormat::ShortLower,
            ..Default::default()
        };
        let fmt = formatter(config);
        let out = fmt.format(Level::Info, "hello", Some(&meta(1_640_995_200)));
        assert_eq!(out, "[1640995200] [inf] hello");
    }

    #[test]
    fn test_iso8601_timestamp() {
        let config = FormatterConfig {
            template: Some("{timestamp} {message}".into()),
            timestamp_format: TimestampFormat::Iso8601,
            ..Default::default()
        };
        let fmt = formatter(config);
        let out = fmt.format(Level::Info, "x", Some(&meta(946_684_800)));
        assert_eq!(out, "2000-01-01T00:00:00Z x");
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let config = FormatterConfig {
            template: Some("{bogus}".into()),
            ..Default::default()
        };
        let err = TemplateFormatter::new(config).unwrap_err();
        assert!(matches!(err, Error::InvalidPlaceholder(_)));
    }

    #[test]
    fn test_unbalanced_brace_rejected() {
        let config = FormatterConfig {
            template: Some("[{timestamp] {message}".into()),
            ..Default::default()
        };
        // The scan finds `]` inside the braces; `timestamp]` is unknown
        assert!(TemplateFormatter::new(config).is_err());

        let config = FormatterConfig {
            template: Some("{message} trailing {".into()),
            ..Default::default()
        };
        let err = TemplateFormatter::new(config).unwrap_err();
        assert!(matches!(err, Error::InvalidPlaceholder(_)));
    }

    #[test]
    fn test_malformed_spec_rejected() {
        let config = FormatterConfig {
            template: Some("{level:wide}".into()),
            ..Default::default()
        };
        assert!(TemplateFormatter::new(config).is_err());
    }

    #[test]
    fn test_spec_pads_level() {
        let config = FormatterConfig {
            template: Some("{level:<8}|".into()),
            ..Default::default()
        };
        let fmt = formatter(config);
        assert_eq!(fmt.format(Level::Info, "", None), "INFO    |");

        let config = FormatterConfig {
            template: Some("{level:>8}|".into()),
            ..Default::default()
        };
        let fmt = formatter(config);
        assert_eq!(fmt.format(Level::Info, "", None), "    INFO|");
    }

    #[test]
    fn test_custom_placeholder() {
        let config = FormatterConfig {
            template: Some("{app} {message}".into()),
            ..Default::default()
        };
        // Unknown until registered
        assert!(TemplateFormatter::new(config.clone()).is_err());

        let fmt = TemplateFormatter::with_custom(
            config,
            vec![(
                "app".to_string(),
                Box::new(|_: Level, _: &str, _: Option<&Metadata>| "relay".to_string()) as CustomHandler,
            )],
        )
        .unwrap();
        assert_eq!(fmt.format(Level::Info, "up", None), "relay up");
    }

    #[test]
    fn test_register_custom_revalidates() {
        let mut fmt = TemplateFormatter::new(FormatterConfig {
            template: Some("{message}".into()),
            ..Default::default()
        })
        .unwrap();
        fmt.register_custom("host", Box::new(|_, _, _| "node-1".to_string()))
            .unwrap();
        assert_eq!(fmt.format(Level::Info, "x", None), "x");
    }

    #[test]
    fn test_colors_toggle() {
        let config = FormatterConfig {
            template: Some("{color}{level}{reset}".into()),
            use_color: true,
            ..Default::default()
        };
        let fmt = formatter(config);
        assert_eq!(fmt.format(Level::Error, "", None), "\x1b[31mERROR\x1b[0m");

        let config = FormatterConfig {
            template: Some("{color}{level}{reset}".into()),
            use_color: false,
            ..Default::default()
        };
        let fmt = formatter(config);
        assert_eq!(fmt.format(Level::Error, "", None), "ERROR");
    }

    #[test]
    fn test_metadata_absent_renders_empty() {
        let config = FormatterConfig {
            template: Some("[{file}:{line}] {message}".into()),
            ..Default::default()
        };
        let fmt = formatter(config);
        assert_eq!(fmt.format(Level::Info, "m", None), "[:] m");
    }

    #[test]
    fn test_context_fields() {
        let config = FormatterConfig {
            template: Some("{request_id}/{trace_id}/{operation}".into()),
            ..Default::default()
        };
        let fmt = formatter(config);

        // Absent context renders dashes
        assert_eq!(fmt.format(Level::Info, "", Some(&meta(0))), "-/-/-");

        let ctx = LogContext::new()
            .with_request_id("r-1")
            .with_trace("t-1", "s-1");
        let mut m = meta(0);
        m.context = Some(&ctx);
        assert_eq!(fmt.format(Level::Info, "", Some(&m)), "r-1/t-1/-");
    }

    #[test]
    fn test_component_placeholder() {
        let config = FormatterConfig {
            template: Some("{component}: {message}".into()),
            component: Some("ingest".into()),
            ..Default::default()
        };
        let fmt = formatter(config);
        assert_eq!(fmt.format(Level::Info, "m", None), "ingest: m");

        let config = FormatterConfig {
            template: Some("{component}: {message}".into()),
            ..Default::default()
        };
        let fmt = formatter(config);
        assert_eq!(fmt.format(Level::Info, "m", None), "-: m");
    }

    #[test]
    fn test_heap_fallback_for_long_message() {
        let config = FormatterConfig {
            template: Some("{message}".into()),
            stack_buffer_size: 16,
            ..Default::default()
        };
        let fmt = formatter(config);
        let long = "x".repeat(500);
        assert_eq!(fmt.format(Level::Info, &long, None), long);
    }

    #[test]
    fn test_json_structured() {
        let config = FormatterConfig {
            template: Some("{message}".into()),
            ..Default::default()
        };
        let fmt = formatter(config);
        let fields = [Field::new("uid", "42")];
        let out = fmt.format_structured(Level::Info, "ok", &fields, Some(&meta(1)));
        assert_eq!(out, r#"{"timestamp":"1","level":"INFO","msg":"ok","uid":"42"}"#);
    }

    #[test]
    fn test_json_escaping() {
        let config = FormatterConfig::default();
        let fmt = formatter(config);
        let fields = [Field::new("path", r#"C:\logs"quoted""#)];
        let out = fmt.format_structured(Level::Info, "a\"b", &fields, Some(&meta(1)));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["msg"], "a\"b");
        assert_eq!(parsed["path"], r#"C:\logs"quoted""#);
    }

    #[test]
    fn test_json_field_order_and_attrs() {
        let config = FormatterConfig {
            include_timestamp: false,
            include_level: false,
            include_message: false,
            ..Default::default()
        };
        let fmt = formatter(config);
        let fields = [
            Field::new("b", 1i64).with_attr("unit", "ms"),
            Field::new("a", true),
        ];
        let out = fmt.format_structured(Level::Info, "", &fields, None);
        assert_eq!(out, r#"{"b":1,"b_unit":"ms","a":true}"#);
    }

    #[test]
    fn test_json_nested_values() {
        let config = FormatterConfig {
            include_timestamp: false,
            include_level: false,
            include_message: false,
            ..Default::default()
        };
        let fmt = formatter(config);
        let fields = [Field::new(
            "spans",
            FieldValue::Array(vec![
                FieldValue::Int(1),
                FieldValue::Object(vec![("id".into(), FieldValue::Str("x".into()))]),
                FieldValue::Null,
            ]),
        )];
        let out = fmt.format_structured(Level::Info, "", &fields, None);
        assert_eq!(out, r#"{"spans":[1,{"id":"x"},null]}"#);
    }

    #[test]
    fn test_logfmt_quoting() {
        let config = FormatterConfig {
            structured_format: StructuredFormat::Logfmt,
            include_timestamp: false,
            include_level: false,
            include_message: false,
            ..Default::default()
        };
        let fmt = formatter(config);
        let fields = [Field::new("k", "a b")];
        let out = fmt.format_structured(Level::Info, "", &fields, None);
        assert_eq!(out, r#"k="a b""#);
    }

    #[test]
    fn test_logfmt_full_record() {
        let config = FormatterConfig {
            structured_format: StructuredFormat::Logfmt,
            ..Default::default()
        };
        let fmt = formatter(config);
        let fields = [Field::new("n", 3i64)];
        let out = fmt.format_structured(Level::Warn, "disk low", &fields, Some(&meta(5)));
        assert_eq!(out, r#"timestamp=5 level=WARN msg="disk low" n=3"#);
    }

    #[test]
    fn test_custom_separators() {
        let config = FormatterConfig {
            structured_format: StructuredFormat::Custom,
            custom_field_separator: " | ".into(),
            custom_key_value_separator: "=>".into(),
            include_timestamp: false,
            ..Default::default()
        };
        let fmt = formatter(config);
        let out = fmt.format_structured(Level::Info, "up", &[Field::new("p", 80i64)], None);
        assert_eq!(out, "level=>INFO | msg=>up | p=>80");
    }

    #[test]
    fn test_default_templates_compile() {
        assert!(TemplateFormatter::new(FormatterConfig::default()).is_ok());
        assert!(TemplateFormatter::for_file(FormatterConfig::default()).is_ok());
    }

    #[test]
    fn test_file_formatter_disables_color() {
        let fmt = TemplateFormatter::for_file(FormatterConfig {
            use_color: true,
            ..Default::default()
        })
        .unwrap();
        let out = fmt.format(Level::Error, "boom", Some(&meta(7)));
        assert_eq!(out, "[7] [ERROR] boom");
    }
}
