// SPDX-License-Identifier: Apache-2.0 OR MIT
// Thread-local log context: correlation and tracing identifiers that ride
// along with every record logged from the owning thread.

use std::cell::RefCell;

/// Per-thread context sub-record.
///
/// Set once at the edge of a request and picked up by every log call on the
/// same thread. No cross-thread propagation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogContext {
    pub request_id: Option<String>,
    pub correlation_id: Option<String>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub operation: Option<String>,
    pub function: Option<String>,
    pub parent_function: Option<String>,
    pub depth: u32,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
        self
    }

    pub fn with_operation(mut self, op: impl Into<String>) -> Self {
        self.operation = Some(op.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

thread_local! {
    static CURRENT: RefCell<Option<LogContext>> = const { RefCell::new(None) };
}

/// Install a context for the current thread, replacing any previous one.
pub fn set(context: LogContext) {
    CURRENT.with(|c| *c.borrow_mut() = Some(context));
}

/// Clone of the current thread's context, if any.
pub fn get() -> Option<LogContext> {
    CURRENT.with(|c| c.borrow().clone())
}

/// Remove the current thread's context.
pub fn clear() {
    CURRENT.with(|c| *c.borrow_mut() = None);
}

/// Read-modify-write the correlation id, creating an empty context if the
/// thread has none yet.
pub fn add_correlation(id: impl Into<String>) {
    CURRENT.with(|c| {
        let mut slot = c.borrow_mut();
        let ctx = slot.get_or_insert_with(LogContext::default);
        ctx.correlation_id = Some(id.into());
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        clear();
        assert!(get().is_none());

        set(LogContext::new().with_request_id("req-1"));
        let ctx = get().unwrap();
        assert_eq!(ctx.request_id.as_deref(), Some("req-1"));

        clear();
        assert!(get().is_none());
    }

    #[test]
    fn test_add_correlation_creates_context() {
        clear();
        add_correlation("corr-9");
        let ctx = get().unwrap();
        assert_eq!(ctx.correlation_id.as_deref(), Some("corr-9"));
    }

    #[test]
    fn test_add_correlation_preserves_fields() {
        clear();
        set(LogContext::new().with_request_id("req-2"));
        add_correlation("corr-2");
        let ctx = get().unwrap();
        assert_eq!(ctx.request_id.as_deref(), Some("req-2"));
        assert_eq!(ctx.correlation_id.as_deref(), Some("corr-2"));
        clear();
    }

    #[test]
    fn test_thread_isolation() {
        clear();
        set(LogContext::new().with_request_id("main-thread"));

        let other = std::thread::spawn(|| get()).join().unwrap();
        assert!(other.is_none());
        clear();
    }
}
