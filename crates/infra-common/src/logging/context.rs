use std::collections::BTreeMap;
use std::fmt;
use tracing::{Level, Span};

/// Context information for logging
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Component that is generating the log
    pub component: String,
    /// Operation or action being performed
    pub operation: Option<String>,
    /// The entity being worked on (ticket id, agent id, ...)
    pub subject: Option<String>,
    /// Additional contextual fields
    pub fields: BTreeMap<String, String>,
}

impl LogContext {
    /// Create a new log context with just the component name
    pub fn new<S: Into<String>>(component: S) -> Self {
        LogContext {
            component: component.into(),
            operation: None,
            subject: None,
            fields: BTreeMap::new(),
        }
    }

    /// Create a new log context with component and operation
    pub fn with_operation<S: Into<String>, T: Into<String>>(component: S, operation: T) -> Self {
        LogContext {
            component: component.into(),
            operation: Some(operation.into()),
            subject: None,
            fields: BTreeMap::new(),
        }
    }

    /// Set the subject recorded on spans created from this context
    pub fn with_subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Add a field to the context
    pub fn with_field<S: Into<String>, T: Into<String>>(mut self, key: S, value: T) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Create a span with this context's information.
    ///
    /// Free-form `fields` only show up in the `Display` form; spans carry the
    /// component, operation and subject.
    pub fn span(&self, level: Level) -> Span {
        let operation = self.operation.as_deref().unwrap_or("-");
        let subject = self.subject.as_deref().unwrap_or("-");

        // span! needs a constant level per callsite
        match level {
            Level::TRACE => tracing::trace_span!("deskroute", component = %self.component, operation = %operation, subject = %subject),
            Level::DEBUG => tracing::debug_span!("deskroute", component = %self.component, operation = %operation, subject = %subject),
            Level::INFO => tracing::info_span!("deskroute", component = %self.component, operation = %operation, subject = %subject),
            Level::WARN => tracing::warn_span!("deskroute", component = %self.component, operation = %operation, subject = %subject),
            _ => tracing::error_span!("deskroute", component = %self.component, operation = %operation, subject = %subject),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.component)?;

        if let Some(op) = &self.operation {
            write!(f, "[{}]", op)?;
        }

        if let Some(subject) = &self.subject {
            write!(f, "[{}]", subject)?;
        }

        for (key, value) in &self.fields {
            write!(f, "[{}={}]", key, value)?;
        }

        Ok(())
    }
}

/// Enter a logging context for the duration of a closure
pub fn with_context<F, R>(context: &LogContext, level: Level, f: F) -> R
where
    F: FnOnce() -> R,
{
    let span = context.span(level);
    let _guard = span.enter();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_orders_fields() {
        let ctx = LogContext::with_operation("routing", "route")
            .with_subject("T-100")
            .with_field("tier", "vip")
            .with_field("category", "bug_report");

        assert_eq!(
            ctx.to_string(),
            "[routing][route][T-100][category=bug_report][tier=vip]"
        );
    }

    #[test]
    fn test_with_context_returns_closure_value() {
        let ctx = LogContext::new("pipeline");
        let value = with_context(&ctx, Level::DEBUG, || 41 + 1);
        assert_eq!(value, 42);
    }
}
