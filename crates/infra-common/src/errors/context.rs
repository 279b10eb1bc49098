use crate::errors::types::Error;
use std::fmt;

/// Where an infrastructure error happened
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Component where the error occurred
    pub component: String,
    /// Operation that was being performed
    pub operation: String,
    /// Additional context information
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new<S: Into<String>, T: Into<String>>(component: S, operation: T) -> Self {
        ErrorContext {
            component: component.into(),
            operation: operation.into(),
            details: None,
        }
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in component '{}' during operation '{}'", self.component, self.operation)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Extension trait for attaching an [`ErrorContext`] to an error
pub trait ErrorExt<T> {
    fn context(self, ctx: ErrorContext) -> Result<T, Error>;

    fn with_context<S: Into<String>, U: Into<String>>(self, component: S, operation: U) -> Result<T, Error>;
}

impl<T> ErrorExt<T> for Result<T, Error> {
    fn context(self, ctx: ErrorContext) -> Result<T, Error> {
        self.map_err(|err| match err {
            Error::Config(msg) => Error::Config(format!("{} [{}]", msg, ctx)),
            Error::Parse(msg) => Error::Parse(format!("{} [{}]", msg, ctx)),
            Error::UnsupportedFormat(msg) => Error::UnsupportedFormat(format!("{} [{}]", msg, ctx)),
            Error::Internal(msg) => Error::Internal(format!("{} [{}]", msg, ctx)),
            Error::Io(io) => Error::Config(format!("{} [{}]", io, ctx)),
        })
    }

    fn with_context<S: Into<String>, U: Into<String>>(self, component: S, operation: U) -> Result<T, Error> {
        self.context(ErrorContext::new(component, operation))
    }
}
