//! # deskroute infra-common
//!
//! Shared plumbing for the deskroute crates: logging setup and structured log
//! contexts, the infrastructure error type, and configuration file loading.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{load_file, load_str, ConfigFormat};
pub use errors::{Error, ErrorContext, ErrorExt, Result};
pub use logging::{setup_logging, LogContext, LoggingConfig};
