//! Error types for letterforge.
//!
//! Only conditions that abort a generation request are errors. Malformed
//! markup, a template without a measurement hook, and missing assets are
//! recovered where they happen and logged instead.

use std::io;
use thiserror::Error;

/// Result type alias for letterforge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can end a generation request.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested template id is not registered.
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    /// The measurement sandbox could not be started.
    #[error("Rendering sandbox failed: {0}")]
    Sandbox(String),

    /// The measurement sandbox ran past its deadline.
    #[error("Rendering sandbox timed out after {0} ms")]
    SandboxTimeout(u64),

    /// A configuration value is outside its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// PDF export failed.
    #[error("Render error: {0}")]
    Render(String),

    /// The caller cancelled the request before it completed.
    #[error("Generation cancelled")]
    Cancelled,

    /// A request or config document failed to parse.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error when reading inputs or writing outputs.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
