//! Error types shared across the engine crates.

use thiserror::Error;

/// Engine-level error for failures outside the GPU layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or event-loop failures
    #[error("Window error: {0}")]
    Window(String),

    /// Surface creation failures
    #[error("Surface error: {0}")]
    Surface(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unparsable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;
