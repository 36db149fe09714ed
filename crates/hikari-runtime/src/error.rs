//! Runtime error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop the client from being built.
///
/// Problems with individual modules never end up here; they are collected
/// in the [`LoadReport`](crate::loader::LoadReport) instead.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The command root itself could not be enumerated.
    #[error("Cannot discover modules under '{}': {message}", path.display())]
    Discovery { path: PathBuf, message: String },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
