//! Error types for the Hikari core.
//!
//! Load-time problems are split in two: [`MetadataError`] for a registration
//! that is missing or misusing a required field, and [`LoadError`] for a
//! module that cannot be registered at all. Neither aborts the whole load
//! phase; the loader collects them and reports at the end.
//!
//! Redefinitions are never errors. They surface as [`RegistrationWarning`]s
//! and the last registration wins.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error type returned by command and event handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by command and event handlers.
pub type HandlerResult = Result<(), BoxError>;

// =============================================================================
// Metadata Errors
// =============================================================================

/// A registration descriptor could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// A required field was absent or empty.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A command name or alias that could never be dispatched.
    #[error("invalid {field} '{value}': {reason}")]
    InvalidName {
        /// Which field was rejected (`name` or `alias`).
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl MetadataError {
    pub(crate) fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}

// =============================================================================
// Load Errors
// =============================================================================

/// A handler module could not be loaded.
///
/// Each variant names the offending module so the final report can point at
/// the right file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The module is neither a cog nor a declarative command.
    #[error("module '{path}' is not a command or cog: {reason}")]
    Unrecognized {
        /// Module path.
        path: String,
        /// What the capability check found.
        reason: &'static str,
    },

    /// One of the module's registrations has bad metadata.
    #[error("module '{path}' has invalid metadata: {source}")]
    Metadata {
        /// Module path.
        path: String,
        /// The underlying metadata problem.
        #[source]
        source: MetadataError,
    },

    /// The module's constructor panicked.
    #[error("module '{path}' panicked during init: {message}")]
    Init {
        /// Module path.
        path: String,
        /// Panic message.
        message: String,
    },

    /// Reading the module's metadata or running its `setup` panicked.
    #[error("module '{path}' panicked while registering: {message}")]
    Setup {
        /// Module path.
        path: String,
        /// Panic message.
        message: String,
    },

    /// A discovered file does not export any handler module.
    #[error("'{}' does not export a handler module", path.display())]
    NoExport {
        /// File that was scanned.
        path: PathBuf,
    },

    /// A discovered file exports several modules and none is marked default.
    #[error("'{}' exports {count} handler modules and none is marked default", path.display())]
    AmbiguousExport {
        /// File that was scanned.
        path: PathBuf,
        /// Number of exports found for the file.
        count: usize,
    },

    /// Enumerating a directory entry failed.
    #[error("failed to read '{}': {message}", path.display())]
    Discovery {
        /// Path that could not be read.
        path: PathBuf,
        /// I/O error description.
        message: String,
    },
}

impl LoadError {
    /// Returns the module path or file the error refers to.
    pub fn location(&self) -> String {
        match self {
            Self::Unrecognized { path, .. }
            | Self::Metadata { path, .. }
            | Self::Init { path, .. }
            | Self::Setup { path, .. } => path.clone(),
            Self::NoExport { path }
            | Self::AmbiguousExport { path, .. }
            | Self::Discovery { path, .. } => path.display().to_string(),
        }
    }
}

// =============================================================================
// Registration Warnings
// =============================================================================

/// A non-fatal redefinition noticed while registering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationWarning {
    /// A command name was registered again; the newer descriptor replaced it.
    #[error("command '{name}' redefined, last registration wins")]
    DuplicateCommand {
        /// The command name.
        name: String,
    },

    /// An alias was moved from one command to another.
    #[error("alias '{alias}' rebound from '{previous}' to '{current}'")]
    DuplicateAlias {
        /// The alias.
        alias: String,
        /// Command the alias pointed at before.
        previous: String,
        /// Command the alias points at now.
        current: String,
    },

    /// A category was declared again with different metadata, which was ignored.
    #[error("category '{name}' redeclared with different metadata, keeping the first")]
    CategoryRedefined {
        /// The category name.
        name: String,
    },
}

// =============================================================================
// Outbound Errors
// =============================================================================

/// Errors raised by the reply/send helpers on a message context.
#[derive(Debug, Error)]
pub enum OutboundError {
    /// No outbound collaborator was configured on the client.
    #[error("no outbound client configured")]
    Unavailable,

    /// The outbound collaborator failed.
    #[error("outbound request failed: {0}")]
    Failed(#[source] BoxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_location() {
        let err = LoadError::Unrecognized {
            path: "bot::commands::ping".into(),
            reason: "no capability",
        };
        assert_eq!(err.location(), "bot::commands::ping");

        let err = LoadError::NoExport {
            path: PathBuf::from("commands/ping.rs"),
        };
        assert_eq!(err.location(), "commands/ping.rs");
    }

    #[test]
    fn test_metadata_error_display() {
        let err = LoadError::Metadata {
            path: "bot::fun".into(),
            source: MetadataError::missing("name"),
        };
        assert_eq!(
            err.to_string(),
            "module 'bot::fun' has invalid metadata: missing required field 'name'"
        );
    }
}
