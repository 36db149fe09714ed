//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HikariConfig {
    /// Command discovery and dispatch settings.
    #[serde(default)]
    pub commands: CommandsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-module config sections, keyed by qualified module name or type name.
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

// =============================================================================
// Commands
// =============================================================================

/// Command discovery and dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Prefixes marking a message as a command. A prefix may contain
    /// whitespace, e.g. a mention followed by a space (`"<@id> "`), but must
    /// not be empty or whitespace only.
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// Root directory of command sources. When unset, every exported
    /// module in the binary is loaded.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// File extensions considered during directory discovery.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// File names never treated as command modules.
    #[serde(default = "default_skip_files")]
    pub skip_files: Vec<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            directory: None,
            extensions: default_extensions(),
            skip_files: default_skip_files(),
        }
    }
}

fn default_prefixes() -> Vec<String> {
    vec!["!".to_string()]
}

fn default_extensions() -> Vec<String> {
    vec!["rs".to_string()]
}

fn default_skip_files() -> Vec<String> {
    ["mod.rs", "lib.rs", "main.rs"]
        .into_iter()
        .map(String::from)
        .collect()
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name, as used in filter directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// The matching `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to compact otherwise.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When the log file is rolled over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level, overridden by `RUST_LOG`.
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Target file when `output = "file"`.
    pub file_path: Option<PathBuf>,
    /// Per-target levels, e.g. `hikari_core = "debug"`.
    pub filters: HashMap<String, LogLevel>,
    pub thread_ids: bool,
    /// Include source file and line.
    pub file_location: bool,
    pub span_events: SpanEventConfig,
    pub rotation: LogRotation,
    /// Rotated files kept on disk.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            filters: HashMap::new(),
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            rotation: LogRotation::Never,
            max_files: 5,
        }
    }
}
