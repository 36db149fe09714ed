//! Configuration for the Hikari runtime.
//!
//! Layered loading through figment ([`ConfigLoader`]), the schema
//! ([`HikariConfig`]) and validation of the values the dispatcher depends on.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    CommandsConfig, HikariConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
