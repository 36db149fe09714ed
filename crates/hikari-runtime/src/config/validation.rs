//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CommandsConfig, HikariConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HikariConfig) -> ConfigResult<()> {
    validate_commands_config(&config.commands)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates command settings.
fn validate_commands_config(commands: &CommandsConfig) -> ConfigResult<()> {
    if commands.prefixes.is_empty() {
        return Err(ConfigError::missing_field("commands.prefixes"));
    }

    for prefix in &commands.prefixes {
        validate_prefix(prefix)?;
    }

    if commands.extensions.is_empty() {
        return Err(ConfigError::missing_field("commands.extensions"));
    }

    if let Some(ext) = commands.extensions.iter().find(|ext| ext.starts_with('.')) {
        return Err(ConfigError::validation(format!(
            "Extension '{ext}' must be given without the leading dot"
        )));
    }

    Ok(())
}

/// Validates a single prefix.
fn validate_prefix(prefix: &str) -> ConfigResult<()> {
    if prefix.is_empty() {
        return Err(ConfigError::InvalidPrefix {
            prefix: prefix.to_string(),
            reason: "prefix must not be empty",
        });
    }

    if prefix.trim().is_empty() {
        return Err(ConfigError::InvalidPrefix {
            prefix: prefix.to_string(),
            reason: "prefix must not be only whitespace",
        });
    }

    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.max_files == 0 {
        return Err(ConfigError::validation("logging.max_files must be greater than 0"));
    }

    Ok(())
}
