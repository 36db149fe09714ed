//! Layered configuration for the command client.
//!
//! Sources, weakest first:
//!
//! | Layer | Source |
//! |-------|--------|
//! | defaults | [`HikariConfig::default`] |
//! | base | [`ConfigLoader::merge`] |
//! | profile | `hikari.{profile}.toml` next to the main file |
//! | main | `hikari.toml` (`toml-config`, default) or `hikari.yaml` / `hikari.yml` (`yaml-config`) |
//! | environment | `HIKARI_*`, `__` between nesting levels |
//!
//! The first directory holding a main file wins; TOML is tried before YAML.
//!
//! `HIKARI_COMMANDS__PREFIXES='["!", "?"]'` sets `commands.prefixes`,
//! `HIKARI_LOGGING__LEVEL=debug` sets `logging.level`.
//!
//! ```rust,ignore
//! use hikari_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new().profile("prod").load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::HikariConfig;
use super::validation::validate_config;

const FILE_STEM: &str = "hikari";
const ENV_PREFIX: &str = "HIKARI_";

/// Deployment profile, selecting `hikari.{profile}.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the short forms `dev` and `prod`.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `HIKARI_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        match std::env::var("HIKARI_PROFILE") {
            Ok(name) => Self::parse(&name),
            Err(_) => Self::default(),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File formats compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl FileFormat {
    fn enabled() -> Vec<Self> {
        let mut formats = Vec::new();
        #[cfg(feature = "toml-config")]
        formats.push(Self::Toml);
        #[cfg(feature = "yaml-config")]
        formats.push(Self::Yaml);
        formats
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["yaml", "yml"],
        }
    }

    fn for_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::enabled()
            .into_iter()
            .find(|format| format.extensions().contains(&ext))
    }

    fn merge_into(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(figment::providers::Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(figment::providers::Yaml::file(path)),
        }
    }
}

/// Builds a [`HikariConfig`] from defaults, files and the environment.
pub struct ConfigLoader {
    base: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    file: Option<PathBuf>,
    env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Searches the working directory and the user config directory, with
    /// the profile taken from `HIKARI_PROFILE`.
    pub fn new() -> Self {
        Self {
            base: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            file: None,
            env: true,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search. Once any is added the default
    /// locations are no longer searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Merges configuration programmatically, above the built-in defaults
    /// and below files and environment.
    pub fn merge(mut self, config: HikariConfig) -> Self {
        self.base = self.base.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<HikariConfig> {
        let profile = self.profile.clone();
        let config: HikariConfig = self
            .figment()?
            .extract()
            .map_err(|e| ConfigError::ParseError(format!("Failed to extract configuration: {e}")))?;
        validate_config(&config)?;

        debug!(
            %profile,
            prefixes = ?config.commands.prefixes,
            directory = ?config.commands.directory,
            level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(self) -> ConfigResult<Figment> {
        let mut figment =
            Figment::from(Serialized::defaults(HikariConfig::default())).merge(self.base.clone());

        figment = match &self.file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.clone()));
                }
                let format = FileFormat::for_path(path).ok_or_else(|| {
                    ConfigError::ParseError(format!(
                        "Unsupported or disabled configuration format: {}",
                        path.display()
                    ))
                })?;
                info!(path = %path.display(), "Loading configuration file");
                format.merge_into(figment, path)
            }
            None => self.merge_found_files(figment),
        };

        if self.env {
            trace!(prefix = ENV_PREFIX, "Merging environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        Ok(figment)
    }

    fn directories(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(FILE_STEM)))
            .collect()
    }

    /// Merges the profile file and the main file of the first directory
    /// that has a main file.
    fn merge_found_files(&self, figment: Figment) -> Figment {
        let directories = self.directories();
        let profile = self.profile.as_str();

        for dir in &directories {
            for format in FileFormat::enabled() {
                for ext in format.extensions() {
                    let main = dir.join(format!("{FILE_STEM}.{ext}"));
                    if !main.is_file() {
                        continue;
                    }

                    let mut figment = figment;
                    let overlay = dir.join(format!("{FILE_STEM}.{profile}.{ext}"));
                    if overlay.is_file() {
                        debug!(path = %overlay.display(), "Loading profile configuration");
                        figment = format.merge_into(figment, &overlay);
                    }
                    info!(path = %main.display(), "Loading configuration file");
                    return format.merge_into(figment, &main);
                }
            }
        }

        warn!(searched = ?directories, "No configuration file found, using defaults");
        figment
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<HikariConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, plus environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<HikariConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================
