//! Hikari Runtime - everything around the routing core.
//!
//! This crate provides:
//! - Layered configuration (`hikari.toml`, profiles, `HIKARI_*` variables)
//! - Logging setup over `tracing-subscriber`
//! - Module sources: the link-time manifest, a command directory, explicit lists
//! - The load phase ([`ModuleLoader`]) and its [`LoadReport`]
//! - [`CommandClient`], which owns the frozen registry and dispatches messages
//!
//! ```ignore
//! use hikari_runtime::{ClientBuilder, config::ConfigLoader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (client, report) = ClientBuilder::with_loader(ConfigLoader::new())?
//!         .load()
//!         .await?;
//!     tracing::info!(commands = report.command_count(), "Loaded");
//!
//!     client.run(my_message_stream, shutdown_token).await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;

// Re-exports
pub use client::{ClientBuilder, CommandClient};
pub use config::{ConfigError, ConfigLoader, ConfigResult, HikariConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use loader::{
    DirectorySource, DiscoveredModule, Discovery, LoadReport, LoadedModule, ModuleList,
    ModuleLoader, ModuleSource, StaticManifest,
};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-export tracing for use by handler crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
