//! # Hikari
//!
//! Command and event routing for chat bots.
//!
//! ## Overview
//!
//! Hikari turns handler modules into a registry of prefixed commands and a
//! set of event subscriptions. Modules are exported with [`export_module!`]
//! and found at startup, either all at once from the link-time manifest or
//! file by file under a command directory.
//!
//! ```text
//! ┌──────────────┐  load   ┌───────────────┐  dispatch  ┌────────────────────┐
//! │ export_module│────────▶│ CommandClient │───────────▶│ handler (own task) │──▶ Outbound
//! │  (manifest)  │         │  registry     │            └────────────────────┘
//! └──────────────┘         │  event binder │───────────▶ EventSource (once / on)
//!                          └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hikari::prelude::*;
//!
//! pub struct Utility;
//!
//! impl ModuleInit for Utility {
//!     fn init(_ctx: &LoadContext) -> Self { Utility }
//! }
//!
//! impl Cog for Utility {
//!     fn setup(&self, reg: &mut CogRegistrar<Self>) {
//!         reg.command(CommandInfo::named("ping").alias("p"), Self::ping);
//!     }
//! }
//!
//! impl Utility {
//!     async fn ping(self: Arc<Self>, ctx: Arc<MessageContext>, _args: Vec<String>) -> HandlerResult {
//!         ctx.reply("Pong!").await?;
//!         Ok(())
//!     }
//! }
//!
//! export_module!(cog Utility);
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (client, _report) = ClientBuilder::new().prefix("!").load().await?;
//!     client.run(messages, CancellationToken::new()).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: read `hikari.toml` (default)
//! - `yaml-config`: read `hikari.yaml`
//! - `json-log`: JSON log output

pub use hikari_core as core;
pub use hikari_runtime as runtime;

pub use hikari_core::export_module;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use hikari::prelude::*;
/// ```
pub mod prelude {
    // Handler modules
    pub use hikari_core::prelude::*;

    // Messages and the reply channel
    pub use hikari_core::{BoxedMessage, Outbound, OutboundError, TextMessage};

    // Events
    pub use hikari_core::{EventBus, EventSource};

    // Client
    pub use hikari_runtime::{ClientBuilder, CommandClient, LoadReport};
}
