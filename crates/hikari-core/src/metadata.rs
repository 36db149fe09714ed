//! Registration metadata and descriptor construction.
//!
//! A command or event handler is described by plain data ([`CommandInfo`],
//! [`EventInfo`]) and turned into a registration ([`CommandRegistration`],
//! [`EventRegistration`]) by pairing it with an already-bound handler. Building
//! never runs the handler; it only validates the metadata, so a misconfigured
//! module fails while loading instead of on its first invocation.
//!
//! ```rust,ignore
//! let info = CommandInfo::named("ping")
//!     .description("Checks latency")
//!     .alias("p")
//!     .category("Utility");
//!
//! let registration = CommandRegistration::build(info, |ctx, _args| async move {
//!     ctx.reply("pong").await?;
//!     Ok(())
//! })?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HandlerResult, MetadataError};
use crate::message::MessageContext;

/// Category name used for commands that declare none.
pub const DEFAULT_CATEGORY: &str = "No Categories";

/// Positional arguments of an event, as delivered by the event source.
pub type EventArgs = Arc<[Value]>;

/// Type-erased command handler, bound to its owning instance.
pub type CommandHandler = Arc<
    dyn Fn(Arc<MessageContext>, Vec<String>) -> BoxFuture<'static, HandlerResult> + Send + Sync,
>;

/// Type-erased event handler, bound to its owning instance.
pub type EventHandler = Arc<dyn Fn(EventArgs) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

// =============================================================================
// Categories
// =============================================================================

/// Metadata of a command category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    /// Category name, also the grouping key.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl CategoryInfo {
    /// Creates category metadata.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// How a command refers to its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    /// By name only; metadata comes from whoever declared it first.
    Name(String),
    /// Inline metadata, recorded if the category is new.
    Inline(CategoryInfo),
}

impl CategoryRef {
    /// The category name.
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Inline(info) => &info.name,
        }
    }

    /// Inline metadata, if any.
    pub fn info(&self) -> Option<&CategoryInfo> {
        match self {
            Self::Name(_) => None,
            Self::Inline(info) => Some(info),
        }
    }
}

impl From<&str> for CategoryRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for CategoryRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<CategoryInfo> for CategoryRef {
    fn from(info: CategoryInfo) -> Self {
        Self::Inline(info)
    }
}

// =============================================================================
// CommandInfo
// =============================================================================

/// Declarative metadata of a command.
///
/// Only `name` is required; everything else defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandInfo {
    /// Unique command name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Alternative names resolving to this command.
    pub aliases: Vec<String>,
    /// Usage string for help output.
    pub usage: String,
    /// Category placement.
    pub category: Option<CategoryRef>,
}

impl CommandInfo {
    /// Starts metadata for the command `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Adds several aliases.
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Sets the usage string.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Sets the category, by name or with inline [`CategoryInfo`].
    pub fn category(mut self, category: impl Into<CategoryRef>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Checks the required fields.
    pub fn validate(&self) -> Result<(), MetadataError> {
        check_token("name", &self.name)?;
        for alias in &self.aliases {
            check_token("alias", alias)?;
        }
        if let Some(category) = &self.category
            && category.name().is_empty()
        {
            return Err(MetadataError::missing("category.name"));
        }
        Ok(())
    }
}

/// Names and aliases are matched against a single whitespace-free token.
fn check_token(field: &'static str, value: &str) -> Result<(), MetadataError> {
    if value.is_empty() {
        return Err(MetadataError::missing(field));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(MetadataError::InvalidName {
            field,
            value: value.to_string(),
            reason: "must not contain whitespace",
        });
    }
    Ok(())
}

// =============================================================================
// EventInfo
// =============================================================================

/// Whether an event handler stays attached after firing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventMode {
    /// Fires for every occurrence.
    #[default]
    On,
    /// Fires at most once, then detaches.
    Once,
}

impl fmt::Display for EventMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Once => f.write_str("once"),
        }
    }
}

/// Declarative metadata of an event handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Event name in the event source's namespace.
    pub event: String,
    /// Attachment mode, repeating unless stated otherwise.
    #[serde(default)]
    pub mode: EventMode,
}

impl EventInfo {
    /// A repeating subscription to `event`.
    pub fn on(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            mode: EventMode::On,
        }
    }

    /// A one-shot subscription to `event`.
    pub fn once(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            mode: EventMode::Once,
        }
    }

    /// Checks the required fields.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.event.is_empty() {
            return Err(MetadataError::missing("event"));
        }
        Ok(())
    }
}

// =============================================================================
// Registrations
// =============================================================================

/// A validated command ready to be registered.
///
/// This is the descriptor stored in the registry: metadata plus a handler
/// that already carries its owning instance.
#[derive(Clone)]
pub struct CommandRegistration {
    info: CommandInfo,
    handler: CommandHandler,
}

/// The registry stores command registrations as-is.
pub type CommandDescriptor = CommandRegistration;

impl CommandRegistration {
    /// Validates `info` and binds it to `handler`.
    pub fn build<F, Fut>(info: CommandInfo, handler: F) -> Result<Self, MetadataError>
    where
        F: Fn(Arc<MessageContext>, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::from_handler(info, Arc::new(move |ctx, args| handler(ctx, args).boxed()))
    }

    /// Validates `info` and pairs it with an already-erased handler.
    pub fn from_handler(info: CommandInfo, handler: CommandHandler) -> Result<Self, MetadataError> {
        info.validate()?;
        Ok(Self { info, handler })
    }

    /// Full metadata.
    pub fn info(&self) -> &CommandInfo {
        &self.info
    }

    /// Command name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Description.
    pub fn description(&self) -> &str {
        &self.info.description
    }

    /// Declared aliases.
    pub fn aliases(&self) -> &[String] {
        &self.info.aliases
    }

    /// Usage string.
    pub fn usage(&self) -> &str {
        &self.info.usage
    }

    /// Declared category.
    pub fn category(&self) -> Option<&CategoryRef> {
        self.info.category.as_ref()
    }

    /// Replaces the category; used when a cog places its commands.
    pub(crate) fn with_category(mut self, category: CategoryRef) -> Self {
        self.info.category = Some(category);
        self
    }

    /// Starts the handler. The returned future is not yet polled.
    pub fn invoke(
        &self,
        ctx: Arc<MessageContext>,
        args: Vec<String>,
    ) -> BoxFuture<'static, HandlerResult> {
        (self.handler)(ctx, args)
    }
}

impl fmt::Debug for CommandRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistration")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// A validated event subscription ready to be bound.
#[derive(Clone)]
pub struct EventRegistration {
    info: EventInfo,
    handler: EventHandler,
}

impl EventRegistration {
    /// Validates `info` and binds it to `handler`.
    pub fn build<F, Fut>(info: EventInfo, handler: F) -> Result<Self, MetadataError>
    where
        F: Fn(EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::from_handler(info, Arc::new(move |args| handler(args).boxed()))
    }

    /// Validates `info` and pairs it with an already-erased handler.
    pub fn from_handler(info: EventInfo, handler: EventHandler) -> Result<Self, MetadataError> {
        info.validate()?;
        Ok(Self { info, handler })
    }

    /// Event name.
    pub fn event(&self) -> &str {
        &self.info.event
    }

    /// Attachment mode.
    pub fn mode(&self) -> EventMode {
        self.info.mode
    }

    /// Starts the handler. The returned future is not yet polled.
    pub fn invoke(&self, args: EventArgs) -> BoxFuture<'static, HandlerResult> {
        (self.handler)(args)
    }
}

impl fmt::Debug for EventRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistration")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Either kind of registration, as produced by a cog.
#[derive(Debug, Clone)]
pub enum Registration {
    /// A command.
    Command(CommandRegistration),
    /// An event subscription.
    Event(EventRegistration),
}
