//! # Hikari Core
//!
//! The in-process routing layer of the Hikari bot framework: it turns
//! handler modules into a registry of commands, aliases and categories,
//! dispatches prefixed chat messages to them and binds named events to an
//! event source.
//!
//! ## Components
//!
//! - **Metadata** ([`CommandInfo`], [`EventInfo`]): declarative descriptions
//!   validated into registrations.
//! - **Modules** ([`Cog`], [`Command`], [`export_module!`]): the units of
//!   discovery and their classification.
//! - **Registry** ([`CommandRegistry`]): name, alias and category lookup.
//! - **Dispatcher** ([`Dispatcher`]): prefix parsing and fire-and-forget
//!   invocation.
//! - **Events** ([`EventBinder`], [`EventBus`]): once/on subscriptions.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐   classify   ┌──────────────┐  resolve   ┌────────────┐
//! │  Manifest   │─────────────▶│   Registry   │◀───────────│ Dispatcher │◀── message
//! │ (modules)   │              └──────────────┘            └────────────┘
//! │             │    bind      ┌──────────────┐  emit      ┌────────────┐
//! │             │─────────────▶│ EventBinder  │───────────▶│ EventSource│◀── event
//! └─────────────┘              └──────────────┘            └────────────┘
//! ```

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod message;
pub mod metadata;
pub mod module;
pub mod registry;
pub mod sink;

#[doc(hidden)]
pub use linkme;

pub use dispatcher::{Dispatch, Dispatcher, Invocation, parse_invocation};
pub use error::{
    BoxError, HandlerResult, LoadError, MetadataError, OutboundError, RegistrationWarning,
};
pub use event::{EventBinder, EventBus, EventListener, EventSource, SubscriptionId};
pub use message::{BoxedMessage, ChatMessage, MessageContext, Outbound, TextMessage};
pub use metadata::{
    CategoryInfo, CategoryRef, CommandDescriptor, CommandInfo, CommandRegistration,
    DEFAULT_CATEGORY, EventArgs, EventInfo, EventMode, EventRegistration, Registration,
};
pub use module::{
    Cog, CogRegistrar, Command, ErasedCog, HANDLER_MODULES, HandlerModule, LoadContext, ModuleDecl,
    ModuleFactory, ModuleInit, ModuleKind, classify, factory_of,
};
pub use registry::{CategoryView, CommandRegistry};
pub use sink::{
    ErrorSink, FailureKind, FailureOrigin, HandlerFailure, TracingErrorSink, panic_message,
};

/// Prelude for handler modules.
pub mod prelude {
    pub use super::error::{BoxError, HandlerResult};
    pub use super::export_module;
    pub use super::message::{ChatMessage, MessageContext};
    pub use super::metadata::{CategoryInfo, CommandInfo, EventArgs, EventInfo};
    pub use super::module::{Cog, CogRegistrar, Command, LoadContext, ModuleInit};
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
