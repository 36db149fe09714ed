//! The command client: load once, then dispatch.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hikari_runtime::{ClientBuilder, config::ConfigLoader};
//!
//! let (client, report) = ClientBuilder::with_loader(ConfigLoader::new())?
//!     .outbound(my_outbound)
//!     .load()
//!     .await?;
//!
//! client.run(messages, shutdown_token).await;
//! ```
//!
//! Loading picks the module source from configuration: the directory named
//! by `commands.directory` when set, otherwise every module exported into the
//! binary. Sources added with [`ClientBuilder::source`] are loaded after it.

use std::path::PathBuf;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use hikari_core::{
    BoxedMessage, CommandRegistry, Dispatch, Dispatcher, ErrorSink, EventBinder, EventBus,
    EventSource, Outbound, TracingErrorSink,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{ConfigLoader, HikariConfig, validate_config};
use crate::error::RuntimeResult;
use crate::loader::{DirectorySource, LoadReport, ModuleLoader, ModuleSource, StaticManifest};
use crate::logging;

/// Builder for a [`CommandClient`].
pub struct ClientBuilder {
    config: HikariConfig,
    sources: Vec<Box<dyn ModuleSource>>,
    default_source: bool,
    event_source: Option<Arc<dyn EventSource>>,
    outbound: Option<Arc<dyn Outbound>>,
    sink: Arc<dyn ErrorSink>,
    init_logging: bool,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// A builder over default settings.
    pub fn new() -> Self {
        Self::from_config(HikariConfig::default())
    }

    /// A builder over already loaded settings.
    pub fn from_config(config: HikariConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            default_source: true,
            event_source: None,
            outbound: None,
            sink: Arc::new(TracingErrorSink),
            init_logging: true,
        }
    }

    /// Loads settings through `loader`.
    pub fn with_loader(loader: ConfigLoader) -> RuntimeResult<Self> {
        Ok(Self::from_config(loader.load()?))
    }

    /// Replaces the prefixes with a single one.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.commands.prefixes = vec![prefix.into()];
        self
    }

    pub fn prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.commands.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the command root directory.
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.commands.directory = Some(directory.into());
        self
    }

    /// Adds a module source, loaded after the default one.
    pub fn source(mut self, source: impl ModuleSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Loads only the sources added with [`source`](Self::source).
    pub fn no_default_source(mut self) -> Self {
        self.default_source = false;
        self
    }

    /// Binds events to `source` instead of a fresh [`EventBus`].
    pub fn event_source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.event_source = Some(source);
        self
    }

    pub fn outbound(mut self, outbound: Arc<dyn Outbound>) -> Self {
        self.outbound = Some(outbound);
        self
    }

    /// Where failing command and event handlers are reported.
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Leaves the global subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Validates the settings, runs the load phase and hands out the client.
    pub async fn load(self) -> RuntimeResult<(CommandClient, LoadReport)> {
        validate_config(&self.config)?;
        if self.init_logging {
            logging::init_from_config(&self.config.logging);
        }

        let mut loader = ModuleLoader::new(self.config.modules.clone());
        if self.default_source {
            loader = match DirectorySource::from_config(&self.config.commands) {
                Some(directory) => loader.source(directory),
                None => loader.source(StaticManifest::new()),
            };
        }
        for source in self.sources {
            loader = loader.boxed_source(source);
        }

        let (source, bus) = match self.event_source {
            Some(source) => (source, None),
            None => {
                let bus = Arc::new(EventBus::new());
                (Arc::clone(&bus) as Arc<dyn EventSource>, Some(bus))
            }
        };
        let mut binder = EventBinder::with_sink(source, Arc::clone(&self.sink));
        let mut registry = CommandRegistry::new();

        let report = loader.load(&mut registry, &mut binder).await?;

        let registry = Arc::new(registry);
        let mut dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            self.config.commands.prefixes.clone(),
        )
        .with_error_sink(self.sink);
        if let Some(outbound) = self.outbound {
            dispatcher = dispatcher.with_outbound(outbound);
        }

        info!(
            prefixes = ?dispatcher.prefixes(),
            commands = registry.len(),
            "Command client ready"
        );
        let client = CommandClient {
            config: self.config,
            dispatcher,
            binder,
            bus,
        };
        Ok((client, report))
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("sources", &sources)
            .field("default_source", &self.default_source)
            .finish_non_exhaustive()
    }
}

/// A loaded client. The registry is frozen; messages are dispatched
/// concurrently.
pub struct CommandClient {
    config: HikariConfig,
    dispatcher: Dispatcher,
    binder: EventBinder,
    bus: Option<Arc<EventBus>>,
}

impl CommandClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        self.dispatcher.registry()
    }

    pub fn config(&self) -> &HikariConfig {
        &self.config
    }

    /// The event source handlers are bound to.
    pub fn events(&self) -> &Arc<dyn EventSource> {
        self.binder.source()
    }

    /// The bus created by the builder, or `None` when an external event
    /// source was supplied.
    pub fn event_bus(&self) -> Option<&Arc<EventBus>> {
        self.bus.as_ref()
    }

    /// Dispatches one message without waiting for the handler.
    pub fn handle_message(&self, message: BoxedMessage) -> Dispatch {
        self.dispatcher.dispatch(message)
    }

    /// Dispatches `messages` in arrival order until the stream ends or
    /// `shutdown` fires. Returns how many commands were invoked.
    ///
    /// Handlers still running at shutdown are left to finish.
    pub async fn run<S>(&self, messages: S, shutdown: CancellationToken) -> usize
    where
        S: Stream<Item = BoxedMessage>,
    {
        let mut messages = std::pin::pin!(messages);
        let mut invoked = 0;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, no longer reading messages");
                    break;
                }
                next = messages.next() => match next {
                    Some(message) => {
                        if self.handle_message(message).is_invoked() {
                            invoked += 1;
                        }
                    }
                    None => {
                        debug!("Message stream ended");
                        break;
                    }
                },
            }
        }
        invoked
    }

    /// Removes every event subscription made during loading.
    pub fn shutdown(&mut self) -> usize {
        let removed = self.binder.unbind_all();
        info!(subscriptions = removed, "Command client shut down");
        removed
    }
}

impl std::fmt::Debug for CommandClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandClient")
            .field("dispatcher", &self.dispatcher)
            .field("binder", &self.binder)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::loader::ModuleList;
    use hikari_core::prelude::*;
    use hikari_core::{HandlerFailure, LoadError, TextMessage, factory_of};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn message(content: &str) -> BoxedMessage {
        TextMessage::new("m1", "general", content).boxed()
    }

    struct Fail;

    impl ModuleInit for Fail {
        fn init(_ctx: &LoadContext) -> Self {
            Fail
        }
    }

    #[async_trait]
    impl Command for Fail {
        fn info(&self) -> CommandInfo {
            CommandInfo::named("fail")
        }

        async fn handle(&self, _ctx: Arc<MessageContext>, _args: Vec<String>) -> HandlerResult {
            Err("boom".into())
        }
    }

    impl hikari_core::HandlerModule for Fail {
        fn into_command(self: Arc<Self>) -> Option<Arc<dyn Command>> {
            Some(self)
        }
    }

    async fn manifest_client() -> CommandClient {
        let (client, report) = ClientBuilder::new()
            .without_logging()
            .prefixes(["?", "hk."])
            .load()
            .await
            .unwrap();
        assert!(report.errors.is_empty());
        client
    }

    #[tokio::test]
    async fn test_manifest_is_default_source() {
        let client = manifest_client().await;

        assert!(client.registry().resolve("ping").is_some());
        assert!(client.registry().resolve("greet").is_some());
        assert_eq!(client.event_bus().unwrap().listener_count("ready"), 1);
    }

    #[tokio::test]
    async fn test_handle_message() {
        let client = manifest_client().await;

        assert!(client.handle_message(message("?p")).is_invoked());
        assert!(client.handle_message(message("hk.greet now")).is_invoked());
        assert!(matches!(
            client.handle_message(message("?unknown")),
            Dispatch::NotFound(name) if name == "unknown"
        ));
        assert!(matches!(
            client.handle_message(message("ping")),
            Dispatch::Ignored
        ));
    }

    #[tokio::test]
    async fn test_run_until_stream_ends() {
        let client = manifest_client().await;
        let messages = futures::stream::iter(vec![
            message("?ping"),
            message("hello there"),
            message("?hi"),
        ]);

        let invoked = client.run(messages, CancellationToken::new()).await;
        assert_eq!(invoked, 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let client = manifest_client().await;
        let token = CancellationToken::new();
        token.cancel();

        let invoked = client
            .run(futures::stream::pending::<BoxedMessage>(), token)
            .await;
        assert_eq!(invoked, 0);
    }

    #[tokio::test]
    async fn test_shutdown_unbinds_events() {
        let mut client = manifest_client().await;
        assert_eq!(client.shutdown(), 1);
        assert_eq!(client.event_bus().unwrap().listener_count("ready"), 0);
    }

    #[tokio::test]
    async fn test_invalid_prefix_is_rejected() {
        let err = ClientBuilder::new()
            .without_logging()
            .prefix("  ")
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientBuilder::new()
            .without_logging()
            .directory(dir.path().join("commands"))
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Discovery { .. }));
    }

    #[tokio::test]
    async fn test_empty_directory_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.rs"), "").unwrap();

        let (client, report) = ClientBuilder::new()
            .without_logging()
            .directory(dir.path())
            .load()
            .await
            .unwrap();
        assert!(client.registry().is_empty());
        assert!(matches!(&report.errors[..], [LoadError::NoExport { .. }]));
    }

    #[tokio::test]
    async fn test_failures_reach_error_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = move |failure: HandlerFailure| {
            let _ = tx.send(failure.to_string());
        };

        let (client, _) = ClientBuilder::new()
            .without_logging()
            .no_default_source()
            .source(ModuleList::new().add("bot::Fail", factory_of::<Fail>()))
            .error_sink(Arc::new(sink))
            .load()
            .await
            .unwrap();
        assert_eq!(client.registry().len(), 1);

        client.handle_message(message("!fail"));
        let reported = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(reported.contains("fail"));
        assert!(reported.contains("boom"));
    }

    #[tokio::test]
    async fn test_external_event_source() {
        let bus = Arc::new(EventBus::new());
        let (client, _) = ClientBuilder::new()
            .without_logging()
            .event_source(bus.clone())
            .load()
            .await
            .unwrap();

        assert!(client.event_bus().is_none());
        assert_eq!(bus.listener_count("ready"), 1);
    }
}
