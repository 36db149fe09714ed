//! Module discovery and loading.
//!
//! A [`ModuleSource`] says *which* modules exist; the [`ModuleLoader`]
//! instantiates each one, classifies it and merges its registrations into
//! the registry and the event binder.
//!
//! | Source | Enumerates |
//! |--------|------------|
//! | [`StaticManifest`] | every `export_module!` in the binary, optionally under a path prefix |
//! | [`DirectorySource`] | source files under a directory, resolved against the manifest |
//! | [`ModuleList`] | an explicit list of factories |
//!
//! Loading never stops at a bad module. Each problem is logged, recorded in
//! the [`LoadReport`] and the next module is processed.

mod directory;
mod manifest;

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use hikari_core::{
    CommandRegistry, EventBinder, HandlerModule, LoadContext, LoadError, ModuleFactory,
    ModuleKind, RegistrationWarning, classify, panic_message,
};
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::{RuntimeError, RuntimeResult};

pub use directory::DirectorySource;
pub use manifest::{ModuleList, StaticManifest};

/// A module found by a source, not yet instantiated.
#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    /// Qualified module name, the module's identity.
    pub path: String,
    /// Bare type name, used as a fallback config key.
    pub name: String,
    /// Source file the module came from, when known.
    pub file: Option<PathBuf>,
    /// Builds the instance.
    pub factory: ModuleFactory,
}

/// What a source found.
#[derive(Debug, Default)]
pub struct Discovery {
    pub modules: Vec<DiscoveredModule>,
    /// Per-entry problems; they do not stop the other entries.
    pub errors: Vec<LoadError>,
}

/// Enumerates candidate handler modules.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Lists modules in processing order.
    ///
    /// An `Err` means the source as a whole is unusable, e.g. a missing
    /// root directory.
    async fn discover(&self) -> RuntimeResult<Discovery>;
}

/// A module that was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub path: String,
    /// `"cog"` or `"command"`.
    pub kind: &'static str,
    /// Command names, in registration order.
    pub commands: Vec<String>,
    /// Number of event handlers bound.
    pub events: usize,
}

/// Outcome of a load phase.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<LoadedModule>,
    pub errors: Vec<LoadError>,
    pub warnings: Vec<RegistrationWarning>,
}

impl LoadReport {
    /// `true` when nothing was rejected and nothing was redefined.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Total number of commands registered, counting redefinitions.
    pub fn command_count(&self) -> usize {
        self.loaded.iter().map(|m| m.commands.len()).sum()
    }

    fn merge(&mut self, other: LoadReport) {
        self.loaded.extend(other.loaded);
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Instantiates and registers modules from a set of sources.
pub struct ModuleLoader {
    sources: Vec<Box<dyn ModuleSource>>,
    sections: HashMap<String, Value>,
}

impl ModuleLoader {
    /// Creates a loader; `sections` are the per-module config sections.
    pub fn new(sections: HashMap<String, Value>) -> Self {
        Self {
            sources: Vec::new(),
            sections,
        }
    }

    /// Adds a source. Sources are processed in the order they were added.
    pub fn source(mut self, source: impl ModuleSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub(crate) fn boxed_source(mut self, source: Box<dyn ModuleSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Runs the load phase.
    pub async fn load(
        &self,
        registry: &mut CommandRegistry,
        binder: &mut EventBinder,
    ) -> RuntimeResult<LoadReport> {
        async {
            let mut report = LoadReport::default();

            for source in &self.sources {
                let discovery = source.discover().await?;
                debug!(
                    source = %source.describe(),
                    modules = discovery.modules.len(),
                    errors = discovery.errors.len(),
                    "Source enumerated"
                );
                for error in &discovery.errors {
                    warn!(location = %error.location(), "{error}");
                }
                report.errors.extend(discovery.errors);

                for module in &discovery.modules {
                    report.merge(self.load_one(module, registry, binder));
                }
            }

            info!(
                modules = report.loaded.len(),
                commands = registry.len(),
                errors = report.errors.len(),
                warnings = report.warnings.len(),
                "Load phase finished"
            );
            Ok::<_, RuntimeError>(report)
        }
        .instrument(info_span!("load"))
        .await
    }

    fn load_one(
        &self,
        module: &DiscoveredModule,
        registry: &mut CommandRegistry,
        binder: &mut EventBinder,
    ) -> LoadReport {
        let mut report = LoadReport::default();

        let kind = self.instantiate(module).and_then(|instance| {
            catch_unwind(AssertUnwindSafe(|| classify(&module.path, instance)))
                .unwrap_or_else(|payload| {
                    Err(LoadError::Setup {
                        path: module.path.clone(),
                        message: panic_message(payload.as_ref()),
                    })
                })
        });
        let kind = match kind {
            Ok(kind) => kind,
            Err(error) => {
                warn!(module = %module.path, "{error}");
                report.errors.push(error);
                return report;
            }
        };

        let label = kind.label();
        let (commands, events) = match kind {
            ModuleKind::Cog {
                category,
                info,
                commands,
                events,
            } => {
                match info {
                    Some(info) => report.warnings.extend(registry.declare_category(info)),
                    None => registry.open_category(&category),
                }
                (commands, events)
            }
            ModuleKind::Command(command) => (vec![command], Vec::new()),
        };

        let names: Vec<String> = commands.iter().map(|c| c.name().to_string()).collect();
        for command in commands {
            report.warnings.extend(registry.register(command));
        }
        let bound = binder.bind(&module.path, events);

        debug!(
            module = %module.path,
            kind = label,
            commands = ?names,
            events = bound,
            "Module loaded"
        );
        report.loaded.push(LoadedModule {
            path: module.path.clone(),
            kind: label,
            commands: names,
            events: bound,
        });
        report
    }

    fn instantiate(&self, module: &DiscoveredModule) -> Result<Arc<dyn HandlerModule>, LoadError> {
        let section = self
            .sections
            .get(&module.path)
            .or_else(|| self.sections.get(&module.name))
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        let ctx = LoadContext::new(module.path.clone(), Arc::new(section));

        catch_unwind(AssertUnwindSafe(|| (module.factory)(&ctx))).map_err(|payload| {
            LoadError::Init {
                path: module.path.clone(),
                message: panic_message(payload.as_ref()),
            }
        })
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        f.debug_struct("ModuleLoader")
            .field("sources", &sources)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hikari_core::prelude::*;
    use hikari_core::{CategoryRef, ErasedCog, EventBus, factory_of};
    use serde::Deserialize;

    pub(crate) struct Greeter {
        greeting: String,
    }

    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct GreeterConfig {
        greeting: Option<String>,
    }

    impl ModuleInit for Greeter {
        fn init(ctx: &LoadContext) -> Self {
            let config: GreeterConfig = ctx.get_config().unwrap_or_default();
            Self {
                greeting: config.greeting.unwrap_or_else(|| "hello".into()),
            }
        }
    }

    impl Cog for Greeter {
        fn category(&self) -> Option<CategoryInfo> {
            Some(CategoryInfo::new("Social", &*self.greeting))
        }

        fn setup(&self, reg: &mut CogRegistrar<Self>) {
            reg.command(CommandInfo::named("greet").alias("hi"), Self::greet)
                .once("ready", Self::ready);
        }
    }

    impl Greeter {
        async fn greet(
            self: Arc<Self>,
            _ctx: Arc<MessageContext>,
            _args: Vec<String>,
        ) -> HandlerResult {
            Ok(())
        }

        async fn ready(self: Arc<Self>, _args: EventArgs) -> HandlerResult {
            Ok(())
        }
    }

    hikari_core::export_module!(cog Greeter);

    pub(crate) struct Ping;

    impl ModuleInit for Ping {
        fn init(_ctx: &LoadContext) -> Self {
            Ping
        }
    }

    #[async_trait]
    impl Command for Ping {
        fn info(&self) -> CommandInfo {
            CommandInfo::named("ping").alias("p")
        }

        async fn handle(&self, _ctx: Arc<MessageContext>, _args: Vec<String>) -> HandlerResult {
            Ok(())
        }
    }

    hikari_core::export_module!(command Ping);

    struct Inert;

    impl ModuleInit for Inert {
        fn init(_ctx: &LoadContext) -> Self {
            Inert
        }
    }

    impl HandlerModule for Inert {}

    struct Exploding;

    impl ModuleInit for Exploding {
        fn init(_ctx: &LoadContext) -> Self {
            panic!("cannot start")
        }
    }

    impl HandlerModule for Exploding {}

    struct BadInfo;

    impl ModuleInit for BadInfo {
        fn init(_ctx: &LoadContext) -> Self {
            BadInfo
        }
    }

    #[async_trait]
    impl Command for BadInfo {
        fn info(&self) -> CommandInfo {
            panic!("metadata unavailable")
        }

        async fn handle(&self, _ctx: Arc<MessageContext>, _args: Vec<String>) -> HandlerResult {
            Ok(())
        }
    }

    impl HandlerModule for BadInfo {
        fn into_command(self: Arc<Self>) -> Option<Arc<dyn Command>> {
            Some(self)
        }
    }

    struct BadSetup;

    impl ModuleInit for BadSetup {
        fn init(_ctx: &LoadContext) -> Self {
            BadSetup
        }
    }

    impl Cog for BadSetup {
        fn setup(&self, _reg: &mut CogRegistrar<Self>) {
            panic!("setup failed")
        }
    }

    impl HandlerModule for BadSetup {
        fn into_cog(self: Arc<Self>) -> Option<Arc<dyn ErasedCog>> {
            Some(self)
        }
    }

    /// A cog that declares no category of its own.
    struct Plain;

    impl ModuleInit for Plain {
        fn init(_ctx: &LoadContext) -> Self {
            Plain
        }
    }

    impl Cog for Plain {
        fn setup(&self, reg: &mut CogRegistrar<Self>) {
            reg.command(CommandInfo::named("plain"), Self::plain);
        }
    }

    impl Plain {
        async fn plain(
            self: Arc<Self>,
            _ctx: Arc<MessageContext>,
            _args: Vec<String>,
        ) -> HandlerResult {
            Ok(())
        }
    }

    impl HandlerModule for Plain {
        fn into_cog(self: Arc<Self>) -> Option<Arc<dyn ErasedCog>> {
            Some(self)
        }
    }

    struct Described;

    impl ModuleInit for Described {
        fn init(_ctx: &LoadContext) -> Self {
            Described
        }
    }

    #[async_trait]
    impl Command for Described {
        fn info(&self) -> CommandInfo {
            CommandInfo::named("described").category(CategoryInfo::new("Plain", "Plain things"))
        }

        async fn handle(&self, _ctx: Arc<MessageContext>, _args: Vec<String>) -> HandlerResult {
            Ok(())
        }
    }

    impl HandlerModule for Described {
        fn into_command(self: Arc<Self>) -> Option<Arc<dyn Command>> {
            Some(self)
        }
    }

    fn binder() -> (Arc<EventBus>, EventBinder) {
        let bus = Arc::new(EventBus::new());
        (bus.clone(), EventBinder::new(bus))
    }

    #[tokio::test]
    async fn test_bad_module_does_not_stop_others() {
        let loader = ModuleLoader::new(HashMap::new()).source(
            ModuleList::new()
                .add("bot::Inert", factory_of::<Inert>())
                .add("bot::Exploding", factory_of::<Exploding>())
                .add("bot::Ping", factory_of::<Ping>())
                .add("bot::Greeter", factory_of::<Greeter>()),
        );
        let mut registry = CommandRegistry::new();
        let (bus, mut binder) = binder();

        let report = loader.load(&mut registry, &mut binder).await.unwrap();

        assert_eq!(report.errors.len(), 2);
        assert!(matches!(report.errors[0], LoadError::Unrecognized { .. }));
        assert!(matches!(report.errors[1], LoadError::Init { .. }));
        assert_eq!(report.loaded.len(), 2);
        assert_eq!(report.command_count(), 2);
        assert!(registry.resolve("p").is_some());
        assert!(registry.resolve("hi").is_some());
        assert_eq!(bus.listener_count("ready"), 1);
    }

    #[tokio::test]
    async fn test_cog_category_and_config_section() {
        let mut sections = HashMap::new();
        sections.insert(
            "Greeter".to_string(),
            serde_json::json!({ "greeting": "hey there" }),
        );
        let loader = ModuleLoader::new(sections)
            .source(ModuleList::new().add("bot::Greeter", factory_of::<Greeter>()));
        let mut registry = CommandRegistry::new();
        let (_bus, mut binder) = binder();

        loader.load(&mut registry, &mut binder).await.unwrap();

        assert_eq!(registry.category("Social").unwrap(), &["greet".to_string()]);
        assert_eq!(
            registry.category_info("Social").unwrap().description,
            "hey there"
        );
        assert_eq!(
            registry.get("greet").unwrap().category(),
            Some(&CategoryRef::Name("Social".into()))
        );
    }

    #[tokio::test]
    async fn test_loading_twice_does_not_double_subscribe() {
        let loader = ModuleLoader::new(HashMap::new())
            .source(ModuleList::new().add("bot::Greeter", factory_of::<Greeter>()));
        let mut registry = CommandRegistry::new();
        let (bus, mut binder) = binder();

        loader.load(&mut registry, &mut binder).await.unwrap();
        let second = loader.load(&mut registry, &mut binder).await.unwrap();

        assert_eq!(bus.listener_count("ready"), 1);
        assert!(second.warnings.iter().any(|w| matches!(
            w,
            RegistrationWarning::DuplicateCommand { name } if name == "greet"
        )));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_panic_while_registering_rejects_only_that_module() {
        let loader = ModuleLoader::new(HashMap::new()).source(
            ModuleList::new()
                .add("bot::BadInfo", factory_of::<BadInfo>())
                .add("bot::BadSetup", factory_of::<BadSetup>())
                .add("bot::Ping", factory_of::<Ping>()),
        );
        let mut registry = CommandRegistry::new();
        let (_bus, mut binder) = binder();

        let report = loader.load(&mut registry, &mut binder).await.unwrap();

        assert_eq!(report.errors.len(), 2);
        assert!(matches!(
            &report.errors[0],
            LoadError::Setup { path, message }
                if path == "bot::BadInfo" && message == "metadata unavailable"
        ));
        assert!(matches!(
            &report.errors[1],
            LoadError::Setup { path, .. } if path == "bot::BadSetup"
        ));
        assert_eq!(report.loaded.len(), 1);
        assert!(registry.resolve("ping").is_some());
    }

    #[tokio::test]
    async fn test_uncategorised_cog_leaves_category_metadata_open() {
        let loader = ModuleLoader::new(HashMap::new()).source(
            ModuleList::new()
                .add("bot::Plain", factory_of::<Plain>())
                .add("bot::Described", factory_of::<Described>()),
        );
        let mut registry = CommandRegistry::new();
        let (_bus, mut binder) = binder();

        let report = loader.load(&mut registry, &mut binder).await.unwrap();

        assert!(report.is_clean(), "{:?}", report.warnings);
        assert_eq!(
            registry.category("Plain").unwrap(),
            &["plain".to_string(), "described".to_string()]
        );
        assert_eq!(
            registry.category_info("Plain").unwrap().description,
            "Plain things"
        );
    }
}
