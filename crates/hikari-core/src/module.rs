//! Handler modules: the unit of discovery.
//!
//! A handler module is a type exported with [`export_module!`]. Each export
//! lands in the link-time [`HANDLER_MODULES`] slice together with its module
//! path and source file, which is how module sources find it without any
//! wiring in `main`.
//!
//! A module comes in one of two shapes:
//!
//! - a **cog** ([`Cog`]): one instance grouping several commands and event
//!   handlers, declared method by method through a [`CogRegistrar`];
//! - a **command** ([`Command`]): a single declarative command.
//!
//! [`classify`] inspects an instance once and turns it into a [`ModuleKind`]
//! holding validated registrations.
//!
//! # Example
//!
//! ```rust,ignore
//! use hikari::prelude::*;
//!
//! pub struct Fun;
//!
//! impl ModuleInit for Fun {
//!     fn init(_ctx: &LoadContext) -> Self { Fun }
//! }
//!
//! impl Cog for Fun {
//!     fn setup(&self, reg: &mut CogRegistrar<Self>) {
//!         reg.command(CommandInfo::named("roll").alias("r"), Self::roll)
//!             .once("ready", Self::ready);
//!     }
//! }
//!
//! impl Fun {
//!     async fn roll(self: Arc<Self>, ctx: Arc<MessageContext>, _args: Vec<String>) -> HandlerResult {
//!         ctx.reply("4").await?;
//!         Ok(())
//!     }
//!
//!     async fn ready(self: Arc<Self>, _args: EventArgs) -> HandlerResult {
//!         Ok(())
//!     }
//! }
//!
//! export_module!(cog Fun);
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{HandlerResult, LoadError, MetadataError};
use crate::message::MessageContext;
use crate::metadata::{
    CategoryInfo, CategoryRef, CommandInfo, CommandRegistration, EventArgs, EventInfo,
    EventRegistration, Registration,
};

// =============================================================================
// Capabilities
// =============================================================================

/// A discoverable handler module.
///
/// Implemented by [`export_module!`]; the capability methods tell the loader
/// what the instance is. When both are present the cog view wins.
pub trait HandlerModule: Send + Sync + 'static {
    /// The cog view of this instance, if it is one.
    fn into_cog(self: Arc<Self>) -> Option<Arc<dyn ErasedCog>> {
        None
    }

    /// The declarative-command view of this instance, if it is one.
    fn into_command(self: Arc<Self>) -> Option<Arc<dyn Command>> {
        None
    }
}

/// Construction of a module instance at load time.
pub trait ModuleInit: Sized {
    /// Builds the instance. Called exactly once per load.
    fn init(ctx: &LoadContext) -> Self;
}

/// A single declarative command.
#[async_trait]
pub trait Command: Send + Sync + 'static {
    /// Metadata, read once at load time.
    fn info(&self) -> CommandInfo;

    /// Runs the command.
    async fn handle(&self, ctx: Arc<MessageContext>, args: Vec<String>) -> HandlerResult;
}

/// A group of commands and event handlers sharing one instance.
pub trait Cog: Send + Sync + Sized + 'static {
    /// Category every command of this cog is filed under.
    ///
    /// Defaults to a category named after the type.
    fn category(&self) -> Option<CategoryInfo> {
        None
    }

    /// Declares the cog's commands and event handlers.
    fn setup(&self, reg: &mut CogRegistrar<Self>);
}

/// Object-safe view of a [`Cog`], implemented for every cog.
pub trait ErasedCog: Send + Sync {
    /// Unqualified type name, the fallback category name.
    fn type_name(&self) -> &'static str;

    /// Declared category.
    fn category(&self) -> Option<CategoryInfo>;

    /// Runs `setup` and returns the validated registrations.
    fn registrations(self: Arc<Self>) -> Result<Vec<Registration>, MetadataError>;
}

impl<C: Cog> ErasedCog for C {
    fn type_name(&self) -> &'static str {
        short_type_name(std::any::type_name::<C>())
    }

    fn category(&self) -> Option<CategoryInfo> {
        Cog::category(self)
    }

    fn registrations(self: Arc<Self>) -> Result<Vec<Registration>, MetadataError> {
        let mut registrar = CogRegistrar::new(Arc::clone(&self));
        self.setup(&mut registrar);
        registrar.finish()
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// =============================================================================
// CogRegistrar
// =============================================================================

/// Collects a cog's per-method registrations.
///
/// Every method receives the shared instance as `Arc<Self>`, so handlers can
/// be registered as plain associated functions (`Self::ping`).
pub struct CogRegistrar<C> {
    cog: Arc<C>,
    registrations: Vec<Result<Registration, MetadataError>>,
}

impl<C: Cog> CogRegistrar<C> {
    fn new(cog: Arc<C>) -> Self {
        Self {
            cog,
            registrations: Vec::new(),
        }
    }

    /// Registers a command method.
    pub fn command<F, Fut>(&mut self, info: CommandInfo, method: F) -> &mut Self
    where
        F: Fn(Arc<C>, Arc<MessageContext>, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let cog = Arc::clone(&self.cog);
        let registration =
            CommandRegistration::build(info, move |ctx, args| method(Arc::clone(&cog), ctx, args));
        self.registrations
            .push(registration.map(Registration::Command));
        self
    }

    /// Registers a method fired on every occurrence of `event`.
    pub fn on<F, Fut>(&mut self, event: impl Into<String>, method: F) -> &mut Self
    where
        F: Fn(Arc<C>, EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.event(EventInfo::on(event), method)
    }

    /// Registers a method fired on the next occurrence of `event` only.
    pub fn once<F, Fut>(&mut self, event: impl Into<String>, method: F) -> &mut Self
    where
        F: Fn(Arc<C>, EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.event(EventInfo::once(event), method)
    }

    /// Registers an event method with explicit metadata.
    pub fn event<F, Fut>(&mut self, info: EventInfo, method: F) -> &mut Self
    where
        F: Fn(Arc<C>, EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let cog = Arc::clone(&self.cog);
        let registration =
            EventRegistration::build(info, move |args| method(Arc::clone(&cog), args));
        self.registrations.push(registration.map(Registration::Event));
        self
    }

    fn finish(self) -> Result<Vec<Registration>, MetadataError> {
        self.registrations.into_iter().collect()
    }
}

// =============================================================================
// LoadContext
// =============================================================================

/// Per-module data available to [`ModuleInit::init`].
#[derive(Debug, Clone)]
pub struct LoadContext {
    path: String,
    config: Arc<Value>,
}

impl LoadContext {
    /// Creates a context for the module at `path` with its config section.
    pub fn new(path: impl Into<String>, config: Arc<Value>) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// A context with an empty config section.
    pub fn empty(path: impl Into<String>) -> Self {
        Self::new(path, Arc::new(Value::Object(Default::default())))
    }

    /// Path of the module being loaded.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw config section.
    pub fn raw_config(&self) -> &Value {
        &self.config
    }

    /// Deserialises the module's config section into `T`.
    ///
    /// Use `#[serde(default)]` on `T` to make every field optional.
    pub fn get_config<T>(&self) -> serde_json::Result<T>
    where
        T: DeserializeOwned,
    {
        T::deserialize(self.config.as_ref())
    }
}

// =============================================================================
// Manifest
// =============================================================================

/// Constructor stored in the manifest.
pub type ModuleFactory = fn(&LoadContext) -> Arc<dyn HandlerModule>;

/// One exported handler module.
#[derive(Clone, Copy)]
pub struct ModuleDecl {
    /// `module_path!()` at the export site.
    pub path: &'static str,
    /// The exported type as written.
    pub name: &'static str,
    /// `file!()` at the export site.
    pub file: &'static str,
    /// Whether this is the file's default export.
    pub is_default: bool,
    /// Builds the instance.
    pub create: ModuleFactory,
}

impl ModuleDecl {
    /// `path::name`, the identity used in logs, reports and config.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.path, self.name)
    }
}

impl fmt::Debug for ModuleDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDecl")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("file", &self.file)
            .field("is_default", &self.is_default)
            .finish_non_exhaustive()
    }
}

/// Every module exported with [`export_module!`] in the final binary.
#[distributed_slice]
pub static HANDLER_MODULES: [ModuleDecl];

/// The manifest constructor for `T`, for wiring modules by hand.
pub fn factory_of<T>() -> ModuleFactory
where
    T: ModuleInit + HandlerModule,
{
    __create::<T>
}

#[doc(hidden)]
pub fn __create<T>(ctx: &LoadContext) -> Arc<dyn HandlerModule>
where
    T: ModuleInit + HandlerModule,
{
    Arc::new(T::init(ctx))
}

/// Exports a handler module into [`HANDLER_MODULES`].
///
/// ```rust,ignore
/// export_module!(cog Moderation);        // implements HandlerModule as a cog
/// export_module!(command Ping);          // implements HandlerModule as a command
/// export_module!(module Custom);         // HandlerModule implemented by hand
/// export_module!(default cog Utility);   // the file's default export
/// ```
///
/// The type must implement [`ModuleInit`].
#[macro_export]
macro_rules! export_module {
    (default $kind:ident $ty:ty) => {
        $crate::__export_module!(@$kind $ty, true);
    };
    ($kind:ident $ty:ty) => {
        $crate::__export_module!(@$kind $ty, false);
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! __export_module {
    (@cog $ty:ty, $default:literal) => {
        impl $crate::module::HandlerModule for $ty {
            fn into_cog(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::option::Option<::std::sync::Arc<dyn $crate::module::ErasedCog>> {
                ::std::option::Option::Some(self)
            }
        }
        $crate::__export_module!(@entry $ty, $default);
    };
    (@command $ty:ty, $default:literal) => {
        impl $crate::module::HandlerModule for $ty {
            fn into_command(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::option::Option<::std::sync::Arc<dyn $crate::module::Command>> {
                ::std::option::Option::Some(self)
            }
        }
        $crate::__export_module!(@entry $ty, $default);
    };
    (@module $ty:ty, $default:literal) => {
        $crate::__export_module!(@entry $ty, $default);
    };
    (@entry $ty:ty, $default:literal) => {
        const _: () = {
            #[$crate::linkme::distributed_slice($crate::module::HANDLER_MODULES)]
            #[linkme(crate = $crate::linkme)]
            static MODULE: $crate::module::ModuleDecl = $crate::module::ModuleDecl {
                path: ::std::module_path!(),
                name: ::std::stringify!($ty),
                file: ::std::file!(),
                is_default: $default,
                create: $crate::module::__create::<$ty>,
            };
        };
    };
}

// =============================================================================
// Classification
// =============================================================================

/// A classified module with its validated registrations.
#[derive(Debug)]
pub enum ModuleKind {
    /// A cog: commands filed under `category`, plus event handlers.
    Cog {
        /// Category name: the declared one, else the cog's type name.
        category: String,
        /// Declared category metadata. `None` when the cog declares none.
        info: Option<CategoryInfo>,
        /// Commands, already placed in `category`.
        commands: Vec<CommandRegistration>,
        /// Event handlers.
        events: Vec<EventRegistration>,
    },
    /// A single declarative command.
    Command(CommandRegistration),
}

impl ModuleKind {
    /// `"cog"` or `"command"`, for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cog { .. } => "cog",
            Self::Command(_) => "command",
        }
    }
}

/// Decides what `instance` is and validates all of its registrations.
///
/// Either every registration of the module is valid or the module is
/// rejected as a whole.
pub fn classify(path: &str, instance: Arc<dyn HandlerModule>) -> Result<ModuleKind, LoadError> {
    let metadata_error = |source| LoadError::Metadata {
        path: path.to_string(),
        source,
    };

    if let Some(cog) = Arc::clone(&instance).into_cog() {
        let info = cog.category();
        let category = info
            .as_ref()
            .map_or_else(|| cog.type_name().to_string(), |info| info.name.clone());
        let registrations = cog.registrations().map_err(metadata_error)?;
        if registrations.is_empty() {
            return Err(LoadError::Unrecognized {
                path: path.to_string(),
                reason: "cog registers no commands or events",
            });
        }

        let mut commands = Vec::new();
        let mut events = Vec::new();
        for registration in registrations {
            match registration {
                Registration::Command(command) => {
                    commands.push(command.with_category(CategoryRef::Name(category.clone())))
                }
                Registration::Event(event) => events.push(event),
            }
        }
        return Ok(ModuleKind::Cog {
            category,
            info,
            commands,
            events,
        });
    }

    if let Some(command) = instance.into_command() {
        let info = command.info();
        let registration = CommandRegistration::build(info, move |ctx, args| {
            let command = Arc::clone(&command);
            async move { command.handle(ctx, args).await }
        })
        .map_err(metadata_error)?;
        return Ok(ModuleKind::Command(registration));
    }

    Err(LoadError::Unrecognized {
        path: path.to_string(),
        reason: "neither a cog nor a command",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EventMode;
    use serde::Deserialize;

    struct Test;

    impl ModuleInit for Test {
        fn init(_ctx: &LoadContext) -> Self {
            Test
        }
    }

    impl Cog for Test {
        fn setup(&self, reg: &mut CogRegistrar<Self>) {
            reg.command(CommandInfo::named("ping").alias("kk"), Self::ping)
                .once("ready", Self::ready)
                .on("messageCreate", Self::message_create);
        }
    }

    impl Test {
        async fn ping(
            self: Arc<Self>,
            _ctx: Arc<MessageContext>,
            _args: Vec<String>,
        ) -> HandlerResult {
            Ok(())
        }

        async fn ready(self: Arc<Self>, _args: EventArgs) -> HandlerResult {
            Ok(())
        }

        async fn message_create(self: Arc<Self>, _args: EventArgs) -> HandlerResult {
            Ok(())
        }
    }

    crate::export_module!(cog Test);

    struct Moderation;

    impl Cog for Moderation {
        fn category(&self) -> Option<CategoryInfo> {
            Some(CategoryInfo::new("Moderation", "Keep order"))
        }

        fn setup(&self, reg: &mut CogRegistrar<Self>) {
            reg.command(CommandInfo::named("ban").category("Elsewhere"), Self::noop)
                .command(CommandInfo::named("kick"), Self::noop);
        }
    }

    impl Moderation {
        async fn noop(
            self: Arc<Self>,
            _ctx: Arc<MessageContext>,
            _args: Vec<String>,
        ) -> HandlerResult {
            Ok(())
        }
    }

    impl HandlerModule for Moderation {
        fn into_cog(self: Arc<Self>) -> Option<Arc<dyn ErasedCog>> {
            Some(self)
        }
    }

    struct Broken;

    impl Cog for Broken {
        fn setup(&self, reg: &mut CogRegistrar<Self>) {
            reg.command(CommandInfo::named("fine"), Self::noop)
                .command(CommandInfo::named("not fine"), Self::noop);
        }
    }

    impl Broken {
        async fn noop(
            self: Arc<Self>,
            _ctx: Arc<MessageContext>,
            _args: Vec<String>,
        ) -> HandlerResult {
            Ok(())
        }
    }

    impl HandlerModule for Broken {
        fn into_cog(self: Arc<Self>) -> Option<Arc<dyn ErasedCog>> {
            Some(self)
        }
    }

    struct Empty;

    impl Cog for Empty {
        fn setup(&self, _reg: &mut CogRegistrar<Self>) {}
    }

    impl HandlerModule for Empty {
        fn into_cog(self: Arc<Self>) -> Option<Arc<dyn ErasedCog>> {
            Some(self)
        }
    }

    struct Echo;

    #[async_trait]
    impl Command for Echo {
        fn info(&self) -> CommandInfo {
            CommandInfo::named("echo").category("Utility")
        }

        async fn handle(&self, _ctx: Arc<MessageContext>, _args: Vec<String>) -> HandlerResult {
            Ok(())
        }
    }

    impl HandlerModule for Echo {
        fn into_command(self: Arc<Self>) -> Option<Arc<dyn Command>> {
            Some(self)
        }
    }

    struct Nothing;

    impl HandlerModule for Nothing {}

    #[test]
    fn test_cog_without_category_uses_type_name() {
        let ModuleKind::Cog {
            category,
            info,
            commands,
            events,
        } = classify("tests::Test", Arc::new(Test)).unwrap()
        else {
            panic!("expected a cog");
        };

        assert_eq!(category, "Test");
        assert!(info.is_none());
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].aliases(), ["kk".to_string()]);
        assert_eq!(commands[0].category().unwrap().name(), "Test");

        let modes: Vec<_> = events.iter().map(|e| (e.event(), e.mode())).collect();
        assert_eq!(
            modes,
            vec![("ready", EventMode::Once), ("messageCreate", EventMode::On)]
        );
    }

    #[test]
    fn test_cog_category_overrides_command_category() {
        let ModuleKind::Cog {
            category,
            info,
            commands,
            ..
        } = classify("tests::Moderation", Arc::new(Moderation)).unwrap()
        else {
            panic!("expected a cog");
        };

        assert_eq!(category, "Moderation");
        assert_eq!(info, Some(CategoryInfo::new("Moderation", "Keep order")));
        assert!(
            commands
                .iter()
                .all(|c| c.category().map(CategoryRef::name) == Some("Moderation"))
        );
    }

    #[test]
    fn test_invalid_registration_rejects_whole_cog() {
        let err = classify("tests::Broken", Arc::new(Broken)).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Metadata {
                source: MetadataError::InvalidName { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_empty_cog_is_unrecognized() {
        let err = classify("tests::Empty", Arc::new(Empty)).unwrap_err();
        assert!(matches!(err, LoadError::Unrecognized { .. }));
    }

    #[test]
    fn test_declarative_command() {
        let kind = classify("tests::Echo", Arc::new(Echo)).unwrap();
        assert_eq!(kind.label(), "command");
        let ModuleKind::Command(registration) = kind else {
            panic!("expected a command");
        };
        assert_eq!(registration.name(), "echo");
        assert_eq!(registration.category().unwrap().name(), "Utility");
    }

    #[test]
    fn test_no_capability_is_unrecognized() {
        let err = classify("tests::Nothing", Arc::new(Nothing)).unwrap_err();
        assert_eq!(err.location(), "tests::Nothing");
    }

    #[test]
    fn test_export_lands_in_manifest() {
        let decl = HANDLER_MODULES
            .iter()
            .find(|decl| decl.name == "Test" && decl.path.ends_with("module::tests"))
            .unwrap();

        assert!(!decl.is_default);
        assert!(decl.file.ends_with("module.rs"));
        assert!(decl.qualified_name().ends_with("module::tests::Test"));

        let instance = (decl.create)(&LoadContext::empty(decl.qualified_name()));
        assert!(classify(decl.path, instance).is_ok());
    }

    #[test]
    fn test_load_context_config() {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Settings {
            greeting: String,
            limit: u32,
        }

        let ctx = LoadContext::new(
            "tests::Test",
            Arc::new(serde_json::json!({ "greeting": "hi" })),
        );
        let settings: Settings = ctx.get_config().unwrap();
        assert_eq!(settings.greeting, "hi");
        assert_eq!(settings.limit, 0);

        let empty: Settings = LoadContext::empty("tests::Test").get_config().unwrap();
        assert_eq!(empty.greeting, "");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("a::b::Cog"), "Cog");
        assert_eq!(short_type_name("a::Wrapper<b::Inner>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
