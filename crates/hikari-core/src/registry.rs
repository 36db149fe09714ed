//! The command registry.
//!
//! [`CommandRegistry`] owns four maps:
//!
//! | Map | Key → Value |
//! |-----|-------------|
//! | commands | name → descriptor |
//! | aliases | alias → canonical name |
//! | categories | category → command names, in registration order |
//! | category info | category → [`CategoryInfo`] |
//!
//! It is filled once, by `&mut` access during the load phase, and then shared
//! read-only behind an `Arc` for the client's lifetime. There is no removal.
//!
//! Collisions never fail. A redefined name or alias goes to the newest
//! registration, and category metadata is kept from the first declaration.
//! Each redefinition is logged and returned as a [`RegistrationWarning`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::RegistrationWarning;
use crate::metadata::{CategoryInfo, CategoryRef, CommandDescriptor, DEFAULT_CATEGORY};

/// Name → descriptor lookup with aliases and categories.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<CommandDescriptor>>,
    aliases: HashMap<String, String>,
    categories: HashMap<String, Vec<String>>,
    category_order: Vec<String>,
    category_info: HashMap<String, CategoryInfo>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command.
    ///
    /// Overwrites any command with the same name, rebinds every declared
    /// alias to it and appends its name to its category (the default
    /// category when none is declared).
    pub fn register(&mut self, descriptor: CommandDescriptor) -> Vec<RegistrationWarning> {
        let mut warnings = Vec::new();
        let name = descriptor.name().to_string();

        for alias in descriptor.aliases() {
            if let Some(previous) = self.aliases.insert(alias.clone(), name.clone())
                && previous != name
            {
                warnings.push(RegistrationWarning::DuplicateAlias {
                    alias: alias.clone(),
                    previous,
                    current: name.clone(),
                });
            }
        }

        match descriptor.category() {
            Some(category) => {
                if let Some(warning) = self.add_to_category(category, &name) {
                    warnings.push(warning);
                }
            }
            None => {
                self.add_to_category(&CategoryRef::Name(DEFAULT_CATEGORY.to_string()), &name);
            }
        }

        if self
            .commands
            .insert(name.clone(), Arc::new(descriptor))
            .is_some()
        {
            warnings.push(RegistrationWarning::DuplicateCommand { name: name.clone() });
        }

        for warning in &warnings {
            warn!(command = %name, "{warning}");
        }
        debug!(command = %name, "Command registered");

        warnings
    }

    /// Declares a category without adding a command to it.
    ///
    /// Cogs call this so their category exists with its metadata even before
    /// (or without) any of their commands landing in it.
    pub fn declare_category(&mut self, info: CategoryInfo) -> Option<RegistrationWarning> {
        let warning = self.record_info(&info);
        self.ensure_category(&info.name);
        if let Some(warning) = &warning {
            warn!(category = %info.name, "{warning}");
        }
        warning
    }

    /// Makes sure a category is listed, without recording metadata for it.
    pub fn open_category(&mut self, name: &str) {
        self.ensure_category(name);
    }

    fn add_to_category(
        &mut self,
        category: &CategoryRef,
        command: &str,
    ) -> Option<RegistrationWarning> {
        let warning = category.info().and_then(|info| self.record_info(info));
        self.ensure_category(category.name()).push(command.to_string());
        warning
    }

    fn ensure_category(&mut self, name: &str) -> &mut Vec<String> {
        if !self.categories.contains_key(name) {
            self.category_order.push(name.to_string());
        }
        self.categories.entry(name.to_string()).or_default()
    }

    fn record_info(&mut self, info: &CategoryInfo) -> Option<RegistrationWarning> {
        match self.category_info.get(&info.name) {
            None => {
                self.category_info.insert(info.name.clone(), info.clone());
                None
            }
            Some(existing) if existing == info => None,
            Some(_) => Some(RegistrationWarning::CategoryRedefined {
                name: info.name.clone(),
            }),
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Looks up by exact name first, then by alias.
    pub fn resolve(&self, name_or_alias: &str) -> Option<Arc<CommandDescriptor>> {
        self.commands.get(name_or_alias).cloned().or_else(|| {
            self.aliases
                .get(name_or_alias)
                .and_then(|name| self.commands.get(name))
                .cloned()
        })
    }

    /// Looks up by exact name only.
    pub fn get(&self, name: &str) -> Option<&Arc<CommandDescriptor>> {
        self.commands.get(name)
    }

    /// Number of distinct command names.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no command is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// All command names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Aliases currently bound to `name`, sorted.
    pub fn aliases_of(&self, name: &str) -> Vec<&str> {
        let mut aliases: Vec<&str> = self
            .aliases
            .iter()
            .filter(|(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.as_str())
            .collect();
        aliases.sort_unstable();
        aliases
    }

    /// Command names filed under `category`, in registration order.
    pub fn category(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    /// Metadata of `category`, if any module declared it.
    pub fn category_info(&self, category: &str) -> Option<&CategoryInfo> {
        self.category_info.get(category)
    }

    /// Iterates categories in the order they were first seen.
    pub fn categories(&self) -> impl Iterator<Item = CategoryView<'_>> {
        self.category_order.iter().map(|name| CategoryView {
            name,
            info: self.category_info.get(name),
            commands: self.categories.get(name).map(Vec::as_slice).unwrap_or(&[]),
        })
    }
}

/// A borrowed view of one category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryView<'a> {
    /// Category name.
    pub name: &'a str,
    /// Declared metadata.
    pub info: Option<&'a CategoryInfo>,
    /// Command names in registration order.
    pub commands: &'a [String],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerResult;
    use crate::message::MessageContext;
    use crate::metadata::{CommandInfo, CommandRegistration};

    async fn noop(_ctx: Arc<MessageContext>, _args: Vec<String>) -> HandlerResult {
        Ok(())
    }

    fn command(info: CommandInfo) -> CommandDescriptor {
        CommandRegistration::build(info, noop).unwrap()
    }

    #[test]
    fn test_resolve_by_name_and_alias() {
        let mut registry = CommandRegistry::new();
        registry.register(command(CommandInfo::named("ping").aliases(["p", "pong"])));

        let by_name = registry.resolve("ping").unwrap();
        for alias in ["p", "pong"] {
            let by_alias = registry.resolve(alias).unwrap();
            assert!(Arc::ptr_eq(&by_name, &by_alias));
        }
        assert_eq!(registry.aliases_of("ping"), vec!["p", "pong"]);
    }

    #[test]
    fn test_resolve_missing_is_none() {
        let registry = CommandRegistry::new();
        assert!(registry.resolve("ping").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_same_name_last_wins() {
        let mut registry = CommandRegistry::new();
        registry.register(command(CommandInfo::named("ping").description("first")));
        let warnings = registry.register(command(CommandInfo::named("ping").description("second")));

        assert_eq!(
            warnings,
            vec![RegistrationWarning::DuplicateCommand {
                name: "ping".into()
            }]
        );
        assert_eq!(registry.resolve("ping").unwrap().description(), "second");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_alias_rebinds_to_newest() {
        let mut registry = CommandRegistry::new();
        registry.register(command(CommandInfo::named("ping").alias("p")));
        let warnings = registry.register(command(CommandInfo::named("purge").alias("p")));

        assert_eq!(
            warnings,
            vec![RegistrationWarning::DuplicateAlias {
                alias: "p".into(),
                previous: "ping".into(),
                current: "purge".into(),
            }]
        );
        assert_eq!(registry.resolve("p").unwrap().name(), "purge");
        assert_eq!(registry.resolve("ping").unwrap().name(), "ping");
    }

    #[test]
    fn test_name_takes_priority_over_alias() {
        let mut registry = CommandRegistry::new();
        registry.register(command(CommandInfo::named("help")));
        registry.register(command(CommandInfo::named("manual").alias("help")));

        assert_eq!(registry.resolve("help").unwrap().name(), "help");
    }

    #[test]
    fn test_category_order_and_duplicates_preserved() {
        let mut registry = CommandRegistry::new();
        registry.register(command(CommandInfo::named("ban").category("Moderation")));
        registry.register(command(CommandInfo::named("kick").category("Moderation")));
        registry.register(command(CommandInfo::named("ban").category("Moderation")));

        assert_eq!(
            registry.category("Moderation").unwrap(),
            &["ban".to_string(), "kick".to_string(), "ban".to_string()]
        );
    }

    #[test]
    fn test_uncategorized_goes_to_default() {
        let mut registry = CommandRegistry::new();
        registry.register(command(CommandInfo::named("ping")));
        assert_eq!(registry.category(DEFAULT_CATEGORY).unwrap(), &["ping".to_string()]);
    }

    #[test]
    fn test_category_info_first_wins() {
        let mut registry = CommandRegistry::new();
        registry.register(command(
            CommandInfo::named("ban").category(CategoryInfo::new("Moderation", "Keep order")),
        ));
        let warnings = registry.register(command(
            CommandInfo::named("kick").category(CategoryInfo::new("Moderation", "Other text")),
        ));

        assert_eq!(
            warnings,
            vec![RegistrationWarning::CategoryRedefined {
                name: "Moderation".into()
            }]
        );
        assert_eq!(
            registry.category_info("Moderation").unwrap().description,
            "Keep order"
        );
        assert_eq!(registry.category("Moderation").unwrap().len(), 2);
    }

    #[test]
    fn test_named_reference_keeps_inline_info() {
        let mut registry = CommandRegistry::new();
        registry.declare_category(CategoryInfo::new("Fun", "Games"));
        registry.register(command(CommandInfo::named("roll").category("Fun")));

        let views: Vec<_> = registry.categories().collect();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name, "Fun");
        assert_eq!(views[0].info.unwrap().description, "Games");
        assert_eq!(views[0].commands, &["roll".to_string()]);
    }

    #[test]
    fn test_categories_in_first_seen_order() {
        let mut registry = CommandRegistry::new();
        registry.register(command(CommandInfo::named("roll").category("Fun")));
        registry.register(command(CommandInfo::named("ban").category("Moderation")));
        registry.register(command(CommandInfo::named("flip").category("Fun")));

        let names: Vec<_> = registry.categories().map(|c| c.name).collect();
        assert_eq!(names, vec!["Fun", "Moderation"]);
    }
}
