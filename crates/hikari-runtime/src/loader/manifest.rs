//! Link-time manifest and explicit module lists.

use async_trait::async_trait;
use hikari_core::{HANDLER_MODULES, ModuleDecl, ModuleFactory};

use super::{DiscoveredModule, Discovery, ModuleSource};
use crate::error::RuntimeResult;

/// Every module exported with `export_module!`, sorted by qualified name.
#[derive(Debug, Clone)]
pub struct StaticManifest {
    decls: Vec<ModuleDecl>,
    prefix: Option<String>,
}

impl Default for StaticManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticManifest {
    /// The manifest linked into this binary.
    pub fn new() -> Self {
        Self::from_decls(HANDLER_MODULES.iter().copied())
    }

    /// A manifest over explicit declarations.
    pub fn from_decls(decls: impl IntoIterator<Item = ModuleDecl>) -> Self {
        Self {
            decls: decls.into_iter().collect(),
            prefix: None,
        }
    }

    /// Keeps only modules at or below the module path `prefix`
    /// (e.g. `my_bot::commands`).
    pub fn within(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn matches(&self, decl: &ModuleDecl) -> bool {
        match &self.prefix {
            None => true,
            Some(prefix) => {
                decl.path == prefix
                    || decl
                        .path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with("::"))
            }
        }
    }
}

pub(super) fn discovered(decl: &ModuleDecl) -> DiscoveredModule {
    DiscoveredModule {
        path: decl.qualified_name(),
        name: decl.name.to_string(),
        file: Some(decl.file.into()),
        factory: decl.create,
    }
}

#[async_trait]
impl ModuleSource for StaticManifest {
    fn describe(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("manifest ({prefix})"),
            None => "manifest".to_string(),
        }
    }

    async fn discover(&self) -> RuntimeResult<Discovery> {
        let mut modules: Vec<DiscoveredModule> = self
            .decls
            .iter()
            .filter(|decl| self.matches(decl))
            .map(discovered)
            .collect();
        modules.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(Discovery {
            modules,
            errors: Vec::new(),
        })
    }
}

/// Modules wired by hand, loaded in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ModuleList {
    modules: Vec<DiscoveredModule>,
}

impl ModuleList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module under the qualified name `path`.
    pub fn add(mut self, path: impl Into<String>, factory: ModuleFactory) -> Self {
        let path = path.into();
        let name = path.rsplit("::").next().unwrap_or(&path).to_string();
        self.modules.push(DiscoveredModule {
            path,
            name,
            file: None,
            factory,
        });
        self
    }
}

#[async_trait]
impl ModuleSource for ModuleList {
    fn describe(&self) -> String {
        format!("list of {}", self.modules.len())
    }

    async fn discover(&self) -> RuntimeResult<Discovery> {
        Ok(Discovery {
            modules: self.modules.clone(),
            errors: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manifest_contains_exports() {
        let discovery = StaticManifest::new()
            .within("hikari_runtime::loader::tests")
            .discover()
            .await
            .unwrap();

        let paths: Vec<_> = discovery.modules.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "hikari_runtime::loader::tests::Greeter",
                "hikari_runtime::loader::tests::Ping",
            ]
        );
        assert!(discovery.modules[0].file.as_ref().unwrap().ends_with("loader/mod.rs"));
    }

    #[tokio::test]
    async fn test_prefix_is_path_aware() {
        let discovery = StaticManifest::new()
            .within("hikari_runtime::loader::test")
            .discover()
            .await
            .unwrap();
        assert!(discovery.modules.is_empty());
    }

    #[tokio::test]
    async fn test_list_keeps_order() {
        fn never(_: &hikari_core::LoadContext) -> std::sync::Arc<dyn hikari_core::HandlerModule> {
            unreachable!()
        }

        let discovery = ModuleList::new()
            .add("b::Second", never)
            .add("a::First", never)
            .discover()
            .await
            .unwrap();
        let names: Vec<_> = discovery.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Second", "First"]);
    }
}
