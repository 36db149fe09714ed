//! Directory discovery.
//!
//! Walks a command root and resolves every source file against the
//! link-time manifest: a file is a module when an `export_module!` in the
//! binary was written in it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hikari_core::{HANDLER_MODULES, LoadError, ModuleDecl};
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::manifest::discovered;
use super::{Discovery, ModuleSource};
use crate::config::CommandsConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Modules exported from source files under a root directory.
///
/// Files are visited depth-first in file-name order. Each file must carry
/// exactly one export, or several of which exactly one is the default
/// (`export_module!(default ...)`).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extensions: HashSet<String>,
    skip_files: HashSet<String>,
    decls: Vec<ModuleDecl>,
}

impl DirectorySource {
    /// Scans `root` for `.rs` files, skipping `mod.rs`, `lib.rs` and `main.rs`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let defaults = CommandsConfig::default();
        Self::with_filters(root.into(), &defaults.extensions, &defaults.skip_files)
    }

    /// The configured command directory, if one is set.
    pub fn from_config(config: &CommandsConfig) -> Option<Self> {
        let root = config.directory.clone()?;
        Some(Self::with_filters(
            root,
            &config.extensions,
            &config.skip_files,
        ))
    }

    fn with_filters(root: PathBuf, extensions: &[String], skip_files: &[String]) -> Self {
        Self {
            root,
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            skip_files: skip_files.iter().cloned().collect(),
            decls: HANDLER_MODULES.iter().copied().collect(),
        }
    }

    /// Resolves files against `decls` instead of the binary's manifest.
    pub fn decls(mut self, decls: impl IntoIterator<Item = ModuleDecl>) -> Self {
        self.decls = decls.into_iter().collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_candidate(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if self.skip_files.contains(file_name) {
            return false;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    fn resolve(&self, file: &Path) -> Result<&ModuleDecl, LoadError> {
        let matches: Vec<&ModuleDecl> = self
            .decls
            .iter()
            .filter(|decl| file.ends_with(decl.file))
            .collect();

        match matches.as_slice() {
            [] => Err(LoadError::NoExport {
                path: file.to_path_buf(),
            }),
            [only] => Ok(*only),
            many => {
                let defaults: Vec<&ModuleDecl> =
                    many.iter().copied().filter(|decl| decl.is_default).collect();
                match defaults.as_slice() {
                    [default] => Ok(*default),
                    _ => Err(LoadError::AmbiguousExport {
                        path: file.to_path_buf(),
                        count: many.len(),
                    }),
                }
            }
        }
    }

    fn walk(root: &Path) -> (Vec<PathBuf>, Vec<LoadError>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name();
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(error) => errors.push(LoadError::Discovery {
                    path: error
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.to_path_buf()),
                    message: error.to_string(),
                }),
            }
        }
        (files, errors)
    }
}

#[async_trait]
impl ModuleSource for DirectorySource {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    async fn discover(&self) -> RuntimeResult<Discovery> {
        let root = self.root.canonicalize().map_err(|e| RuntimeError::Discovery {
            path: self.root.clone(),
            message: e.to_string(),
        })?;
        if !root.is_dir() {
            return Err(RuntimeError::Discovery {
                path: self.root.clone(),
                message: "not a directory".to_string(),
            });
        }

        let walk_root = root.clone();
        let (files, walk_errors) = tokio::task::spawn_blocking(move || Self::walk(&walk_root))
            .await
            .map_err(|e| RuntimeError::Discovery {
                path: root.clone(),
                message: e.to_string(),
            })?;

        let mut discovery = Discovery {
            modules: Vec::new(),
            errors: walk_errors,
        };
        for file in files {
            if !self.is_candidate(&file) {
                trace!(file = %file.display(), "Skipping file");
                continue;
            }
            match self.resolve(&file) {
                Ok(decl) => {
                    let mut module = discovered(decl);
                    module.file = Some(file);
                    discovery.modules.push(module);
                }
                Err(error) => discovery.errors.push(error),
            }
        }

        debug!(
            root = %root.display(),
            modules = discovery.modules.len(),
            "Directory scanned"
        );
        Ok(discovery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hikari_core::{HandlerModule, LoadContext};
    use std::fs;
    use std::sync::Arc;

    fn never(_: &LoadContext) -> Arc<dyn HandlerModule> {
        unreachable!()
    }

    fn decl(file: &Path, name: &'static str, is_default: bool) -> ModuleDecl {
        let file: &'static str = Box::leak(file.to_string_lossy().into_owned().into_boxed_str());
        ModuleDecl {
            path: "bot::commands",
            name,
            file,
            is_default,
            create: never,
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().canonicalize().unwrap();
            Self { _dir: dir, root }
        }

        fn file(&self, relative: &str) -> PathBuf {
            let path = self.root.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "// module").unwrap();
            path
        }
    }

    #[tokio::test]
    async fn test_files_resolve_in_name_order() {
        let fx = Fixture::new();
        let zeta = fx.file("zeta.rs");
        let alpha = fx.file("fun/alpha.rs");
        fx.file("fun/mod.rs");
        fx.file("notes.txt");

        let source = DirectorySource::new(&fx.root).decls([
            decl(&zeta, "Zeta", false),
            decl(&alpha, "Alpha", false),
        ]);
        let discovery = source.discover().await.unwrap();

        let names: Vec<_> = discovery.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
        assert_eq!(discovery.modules[0].path, "bot::commands::Alpha");
        assert!(discovery.errors.is_empty());
    }

    #[tokio::test]
    async fn test_file_without_export_is_reported() {
        let fx = Fixture::new();
        let stray = fx.file("stray.rs");
        let ping = fx.file("ping.rs");

        let source = DirectorySource::new(&fx.root).decls([decl(&ping, "Ping", false)]);
        let discovery = source.discover().await.unwrap();

        assert_eq!(discovery.modules.len(), 1);
        assert!(matches!(
            &discovery.errors[..],
            [LoadError::NoExport { path }] if path == &stray
        ));
    }

    #[tokio::test]
    async fn test_default_export_breaks_ties() {
        let fx = Fixture::new();
        let utility = fx.file("utility.rs");
        let mixed = fx.file("mixed.rs");

        let source = DirectorySource::new(&fx.root).decls([
            decl(&utility, "Helper", false),
            decl(&utility, "Utility", true),
            decl(&mixed, "One", false),
            decl(&mixed, "Two", false),
        ]);
        let discovery = source.discover().await.unwrap();

        assert_eq!(discovery.modules.len(), 1);
        assert_eq!(discovery.modules[0].name, "Utility");
        assert!(matches!(
            &discovery.errors[..],
            [LoadError::AmbiguousExport { count: 2, .. }]
        ));
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let fx = Fixture::new();
        let source = DirectorySource::new(fx.root.join("absent"));
        let err = source.discover().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Discovery { .. }));
    }

    #[tokio::test]
    async fn test_root_must_be_directory() {
        let fx = Fixture::new();
        let file = fx.file("single.rs");
        let err = DirectorySource::new(file).discover().await.unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_from_config_filters() {
        let config = CommandsConfig {
            directory: Some(PathBuf::from("commands")),
            extensions: vec!["RS".into()],
            skip_files: vec!["skip.rs".into()],
            ..Default::default()
        };
        let source = DirectorySource::from_config(&config).unwrap();

        assert!(source.is_candidate(Path::new("commands/ping.rs")));
        assert!(!source.is_candidate(Path::new("commands/skip.rs")));
        assert!(!source.is_candidate(Path::new("commands/mod.rs.bak")));
        assert!(DirectorySource::from_config(&CommandsConfig::default()).is_none());
    }
}
