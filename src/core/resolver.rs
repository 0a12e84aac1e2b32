// src/core/resolver.rs

//! # Resolver
//!
//! Turns a spec string into a [`ResolvedArtifact`]: parse, classify, consult the
//! cache, fill it on a miss (download or install), then locate the entry point.

use crate::constants::LATEST_LABEL;
use crate::core::cache::{CacheStore, CommitOutcome, mark_executable};
use crate::core::catalog::Catalog;
use crate::core::installer::{InstallTool, PackageInstaller};
use crate::core::paths::Settings;
use crate::core::{locator, spec};
use crate::dev_utils::BlockTimer;
use crate::models::{ArtifactKind, CacheKey, CachedArtifact, ResolvedArtifact, SpecTarget};
use crate::system::composer::ComposerTool;
use crate::system::downloader::{Fetcher, HttpFetcher};
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Invalid specification '{spec}': {reason}")]
    SpecInvalid { spec: String, reason: String },

    #[error("'{name}' is neither a known archive nor an existing file.")]
    ArtifactNotFound { name: String },

    #[error("Version '{version}' of '{name}' is not available (known versions: {known}).")]
    VersionNotFound {
        name: String,
        version: String,
        known: String,
    },

    #[error("Failed to download '{name}' from {url}: {reason}")]
    DownloadFailed {
        name: String,
        url: String,
        reason: String,
    },

    /// `output` holds the installer's captured output and is not part of the message.
    #[error("Failed to install '{spec}': {reason}")]
    InstallFailed {
        spec: String,
        reason: String,
        output: String,
    },

    #[error("No executable found for '{name}' in '{path}'.")]
    ExecutableNotFound { name: String, path: String },

    #[error("I/O error while {action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },
}

/// The resolution engine. Holds its collaborators; no process-global state.
pub struct Resolver {
    store: CacheStore,
    catalog: Catalog,
    fetcher: Box<dyn Fetcher>,
    installer: PackageInstaller,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("store", &self.store)
            .field("installer", &self.installer)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(
        store: CacheStore,
        catalog: Catalog,
        fetcher: Box<dyn Fetcher>,
        installer: Box<dyn InstallTool>,
    ) -> Self {
        Self {
            store,
            catalog,
            fetcher,
            installer: PackageInstaller::new(installer),
        }
    }

    /// Wires the production collaborators: HTTP downloads and the composer CLI.
    pub fn from_settings(settings: &Settings, catalog: Catalog) -> Self {
        Self::new(
            CacheStore::new(settings.cache_root.clone()),
            catalog,
            Box::new(HttpFetcher),
            Box::new(ComposerTool::new(settings.composer_command.clone())),
        )
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolves a raw `name[:version]` string to a runnable artifact.
    ///
    /// # Errors
    /// Any [`ResolveError`]; no process has been started when this fails.
    pub fn resolve(&self, raw: &str) -> Result<ResolvedArtifact, ResolveError> {
        let _timer = BlockTimer::new(format!("resolve {}", raw));

        let parsed = spec::parse(raw)?;
        let target = spec::classify(raw, &parsed, &self.catalog)?;
        debug!("'{}' classified as {}", raw, target.kind());

        let cached = match &target {
            SpecTarget::DirectScript { path } => direct_script(path)?,
            SpecTarget::Archive { name, version } => self.ensure_archive(name, version.as_deref())?,
            SpecTarget::Package { name, version } => self.ensure_package(name, version.as_deref())?,
        };

        let entry_point = locator::locate(&cached)?;
        Ok(ResolvedArtifact::new(cached, entry_point))
    }

    /// The cache key a target maps to. Direct scripts are never cached.
    pub fn cache_key(target: &SpecTarget) -> Option<CacheKey> {
        match target {
            SpecTarget::DirectScript { .. } => None,
            SpecTarget::Archive { name, version } => Some(CacheKey::archive(name, version.as_deref())),
            SpecTarget::Package { name, version } => Some(CacheKey::package(name, version.as_deref())),
        }
    }

    fn ensure_archive(&self, name: &str, version: Option<&str>) -> Result<CachedArtifact, ResolveError> {
        let key = CacheKey::archive(name, version);

        // 1. Cache hit: no network, no copy.
        if let Some(hit) = self.store.lookup(&key) {
            return Ok(hit);
        }

        // 2. Registry-known archive: gate the version before touching the network.
        if let Some(versions) = self.catalog.registry().versions(name) {
            let label = version.unwrap_or(LATEST_LABEL);
            let Some(url) = versions.get(label) else {
                return Err(ResolveError::VersionNotFound {
                    name: name.to_string(),
                    version: label.to_string(),
                    known: versions.keys().cloned().collect::<Vec<_>>().join(", "),
                });
            };
            return self.download_archive(&key, url);
        }

        // 3. A user-supplied archive on disk.
        let local = Path::new(name);
        if local.is_file() {
            return self.copy_local_archive(&key, local);
        }

        Err(ResolveError::ArtifactNotFound {
            name: name.to_string(),
        })
    }

    fn download_archive(&self, key: &CacheKey, url: &str) -> Result<CachedArtifact, ResolveError> {
        let _timer = BlockTimer::new(format!("download {}", key.canonical()));
        self.fill_archive(key, |staged| {
            self.fetcher
                .fetch(url, staged)
                .map(|_| ())
                .map_err(|e| ResolveError::DownloadFailed {
                    name: key.canonical().to_string(),
                    url: url.to_string(),
                    reason: e.to_string(),
                })
        })
    }

    fn copy_local_archive(&self, key: &CacheKey, source: &Path) -> Result<CachedArtifact, ResolveError> {
        debug!("Caching local archive '{}'", source.display());
        self.fill_archive(key, |staged| {
            fs::copy(source, staged)
                .map(|_| ())
                .map_err(|source_err| ResolveError::Io {
                    action: "copying",
                    path: source.display().to_string(),
                    source: source_err,
                })
        })
    }

    /// Writes an archive into a staging directory with `write`, then commits it.
    fn fill_archive<F>(&self, key: &CacheKey, write: F) -> Result<CachedArtifact, ResolveError>
    where
        F: FnOnce(&Path) -> Result<(), ResolveError>,
    {
        let target = self.store.archive_dir(key);
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.store.archives_root());
        let staging = self.store.stage_in(&parent).map_err(|source| ResolveError::Io {
            action: "creating a staging directory in",
            path: parent.display().to_string(),
            source,
        })?;

        let staged_file = staging.path().join(key.canonical());
        write(&staged_file)?;
        mark_executable(&staged_file).map_err(|source| ResolveError::Io {
            action: "marking as executable",
            path: staged_file.display().to_string(),
            source,
        })?;

        let outcome = self.store.commit(staging, &target).map_err(|source| ResolveError::Io {
            action: "committing",
            path: target.display().to_string(),
            source,
        })?;
        if outcome == CommitOutcome::AlreadyPresent {
            debug!("'{}' appeared concurrently, using the existing copy", target.display());
        }

        Ok(CachedArtifact {
            name: key.canonical().to_string(),
            path: target,
            kind: ArtifactKind::Archive,
        })
    }

    fn ensure_package(&self, name: &str, version: Option<&str>) -> Result<CachedArtifact, ResolveError> {
        let key = CacheKey::package(name, version);
        if let Some(hit) = self.store.lookup(&key) {
            return Ok(hit);
        }

        let _timer = BlockTimer::new(format!("install {}", name));
        let target = self.store.package_dir(&key);
        self.installer.install(&self.store, name, version, &target)?;
        Ok(CachedArtifact {
            name: name.to_string(),
            path: target,
            kind: ArtifactKind::InstalledPackage,
        })
    }
}

/// A script runs from where it lives: its directory is the artifact path.
fn direct_script(path: &Path) -> Result<CachedArtifact, ResolveError> {
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ResolveError::SpecInvalid {
            spec: path.display().to_string(),
            reason: "the script path has no file name".to_string(),
        })?;
    Ok(CachedArtifact {
        name: file_name,
        path: parent,
        kind: ArtifactKind::DirectScript,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{AliasTable, KnownArtifactRegistry};
    use crate::core::installer::tests::FakeComposer;
    use crate::system::downloader::FetchError;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    /// Records every URL and writes a tiny fake phar, or fails with a 404.
    struct FakeFetcher {
        calls: Rc<RefCell<Vec<String>>>,
        fail: bool,
    }

    impl Fetcher for FakeFetcher {
        fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
            self.calls.borrow_mut().push(url.to_string());
            if self.fail {
                return Err(FetchError::Status { status: 404 });
            }
            let body = b"#!/usr/bin/env php\n<?php echo 'phar';";
            fs::write(dest, body)?;
            Ok(body.len() as u64)
        }
    }

    fn test_catalog() -> Catalog {
        let mut registry = KnownArtifactRegistry::default();
        registry.insert(
            "tool.phar",
            BTreeMap::from([
                ("latest".to_string(), "https://example.test/tool.phar".to_string()),
                ("2".to_string(), "https://example.test/tool-2.phar".to_string()),
            ]),
        );
        let mut aliases = AliasTable::default();
        aliases.insert("tool", "tool.phar");
        Catalog::new(registry, aliases).unwrap()
    }

    struct Harness {
        _cache: tempfile::TempDir,
        resolver: Resolver,
        downloads: Rc<RefCell<Vec<String>>>,
        installs: Rc<RefCell<u32>>,
    }

    fn harness(fail_downloads: bool) -> Harness {
        let cache = tempfile::tempdir().unwrap();
        let downloads = Rc::new(RefCell::new(Vec::new()));
        let composer = FakeComposer::working();
        let installs = Rc::clone(&composer.calls);
        let resolver = Resolver::new(
            CacheStore::new(cache.path()),
            test_catalog(),
            Box::new(FakeFetcher {
                calls: Rc::clone(&downloads),
                fail: fail_downloads,
            }),
            Box::new(composer),
        );
        Harness {
            _cache: cache,
            resolver,
            downloads,
            installs,
        }
    }

    #[test]
    fn test_archive_resolution_is_idempotent() {
        let h = harness(false);
        let first = h.resolver.resolve("tool.phar:2").unwrap();
        let second = h.resolver.resolve("tool.phar:2").unwrap();

        assert_eq!(first, second);
        assert_eq!(*h.downloads.borrow(), vec!["https://example.test/tool-2.phar"]);
        assert_eq!(first.kind(), ArtifactKind::Archive);
        assert_eq!(
            first.path(),
            h.resolver.store().root().join("archives/tool/2")
        );
        assert_eq!(first.entry_point(), first.path().join("tool.phar"));
    }

    #[test]
    fn test_alias_and_canonical_share_a_cache_key() {
        let h = harness(false);
        let catalog = h.resolver.catalog();
        let by_alias = spec::classify("tool:2", &spec::parse("tool:2").unwrap(), catalog).unwrap();
        let by_name =
            spec::classify("tool.phar:2", &spec::parse("tool.phar:2").unwrap(), catalog).unwrap();
        assert_eq!(Resolver::cache_key(&by_alias), Resolver::cache_key(&by_name));

        let a = h.resolver.resolve("tool:2").unwrap();
        let b = h.resolver.resolve("tool.phar:2").unwrap();
        assert_eq!(a.path(), b.path());
        assert_eq!(h.downloads.borrow().len(), 1);
    }

    #[test]
    fn test_latest_is_implicit() {
        let h = harness(false);
        let artifact = h.resolver.resolve("tool").unwrap();
        assert!(artifact.path().ends_with("archives/tool/latest"));
        assert_eq!(*h.downloads.borrow(), vec!["https://example.test/tool.phar"]);
    }

    #[test]
    fn test_unknown_version_makes_no_network_call() {
        let h = harness(false);
        let err = h.resolver.resolve("tool:99").unwrap_err();
        match err {
            ResolveError::VersionNotFound { name, version, known } => {
                assert_eq!(name, "tool.phar");
                assert_eq!(version, "99");
                assert_eq!(known, "2, latest");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(h.downloads.borrow().is_empty());
    }

    #[test]
    fn test_failed_download_leaves_no_entry() {
        let h = harness(true);
        let result = h.resolver.resolve("tool.phar");
        assert!(matches!(result, Err(ResolveError::DownloadFailed { .. })));

        let entry = h.resolver.store().root().join("archives/tool");
        let leftovers: Vec<_> = fs::read_dir(&entry).unwrap().collect();
        assert!(leftovers.is_empty(), "staging was not cleaned up");
        assert!(!entry.join("latest").exists());
    }

    #[test]
    fn test_local_archive_is_copied_by_basename() {
        let h = harness(false);
        let src = tempfile::tempdir().unwrap();
        let local = src.path().join("custom.phar");
        fs::write(&local, b"phar").unwrap();

        let artifact = h.resolver.resolve(&local.display().to_string()).unwrap();
        assert!(artifact.path().ends_with("archives/custom/latest"));
        assert_eq!(artifact.entry_point(), artifact.path().join("custom.phar"));
        assert!(h.downloads.borrow().is_empty());
    }

    #[test]
    fn test_unknown_archive_is_not_found() {
        let h = harness(false);
        let result = h.resolver.resolve("nowhere.phar");
        assert!(matches!(result, Err(ResolveError::ArtifactNotFound { .. })));
        assert!(h.downloads.borrow().is_empty());
    }

    #[test]
    fn test_package_is_installed_once() {
        let h = harness(false);
        let first = h.resolver.resolve("acme/tool:^1.0").unwrap();
        let second = h.resolver.resolve("Acme/Tool:^1.0").unwrap();

        assert_eq!(first, second);
        assert_eq!(*h.installs.borrow(), 1);
        assert_eq!(first.kind(), ArtifactKind::InstalledPackage);
        assert_eq!(first.path(), h.resolver.store().root().join("acme_tool_^1.0"));
        assert_eq!(first.entry_point(), first.path().join("bin/tool"));
        assert_eq!(first.bin_dir(), first.path().join("vendor/bin"));
    }

    #[test]
    fn test_direct_script_is_not_cached() {
        let h = harness(false);
        let scripts = tempfile::tempdir().unwrap();
        let script = scripts.path().join("hello.php");
        fs::write(&script, "<?php echo 'hi';").unwrap();

        let artifact = h.resolver.resolve(&script.display().to_string()).unwrap();
        let canonical = dunce::canonicalize(&script).unwrap();
        assert_eq!(artifact.kind(), ArtifactKind::DirectScript);
        assert_eq!(artifact.entry_point(), canonical);
        assert_eq!(Some(artifact.path()), canonical.parent());
        assert!(!h.resolver.store().root().join("archives").exists());
        assert_eq!(*h.installs.borrow(), 0);
    }

    #[test]
    fn test_paths_with_spaces_resolve() {
        let h = harness(false);
        let src = tempfile::tempdir().unwrap();
        let tools = src.path().join("my tools");
        fs::create_dir(&tools).unwrap();
        fs::write(tools.join("hello.php"), "<?php echo 'hi';").unwrap();
        fs::write(tools.join("custom.phar"), b"phar").unwrap();

        let script = h
            .resolver
            .resolve(&tools.join("hello.php").display().to_string())
            .unwrap();
        assert_eq!(script.kind(), ArtifactKind::DirectScript);
        assert_eq!(
            script.entry_point(),
            dunce::canonicalize(tools.join("hello.php")).unwrap()
        );

        let archive = h
            .resolver
            .resolve(&tools.join("custom.phar").display().to_string())
            .unwrap();
        assert!(archive.path().ends_with("archives/custom/latest"));
        assert!(h.downloads.borrow().is_empty());
    }

    #[test]
    fn test_empty_spec_is_invalid() {
        let h = harness(false);
        assert!(matches!(
            h.resolver.resolve(""),
            Err(ResolveError::SpecInvalid { .. })
        ));
    }
}
