// src/core/installer.rs

//! Adapter around the external package installer.
//!
//! A throwaway workspace gets a one-line `composer.json`, the tool installs
//! into it, and the resulting package plus its `vendor/` tree is staged and
//! committed into the cache. The workspace never outlives the call.

use crate::constants::{MANIFEST_FILENAME, VENDOR_DIR};
use crate::core::cache::{CacheStore, CommitOutcome, copy_tree};
use crate::core::resolver::ResolveError;
use serde_json::json;
use std::fs;
use std::io;
use std::path::Path;

/// What an install tool reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Whether the tool exited successfully.
    pub success: bool,
    /// Captured stdout and stderr, for diagnostics.
    pub output: String,
}

/// Something that materializes `<workspace>/vendor` from `<workspace>/composer.json`.
pub trait InstallTool {
    /// Runs the install inside `workspace`.
    ///
    /// An `Err` means the tool could not be run at all.
    fn install(&self, workspace: &Path) -> io::Result<ToolOutcome>;

    /// Human-readable name of the tool, for messages.
    fn describe(&self) -> String;
}

/// Installs packages into the cache through an [`InstallTool`].
pub struct PackageInstaller {
    tool: Box<dyn InstallTool>,
}

impl std::fmt::Debug for PackageInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageInstaller")
            .field("tool", &self.tool.describe())
            .finish()
    }
}

impl PackageInstaller {
    pub fn new(tool: Box<dyn InstallTool>) -> Self {
        Self { tool }
    }

    /// Writes the disposable manifest requiring exactly `name` (at `version`, or `*`).
    pub fn write_manifest(workspace: &Path, name: &str, version: Option<&str>) -> io::Result<()> {
        let manifest = json!({
            "require": {
                name: version.unwrap_or("*"),
            }
        });
        let content = serde_json::to_string_pretty(&manifest).map_err(io::Error::other)?;
        fs::write(workspace.join(MANIFEST_FILENAME), content)
    }

    /// Installs `name` and commits it to `target`.
    ///
    /// The package's own files end up at the top of `target`, and the whole
    /// dependency tree under `target/vendor`.
    pub fn install(
        &self,
        store: &CacheStore,
        name: &str,
        version: Option<&str>,
        target: &Path,
    ) -> Result<(), ResolveError> {
        let spec = match version {
            Some(version) => format!("{}:{}", name, version),
            None => name.to_string(),
        };
        let io_error = |action: &'static str, path: &Path| {
            let path = path.display().to_string();
            move |source| ResolveError::Io { action, path, source }
        };

        // 1. Disposable workspace, removed when it goes out of scope.
        let workspace = tempfile::Builder::new()
            .prefix("phpx-install-")
            .tempdir()
            .map_err(io_error("creating a workspace in", &std::env::temp_dir()))?;
        Self::write_manifest(workspace.path(), name, version)
            .map_err(io_error("writing the manifest in", workspace.path()))?;

        // 2. Run the tool.
        log::debug!(
            "Installing '{}' with {} in '{}'",
            spec,
            self.tool.describe(),
            workspace.path().display()
        );
        let outcome = self
            .tool
            .install(workspace.path())
            .map_err(|e| ResolveError::InstallFailed {
                spec: spec.clone(),
                reason: format!("could not run {}: {}", self.tool.describe(), e),
                output: String::new(),
            })?;
        if !outcome.success {
            return Err(ResolveError::InstallFailed {
                spec,
                reason: format!("{} reported a failure", self.tool.describe()),
                output: outcome.output,
            });
        }

        let vendor = workspace.path().join(VENDOR_DIR);
        let package_dir = vendor.join(name);
        if !package_dir.is_dir() {
            return Err(ResolveError::InstallFailed {
                spec,
                reason: format!("'{}' was not found in the installed dependencies", name),
                output: outcome.output,
            });
        }

        // 3. Stage the package and its vendor tree next to the target.
        let parent = target.parent().unwrap_or(store.root());
        let staging = store
            .stage_in(parent)
            .map_err(io_error("creating a staging directory in", parent))?;
        copy_tree(&package_dir, staging.path())
            .map_err(io_error("copying the package from", &package_dir))?;
        copy_tree(&vendor, &staging.path().join(VENDOR_DIR))
            .map_err(io_error("copying dependencies from", &vendor))?;

        // 4. Commit.
        match store
            .commit(staging, target)
            .map_err(io_error("committing", target))?
        {
            CommitOutcome::Committed => log::debug!("Installed '{}' into '{}'", spec, target.display()),
            CommitOutcome::AlreadyPresent => {
                log::debug!("'{}' was installed concurrently, using the existing copy", spec);
            }
        }
        Ok(())
    }
}
