// src/core/locator.rs

//! Finds the file to launch inside a resolved artifact directory.

use crate::constants::{MANIFEST_FILENAME, SCRIPT_EXTENSION, VENDOR_BIN_DIR, VENDOR_DIR};
use crate::core::resolver::ResolveError;
use crate::models::{ArtifactKind, CachedArtifact, has_archive_extension};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// The part of `composer.json` the locator cares about.
#[derive(Deserialize, Debug, Default)]
struct PackageManifest {
    #[serde(default)]
    bin: Option<BinDeclaration>,
}

/// `"bin"` may be a single path or a list of paths.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum BinDeclaration {
    Single(String),
    Many(Vec<String>),
}

impl BinDeclaration {
    fn first(&self) -> Option<&str> {
        match self {
            Self::Single(path) => Some(path.as_str()),
            Self::Many(paths) => paths.first().map(String::as_str),
        }
    }
}

/// Returns the entry point of a cached artifact.
///
/// # Errors
/// `ExecutableNotFound` when no strategy for the artifact's kind matches.
pub fn locate(artifact: &CachedArtifact) -> Result<PathBuf, ResolveError> {
    let found = match artifact.kind {
        ArtifactKind::Archive => find_archive(&artifact.path),
        ArtifactKind::InstalledPackage => find_package_binary(&artifact.path, &artifact.name),
        ArtifactKind::DirectScript => Some(artifact.path.join(&artifact.name)).filter(|p| p.is_file()),
    };

    match found {
        Some(entry_point) => {
            log::debug!("Entry point for '{}': '{}'", artifact.name, entry_point.display());
            Ok(entry_point)
        }
        None => Err(ResolveError::ExecutableNotFound {
            name: artifact.name.clone(),
            path: artifact.path.display().to_string(),
        }),
    }
}

fn find_archive(dir: &Path) -> Option<PathBuf> {
    sorted_files(dir)
        .into_iter()
        .find(|path| has_archive_extension(&path.to_string_lossy()))
}

fn find_package_binary(dir: &Path, package_name: &str) -> Option<PathBuf> {
    let bin_dir = dir.join(VENDOR_DIR).join(VENDOR_BIN_DIR);
    let short_name = package_name.rsplit('/').next().unwrap_or(package_name);

    // 1. vendor/bin/<package>
    let named = bin_dir.join(short_name);
    if is_executable_file(&named) {
        return Some(named);
    }

    // 2. Anything executable in vendor/bin.
    if let Some(path) = sorted_files(&bin_dir)
        .into_iter()
        .find(|path| is_executable_file(path))
    {
        return Some(path);
    }

    // 3. First "bin" entry of the package's own composer.json.
    if let Some(path) = declared_binary(dir) {
        return Some(path);
    }

    // 4. A loose top-level script.
    sorted_files(dir).into_iter().find(|path| {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION))
    })
}

fn declared_binary(dir: &Path) -> Option<PathBuf> {
    let manifest_path = dir.join(MANIFEST_FILENAME);
    let content = fs::read_to_string(&manifest_path).ok()?;
    let manifest: PackageManifest = match serde_json::from_str(&content) {
        Ok(manifest) => manifest,
        Err(e) => {
            log::warn!("Ignoring unreadable '{}': {}", manifest_path.display(), e);
            return None;
        }
    };
    let declared = manifest.bin.as_ref()?.first()?;
    let path = dir.join(declared);
    path.is_file().then_some(path)
}

fn sorted_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
