// src/core/cache.rs

//! Deterministic on-disk layout of the artifact cache.
//!
//! Archives live under `<root>/archives/<stem>/<label>/<file>.phar`, installed
//! packages under `<root>/<vendor>_<package>[_<version>]/`. Nothing is ever
//! written in place: content is assembled in a staging directory next to its
//! target and committed with a single `rename`.

use crate::constants::{ARCHIVES_DIR, STAGING_PREFIX};
use crate::models::{ArtifactKind, CacheKey, CachedArtifact};
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Result of moving a staged entry into place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The staged content is now the cache entry.
    Committed,
    /// Another process committed the same entry first; the staged copy was discarded.
    AlreadyPresent,
}

/// Maps cache keys to directories under a single root.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root. May not exist yet.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parent directory of every archive entry.
    pub fn archives_root(&self) -> PathBuf {
        self.root.join(ARCHIVES_DIR)
    }

    /// `<root>/archives/<stem>/<label>`
    pub fn archive_dir(&self, key: &CacheKey) -> PathBuf {
        self.archives_root().join(key.stem()).join(key.label())
    }

    /// `<root>/<name with '/' flattened to '_'>[_<version>]`
    pub fn package_dir(&self, key: &CacheKey) -> PathBuf {
        let mut dir_name = flatten(key.canonical());
        if let Some(version) = key.version() {
            dir_name.push('_');
            dir_name.push_str(&flatten(version));
        }
        self.root.join(dir_name)
    }

    /// The directory a key maps to, whatever its kind.
    pub fn dir_for(&self, key: &CacheKey) -> PathBuf {
        match key.kind() {
            ArtifactKind::Archive => self.archive_dir(key),
            _ => self.package_dir(key),
        }
    }

    /// Returns the cached artifact for `key` if its directory is already committed.
    ///
    /// An archive entry only counts as a hit when it actually holds a `.phar`
    /// file, so an emptied directory is treated as a miss.
    pub fn lookup(&self, key: &CacheKey) -> Option<CachedArtifact> {
        let dir = self.dir_for(key);
        let hit = match key.kind() {
            ArtifactKind::Archive => dir.join(key.canonical()).is_file(),
            _ => dir.is_dir(),
        };
        debug!(
            "Cache {} for '{}' at '{}'",
            if hit { "hit" } else { "miss" },
            key.canonical(),
            dir.display()
        );
        hit.then(|| CachedArtifact {
            name: key.canonical().to_string(),
            path: dir,
            kind: key.kind(),
        })
    }

    /// Creates a private staging directory inside `parent` (created if missing).
    ///
    /// Staging next to the target keeps the final `rename` on one filesystem.
    /// The directory is deleted on drop unless it was committed.
    pub fn stage_in(&self, parent: &Path) -> io::Result<TempDir> {
        fs::create_dir_all(parent)?;
        tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)
    }

    /// Atomically moves a staged directory to `target`.
    ///
    /// If `target` already exists, the existing entry wins and the staged copy
    /// is dropped.
    pub fn commit(&self, staging: TempDir, target: &Path) -> io::Result<CommitOutcome> {
        if target.exists() {
            debug!("'{}' already committed, discarding staged copy", target.display());
            return Ok(CommitOutcome::AlreadyPresent);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let staged = staging.keep();
        match fs::rename(&staged, target) {
            Ok(()) => {
                debug!("Committed '{}'", target.display());
                Ok(CommitOutcome::Committed)
            }
            Err(_) if target.exists() => {
                // Lost the race: someone renamed into place between the check and ours.
                let _ = fs::remove_dir_all(&staged);
                Ok(CommitOutcome::AlreadyPresent)
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&staged);
                Err(e)
            }
        }
    }
}

/// Recursively copies `src` into `dst`, preserving symlinks on unix.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let destination = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&destination)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    // Without symlink privileges, fall back to copying what the link points at.
    if src.is_dir() {
        copy_tree(src, dst)
    } else {
        fs::copy(src, dst).map(|_| ())
    }
}

/// Sets `rwxr-xr-x` on unix; a no-op elsewhere.
pub fn mark_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn flatten(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}
