// src/models.rs

//! Plain data shared between the resolution engine and the execution bridge.

use crate::constants::{
    ARCHIVE_EXTENSION, DEFAULT_LABEL, LATEST_LABEL, VENDOR_BIN_DIR, VENDOR_DIR,
};
use std::fmt;
use std::path::{Path, PathBuf};

/// A parsed `name[:version]` string. Transient: lives for one resolution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// The name portion, exactly as typed (before alias resolution).
    pub raw_name: String,
    /// The version portion. `None` means "latest" for archives and
    /// "unconstrained" for installed packages.
    pub version: Option<String>,
}

impl fmt::Display for ArtifactSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}", self.raw_name, version),
            None => f.write_str(&self.raw_name),
        }
    }
}

/// The three shapes a runnable artifact can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A single-file PHAR, run through the interpreter.
    Archive,
    /// A package materialized by the external installer, with its `vendor/` tree.
    InstalledPackage,
    /// A loose PHP script run in place, never cached.
    DirectScript,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Archive => "archive",
            Self::InstalledPackage => "package",
            Self::DirectScript => "script",
        };
        f.write_str(label)
    }
}

/// What a spec string turned out to name, after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecTarget {
    /// An existing script file; the version portion, if any, was ignored.
    DirectScript {
        /// Canonical path of the script.
        path: PathBuf,
    },
    /// A PHAR, by canonical (alias-resolved) name or by local path.
    Archive {
        /// Canonical registry name (`phpunit.phar`) or a local path to a `.phar` file.
        name: String,
        /// Requested version label.
        version: Option<String>,
    },
    /// A Composer package name such as `vendor/tool`.
    Package {
        /// Normalized (lowercase) package name.
        name: String,
        /// Version constraint handed to the installer.
        version: Option<String>,
    },
}

impl SpecTarget {
    /// The artifact kind this target resolves to.
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::DirectScript { .. } => ArtifactKind::DirectScript,
            Self::Archive { .. } => ArtifactKind::Archive,
            Self::Package { .. } => ArtifactKind::InstalledPackage,
        }
    }
}

/// Deterministic identity of a cache entry.
///
/// Two specs that normalize to the same key always map to the same directory,
/// whether they were typed as an alias or as the canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: ArtifactKind,
    canonical: String,
    version: Option<String>,
}

impl CacheKey {
    /// Key of an archive. Only the file name of `name` takes part, so a local
    /// path and a registry name with the same basename share an entry.
    pub fn archive(name: &str, version: Option<&str>) -> Self {
        let basename = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        Self {
            kind: ArtifactKind::Archive,
            canonical: basename,
            version: version.map(str::to_string),
        }
    }

    /// Key of an installed package.
    pub fn package(name: &str, version: Option<&str>) -> Self {
        Self {
            kind: ArtifactKind::InstalledPackage,
            canonical: name.to_string(),
            version: version.map(str::to_string),
        }
    }

    /// The artifact kind the key belongs to.
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Canonical name: the archive file name, or the package name.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// The explicit version, if one was requested.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The version label used on disk: the requested version, or `latest`
    /// (archives) / `default` (packages).
    pub fn label(&self) -> &str {
        match (&self.version, self.kind) {
            (Some(version), _) => version,
            (None, ArtifactKind::Archive) => LATEST_LABEL,
            (None, _) => DEFAULT_LABEL,
        }
    }

    /// Archive name without its `.phar` extension (the per-archive directory name).
    pub fn stem(&self) -> &str {
        strip_archive_extension(&self.canonical)
    }
}

/// Strips a trailing `.phar` (any case) from a file name.
pub fn strip_archive_extension(name: &str) -> &str {
    let suffix_len = ARCHIVE_EXTENSION.len() + 1;
    if has_archive_extension(name) {
        name.get(..name.len() - suffix_len).unwrap_or(name)
    } else {
        name
    }
}

/// `true` when `name` ends with `.phar`, ignoring case.
pub fn has_archive_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// An artifact present in the cache (or on disk, for scripts) whose entry
/// point has not been located yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    /// Canonical name: archive file name, package name, or script file name.
    pub name: String,
    /// The artifact's directory.
    pub path: PathBuf,
    /// The artifact kind.
    pub kind: ArtifactKind,
}

/// A fully resolved artifact, ready for the execution bridge. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    name: String,
    path: PathBuf,
    kind: ArtifactKind,
    entry_point: PathBuf,
}

impl ResolvedArtifact {
    /// Pairs a cached artifact with the entry point found by the locator.
    pub fn new(cached: CachedArtifact, entry_point: PathBuf) -> Self {
        Self {
            name: cached.name,
            path: cached.path,
            kind: cached.kind,
            entry_point,
        }
    }

    /// Canonical name of the artifact.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The artifact's directory (a cache entry, or a script's parent directory).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The artifact kind.
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The file to launch.
    pub fn entry_point(&self) -> &Path {
        &self.entry_point
    }

    /// The artifact's dependency directory (`<path>/vendor`).
    pub fn vendor_dir(&self) -> PathBuf {
        self.path.join(VENDOR_DIR)
    }

    /// The artifact's own binary directory (`<path>/vendor/bin`).
    pub fn bin_dir(&self) -> PathBuf {
        self.vendor_dir().join(VENDOR_BIN_DIR)
    }
}
